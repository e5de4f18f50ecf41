//! Versioned lookup from ONNX operator names to their lowerings.

use std::collections::BTreeMap;

use log::debug;
use rustc_hash::FxHashMap;

use crate::{
    error::{ImportError, Result},
    graph::{Graph, NodeId},
    onnx::{node::Node, op, options::LoweringOptions},
};

/// Lowers one node into the graph, returning its outputs in order.
pub type LowerFn = fn(&Graph, &Node, &LoweringOptions) -> Result<Vec<NodeId>>;

/// The default ONNX domain may be spelled either way.
fn canonical_domain(domain: &str) -> &str {
    if domain == "ai.onnx" {
        ""
    } else {
        domain
    }
}

/// Maps `(domain, op_type)` to lowerings keyed by the opset version they
/// were introduced in.
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    operators: FxHashMap<(String, String), BTreeMap<i64, LowerFn>>,
    options: LoweringOptions,
}

impl OperatorRegistry {
    /// Creates a registry with no operators.
    pub fn empty(options: LoweringOptions) -> Self {
        Self {
            operators: FxHashMap::default(),
            options,
        }
    }

    /// Creates a registry with every built-in lowering.
    pub fn new(options: LoweringOptions) -> Self {
        let mut registry = Self::empty(options);
        registry.register("", "QLinearConv", 1, op::quant_conv);
        registry
    }

    pub fn options(&self) -> &LoweringOptions {
        &self.options
    }

    /// Registers `lower` for opset versions from `since_version` up to the
    /// next registration of the same operator.
    pub fn register(&mut self, domain: &str, op_type: &str, since_version: i64, lower: LowerFn) {
        self.operators
            .entry((canonical_domain(domain).to_string(), op_type.to_string()))
            .or_default()
            .insert(since_version, lower);
    }

    /// The newest lowering not newer than `version`.
    pub fn find(&self, domain: &str, op_type: &str, version: i64) -> Option<LowerFn> {
        self.operators
            .get(&(canonical_domain(domain).to_string(), op_type.to_string()))?
            .range(..=version)
            .next_back()
            .map(|(_, lower)| *lower)
    }

    pub fn is_registered(&self, domain: &str, op_type: &str, version: i64) -> bool {
        self.find(domain, op_type, version).is_some()
    }

    /// Lowers `node` with the lowering registered for `version`.
    pub fn lower(&self, graph: &Graph, node: &Node, version: i64) -> Result<Vec<NodeId>> {
        let lower = self
            .find(node.domain(), node.op_type(), version)
            .ok_or_else(|| ImportError::UnknownOperator {
                domain: node.domain().to_string(),
                op_type: node.op_type().to_string(),
                version,
            })?;
        debug!("Lowering {node} for opset {version}");
        lower(graph, node, &self.options)
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new(LoweringOptions::default())
    }
}
