//! Error types for graph construction and operator import.

use thiserror::Error;

use crate::graph::{ElementType, NodeId};

/// Raised by `Graph` when a node cannot be built from its sources.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// A `NodeId` that does not belong to the graph.
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeId),

    /// Two shapes that had to agree did not.
    #[error("Shape mismatch in {op}: {lhs:?} vs {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    /// Two element types that had to agree did not.
    #[error("Type mismatch in {op}: {lhs} vs {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: ElementType,
        rhs: ElementType,
    },

    /// A tensor has the wrong number of dimensions.
    #[error("Rank mismatch: expected {expected}, found {found}")]
    RankMismatch { expected: usize, found: usize },

    /// Axis outside the tensor's rank.
    #[error("Axis {axis} out of range for rank {rank}")]
    AxisOutOfRange { axis: usize, rank: usize },

    /// Slice bounds outside the source shape.
    #[error("Slice bounds {lower:?}..{upper:?} invalid for shape {shape:?}")]
    InvalidSlice {
        lower: Vec<usize>,
        upper: Vec<usize>,
        shape: Vec<usize>,
    },

    /// Any other inconsistent operator parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Raised while lowering an ONNX node.
///
/// `node` is the node's display form, e.g. `<Node(QLinearConv): conv1>`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ImportError {
    /// The node's inputs or attributes violate the operator contract.
    #[error("{node} {message}")]
    InvalidArgument { node: String, message: String },

    /// A configuration the lowering deliberately does not handle.
    #[error("{node} {message} (not supported)")]
    NotSupported { node: String, message: String },

    /// An attribute exists but holds a value of another type.
    #[error("{node} attribute '{name}' is {found}, expected {expected}")]
    AttributeType {
        node: String,
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Graph construction failed while lowering the node.
    #[error("{node} {source}")]
    Graph {
        node: String,
        #[source]
        source: GraphError,
    },

    /// No lowering is registered for the operator.
    #[error("unknown operator '{op_type}' in domain '{domain}' for opset version {version}")]
    UnknownOperator {
        domain: String,
        op_type: String,
        version: i64,
    },
}

/// Result alias used throughout the import layer.
pub type Result<T> = std::result::Result<T, ImportError>;
