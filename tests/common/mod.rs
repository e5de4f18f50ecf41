//! Shared fixtures for the QLinearConv integration tests.

#![allow(dead_code)]

pub mod interpreter;

use harp_onnx::graph::NodeData;
use harp_onnx::prelude::*;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A graph holding the eight `QLinearConv` operands as inputs.
///
/// Input names: `x`, `x_scale`, `x_zero_point`, `w`, `w_scale`,
/// `w_zero_point`, `y_scale`, `y_zero_point`.
pub struct QLinearConvFixture {
    pub graph: Graph,
    pub data: NodeId,
    pub data_scale: NodeId,
    pub data_zero_point: NodeId,
    pub filters: NodeId,
    pub filter_scale: NodeId,
    pub filter_zero_point: NodeId,
    pub output_scale: NodeId,
    pub output_zero_point: NodeId,
}

impl QLinearConvFixture {
    /// u8 data, per-tensor scales, i8 output zero point.
    pub fn new(data_shape: &[usize], filter_shape: &[usize], filter_type: ElementType) -> Self {
        Self::with_filter_scale_shape(data_shape, filter_shape, filter_type, vec![])
    }

    /// Same as [`QLinearConvFixture::new`] with one filter scale per output channel.
    pub fn per_channel(
        data_shape: &[usize],
        filter_shape: &[usize],
        filter_type: ElementType,
    ) -> Self {
        Self::with_filter_scale_shape(data_shape, filter_shape, filter_type, vec![filter_shape[0]])
    }

    fn with_filter_scale_shape(
        data_shape: &[usize],
        filter_shape: &[usize],
        filter_type: ElementType,
        filter_scale_shape: Vec<usize>,
    ) -> Self {
        let graph = Graph::new();
        let data = graph.input("x", ElementType::U8, data_shape.to_vec());
        let data_scale = graph.input("x_scale", ElementType::F32, vec![]);
        let data_zero_point = graph.input("x_zero_point", ElementType::U8, vec![]);
        let filters = graph.input("w", filter_type, filter_shape.to_vec());
        let filter_scale = graph.input("w_scale", ElementType::F32, filter_scale_shape.clone());
        let filter_zero_point = graph.input("w_zero_point", filter_type, filter_scale_shape);
        let output_scale = graph.input("y_scale", ElementType::F32, vec![]);
        let output_zero_point = graph.input("y_zero_point", ElementType::I8, vec![]);
        Self {
            graph,
            data,
            data_scale,
            data_zero_point,
            filters,
            filter_scale,
            filter_zero_point,
            output_scale,
            output_zero_point,
        }
    }

    pub fn scales(&self) -> ScaleBundle {
        ScaleBundle {
            data_scale: self.data_scale,
            filter_scale: self.filter_scale,
            output_scale: self.output_scale,
        }
    }

    pub fn operands(&self) -> Vec<NodeId> {
        vec![
            self.data,
            self.data_scale,
            self.data_zero_point,
            self.filters,
            self.filter_scale,
            self.filter_zero_point,
            self.output_scale,
            self.output_zero_point,
        ]
    }

    /// `QLinearConv` node with the eight required inputs.
    pub fn node(&self) -> Node {
        self.operands()
            .into_iter()
            .fold(Node::new("QLinearConv").with_name("conv"), Node::with_input)
    }

    /// `QLinearConv` node in the nine-input form; `bias` may be empty.
    pub fn node_with_bias(&self, bias: Option<NodeId>) -> Node {
        self.node().with_optional_input(bias)
    }

    /// Snapshot of every node, for structural comparisons.
    pub fn nodes(&self) -> Vec<NodeData> {
        self.graph.nodes.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&GraphOp) -> bool) -> usize {
        self.graph.count_ops(predicate)
    }
}

/// Deterministic small values for a tensor of `shape`.
pub fn pattern(shape: &[usize], seed: usize, modulus: usize, offset: f64) -> ndarray::ArrayD<f64> {
    let len: usize = shape.iter().product();
    let values = (0..len)
        .map(|i| ((i * 7 + seed * 13 + 3) % modulus) as f64 - offset)
        .collect();
    ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(shape), values).unwrap()
}
