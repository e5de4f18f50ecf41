//! Quantized linear convolution builders.
//!
//! Each builder lowers exactly one ungrouped quantized convolution. Callers
//! that need groups split the operands first and call a builder per group.

use crate::{
    error::GraphError,
    graph::{ConvParams, ElementType, Graph, NodeId, RoundMode},
};

/// The three affine scales of a quantized convolution.
///
/// Each scale is a real tensor holding either one value or one value per
/// channel. The bundle only refers to nodes owned by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleBundle {
    pub data_scale: NodeId,
    pub filter_scale: NodeId,
    pub output_scale: NodeId,
}

/// Zero points matching a [`ScaleBundle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZeroPointBundle {
    pub data_zero_point: NodeId,
    pub filter_zero_point: NodeId,
    pub output_zero_point: NodeId,
}

/// Builds `(data_scale * filter_scale) / output_scale`, returning the product
/// node alongside the final scale.
fn requantization_scale(
    graph: &Graph,
    scales: &ScaleBundle,
) -> Result<(NodeId, NodeId), GraphError> {
    let product = graph.multiply(scales.data_scale, scales.filter_scale)?;
    let requantization_scale = graph.divide(product, scales.output_scale)?;
    Ok((product, requantization_scale))
}

/// Quantized convolution without zero points.
pub fn quantized_linear_convolution(
    graph: &Graph,
    data: NodeId,
    filters: NodeId,
    params: &ConvParams,
    scales: &ScaleBundle,
) -> Result<NodeId, GraphError> {
    let (_, requantization_scale) = requantization_scale(graph, scales)?;
    graph.quantized_convolution(data, filters, params.clone(), requantization_scale)
}

/// Quantized convolution with a per-output-channel bias.
///
/// A bias that is not already i32 is quantized to i32 with scale
/// `data_scale * filter_scale` and a zero point of 0.
pub fn quantized_linear_convolution_bias(
    graph: &Graph,
    data: NodeId,
    filters: NodeId,
    bias: NodeId,
    params: &ConvParams,
    scales: &ScaleBundle,
) -> Result<NodeId, GraphError> {
    let (bias_scale, requantization_scale) = requantization_scale(graph, scales)?;
    let bias = if graph.dtype(bias)? == ElementType::I32 {
        bias
    } else {
        let zero = graph.constant(0i32, ElementType::I32, graph.shape(bias_scale)?);
        graph.quantize(
            bias,
            bias_scale,
            zero,
            ElementType::I32,
            RoundMode::HalfToEven,
        )?
    };
    graph.quantized_convolution_bias(
        data,
        filters,
        bias,
        params.clone(),
        requantization_scale,
        false,
    )
}

/// Quantized convolution that keeps every scale and zero point as an operand.
pub fn quantized_linear_convolution_with_zero_points(
    graph: &Graph,
    data: NodeId,
    filters: NodeId,
    params: &ConvParams,
    scales: &ScaleBundle,
    zero_points: &ZeroPointBundle,
) -> Result<NodeId, GraphError> {
    graph.qlinear_convolution(
        data,
        scales.data_scale,
        zero_points.data_zero_point,
        filters,
        scales.filter_scale,
        zero_points.filter_zero_point,
        scales.output_scale,
        zero_points.output_zero_point,
        params.clone(),
    )
}
