//! Node constructors with shape and type inference.

use log::trace;

use crate::{
    error::GraphError,
    graph::{
        conv::ConvParams,
        dtype::ElementType,
        graph::Graph,
        node::NodeId,
        op::{GraphOp, RoundMode},
    },
};

fn num_elements(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Result shape of an element-wise binary op where a single-element side is
/// broadcast against the other.
fn broadcast_shape(
    op: &'static str,
    lhs: &[usize],
    rhs: &[usize],
) -> Result<Vec<usize>, GraphError> {
    if lhs == rhs {
        Ok(lhs.to_vec())
    } else if num_elements(rhs) == 1 && rhs.len() <= lhs.len() {
        Ok(lhs.to_vec())
    } else if num_elements(lhs) == 1 && lhs.len() <= rhs.len() {
        Ok(rhs.to_vec())
    } else {
        Err(GraphError::ShapeMismatch {
            op,
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        })
    }
}

fn expect_quantized(op: &'static str, dtype: ElementType) -> Result<(), GraphError> {
    if dtype.is_quantized() {
        Ok(())
    } else {
        Err(GraphError::InvalidParameter(format!(
            "{op} expects an 8-bit quantized operand, got {dtype}"
        )))
    }
}

fn expect_real(op: &'static str, dtype: ElementType) -> Result<(), GraphError> {
    if dtype.is_real() {
        Ok(())
    } else {
        Err(GraphError::InvalidParameter(format!(
            "{op} expects a real-valued scale, got {dtype}"
        )))
    }
}

/// Output shape of an NC[spatial] x OI[spatial] convolution.
fn conv_output_shape(
    op: &'static str,
    data_shape: &[usize],
    filter_shape: &[usize],
    params: &ConvParams,
) -> Result<Vec<usize>, GraphError> {
    if data_shape.len() < 3 {
        return Err(GraphError::RankMismatch {
            expected: 3,
            found: data_shape.len(),
        });
    }
    if filter_shape.len() != data_shape.len() {
        return Err(GraphError::RankMismatch {
            expected: data_shape.len(),
            found: filter_shape.len(),
        });
    }
    if params.ndim() != data_shape.len() - 2 {
        return Err(GraphError::RankMismatch {
            expected: data_shape.len() - 2,
            found: params.ndim(),
        });
    }
    if data_shape[1] != filter_shape[1] {
        return Err(GraphError::ShapeMismatch {
            op,
            lhs: data_shape.to_vec(),
            rhs: filter_shape.to_vec(),
        });
    }
    let spatial = params.output_size(&data_shape[2..], &filter_shape[2..])?;
    let mut shape = vec![data_shape[0], filter_shape[0]];
    shape.extend(spatial);
    Ok(shape)
}

/// A scale is either per-tensor or one value per output channel.
fn check_scale_len(
    op: &'static str,
    scale_shape: &[usize],
    output_channels: usize,
) -> Result<(), GraphError> {
    let n = num_elements(scale_shape);
    if n == 1 || n == output_channels {
        Ok(())
    } else {
        Err(GraphError::InvalidParameter(format!(
            "{op} scale of shape {scale_shape:?} matches neither a single value \
             nor {output_channels} output channels"
        )))
    }
}

impl Graph {
    fn binary(&self, op: GraphOp, lhs: NodeId, rhs: NodeId) -> Result<NodeId, GraphError> {
        let name = op.name();
        let (lhs_dtype, lhs_shape) = self.meta(lhs)?;
        let (rhs_dtype, rhs_shape) = self.meta(rhs)?;
        if lhs_dtype != rhs_dtype {
            return Err(GraphError::TypeMismatch {
                op: name,
                lhs: lhs_dtype,
                rhs: rhs_dtype,
            });
        }
        let shape = broadcast_shape(name, &lhs_shape, &rhs_shape)?;
        Ok(self.add_node(op, vec![lhs, rhs], lhs_dtype, shape))
    }

    pub fn multiply(&self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, GraphError> {
        self.binary(GraphOp::Multiply, lhs, rhs)
    }

    pub fn divide(&self, lhs: NodeId, rhs: NodeId) -> Result<NodeId, GraphError> {
        self.binary(GraphOp::Divide, lhs, rhs)
    }

    /// Slices `src` to `[lower_bounds[i], upper_bounds[i])` on every axis.
    pub fn slice(
        &self,
        src: NodeId,
        lower_bounds: Vec<usize>,
        upper_bounds: Vec<usize>,
    ) -> Result<NodeId, GraphError> {
        let (dtype, shape) = self.meta(src)?;
        let valid = lower_bounds.len() == shape.len()
            && upper_bounds.len() == shape.len()
            && lower_bounds
                .iter()
                .zip(&upper_bounds)
                .zip(&shape)
                .all(|((lo, hi), dim)| lo <= hi && hi <= dim);
        if !valid {
            return Err(GraphError::InvalidSlice {
                lower: lower_bounds,
                upper: upper_bounds,
                shape,
            });
        }
        let new_shape = lower_bounds
            .iter()
            .zip(&upper_bounds)
            .map(|(lo, hi)| hi - lo)
            .collect();
        trace!("Slice {src:?} to {lower_bounds:?}..{upper_bounds:?}");
        Ok(self.add_node(
            GraphOp::Slice {
                lower_bounds,
                upper_bounds,
            },
            vec![src],
            dtype,
            new_shape,
        ))
    }

    /// Concatenates `srcs` along `axis`, in order.
    pub fn concat(&self, srcs: Vec<NodeId>, axis: usize) -> Result<NodeId, GraphError> {
        let first = *srcs.first().ok_or_else(|| {
            GraphError::InvalidParameter("Concat needs at least one source".to_string())
        })?;
        let (dtype, mut shape) = self.meta(first)?;
        if axis >= shape.len() {
            return Err(GraphError::AxisOutOfRange {
                axis,
                rank: shape.len(),
            });
        }
        for &src in &srcs[1..] {
            let (src_dtype, src_shape) = self.meta(src)?;
            if src_dtype != dtype {
                return Err(GraphError::TypeMismatch {
                    op: "Concat",
                    lhs: dtype,
                    rhs: src_dtype,
                });
            }
            let compatible = src_shape.len() == shape.len()
                && src_shape
                    .iter()
                    .zip(&shape)
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);
            if !compatible {
                return Err(GraphError::ShapeMismatch {
                    op: "Concat",
                    lhs: shape,
                    rhs: src_shape,
                });
            }
            shape[axis] += src_shape[axis];
        }
        Ok(self.add_node(GraphOp::Concat { axis }, srcs, dtype, shape))
    }

    /// Quantizes a real tensor: `round(src / scale) + zero_point`.
    pub fn quantize(
        &self,
        src: NodeId,
        scale: NodeId,
        zero_point: NodeId,
        output_type: ElementType,
        round_mode: RoundMode,
    ) -> Result<NodeId, GraphError> {
        let (src_dtype, shape) = self.meta(src)?;
        let (scale_dtype, scale_shape) = self.meta(scale)?;
        let (zp_dtype, zp_shape) = self.meta(zero_point)?;
        expect_real("Quantize", src_dtype)?;
        if scale_dtype != src_dtype {
            return Err(GraphError::TypeMismatch {
                op: "Quantize",
                lhs: src_dtype,
                rhs: scale_dtype,
            });
        }
        if zp_dtype != output_type {
            return Err(GraphError::TypeMismatch {
                op: "Quantize",
                lhs: output_type,
                rhs: zp_dtype,
            });
        }
        if scale_shape != zp_shape {
            return Err(GraphError::ShapeMismatch {
                op: "Quantize",
                lhs: scale_shape,
                rhs: zp_shape,
            });
        }
        broadcast_shape("Quantize", &shape, &scale_shape)?;
        Ok(self.add_node(
            GraphOp::Quantize {
                output_type,
                round_mode,
            },
            vec![src, scale, zero_point],
            output_type,
            shape,
        ))
    }

    /// Quantized convolution requantized by a single scale tensor. Output is i8.
    pub fn quantized_convolution(
        &self,
        data: NodeId,
        filters: NodeId,
        params: ConvParams,
        requantization_scale: NodeId,
    ) -> Result<NodeId, GraphError> {
        const OP: &str = "QuantizedConvolution";
        let (data_dtype, data_shape) = self.meta(data)?;
        let (filter_dtype, filter_shape) = self.meta(filters)?;
        let (scale_dtype, scale_shape) = self.meta(requantization_scale)?;
        expect_quantized(OP, data_dtype)?;
        expect_quantized(OP, filter_dtype)?;
        expect_real(OP, scale_dtype)?;
        let shape = conv_output_shape(OP, &data_shape, &filter_shape, &params)?;
        check_scale_len(OP, &scale_shape, filter_shape[0])?;
        trace!("{OP} {data:?} x {filters:?} -> {shape:?}");
        Ok(self.add_node(
            GraphOp::QuantizedConvolution(params),
            vec![data, filters, requantization_scale],
            ElementType::I8,
            shape,
        ))
    }

    /// Quantized convolution with an i32 bias of one value per output channel.
    ///
    /// Output is i8, or u8 when `with_relu` is set.
    pub fn quantized_convolution_bias(
        &self,
        data: NodeId,
        filters: NodeId,
        bias: NodeId,
        params: ConvParams,
        requantization_scale: NodeId,
        with_relu: bool,
    ) -> Result<NodeId, GraphError> {
        const OP: &str = "QuantizedConvolutionBias";
        let (data_dtype, data_shape) = self.meta(data)?;
        let (filter_dtype, filter_shape) = self.meta(filters)?;
        let (bias_dtype, bias_shape) = self.meta(bias)?;
        let (scale_dtype, scale_shape) = self.meta(requantization_scale)?;
        expect_quantized(OP, data_dtype)?;
        expect_quantized(OP, filter_dtype)?;
        expect_real(OP, scale_dtype)?;
        if bias_dtype != ElementType::I32 {
            return Err(GraphError::TypeMismatch {
                op: OP,
                lhs: ElementType::I32,
                rhs: bias_dtype,
            });
        }
        let shape = conv_output_shape(OP, &data_shape, &filter_shape, &params)?;
        if bias_shape != [filter_shape[0]] {
            return Err(GraphError::ShapeMismatch {
                op: OP,
                lhs: vec![filter_shape[0]],
                rhs: bias_shape,
            });
        }
        check_scale_len(OP, &scale_shape, filter_shape[0])?;
        let output_type = if with_relu {
            ElementType::U8
        } else {
            ElementType::I8
        };
        trace!("{OP} {data:?} x {filters:?} + {bias:?} -> {shape:?}");
        Ok(self.add_node(
            GraphOp::QuantizedConvolutionBias { params, with_relu },
            vec![data, filters, bias, requantization_scale],
            output_type,
            shape,
        ))
    }

    /// Quantized convolution carrying every scale and zero point.
    ///
    /// The output element type is the output zero point's type.
    #[allow(clippy::too_many_arguments)]
    pub fn qlinear_convolution(
        &self,
        data: NodeId,
        data_scale: NodeId,
        data_zero_point: NodeId,
        filters: NodeId,
        filter_scale: NodeId,
        filter_zero_point: NodeId,
        output_scale: NodeId,
        output_zero_point: NodeId,
        params: ConvParams,
    ) -> Result<NodeId, GraphError> {
        const OP: &str = "QLinearConvolution";
        let (data_dtype, data_shape) = self.meta(data)?;
        let (filter_dtype, filter_shape) = self.meta(filters)?;
        expect_quantized(OP, data_dtype)?;
        expect_quantized(OP, filter_dtype)?;
        let shape = conv_output_shape(OP, &data_shape, &filter_shape, &params)?;

        let operand_pairs = [
            (data_scale, data_zero_point, data_dtype),
            (filter_scale, filter_zero_point, filter_dtype),
        ];
        for (scale, zero_point, expected) in operand_pairs {
            expect_real(OP, self.dtype(scale)?)?;
            let zp_dtype = self.dtype(zero_point)?;
            if zp_dtype != expected {
                return Err(GraphError::TypeMismatch {
                    op: OP,
                    lhs: expected,
                    rhs: zp_dtype,
                });
            }
        }
        expect_real(OP, self.dtype(output_scale)?)?;
        let (output_type, _) = self.meta(output_zero_point)?;
        expect_quantized(OP, output_type)?;
        check_scale_len(OP, &self.shape(filter_scale)?, filter_shape[0])?;

        trace!("{OP} {data:?} x {filters:?} -> {shape:?}");
        Ok(self.add_node(
            GraphOp::QLinearConvolution(params),
            vec![
                data,
                data_scale,
                data_zero_point,
                filters,
                filter_scale,
                filter_zero_point,
                output_scale,
                output_zero_point,
            ],
            output_type,
            shape,
        ))
    }
}
