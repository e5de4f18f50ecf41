use crate::graph::{
    conv::ConvParams,
    dtype::{ElementType, Literal},
};

/// Rounding applied when a real value is converted to an integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoundMode {
    /// Ties go to the nearest even integer.
    #[default]
    HalfToEven,
    /// Ties go away from zero.
    HalfAwayFromZero,
}

/// An enumeration of all tensor operations a lowered graph can contain.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphOp {
    /// An input tensor to the graph.
    Input { name: String },
    /// A tensor filled with a single constant value.
    Constant(Literal),
    /// Element-wise product, a single-element side is broadcast.
    Multiply,
    /// Element-wise quotient, a single-element side is broadcast.
    Divide,
    /// Half-open `[lower, upper)` window per axis.
    Slice {
        lower_bounds: Vec<usize>,
        upper_bounds: Vec<usize>,
    },
    /// Joins tensors along `axis` in source order.
    Concat { axis: usize },
    /// `src[0] / src[1] + src[2]`, rounded into `output_type`.
    Quantize {
        output_type: ElementType,
        round_mode: RoundMode,
    },
    /// Quantized convolution with a single requantization scale.
    ///
    /// Sources: data, filters, requantization scale.
    QuantizedConvolution(ConvParams),
    /// Quantized convolution with an i32 bias.
    ///
    /// Sources: data, filters, bias, requantization scale.
    QuantizedConvolutionBias { params: ConvParams, with_relu: bool },
    /// Quantized convolution carrying every scale and zero point.
    ///
    /// Sources: data, data scale, data zero point, filters, filter scale,
    /// filter zero point, output scale, output zero point.
    QLinearConvolution(ConvParams),
}

impl GraphOp {
    /// Short operator name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            GraphOp::Input { .. } => "Input",
            GraphOp::Constant(_) => "Constant",
            GraphOp::Multiply => "Multiply",
            GraphOp::Divide => "Divide",
            GraphOp::Slice { .. } => "Slice",
            GraphOp::Concat { .. } => "Concat",
            GraphOp::Quantize { .. } => "Quantize",
            GraphOp::QuantizedConvolution(_) => "QuantizedConvolution",
            GraphOp::QuantizedConvolutionBias { .. } => "QuantizedConvolutionBias",
            GraphOp::QLinearConvolution(_) => "QLinearConvolution",
        }
    }

    pub fn is_slice(&self) -> bool {
        matches!(self, GraphOp::Slice { .. })
    }

    pub fn is_concat(&self) -> bool {
        matches!(self, GraphOp::Concat { .. })
    }

    /// Returns `true` for any of the three quantized convolution flavours.
    pub fn is_convolution(&self) -> bool {
        matches!(
            self,
            GraphOp::QuantizedConvolution(_)
                | GraphOp::QuantizedConvolutionBias { .. }
                | GraphOp::QLinearConvolution(_)
        )
    }

    /// Convolution parameters, if this is a convolution.
    pub fn conv_params(&self) -> Option<&ConvParams> {
        match self {
            GraphOp::QuantizedConvolution(params)
            | GraphOp::QuantizedConvolutionBias { params, .. }
            | GraphOp::QLinearConvolution(params) => Some(params),
            _ => None,
        }
    }
}
