//! Window attributes shared by the ONNX convolution and pooling operators.

use std::str::FromStr;

use crate::{
    error::Result,
    graph::ConvParams,
    onnx::node::Node,
};

/// The `auto_pad` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoPad {
    /// Explicit `pads`, zero when absent.
    #[default]
    NotSet,
    /// No padding.
    Valid,
    /// `ceil(in / stride)` outputs, odd padding element at the end.
    SameUpper,
    /// `ceil(in / stride)` outputs, odd padding element at the beginning.
    SameLower,
}

impl FromStr for AutoPad {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "" | "NOTSET" => Ok(AutoPad::NotSet),
            "VALID" => Ok(AutoPad::Valid),
            "SAME_UPPER" => Ok(AutoPad::SameUpper),
            "SAME_LOWER" => Ok(AutoPad::SameLower),
            other => Err(format!("unsupported auto_pad value '{other}'")),
        }
    }
}

/// Kernel spatial shape: the `kernel_shape` attribute, or the filter's
/// dimensions after (output channels, input channels).
pub fn get_kernel_shape(node: &Node, filter_shape: &[usize]) -> Result<Vec<usize>> {
    if filter_shape.len() < 3 {
        return Err(node.invalid_argument(format!(
            "filter must have at least 3 dimensions, got shape {filter_shape:?}"
        )));
    }
    let inferred = filter_shape[2..].to_vec();
    let Some(declared) = node.get_attribute::<Vec<i64>>("kernel_shape")? else {
        return Ok(inferred);
    };
    let declared = declared
        .iter()
        .map(|&k| usize::try_from(k).ok().filter(|&k| k > 0))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| {
            node.invalid_argument(format!("'kernel_shape' must be positive, got {declared:?}"))
        })?;
    if declared != inferred {
        return Err(node.invalid_argument(format!(
            "'kernel_shape' {declared:?} does not match filter shape {filter_shape:?}"
        )));
    }
    Ok(declared)
}

fn get_window_attribute(node: &Node, name: &str, kernel_rank: usize) -> Result<Vec<usize>> {
    let Some(values) = node.get_attribute::<Vec<i64>>(name)? else {
        return Ok(vec![1; kernel_rank]);
    };
    if values.len() != kernel_rank {
        return Err(node.invalid_argument(format!(
            "'{name}' has {} values but the kernel has {kernel_rank} spatial dimensions",
            values.len()
        )));
    }
    values
        .iter()
        .map(|&v| usize::try_from(v).ok().filter(|&v| v > 0))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| node.invalid_argument(format!("'{name}' must be positive, got {values:?}")))
}

/// The `strides` attribute, all ones when absent.
pub fn get_strides(node: &Node, kernel_rank: usize) -> Result<Vec<usize>> {
    get_window_attribute(node, "strides", kernel_rank)
}

/// The `dilations` attribute, all ones when absent.
pub fn get_dilations(node: &Node, kernel_rank: usize) -> Result<Vec<usize>> {
    get_window_attribute(node, "dilations", kernel_rank)
}

/// Padding below and above each spatial axis.
///
/// Explicit `pads` win; they hold either all begin values followed by all end
/// values, or one value per axis applied to both sides. Without `pads` the
/// padding follows `auto_pad`, which needs the input spatial sizes.
pub fn get_pads(
    node: &Node,
    data_spatial: &[usize],
    kernel_shape: &[usize],
    strides: &[usize],
    dilations: &[usize],
) -> Result<(Vec<i64>, Vec<i64>)> {
    let rank = kernel_shape.len();
    if let Some(pads) = node.get_attribute::<Vec<i64>>("pads")? {
        return if pads.len() == rank * 2 {
            Ok((pads[..rank].to_vec(), pads[rank..].to_vec()))
        } else if pads.len() == rank {
            Ok((pads.clone(), pads))
        } else {
            Err(node.invalid_argument(format!(
                "'pads' has {} values, expected {} or {}",
                pads.len(),
                rank,
                rank * 2
            )))
        };
    }

    let auto_pad: AutoPad = node
        .get_attribute_value("auto_pad", String::new())?
        .parse()
        .map_err(|message: String| node.invalid_argument(message))?;
    match auto_pad {
        AutoPad::NotSet | AutoPad::Valid => Ok((vec![0; rank], vec![0; rank])),
        AutoPad::SameUpper | AutoPad::SameLower => {
            if data_spatial.len() != rank {
                return Err(node.invalid_argument(format!(
                    "data has {} spatial dimensions but the kernel has {rank}",
                    data_spatial.len()
                )));
            }
            let mut below = Vec::with_capacity(rank);
            let mut above = Vec::with_capacity(rank);
            for axis in 0..rank {
                let input = data_spatial[axis] as i64;
                let stride = strides[axis] as i64;
                let window = ((kernel_shape[axis] - 1) * dilations[axis] + 1) as i64;
                let output = (input + stride - 1) / stride;
                let total = ((output - 1) * stride + window - input).max(0);
                let (small, large) = (total / 2, total - total / 2);
                if auto_pad == AutoPad::SameUpper {
                    below.push(small);
                    above.push(large);
                } else {
                    below.push(large);
                    above.push(small);
                }
            }
            Ok((below, above))
        }
    }
}

/// Convolution window parameters for `node`, with unit data dilations.
pub fn get_conv_params(
    node: &Node,
    data_shape: &[usize],
    filter_shape: &[usize],
) -> Result<ConvParams> {
    let kernel_shape = get_kernel_shape(node, filter_shape)?;
    let rank = kernel_shape.len();
    if data_shape.len() != rank + 2 {
        return Err(node.invalid_argument(format!(
            "data shape {data_shape:?} does not match a {rank}-D kernel"
        )));
    }
    let strides = get_strides(node, rank)?;
    let dilations = get_dilations(node, rank)?;
    let (padding_below, padding_above) =
        get_pads(node, &data_shape[2..], &kernel_shape, &strides, &dilations)?;
    ConvParams::new(strides, dilations, padding_below, padding_above)
        .map_err(|e| node.graph_error(e))
}
