//! `QLinearConv` lowering.
//!
//! A grouped convolution is realised as one quantized convolution per group
//! over disjoint channel slices of the data and filters, concatenated back
//! along the channel axis:
//!
//! ```text
//! data   [N, C, ...]   --slice axis 1--> [N, C/G, ...]   --\
//!                                                          QuantizedConvolution x G
//! filter [M, C/G, ...] --slice axis 0--> [M/G, C/G, ...] --/          |
//!                                                          concat axis 1 --> [N, M, ...]
//! ```

use std::ops::Range;

use log::{debug, trace};

use crate::{
    builder::quantization::{
        quantized_linear_convolution, quantized_linear_convolution_bias,
        quantized_linear_convolution_with_zero_points, ScaleBundle, ZeroPointBundle,
    },
    error::{GraphError, Result},
    graph::{ConvParams, ElementType, Graph, NodeId},
    onnx::{convpool, node::Node, options::LoweringOptions},
};

/// Number of inputs when the optional bias is omitted.
const REQUIRED_INPUTS: usize = 8;
const BIAS_INPUT: usize = 8;

/// Channel axis of the data tensor (NCHW).
const DATA_CHANNEL_AXIS: usize = 1;
/// Output-channel axis of the filter tensor (OIHW).
const FILTER_CHANNEL_AXIS: usize = 0;
const CONCAT_AXIS: usize = 1;

/// Attributes `QLinearConv` reads besides the window attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantConvAttributes {
    /// Number of channel groups, 1 unless given.
    pub group: i64,
}

impl QuantConvAttributes {
    pub fn from_node(node: &Node) -> Result<Self> {
        Ok(Self {
            group: node.get_attribute_value("group", 1i64)?,
        })
    }
}

/// Positional operands of `QLinearConv`.
///
/// Order: data, data scale, data zero point, filters, filter scale, filter
/// zero point, output scale, output zero point and an optional bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantConvInputs {
    pub data: NodeId,
    pub filters: NodeId,
    pub scales: ScaleBundle,
    pub zero_points: ZeroPointBundle,
    pub bias: Option<NodeId>,
}

impl QuantConvInputs {
    pub fn from_node(node: &Node) -> Result<Self> {
        let count = node.inputs().len();
        if count != REQUIRED_INPUTS && count != REQUIRED_INPUTS + 1 {
            return Err(node.invalid_argument(format!(
                "expected {} or {} inputs, got {count}",
                REQUIRED_INPUTS,
                REQUIRED_INPUTS + 1
            )));
        }
        Ok(Self {
            data: node.input(0)?,
            filters: node.input(3)?,
            scales: ScaleBundle {
                data_scale: node.input(1)?,
                filter_scale: node.input(4)?,
                output_scale: node.input(6)?,
            },
            zero_points: ZeroPointBundle {
                data_zero_point: node.input(2)?,
                filter_zero_point: node.input(5)?,
                output_zero_point: node.input(7)?,
            },
            bias: node.optional_input(BIAS_INPUT),
        })
    }
}

/// Checks `group` against the channel counts and returns it as a group count.
///
/// The group count must be positive, no larger than either channel count and
/// divide both evenly.
pub fn validate_groups(
    node: &Node,
    group: i64,
    data_channels: usize,
    filter_channels: usize,
) -> Result<usize> {
    let groups = usize::try_from(group)
        .ok()
        .filter(|&g| g > 0 && g <= data_channels && g <= filter_channels)
        .ok_or_else(|| {
            node.invalid_argument(format!("incorrect value of 'group' attribute: {group}"))
        })?;
    if data_channels % groups != 0 {
        return Err(node.invalid_argument(format!(
            "data channels count ({data_channels}) must be a multiple of \
             the 'group' attribute value ({groups})"
        )));
    }
    if filter_channels % groups != 0 {
        return Err(node.invalid_argument(format!(
            "filter channels count ({filter_channels}) must be a multiple of \
             the 'group' attribute value ({groups})"
        )));
    }
    Ok(groups)
}

/// Splits `0..channels` into `groups` consecutive equal ranges.
///
/// `groups` must be positive and divide `channels`.
pub(crate) fn channel_ranges(channels: usize, groups: usize) -> Vec<Range<usize>> {
    let size = channels / groups;
    (0..groups).map(|g| g * size..(g + 1) * size).collect()
}

/// Which lowering a `QLinearConv` node takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoweringPath {
    /// One quantized convolution over the whole tensors.
    Plain,
    /// One quantized convolution with bias over the whole tensors.
    Biased { bias: NodeId },
    /// One convolution carrying every scale and zero point.
    FastPathU8,
    /// Per-group convolutions over channel slices, concatenated.
    Grouped { groups: usize },
    /// Grouped convolution with bias; rejected.
    GroupedBiased { groups: usize, bias: NodeId },
}

impl LoweringPath {
    /// Picks the path for a validated group count. A bias takes precedence
    /// over the u8 fast path.
    pub fn select(
        groups: usize,
        bias: Option<NodeId>,
        filter_type: ElementType,
        options: &LoweringOptions,
    ) -> Self {
        match bias {
            Some(bias) if groups == 1 => LoweringPath::Biased { bias },
            Some(bias) => LoweringPath::GroupedBiased { groups, bias },
            None if groups == 1 && filter_type == ElementType::U8 && options.u8_fast_path => {
                LoweringPath::FastPathU8
            }
            None if groups == 1 => LoweringPath::Plain,
            None => LoweringPath::Grouped { groups },
        }
    }
}

/// Slices `src` to `range` on `axis`, keeping every other axis whole.
fn slice_axis(
    graph: &Graph,
    src: NodeId,
    axis: usize,
    range: Range<usize>,
) -> std::result::Result<NodeId, GraphError> {
    let shape = graph.shape(src)?;
    if axis >= shape.len() {
        return Err(GraphError::AxisOutOfRange {
            axis,
            rank: shape.len(),
        });
    }
    let mut lower_bounds = vec![0; shape.len()];
    let mut upper_bounds = shape;
    lower_bounds[axis] = range.start;
    upper_bounds[axis] = range.end;
    graph.slice(src, lower_bounds, upper_bounds)
}

/// Builds the convolution for one `QLinearConv` node.
pub struct GroupedConvBuilder<'a> {
    graph: &'a Graph,
    node: &'a Node,
    inputs: &'a QuantConvInputs,
    params: &'a ConvParams,
}

impl<'a> GroupedConvBuilder<'a> {
    pub fn new(
        graph: &'a Graph,
        node: &'a Node,
        inputs: &'a QuantConvInputs,
        params: &'a ConvParams,
    ) -> Self {
        Self {
            graph,
            node,
            inputs,
            params,
        }
    }

    /// Emits the nodes for `path` and returns the output node.
    pub fn build(&self, path: LoweringPath) -> Result<NodeId> {
        let QuantConvInputs {
            data,
            filters,
            scales,
            zero_points,
            ..
        } = *self.inputs;
        let output = match path {
            LoweringPath::Plain => {
                quantized_linear_convolution(self.graph, data, filters, self.params, &scales)
            }
            LoweringPath::Biased { bias } => quantized_linear_convolution_bias(
                self.graph,
                data,
                filters,
                bias,
                self.params,
                &scales,
            ),
            LoweringPath::FastPathU8 => quantized_linear_convolution_with_zero_points(
                self.graph,
                data,
                filters,
                self.params,
                &scales,
                &zero_points,
            ),
            LoweringPath::Grouped { groups } => {
                let groups = self.checked_groups(groups)?;
                self.split_groups(groups)
            }
            LoweringPath::GroupedBiased { .. } => {
                return Err(self.node.not_supported(
                    "groups != 1 is not supported for quantized convolution with bias",
                ))
            }
        };
        output.map_err(|e| self.node.graph_error(e))
    }

    /// Re-checks a group count against the operand shapes, so that a path
    /// built outside [`quant_conv`] cannot drop channels.
    fn checked_groups(&self, groups: usize) -> Result<usize> {
        let channels = |id: NodeId, axis: usize, what: &str| -> Result<usize> {
            let shape = self.graph.shape(id).map_err(|e| self.node.graph_error(e))?;
            shape.get(axis).copied().ok_or_else(|| {
                self.node
                    .invalid_argument(format!("{what} of shape {shape:?} has no channel axis"))
            })
        };
        let data_channels = channels(self.inputs.data, DATA_CHANNEL_AXIS, "data")?;
        let filter_channels = channels(self.inputs.filters, FILTER_CHANNEL_AXIS, "filter")?;
        let group = i64::try_from(groups).unwrap_or(i64::MAX);
        validate_groups(self.node, group, data_channels, filter_channels)
    }

    /// The filter scale, sliced to the group when it holds one value per
    /// output channel.
    fn group_filter_scale(
        &self,
        filter_channels: usize,
        range: Range<usize>,
    ) -> std::result::Result<NodeId, GraphError> {
        let filter_scale = self.inputs.scales.filter_scale;
        let shape = self.graph.shape(filter_scale)?;
        if filter_channels > 1 && shape == [filter_channels] {
            slice_axis(self.graph, filter_scale, 0, range)
        } else {
            Ok(filter_scale)
        }
    }

    fn split_groups(&self, groups: usize) -> std::result::Result<NodeId, GraphError> {
        let QuantConvInputs {
            data,
            filters,
            scales,
            ..
        } = *self.inputs;
        let data_channels = self.graph.shape(data)?[DATA_CHANNEL_AXIS];
        let filter_channels = self.graph.shape(filters)?[FILTER_CHANNEL_AXIS];
        debug!(
            "Splitting {} into {groups} groups of {} data and {} filter channels",
            self.node,
            data_channels / groups,
            filter_channels / groups
        );

        let data_ranges = channel_ranges(data_channels, groups);
        let filter_ranges = channel_ranges(filter_channels, groups);
        let mut convolutions = Vec::with_capacity(groups);
        let ranges = data_ranges.into_iter().zip(filter_ranges);
        for (group, (data_range, filter_range)) in ranges.enumerate() {
            trace!("Group {group}: data {data_range:?}, filters {filter_range:?}");
            let sliced_data = slice_axis(self.graph, data, DATA_CHANNEL_AXIS, data_range)?;
            let sliced_filters =
                slice_axis(self.graph, filters, FILTER_CHANNEL_AXIS, filter_range.clone())?;
            let group_scales = ScaleBundle {
                filter_scale: self.group_filter_scale(filter_channels, filter_range)?,
                ..scales
            };
            convolutions.push(quantized_linear_convolution(
                self.graph,
                sliced_data,
                sliced_filters,
                self.params,
                &group_scales,
            )?);
        }
        self.graph.concat(convolutions, CONCAT_AXIS)
    }
}

/// Lowers a `QLinearConv` node, returning its single output.
pub fn quant_conv(graph: &Graph, node: &Node, options: &LoweringOptions) -> Result<Vec<NodeId>> {
    let inputs = QuantConvInputs::from_node(node)?;
    let attributes = QuantConvAttributes::from_node(node)?;

    let data_shape = graph.shape(inputs.data).map_err(|e| node.graph_error(e))?;
    let (filter_type, filter_shape) = graph
        .meta(inputs.filters)
        .map_err(|e| node.graph_error(e))?;
    if data_shape.len() < 3 {
        return Err(node.invalid_argument(format!(
            "data must have at least 3 dimensions, got shape {data_shape:?}"
        )));
    }
    if filter_shape.len() < 3 {
        return Err(node.invalid_argument(format!(
            "filter must have at least 3 dimensions, got shape {filter_shape:?}"
        )));
    }

    let groups = validate_groups(
        node,
        attributes.group,
        data_shape[DATA_CHANNEL_AXIS],
        filter_shape[FILTER_CHANNEL_AXIS],
    )?;
    let params = convpool::get_conv_params(node, &data_shape, &filter_shape)?;

    let path = LoweringPath::select(groups, inputs.bias, filter_type, options);
    debug!("Lowering {node} via {path:?}");
    let output = GroupedConvBuilder::new(graph, node, &inputs, &params).build(path)?;
    Ok(vec![output])
}
