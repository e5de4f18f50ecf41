//! Reference evaluator for lowered graphs.
//!
//! Every tensor is held as `ArrayD<f64>`; integer tensors hold whole numbers.
//! Only 2-D convolutions are supported, which is all the tests lower.

use harp_onnx::graph::{ConvParams, ElementType, Graph, GraphOp, Literal, NodeId, RoundMode};
use ndarray::{concatenate, ArrayD, Axis, IxDyn, Slice};
use rustc_hash::FxHashMap;

pub struct Interpreter<'g> {
    graph: &'g Graph,
    inputs: FxHashMap<String, ArrayD<f64>>,
    cache: FxHashMap<NodeId, ArrayD<f64>>,
}

fn saturate(value: f64, dtype: ElementType) -> f64 {
    let (lo, hi) = match dtype {
        ElementType::I8 => (i8::MIN as f64, i8::MAX as f64),
        ElementType::U8 => (0.0, u8::MAX as f64),
        ElementType::I32 => (i32::MIN as f64, i32::MAX as f64),
        other => panic!("no saturation range for {other}"),
    };
    value.clamp(lo, hi)
}

fn round(value: f64, mode: RoundMode) -> f64 {
    match mode {
        RoundMode::HalfToEven => value.round_ties_even(),
        RoundMode::HalfAwayFromZero => value.round(),
    }
}

/// Value of a scalar or per-channel tensor for channel `c`.
fn channel_value(values: &ArrayD<f64>, c: usize) -> f64 {
    if values.len() == 1 {
        values.iter().next().copied().unwrap()
    } else {
        values.as_slice().unwrap()[c]
    }
}

fn broadcast(lhs: &ArrayD<f64>, rhs: &ArrayD<f64>, f: impl Fn(f64, f64) -> f64) -> ArrayD<f64> {
    if lhs.shape() == rhs.shape() {
        let mut out = lhs.clone();
        out.zip_mut_with(rhs, |a, &b| *a = f(*a, b));
        out
    } else if rhs.len() == 1 {
        let b = channel_value(rhs, 0);
        lhs.mapv(|a| f(a, b))
    } else {
        let a = channel_value(lhs, 0);
        rhs.mapv(|b| f(a, b))
    }
}

/// Integer accumulation of a 2-D NCHW x OIHW convolution.
fn convolve(
    data: &ArrayD<f64>,
    filters: &ArrayD<f64>,
    params: &ConvParams,
    data_zero_point: f64,
    filter_zero_point: impl Fn(usize) -> f64,
) -> ArrayD<f64> {
    assert_eq!(data.ndim(), 4, "reference convolution is 2-D only");
    assert_eq!(params.data_dilations, vec![1, 1]);
    let (n, c_in, h, w) = (data.shape()[0], data.shape()[1], data.shape()[2], data.shape()[3]);
    let (m, kh, kw) = (filters.shape()[0], filters.shape()[2], filters.shape()[3]);
    let out_size = params.output_size(&[h, w], &[kh, kw]).unwrap();
    let (oh, ow) = (out_size[0], out_size[1]);

    let mut out = ArrayD::<f64>::zeros(IxDyn(&[n, m, oh, ow]));
    for b in 0..n {
        for o in 0..m {
            let wzp = filter_zero_point(o);
            for y in 0..oh {
                for x in 0..ow {
                    let mut acc = 0.0;
                    for c in 0..c_in {
                        for i in 0..kh {
                            for j in 0..kw {
                                let iy = (y * params.strides[0] + i * params.filter_dilations[0])
                                    as i64
                                    - params.padding_below[0];
                                let ix = (x * params.strides[1] + j * params.filter_dilations[1])
                                    as i64
                                    - params.padding_below[1];
                                if iy < 0 || ix < 0 || iy >= h as i64 || ix >= w as i64 {
                                    continue;
                                }
                                let d = data[[b, c, iy as usize, ix as usize].as_slice()]
                                    - data_zero_point;
                                let k = filters[[o, c, i, j].as_slice()] - wzp;
                                acc += d * k;
                            }
                        }
                    }
                    out[[b, o, y, x].as_slice()] = acc;
                }
            }
        }
    }
    out
}

/// Applies `f(acc, channel)` to every element of an NCHW tensor.
fn per_channel(acc: ArrayD<f64>, f: impl Fn(f64, usize) -> f64) -> ArrayD<f64> {
    let mut out = acc;
    for (index, value) in out.indexed_iter_mut() {
        *value = f(*value, index[1]);
    }
    out
}

impl<'g> Interpreter<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            inputs: FxHashMap::default(),
            cache: FxHashMap::default(),
        }
    }

    pub fn bind(mut self, name: &str, value: ArrayD<f64>) -> Self {
        self.inputs.insert(name.to_string(), value);
        self
    }

    /// Binds a scalar input.
    pub fn bind_scalar(self, name: &str, value: f64) -> Self {
        self.bind(name, ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn evaluate(&mut self, id: NodeId) -> ArrayD<f64> {
        if let Some(value) = self.cache.get(&id) {
            return value.clone();
        }
        let node = self.graph.node(id).unwrap();
        let src: Vec<ArrayD<f64>> = node.src.iter().map(|&s| self.evaluate(s)).collect();

        let value = match &node.op {
            GraphOp::Input { name } => {
                let value = self
                    .inputs
                    .get(name)
                    .unwrap_or_else(|| panic!("input '{name}' is not bound"))
                    .clone();
                assert_eq!(value.shape(), node.shape.as_slice(), "input '{name}'");
                value
            }
            GraphOp::Constant(literal) => {
                let v = match literal {
                    Literal::Int(v) => *v as f64,
                    Literal::Float(v) => *v,
                };
                ArrayD::from_elem(IxDyn(&node.shape), v)
            }
            GraphOp::Multiply => broadcast(&src[0], &src[1], |a, b| a * b),
            GraphOp::Divide => broadcast(&src[0], &src[1], |a, b| a / b),
            GraphOp::Slice {
                lower_bounds,
                upper_bounds,
            } => src[0]
                .slice_each_axis(|axis| {
                    let i = axis.axis.index();
                    Slice::from(lower_bounds[i]..upper_bounds[i])
                })
                .to_owned(),
            GraphOp::Concat { axis } => {
                let views: Vec<_> = src.iter().map(|a| a.view()).collect();
                concatenate(Axis(*axis), &views).unwrap()
            }
            GraphOp::Quantize {
                output_type,
                round_mode,
            } => {
                let mut out = src[0].clone();
                for (i, value) in out.iter_mut().enumerate() {
                    let scale = channel_value(&src[1], i);
                    let zero_point = channel_value(&src[2], i);
                    let rounded = round(*value / scale, *round_mode);
                    *value = saturate(rounded + zero_point, *output_type);
                }
                out
            }
            GraphOp::QuantizedConvolution(params) => {
                let acc = convolve(&src[0], &src[1], params, 0.0, |_| 0.0);
                per_channel(acc, |acc, c| {
                    let scale = channel_value(&src[2], c);
                    saturate(round(acc * scale, RoundMode::HalfToEven), node.dtype)
                })
            }
            GraphOp::QuantizedConvolutionBias { params, .. } => {
                let acc = convolve(&src[0], &src[1], params, 0.0, |_| 0.0);
                per_channel(acc, |acc, c| {
                    let biased = acc + src[2].as_slice().unwrap()[c];
                    saturate(
                        round(biased * channel_value(&src[3], c), RoundMode::HalfToEven),
                        node.dtype,
                    )
                })
            }
            GraphOp::QLinearConvolution(params) => {
                let [
                    data,
                    data_scale,
                    data_zp,
                    filters,
                    filter_scale,
                    filter_zp,
                    output_scale,
                    output_zp,
                ] = &src[..]
                else {
                    panic!("QLinearConvolution takes eight operands");
                };
                let acc = convolve(data, filters, params, channel_value(data_zp, 0), |c| {
                    channel_value(filter_zp, c)
                });
                per_channel(acc, |acc, c| {
                    let scale = channel_value(data_scale, 0) * channel_value(filter_scale, c)
                        / channel_value(output_scale, 0);
                    saturate(
                        round(acc * scale, RoundMode::HalfToEven) + channel_value(output_zp, 0),
                        node.dtype,
                    )
                })
            }
        };

        assert_eq!(value.shape(), node.shape.as_slice(), "{} {id:?}", node.op.name());
        self.cache.insert(id, value.clone());
        value
    }
}
