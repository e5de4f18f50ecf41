//! Composite node builders layered on top of the graph primitives.

pub mod quantization;
