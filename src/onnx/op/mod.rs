//! Lowerings for individual ONNX operators.

pub mod quant_conv;

pub use quant_conv::quant_conv;
