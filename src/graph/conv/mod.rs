//! Convolution window parameters.

mod params;

pub use params::ConvParams;
