use typed_builder::TypedBuilder;

/// Knobs that change which lowering an operator picks.
///
/// ```
/// use harp_onnx::onnx::LoweringOptions;
///
/// let options = LoweringOptions::builder().u8_fast_path(false).build();
/// assert!(!options.u8_fast_path);
/// assert!(LoweringOptions::default().u8_fast_path);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct LoweringOptions {
    /// Lower ungrouped, unbiased `QLinearConv` with u8 filters straight to a
    /// convolution that keeps every zero point, instead of folding the scales
    /// into one requantization scale.
    #[builder(default = true)]
    pub u8_fast_path: bool,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}
