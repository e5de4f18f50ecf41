//! Window parameters shared by every convolution node.

use crate::error::GraphError;

/// N-dimensional convolution window parameters.
///
/// Every sequence holds one entry per spatial dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConvParams {
    /// Window movement strides.
    pub strides: Vec<usize>,
    /// Spacing between filter taps.
    pub filter_dilations: Vec<usize>,
    /// Spacing inserted between data elements.
    pub data_dilations: Vec<usize>,
    /// Padding added before the first element of each spatial axis.
    pub padding_below: Vec<i64>,
    /// Padding added after the last element of each spatial axis.
    pub padding_above: Vec<i64>,
}

impl ConvParams {
    /// Creates parameters with unit data dilations.
    pub fn new(
        strides: Vec<usize>,
        filter_dilations: Vec<usize>,
        padding_below: Vec<i64>,
        padding_above: Vec<i64>,
    ) -> Result<Self, GraphError> {
        let data_dilations = vec![1; strides.len()];
        Self {
            strides,
            filter_dilations,
            data_dilations,
            padding_below,
            padding_above,
        }
        .validated()
    }

    /// Replaces the data dilations, re-checking the invariants.
    pub fn with_data_dilations(self, data_dilations: Vec<usize>) -> Result<Self, GraphError> {
        Self {
            data_dilations,
            ..self
        }
        .validated()
    }

    fn validated(self) -> Result<Self, GraphError> {
        let ndim = self.strides.len();
        let lengths = [
            ("filter_dilations", self.filter_dilations.len()),
            ("data_dilations", self.data_dilations.len()),
            ("padding_below", self.padding_below.len()),
            ("padding_above", self.padding_above.len()),
        ];
        for (name, len) in lengths {
            if len != ndim {
                return Err(GraphError::InvalidParameter(format!(
                    "{name} has {len} entries but strides has {ndim}"
                )));
            }
        }
        let positive = [
            ("strides", &self.strides),
            ("filter_dilations", &self.filter_dilations),
            ("data_dilations", &self.data_dilations),
        ];
        for (name, values) in positive {
            if values.contains(&0) {
                return Err(GraphError::InvalidParameter(format!(
                    "{name} must be positive, got {values:?}"
                )));
            }
        }
        Ok(self)
    }

    /// Number of spatial dimensions.
    pub fn ndim(&self) -> usize {
        self.strides.len()
    }

    /// Dilated kernel extent: `(k - 1) * d + 1`.
    pub fn effective_kernel_size(&self, kernel_size: &[usize]) -> Vec<usize> {
        kernel_size
            .iter()
            .zip(&self.filter_dilations)
            .map(|(&k, &d)| (k - 1) * d + 1)
            .collect()
    }

    /// Output spatial sizes for the given input spatial sizes and kernel.
    ///
    /// `out = (dilated_input + pad_below + pad_above - effective_kernel) / stride + 1`
    pub fn output_size(
        &self,
        input_size: &[usize],
        kernel_size: &[usize],
    ) -> Result<Vec<usize>, GraphError> {
        if input_size.len() != self.ndim() || kernel_size.len() != self.ndim() {
            return Err(GraphError::RankMismatch {
                expected: self.ndim(),
                found: input_size.len().max(kernel_size.len()),
            });
        }
        if kernel_size.contains(&0) {
            return Err(GraphError::InvalidParameter(format!(
                "kernel size must be positive, got {kernel_size:?}"
            )));
        }
        let eff_kernel = self.effective_kernel_size(kernel_size);
        (0..self.ndim())
            .map(|axis| {
                let dilated = match input_size[axis] {
                    0 => 0,
                    n => (n - 1) * self.data_dilations[axis] + 1,
                };
                let padded =
                    dilated as i64 + self.padding_below[axis] + self.padding_above[axis];
                let window = eff_kernel[axis] as i64;
                if padded < window {
                    return Err(GraphError::InvalidParameter(format!(
                        "window of size {window} does not fit padded input of size \
                         {padded} on spatial axis {axis}"
                    )));
                }
                Ok(((padded - window) as usize) / self.strides[axis] + 1)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn params_2d(stride: usize, dilation: usize, pad: i64) -> ConvParams {
        ConvParams::new(
            vec![stride; 2],
            vec![dilation; 2],
            vec![pad; 2],
            vec![pad; 2],
        )
        .unwrap()
    }

    #[test]
    fn test_new_sets_unit_data_dilations() {
        let params = params_2d(1, 1, 0);
        assert_eq!(params.ndim(), 2);
        assert_eq!(params.data_dilations, vec![1, 1]);
    }

    #[test]
    fn test_mismatched_lengths() {
        let err = ConvParams::new(vec![1, 1], vec![1], vec![0, 0], vec![0, 0]).unwrap_err();
        assert!(err.to_string().contains("filter_dilations"));
    }

    #[test]
    fn test_zero_stride_rejected() {
        let err = ConvParams::new(vec![0, 1], vec![1, 1], vec![0, 0], vec![0, 0]).unwrap_err();
        assert!(err.to_string().contains("strides must be positive"));
    }

    #[test]
    fn test_effective_kernel_size() {
        assert_eq!(params_2d(1, 1, 0).effective_kernel_size(&[3, 3]), vec![3, 3]);
        // (3 - 1) * 2 + 1
        assert_eq!(params_2d(1, 2, 0).effective_kernel_size(&[3, 3]), vec![5, 5]);
    }

    #[rstest]
    #[case(1, 1, 0, 10, 3, 8)]
    #[case(2, 1, 0, 10, 3, 4)]
    #[case(1, 2, 0, 10, 3, 6)]
    #[case(1, 1, 1, 10, 3, 10)]
    #[case(2, 1, 1, 7, 3, 4)]
    fn test_output_size(
        #[case] stride: usize,
        #[case] dilation: usize,
        #[case] pad: i64,
        #[case] input: usize,
        #[case] kernel: usize,
        #[case] expected: usize,
    ) {
        let params = params_2d(stride, dilation, pad);
        assert_eq!(
            params.output_size(&[input, input], &[kernel, kernel]).unwrap(),
            vec![expected, expected]
        );
    }

    #[test]
    fn test_output_size_with_data_dilation() {
        let params = params_2d(1, 1, 0).with_data_dilations(vec![2, 2]).unwrap();
        // dilated input: (4 - 1) * 2 + 1 = 7
        assert_eq!(params.output_size(&[4, 4], &[3, 3]).unwrap(), vec![5, 5]);
    }

    #[test]
    fn test_window_larger_than_input() {
        let params = params_2d(1, 1, 0);
        assert!(params.output_size(&[2, 2], &[3, 3]).is_err());
    }
}
