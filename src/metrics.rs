//! Network error metrics.
//!
//! Errors are reported per network (all outputs, all samples). The mean-square
//! figure carries a fixed `25x` scale so values stay comparable with existing
//! trained networks; regression and [`crate::Mlfn::trial_error`] use the same
//! scaling.

/// Scale applied to the mean squared error of a network.
pub const MSE_SCALE: f64 = 25.0;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Definition of network error used during training.
pub enum ErrorMetric {
    /// `25 * sum(delta^2) / (n_samples * n_outputs)`.
    #[default]
    MeanSquare,
    /// `sum(|delta|) / (n_samples * n_outputs)`; complex outputs use the modulus.
    MeanAbsolute,
}

impl ErrorMetric {
    /// Contribution of one real output.
    #[inline]
    pub fn real_term(self, delta: f64) -> f64 {
        match self {
            ErrorMetric::MeanSquare => delta * delta,
            ErrorMetric::MeanAbsolute => delta.abs(),
        }
    }

    /// Contribution of one complex output.
    #[inline]
    pub fn complex_term(self, d_re: f64, d_im: f64) -> f64 {
        match self {
            ErrorMetric::MeanSquare => d_re * d_re + d_im * d_im,
            ErrorMetric::MeanAbsolute => d_re.hypot(d_im),
        }
    }

    /// Turn an accumulated sum into the network error.
    #[inline]
    pub fn finish(self, sum: f64, n_samples: usize, n_outputs: usize) -> f64 {
        if n_samples == 0 || n_outputs == 0 {
            return 0.0;
        }
        let denom = n_samples as f64 * n_outputs as f64;
        match self {
            ErrorMetric::MeanSquare => MSE_SCALE * sum / denom,
            ErrorMetric::MeanAbsolute => sum / denom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_square_carries_fixed_scale() {
        let m = ErrorMetric::MeanSquare;
        let sum = m.real_term(0.2) + m.complex_term(0.3, 0.4);
        assert!((m.finish(sum, 2, 1) - 25.0 * (0.04 + 0.25) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn mean_absolute_uses_modulus() {
        let m = ErrorMetric::MeanAbsolute;
        assert!((m.complex_term(3.0, 4.0) - 5.0).abs() < 1e-12);
        assert_eq!(m.finish(6.0, 3, 2), 1.0);
    }

    #[test]
    fn no_samples_is_zero_error() {
        assert_eq!(ErrorMetric::MeanSquare.finish(1.0, 0, 2), 0.0);
    }
}
