//! Activation functions.
//!
//! A unit computes a net input `z = w . x + bias` and then squashes it:
//! `y = activation(z)`. Regression fits the net input directly, so every
//! nonlinearity here also has an inverse that maps a desired post-activation
//! value back to the net input that produces it.
//!
//! Complex units squash the modulus of `z` with `tanh` and leave its phase alone,
//! so `0` maps to `0` and every output lies strictly inside the unit disk.

/// Target activation for the output that matches a sample's class.
pub const NEURON_ON: f64 = 0.9;
/// Target activation for every other output.
pub const NEURON_OFF: f64 = 0.1;

// Inverses are evaluated on values pulled this far inside the open range.
const INVERSE_MARGIN: f64 = 1e-7;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Element-wise activation function for real-valued units.
pub enum Activation {
    /// `1 / (1 + exp(-x))`, range `(0, 1)`.
    #[default]
    Logistic,
    /// `tanh(x)`, range `(-1, 1)`.
    Tanh,
}

impl Activation {
    #[inline]
    pub fn forward(self, x: f64) -> f64 {
        match self {
            Activation::Logistic => logistic(x),
            Activation::Tanh => x.tanh(),
        }
    }

    /// Net input producing `y`. Values outside the open range are clamped first.
    #[inline]
    pub fn inverse(self, y: f64) -> f64 {
        match self {
            Activation::Logistic => {
                let y = y.clamp(INVERSE_MARGIN, 1.0 - INVERSE_MARGIN);
                (y / (1.0 - y)).ln()
            }
            Activation::Tanh => {
                let y = y.clamp(-1.0 + INVERSE_MARGIN, 1.0 - INVERSE_MARGIN);
                y.atanh()
            }
        }
    }
}

#[inline]
fn logistic(x: f64) -> f64 {
    // Numerically stable logistic.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

/// Complex activation: `tanh(|z|) * z / |z|`.
#[inline]
pub fn complex_forward(re: f64, im: f64) -> (f64, f64) {
    let r = re.hypot(im);
    if r <= f64::MIN_POSITIVE {
        return (0.0, 0.0);
    }
    let scale = r.tanh() / r;
    (re * scale, im * scale)
}

/// Inverse of [`complex_forward`]: `atanh(|y|) * y / |y|` with `|y|` clamped below 1.
#[inline]
pub fn complex_inverse(re: f64, im: f64) -> (f64, f64) {
    let r = re.hypot(im);
    if r <= f64::MIN_POSITIVE {
        return (0.0, 0.0);
    }
    let scale = r.min(1.0 - INVERSE_MARGIN).atanh() / r;
    (re * scale, im * scale)
}
