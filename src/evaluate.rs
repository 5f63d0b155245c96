//! Forward evaluation of a single unit.
//!
//! Each evaluator takes the layer input vector, the unit's weight vector (bias
//! last), the logical input count `n`, and whether the unit is linear. Linear
//! units return their net input unchanged.
//!
//! Weight vector lengths:
//! - real -> real: `n + 1`
//! - complex -> real / complex -> complex: `2n + 2` (complex bias pair last)

use crate::activation::{self, Activation};
use crate::dotprod::{dotprod, dotprodc, dotprodcr};
use crate::layer::UnitKind;

/// Real inputs, real output.
#[inline]
pub fn activity_rr(input: &[f64], coefs: &[f64], n: usize, linear: bool, act: Activation) -> f64 {
    debug_assert!(coefs.len() > n);
    let net = dotprod(n, input, coefs) + coefs[n];
    if linear { net } else { act.forward(net) }
}

/// Complex inputs, real output: the real part of the complex net input.
#[inline]
pub fn activity_cr(input: &[f64], coefs: &[f64], n: usize, linear: bool, act: Activation) -> f64 {
    debug_assert!(coefs.len() > 2 * n);
    // Bias input is 1 + 0i, so only the real part of the bias weight survives.
    let net = dotprodcr(n, input, coefs) + coefs[2 * n];
    if linear { net } else { act.forward(net) }
}

/// Complex inputs, complex output.
#[inline]
pub fn activity_cc(input: &[f64], coefs: &[f64], n: usize, linear: bool) -> (f64, f64) {
    debug_assert!(coefs.len() > 2 * n + 1);
    let (re, im) = dotprodc(n, input, coefs);
    let re = re + coefs[2 * n];
    let im = im + coefs[2 * n + 1];
    if linear {
        (re, im)
    } else {
        activation::complex_forward(re, im)
    }
}

/// Evaluate every unit of a layer, writing `kind.out_width()` numbers per unit.
///
/// `weights` is the layer's whole span (units back to back, `n_in_numeric` each).
pub fn layer_forward(
    kind: UnitKind,
    input: &[f64],
    weights: &[f64],
    n_in: usize,
    linear: bool,
    act: Activation,
    out: &mut [f64],
) {
    let stride = n_in * kind.in_width() + kind.in_width();
    debug_assert_eq!(weights.len() % stride, 0);
    let coefs = weights.chunks_exact(stride);
    match kind {
        UnitKind::RealToReal => {
            for (o, w) in out.iter_mut().zip(coefs) {
                *o = activity_rr(input, w, n_in, linear, act);
            }
        }
        UnitKind::ComplexToReal => {
            for (o, w) in out.iter_mut().zip(coefs) {
                *o = activity_cr(input, w, n_in, linear, act);
            }
        }
        UnitKind::ComplexToComplex => {
            for (o, w) in out.chunks_exact_mut(2).zip(coefs) {
                let (re, im) = activity_cc(input, w, n_in, linear);
                o[0] = re;
                o[1] = im;
            }
        }
    }
}
