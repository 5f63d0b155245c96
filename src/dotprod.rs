//! Dot products over real and interleaved-complex vectors.
//!
//! Complex vectors are stored interleaved: element `k` is `v[2k] + i * v[2k + 1]`.
//! These are the innermost loops of the whole engine (one call per unit, per
//! sample, per evaluation) so they are plain reductions with no branches and no
//! allocation.

/// Real dot product `sum(a[k] * b[k])` over the first `n` elements.
#[inline]
pub fn dotprod(n: usize, a: &[f64], b: &[f64]) -> f64 {
    debug_assert!(a.len() >= n && b.len() >= n);
    a[..n]
        .iter()
        .zip(&b[..n])
        .fold(0.0, |sum, (&x, &y)| sum + x * y)
}

/// Complex dot product of the first `n` complex elements of `a` and `b`.
///
/// Returns `(re, im)` of `sum((a_re + i a_im)(b_re + i b_im))`. `n == 0` gives `(0, 0)`.
#[inline]
pub fn dotprodc(n: usize, a: &[f64], b: &[f64]) -> (f64, f64) {
    debug_assert!(a.len() >= 2 * n && b.len() >= 2 * n);
    let mut re = 0.0;
    let mut im = 0.0;
    for (x, y) in a[..2 * n].chunks_exact(2).zip(b[..2 * n].chunks_exact(2)) {
        re += x[0] * y[0] - x[1] * y[1];
        im += x[0] * y[1] + x[1] * y[0];
    }
    (re, im)
}

/// Real part only of [`dotprodc`].
#[inline]
pub fn dotprodcr(n: usize, a: &[f64], b: &[f64]) -> f64 {
    debug_assert!(a.len() >= 2 * n && b.len() >= 2 * n);
    a[..2 * n]
        .chunks_exact(2)
        .zip(b[..2 * n].chunks_exact(2))
        .fold(0.0, |sum, (x, y)| sum + x[0] * y[0] - x[1] * y[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_product_sum_of_two_pairs() {
        let v1 = [1.0, 2.0, 3.0, 4.0];
        let v2 = [5.0, 6.0, 7.0, 8.0];
        let (re, im) = dotprodc(2, &v1, &v2);
        assert_eq!(re, -18.0);
        assert_eq!(im, 68.0);
        assert_eq!(dotprodcr(2, &v1, &v2), -18.0);
    }

    #[test]
    fn real_and_complex_kernels_round_alike() {
        // Re(a . b) == a . conj-signed(b) bit for bit when both accumulate the same way.
        let a = [0.1, 0.7, 1.0 / 3.0, -2.9, 1e-3, 5.5];
        let b = [0.3, 0.2, -1.0 / 7.0, 0.9, 123.456, 1.0 / 9.0];
        let flipped: Vec<f64> = b
            .chunks_exact(2)
            .flat_map(|y| [y[0], -y[1]])
            .collect();
        assert_eq!(dotprod(6, &a, &flipped), dotprodcr(3, &a, &b));
    }

    #[test]
    fn empty_vectors_give_zero() {
        assert_eq!(dotprodc(0, &[], &[]), (0.0, 0.0));
        assert_eq!(dotprodcr(0, &[], &[]), 0.0);
        assert_eq!(dotprod(0, &[], &[]), 0.0);
    }

    #[test]
    fn only_the_first_n_elements_are_used() {
        let a = [1.0, 2.0, 3.0, 100.0];
        let b = [4.0, 5.0, 6.0, 100.0];
        assert_eq!(dotprod(3, &a, &b), 32.0);

        // Trailing bias slots are ignored.
        let c = [1.0, 1.0, 9.0, 9.0];
        let d = [2.0, 3.0, 9.0, 9.0];
        assert_eq!(dotprodc(1, &c, &d), (-1.0, 5.0));
    }

    #[test]
    fn real_part_matches_full_complex_product() {
        let a: Vec<f64> = (0..14).map(|i| (i as f64 * 0.37).sin()).collect();
        let b: Vec<f64> = (0..14).map(|i| (i as f64 * 0.91).cos()).collect();
        let (re, _) = dotprodc(7, &a, &b);
        assert!((re - dotprodcr(7, &a, &b)).abs() < 1e-12);
    }
}
