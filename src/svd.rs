//! Singular value decomposition and least-squares back-substitution.
//!
//! Typical use:
//!
//! 1. Build an [`SvdSolver`] for a `rows x cols` design matrix. All buffers are
//!    allocated up front; if that fails the solver is permanently unusable
//!    (`is_ok() == false`) and every later call returns
//!    [`Error::SolverUnavailable`] without touching memory.
//! 2. Fill the design matrix (row-major) through [`SvdSolver::a_mut`] and call
//!    [`SvdSolver::decompose`].
//! 3. For each right-hand side, fill [`SvdSolver::b_mut`] and call
//!    [`SvdSolver::backsub`].
//!
//! The decomposition is the Golub-Reinsch scheme: Householder reduction to upper
//! bidiagonal form, accumulation of the left and right transforms, then implicit
//! shifted QR sweeps on the bidiagonal until every superdiagonal element is
//! negligible relative to the matrix norm. Singular values come out unsorted and
//! non-negative.
//!
//! Systems with fewer rows than columns are padded with zero rows internally,
//! which leaves the least-squares problem unchanged.

use tracing::{debug, warn};

use crate::{Error, Result};

const MAX_QR_ITERATIONS: usize = 75;

#[derive(Debug, Clone)]
/// Workspace for `A = U diag(W) V^T` and tolerant back-substitution.
pub struct SvdSolver {
    rows: usize,
    padded_rows: usize,
    cols: usize,
    preserve_input: bool,
    ok: bool,
    decomposed: bool,
    /// `padded_rows x cols`. Overwritten by `U` unless `preserve_input`.
    a: Vec<f64>,
    /// `U` when `preserve_input`, otherwise empty.
    u: Vec<f64>,
    w: Vec<f64>,
    v: Vec<f64>,
    b: Vec<f64>,
    work: Vec<f64>,
    norm: f64,
}

impl SvdSolver {
    /// Allocate a workspace for a `rows x cols` system.
    ///
    /// With `preserve_input` the design matrix stays intact and `U` is produced in
    /// a separate buffer. Zero dimensions or a failed allocation yield a solver
    /// with `is_ok() == false`.
    pub fn new(rows: usize, cols: usize, preserve_input: bool) -> Self {
        if rows == 0 || cols == 0 {
            debug!(rows, cols, "empty svd system");
            return Self::failed(rows, cols, preserve_input);
        }
        match Self::allocate(rows, cols, preserve_input) {
            Some(solver) => solver,
            None => {
                warn!(rows, cols, "svd workspace allocation failed");
                Self::failed(rows, cols, preserve_input)
            }
        }
    }

    /// Like [`SvdSolver::new`], but reports a failed allocation as an error.
    pub fn try_new(rows: usize, cols: usize, preserve_input: bool) -> Result<Self> {
        let solver = Self::new(rows, cols, preserve_input);
        if solver.ok {
            Ok(solver)
        } else {
            Err(Error::SolverUnavailable)
        }
    }

    fn allocate(rows: usize, cols: usize, preserve_input: bool) -> Option<Self> {
        let padded_rows = rows.max(cols);
        let a_len = padded_rows.checked_mul(cols)?;
        let v_len = cols.checked_mul(cols)?;

        Some(Self {
            rows,
            padded_rows,
            cols,
            preserve_input,
            ok: true,
            decomposed: false,
            a: zeroed(a_len)?,
            u: if preserve_input {
                zeroed(a_len)?
            } else {
                Vec::new()
            },
            w: zeroed(cols)?,
            v: zeroed(v_len)?,
            b: zeroed(padded_rows)?,
            work: zeroed(cols)?,
            norm: 0.0,
        })
    }

    fn failed(rows: usize, cols: usize, preserve_input: bool) -> Self {
        Self {
            rows,
            padded_rows: 0,
            cols,
            preserve_input,
            ok: false,
            decomposed: false,
            a: Vec::new(),
            u: Vec::new(),
            w: Vec::new(),
            v: Vec::new(),
            b: Vec::new(),
            work: Vec::new(),
            norm: 0.0,
        }
    }

    /// Whether construction succeeded. Never changes after construction.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn preserves_input(&self) -> bool {
        self.preserve_input
    }

    /// Design matrix, row-major `rows x cols`. Empty for a failed solver.
    #[inline]
    pub fn a(&self) -> &[f64] {
        let n = if self.ok { self.rows * self.cols } else { 0 };
        &self.a[..n]
    }

    /// Mutable design matrix. Writing it invalidates any previous decomposition.
    #[inline]
    pub fn a_mut(&mut self) -> &mut [f64] {
        self.decomposed = false;
        let n = if self.ok { self.rows * self.cols } else { 0 };
        &mut self.a[..n]
    }

    /// Right-hand side, `rows` long.
    #[inline]
    pub fn b(&self) -> &[f64] {
        let n = if self.ok { self.rows } else { 0 };
        &self.b[..n]
    }

    #[inline]
    pub fn b_mut(&mut self) -> &mut [f64] {
        let n = if self.ok { self.rows } else { 0 };
        &mut self.b[..n]
    }

    /// Left singular vectors, row-major `max(rows, cols) x cols`.
    #[inline]
    pub fn u(&self) -> &[f64] {
        if self.preserve_input { &self.u } else { &self.a }
    }

    /// Singular values (unsorted).
    #[inline]
    pub fn singular_values(&self) -> &[f64] {
        &self.w
    }

    /// Right singular vectors, row-major `cols x cols`.
    #[inline]
    pub fn v(&self) -> &[f64] {
        &self.v
    }

    /// Decompose the current design matrix.
    pub fn decompose(&mut self) -> Result<()> {
        if !self.ok {
            return Err(Error::SolverUnavailable);
        }
        let (m, n) = (self.padded_rows, self.cols);

        // Padding rows must be zero; a previous in-place decomposition may have
        // left parts of U there.
        self.a[self.rows * n..].fill(0.0);

        let u: &mut [f64] = if self.preserve_input {
            self.u.copy_from_slice(&self.a);
            &mut self.u
        } else {
            &mut self.a
        };

        let norm = bidiagonalize(m, n, u, &mut self.w, &mut self.work);
        accumulate_right(n, u, &mut self.v, &self.work);
        accumulate_left(m, n, u, &self.w);
        let converged = diagonalize(m, n, u, &mut self.w, &mut self.v, &mut self.work, norm);
        if !converged {
            warn!(
                rows = self.rows,
                cols = n,
                max_iterations = MAX_QR_ITERATIONS,
                "svd did not fully converge"
            );
        }

        self.norm = norm;
        self.decomposed = true;
        Ok(())
    }

    /// Solve `A x = b` in the least-squares sense, writing `x` into `soln`.
    ///
    /// Singular values at or below `limit * max(w)` are treated as zero, which
    /// yields the minimum-norm solution for rank-deficient systems.
    pub fn backsub(&mut self, limit: f64, soln: &mut [f64]) -> Result<()> {
        if !self.ok {
            return Err(Error::SolverUnavailable);
        }
        if !self.decomposed {
            return Err(Error::InvalidConfig(
                "decompose must be called before backsub".to_owned(),
            ));
        }
        if soln.len() != self.cols {
            return Err(Error::InvalidShape(format!(
                "solution length {} does not match cols {}",
                soln.len(),
                self.cols
            )));
        }

        let (m, n) = (self.padded_rows, self.cols);
        let u = if self.preserve_input { &self.u } else { &self.a };

        let wmax = self.w.iter().fold(0.0_f64, |acc, &x| acc.max(x));
        let thresh = limit * wmax;

        let mut truncated = 0usize;
        for j in 0..n {
            let wj = self.w[j];
            self.work[j] = if wj > thresh {
                let mut s = 0.0;
                for i in 0..m {
                    s += u[i * n + j] * self.b[i];
                }
                s / wj
            } else {
                truncated += 1;
                0.0
            };
        }
        if truncated > 0 {
            debug!(truncated, thresh, "truncated small singular values");
        }

        for (j, x) in soln.iter_mut().enumerate() {
            let row = &self.v[j * n..(j + 1) * n];
            *x = row.iter().zip(&self.work).map(|(vj, t)| vj * t).sum();
        }
        Ok(())
    }

    /// Norm estimate accumulated during the last bidiagonalization.
    #[inline]
    pub fn norm(&self) -> f64 {
        self.norm
    }
}

fn zeroed(len: usize) -> Option<Vec<f64>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).ok()?;
    v.resize(len, 0.0);
    Some(v)
}

#[inline]
fn sign(a: f64, b: f64) -> f64 {
    if b >= 0.0 { a.abs() } else { -a.abs() }
}

#[allow(clippy::float_cmp)]
#[inline]
fn negligible(x: f64, norm: f64) -> bool {
    x.abs() + norm == norm
}

/// Householder reduction of `u` (`m x n`, `m >= n`) to upper bidiagonal form.
///
/// The diagonal goes to `w`, the superdiagonal to `rv1[1..]`. The reflectors are
/// left in `u` for the accumulation steps. Returns the norm estimate.
fn bidiagonalize(m: usize, n: usize, u: &mut [f64], w: &mut [f64], rv1: &mut [f64]) -> f64 {
    let mut g = 0.0;
    let mut scale = 0.0;
    let mut norm = 0.0_f64;

    for i in 0..n {
        let l = i + 1;
        rv1[i] = scale * g;

        // Left reflector: column i below the diagonal.
        g = 0.0;
        scale = 0.0;
        for k in i..m {
            scale += u[k * n + i].abs();
        }
        if scale != 0.0 {
            let mut s = 0.0;
            for k in i..m {
                u[k * n + i] /= scale;
                s += u[k * n + i] * u[k * n + i];
            }
            let f = u[i * n + i];
            g = -sign(s.sqrt(), f);
            let h = f * g - s;
            u[i * n + i] = f - g;
            for j in l..n {
                let mut s = 0.0;
                for k in i..m {
                    s += u[k * n + i] * u[k * n + j];
                }
                let f = s / h;
                for k in i..m {
                    u[k * n + j] += f * u[k * n + i];
                }
            }
            for k in i..m {
                u[k * n + i] *= scale;
            }
        }
        w[i] = scale * g;

        // Right reflector: row i right of the superdiagonal.
        g = 0.0;
        scale = 0.0;
        if l != n {
            for k in l..n {
                scale += u[i * n + k].abs();
            }
            if scale != 0.0 {
                let mut s = 0.0;
                for k in l..n {
                    u[i * n + k] /= scale;
                    s += u[i * n + k] * u[i * n + k];
                }
                let f = u[i * n + l];
                g = -sign(s.sqrt(), f);
                let h = f * g - s;
                u[i * n + l] = f - g;
                for k in l..n {
                    rv1[k] = u[i * n + k] / h;
                }
                for j in l..m {
                    let mut s = 0.0;
                    for k in l..n {
                        s += u[j * n + k] * u[i * n + k];
                    }
                    for k in l..n {
                        u[j * n + k] += s * rv1[k];
                    }
                }
                for k in l..n {
                    u[i * n + k] *= scale;
                }
            }
        }

        norm = norm.max(w[i].abs() + rv1[i].abs());
    }

    norm
}

/// Build `V` from the right reflectors stored in the rows of `u`.
fn accumulate_right(n: usize, u: &[f64], v: &mut [f64], rv1: &[f64]) {
    let mut g = 0.0;
    let mut l = n;
    for i in (0..n).rev() {
        if i + 1 < n {
            if g != 0.0 {
                // Double division avoids possible underflow.
                for j in l..n {
                    v[j * n + i] = (u[i * n + j] / u[i * n + l]) / g;
                }
                for j in l..n {
                    let mut s = 0.0;
                    for k in l..n {
                        s += u[i * n + k] * v[k * n + j];
                    }
                    for k in l..n {
                        v[k * n + j] += s * v[k * n + i];
                    }
                }
            }
            for j in l..n {
                v[i * n + j] = 0.0;
                v[j * n + i] = 0.0;
            }
        }
        v[i * n + i] = 1.0;
        g = rv1[i];
        l = i;
    }
}

/// Overwrite `u` with the accumulated left transforms.
fn accumulate_left(m: usize, n: usize, u: &mut [f64], w: &[f64]) {
    for i in (0..n).rev() {
        let l = i + 1;
        for j in l..n {
            u[i * n + j] = 0.0;
        }
        let g = w[i];
        if g != 0.0 {
            let g = 1.0 / g;
            for j in l..n {
                let mut s = 0.0;
                for k in l..m {
                    s += u[k * n + i] * u[k * n + j];
                }
                let f = (s / u[i * n + i]) * g;
                for k in i..m {
                    u[k * n + j] += f * u[k * n + i];
                }
            }
            for j in i..m {
                u[j * n + i] *= g;
            }
        } else {
            for j in i..m {
                u[j * n + i] = 0.0;
            }
        }
        u[i * n + i] += 1.0;
    }
}

/// Drive the bidiagonal to diagonal form. Returns false if some singular value
/// hit the iteration cap.
fn diagonalize(
    m: usize,
    n: usize,
    u: &mut [f64],
    w: &mut [f64],
    v: &mut [f64],
    rv1: &mut [f64],
    norm: f64,
) -> bool {
    let mut converged = true;

    for k in (0..n).rev() {
        let mut iterations = 0;
        loop {
            // Find the top `l` of the unreduced block ending at `k`.
            let mut l = k;
            let mut split_at_zero_diagonal = true;
            loop {
                if l == 0 || negligible(rv1[l], norm) {
                    split_at_zero_diagonal = false;
                    break;
                }
                if negligible(w[l - 1], norm) {
                    break;
                }
                l -= 1;
            }
            if split_at_zero_diagonal {
                cancel(l, k, m, n, u, w, rv1, norm);
            }

            if l == k {
                if w[k] < 0.0 {
                    w[k] = -w[k];
                    for j in 0..n {
                        v[j * n + k] = -v[j * n + k];
                    }
                }
                break;
            }

            if iterations == MAX_QR_ITERATIONS {
                converged = false;
                break;
            }
            iterations += 1;

            qr_sweep(l, k, m, n, u, w, v, rv1);
        }
    }

    converged
}

/// Zero `rv1[l..=k]` by rotations against the negligible `w[l - 1]`.
#[allow(clippy::too_many_arguments)]
fn cancel(
    l: usize,
    k: usize,
    m: usize,
    n: usize,
    u: &mut [f64],
    w: &mut [f64],
    rv1: &mut [f64],
    norm: f64,
) {
    let nm = l - 1;
    let mut c = 0.0;
    let mut s = 1.0;
    for i in l..=k {
        let f = s * rv1[i];
        rv1[i] *= c;
        if negligible(f, norm) {
            break;
        }
        let g = w[i];
        let h = f.hypot(g);
        w[i] = h;
        let h = 1.0 / h;
        c = g * h;
        s = -f * h;
        for j in 0..m {
            let y = u[j * n + nm];
            let z = u[j * n + i];
            u[j * n + nm] = y * c + z * s;
            u[j * n + i] = z * c - y * s;
        }
    }
}

/// One implicit-shift QR sweep over the block `l..=k`.
#[allow(clippy::too_many_arguments)]
fn qr_sweep(
    l: usize,
    k: usize,
    m: usize,
    n: usize,
    u: &mut [f64],
    w: &mut [f64],
    v: &mut [f64],
    rv1: &mut [f64],
) {
    // Shift from the trailing 2x2 minor.
    let z = w[k];
    let mut x = w[l];
    let nm = k - 1;
    let mut y = w[nm];
    let mut g = rv1[nm];
    let mut h = rv1[k];
    let mut f = ((y - z) * (y + z) + (g - h) * (g + h)) / (2.0 * h * y);
    g = f.hypot(1.0);
    f = ((x - z) * (x + z) + h * ((y / (f + sign(g, f))) - h)) / x;

    let mut c = 1.0;
    let mut s = 1.0;
    for j in l..=nm {
        let i = j + 1;
        g = rv1[i];
        y = w[i];
        h = s * g;
        g *= c;
        let mut z = f.hypot(h);
        rv1[j] = z;
        c = f / z;
        s = h / z;
        f = x * c + g * s;
        g = g * c - x * s;
        h = y * s;
        y *= c;
        qr_vrot(n, j, i, c, s, v);

        z = f.hypot(h);
        w[j] = z;
        if z != 0.0 {
            let zi = 1.0 / z;
            c = f * zi;
            s = h * zi;
        }
        f = c * g + s * y;
        x = c * y - s * g;
        qr_mrot(m, n, j, i, c, s, u);
    }
    rv1[l] = 0.0;
    rv1[k] = f;
    w[k] = x;
}

/// Rotate columns `j` and `i` of `V` (`n x n`).
#[inline]
fn qr_vrot(n: usize, j: usize, i: usize, c: f64, s: f64, v: &mut [f64]) {
    for row in v.chunks_exact_mut(n) {
        let x = row[j];
        let z = row[i];
        row[j] = x * c + z * s;
        row[i] = z * c - x * s;
    }
}

/// Rotate columns `j` and `i` of `U` (`m x n`).
#[inline]
fn qr_mrot(m: usize, n: usize, j: usize, i: usize, c: f64, s: f64, u: &mut [f64]) {
    for row in u[..m * n].chunks_exact_mut(n) {
        let y = row[j];
        let z = row[i];
        row[j] = y * c + z * s;
        row[i] = z * c - y * s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn reconstruct(solver: &SvdSolver) -> Vec<f64> {
        let (r, c) = (solver.rows(), solver.cols());
        let (u, w, v) = (solver.u(), solver.singular_values(), solver.v());
        let mut out = vec![0.0; r * c];
        for i in 0..r {
            for j in 0..c {
                out[i * c + j] = (0..c).map(|k| u[i * c + k] * w[k] * v[j * c + k]).sum();
            }
        }
        out
    }

    fn solve(rows: usize, cols: usize, a: &[f64], b: &[f64], limit: f64) -> Vec<f64> {
        let mut solver = SvdSolver::new(rows, cols, false);
        solver.a_mut().copy_from_slice(a);
        solver.decompose().unwrap();
        solver.b_mut().copy_from_slice(b);
        let mut x = vec![0.0; cols];
        solver.backsub(limit, &mut x).unwrap();
        x
    }

    #[test]
    fn reconstructs_random_matrix() {
        let mut rng = StdRng::seed_from_u64(7);
        let (rows, cols) = (9, 5);
        let a: Vec<f64> = (0..rows * cols).map(|_| rng.gen_range(-2.0..2.0)).collect();

        let mut solver = SvdSolver::new(rows, cols, true);
        solver.a_mut().copy_from_slice(&a);
        solver.decompose().unwrap();

        assert_eq!(solver.a(), a.as_slice(), "preserved input must be intact");
        assert!(solver.singular_values().iter().all(|&w| w >= 0.0));
        for (x, y) in reconstruct(&solver).iter().zip(&a) {
            assert!((x - y).abs() < 1e-10, "{x} vs {y}");
        }

        // V is orthogonal.
        let v = solver.v();
        for p in 0..cols {
            for q in 0..cols {
                let dot: f64 = (0..cols).map(|k| v[k * cols + p] * v[k * cols + q]).sum();
                let expected = if p == q { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn solves_exactly_determined_system() {
        // x + 2y = 5, 3x - y = 1 -> x = 1, y = 2
        let x = solve(2, 2, &[1.0, 2.0, 3.0, -1.0], &[5.0, 1.0], 1e-8);
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn overdetermined_fit_matches_normal_equations() {
        // Fit y = m t + c through (0,1), (1,3), (2,4), (3,8).
        let a = [0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0, 1.0];
        let b = [1.0, 3.0, 4.0, 8.0];
        let x = solve(4, 2, &a, &b, 1e-8);
        // Normal equations: [14 6; 6 4] [m c] = [35 16] -> m = 2.2, c = 0.7
        assert!((x[0] - 2.2).abs() < 1e-10);
        assert!((x[1] - 0.7).abs() < 1e-10);
    }

    #[test]
    fn duplicate_columns_give_minimum_norm_solution() {
        let a = [1.0, 1.0, 2.0, 2.0, 3.0, 3.0];
        let b = [1.0, 2.0, 3.0];
        let x = solve(3, 2, &a, &b, 1e-8);
        assert!((x[0] - 0.5).abs() < 1e-10);
        assert!((x[1] - 0.5).abs() < 1e-10);
    }

    #[test]
    fn fewer_rows_than_columns_is_padded() {
        let x = solve(1, 2, &[1.0, 1.0], &[2.0], 1e-8);
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn zero_matrix_gives_zero_solution() {
        let x = solve(3, 2, &[0.0; 6], &[1.0, 2.0, 3.0], 1e-8);
        assert_eq!(x, vec![0.0, 0.0]);
    }

    #[test]
    fn in_place_decomposition_can_be_repeated() {
        let mut solver = SvdSolver::new(3, 2, false);
        for scale in [1.0, 2.0] {
            let a = [scale, 0.0, 0.0, scale, 0.0, 0.0];
            solver.a_mut().copy_from_slice(&a);
            solver.decompose().unwrap();
            solver.b_mut().copy_from_slice(&[2.0, 4.0, 9.0]);
            let mut x = [0.0; 2];
            solver.backsub(1e-8, &mut x).unwrap();
            assert!((x[0] - 2.0 / scale).abs() < 1e-12);
            assert!((x[1] - 4.0 / scale).abs() < 1e-12);
        }
    }

    #[test]
    fn failed_solver_is_inert() {
        let mut solver = SvdSolver::new(0, 3, false);
        assert!(!solver.is_ok());
        assert!(solver.a_mut().is_empty());
        assert!(solver.b_mut().is_empty());
        assert_eq!(solver.decompose(), Err(Error::SolverUnavailable));

        let mut x = [7.0; 3];
        assert_eq!(solver.backsub(1e-8, &mut x), Err(Error::SolverUnavailable));
        assert_eq!(x, [7.0; 3]);

        assert!(SvdSolver::try_new(4, 0, true).is_err());
    }

    #[test]
    fn backsub_requires_decompose() {
        let mut solver = SvdSolver::new(2, 2, false);
        let mut x = [0.0; 2];
        assert!(solver.backsub(1e-8, &mut x).is_err());
    }

    #[test]
    fn empty_system_logs_at_debug_not_warn() {
        use std::io;
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl io::Write for Captured {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let solver = tracing::subscriber::with_default(subscriber, || SvdSolver::new(0, 4, false));
        assert!(!solver.is_ok());

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("DEBUG"), "{logs}");
        assert!(logs.contains("empty svd system"), "{logs}");
        assert!(!logs.contains("WARN"), "{logs}");
    }
}
