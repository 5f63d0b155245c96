//! Closed-form least-squares training of the output layer.
//!
//! The hidden layers are frozen. Every training sample is pushed through them and
//! the resulting activations (plus bias) form one row of the design matrix. The
//! right-hand side is the desired net input of one output unit: the target passed
//! through the inverse activation (or the raw target for linear outputs). Solving
//! by SVD gives that unit's weights directly.
//!
//! Complex layers need care because `(a + bi)(w + vi) = (aw - bv) + (av + bw)i`:
//!
//! - complex -> real: the row is `[a1, -b1, a2, -b2, ..., 1, 0]`, whose product
//!   with the interleaved weights `[w1, v1, ...]` is the real part of the net input.
//! - complex -> complex: each sample adds a second row `[b1, a1, ..., 0, 1]` that
//!   predicts the imaginary part. Both rows share one complex weight vector, so a
//!   complex output is solved once, not once per component.

use tracing::debug;

use crate::Mlfn;
use crate::activation;
use crate::evaluate::{activity_cc, activity_cr, activity_rr};
use crate::layer::UnitKind;
use crate::svd::SvdSolver;
use crate::{Error, ErrorMetric, Result, TrainingSet};

/// Relative singular value cutoff used when solving for output weights.
pub const REGRESSION_LIMIT: f64 = 1e-8;

impl Mlfn {
    /// Solve the output-layer weights by regression and return the network error.
    ///
    /// `solver` must be sized as [`Mlfn::regression_solver`] sizes it. With the
    /// `MeanSquare` metric the error is accumulated while solving; any other metric
    /// is evaluated afterwards with [`Mlfn::trial_error`]. An empty training set
    /// leaves the weights alone and reports zero error.
    pub fn regress(&mut self, train: &TrainingSet, solver: &mut SvdSolver) -> Result<f64> {
        self.check_training_set(train)?;
        if train.is_empty() {
            self.set_error(0.0);
            return Ok(0.0);
        }
        if !solver.is_ok() {
            return Err(Error::SolverUnavailable);
        }

        let output = *self.layout().output();
        let kind = output.kind();
        let nvars = output.n_in_numeric();
        let n_values = output.n_in_values();
        let rows_per_sample = kind.out_width();
        let expected_rows = train.len() * rows_per_sample;
        if solver.rows() != expected_rows || solver.cols() != nvars {
            return Err(Error::InvalidShape(format!(
                "svd workspace is {}x{}, regression needs {expected_rows}x{nvars}",
                solver.rows(),
                solver.cols()
            )));
        }

        // Activations feeding the output layer, one row per sample.
        let mut acts = vec![0.0; train.len() * n_values];
        let mut scratch = self.scratch();
        for (idx, row) in acts.chunks_exact_mut(n_values).enumerate() {
            row.copy_from_slice(self.pre_output(train.input(idx), &mut scratch));
        }

        fill_design_matrix(kind, &acts, n_values, solver.a_mut());
        solver.decompose()?;

        let linear = self.linear_output();
        let act = self.activation();
        let metric = self.error_metric();
        let n_in = output.n_in();
        let mut err = 0.0;

        for o in 0..output.n_units() {
            let b = solver.b_mut();
            if kind.complex_out() {
                for (idx, pair) in b.chunks_exact_mut(2).enumerate() {
                    let t_re = self.desired(train, idx, 2 * o);
                    let t_im = self.desired(train, idx, 2 * o + 1);
                    let (re, im) = if linear {
                        (t_re, t_im)
                    } else {
                        activation::complex_inverse(t_re, t_im)
                    };
                    pair[0] = re;
                    pair[1] = im;
                }
            } else {
                for (idx, slot) in b.iter_mut().enumerate() {
                    let t = self.desired(train, idx, o);
                    *slot = if linear { t } else { act.inverse(t) };
                }
            }

            let range = output.unit_range(o);
            solver.backsub(REGRESSION_LIMIT, &mut self.weights_mut()[range.clone()])?;

            if metric != ErrorMetric::MeanSquare {
                continue;
            }

            let coefs = &self.weights()[range];
            for (idx, x) in acts.chunks_exact(n_values).enumerate() {
                err += match kind {
                    UnitKind::RealToReal => {
                        let y = activity_rr(x, coefs, n_in, linear, act);
                        metric.real_term(y - self.desired(train, idx, o))
                    }
                    UnitKind::ComplexToReal => {
                        let y = activity_cr(x, coefs, n_in, linear, act);
                        metric.real_term(y - self.desired(train, idx, o))
                    }
                    UnitKind::ComplexToComplex => {
                        let (y_re, y_im) = activity_cc(x, coefs, n_in, linear);
                        metric.complex_term(
                            y_re - self.desired(train, idx, 2 * o),
                            y_im - self.desired(train, idx, 2 * o + 1),
                        )
                    }
                };
            }
        }

        let error = if metric == ErrorMetric::MeanSquare {
            metric.finish(err, train.len(), output.n_units())
        } else {
            self.trial_error(train)?
        };
        debug!(
            samples = train.len(),
            outputs = output.n_units(),
            unknowns = nvars,
            error,
            "regressed output layer"
        );

        self.set_error(error);
        Ok(error)
    }
}

/// Write the design matrix for `acts` (`n_values` numbers per sample) into `a`.
fn fill_design_matrix(kind: UnitKind, acts: &[f64], n_values: usize, a: &mut [f64]) {
    let nvars = n_values + kind.in_width();
    let rows_per_sample = kind.out_width();

    for (x, rows) in acts
        .chunks_exact(n_values)
        .zip(a.chunks_exact_mut(nvars * rows_per_sample))
    {
        match kind {
            UnitKind::RealToReal => {
                rows[..n_values].copy_from_slice(x);
                rows[n_values] = 1.0;
            }
            UnitKind::ComplexToReal | UnitKind::ComplexToComplex => {
                let (real_row, rest) = rows.split_at_mut(nvars);
                for (dst, src) in real_row[..n_values].chunks_exact_mut(2).zip(x.chunks_exact(2)) {
                    dst[0] = src[0];
                    dst[1] = -src[1];
                }
                real_row[n_values] = 1.0;
                real_row[n_values + 1] = 0.0;

                if kind == UnitKind::ComplexToComplex {
                    for (dst, src) in rest[..n_values].chunks_exact_mut(2).zip(x.chunks_exact(2)) {
                        dst[0] = src[1];
                        dst[1] = src[0];
                    }
                    rest[n_values] = 0.0;
                    rest[n_values + 1] = 1.0;
                }
            }
        }
    }
}
