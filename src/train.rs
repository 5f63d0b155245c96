//! Training by simulated annealing with output-layer regression.
//!
//! A network without hidden layers is linear in its output weights (up to the
//! inverse activation), so a single regression solves it. Otherwise the hidden
//! weights are annealed: every trial perturbs them, regresses the output layer on
//! the result and keeps the trial according to the schedule's acceptance rule.

use rand::Rng;
use tracing::{debug, info, info_span};

use crate::anneal::{self, AnnealConfig, AnnealSchedule};
use crate::svd::SvdSolver;
use crate::{CancellationToken, Error, Mlfn, Result, TrainingSet};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnConfig {
    /// Stop as soon as the error reaches this value.
    pub quit_error: f64,
    /// Initial searches from the starting weights.
    pub pretries: usize,
    /// Consecutive unsuccessful escape searches before giving up.
    pub retries: usize,
    /// An escape counts as progress if it lowers the error by the relative
    /// amount `10^-accuracy`.
    pub accuracy: u32,
    /// Regress the output layer on every trial instead of annealing it.
    pub regress: bool,
    pub anneal: AnnealConfig,
}

impl Default for LearnConfig {
    fn default() -> Self {
        Self {
            quit_error: 0.0,
            pretries: 1,
            retries: 4,
            accuracy: 4,
            regress: true,
            anneal: AnnealConfig::default(),
        }
    }
}

impl LearnConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.quit_error.is_finite() && self.quit_error >= 0.0) {
            return Err(Error::InvalidConfig(
                "quit_error must be finite and >= 0".to_owned(),
            ));
        }
        if self.pretries == 0 {
            return Err(Error::InvalidConfig("pretries must be > 0".to_owned()));
        }
        if self.accuracy > 15 {
            return Err(Error::InvalidConfig(format!(
                "accuracy {} exceeds the 15 digits an f64 can resolve",
                self.accuracy
            )));
        }
        self.anneal.validate()
    }

    #[inline]
    fn tolerance(&self) -> f64 {
        10f64.powi(-(self.accuracy as i32))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnReport {
    /// Error of the weights left in the network.
    pub error: f64,
    /// Number of error evaluations (regressions or trial passes).
    pub evaluations: usize,
    /// Temperature steps run across all searches.
    pub temperatures: usize,
    /// The run stopped because the cancellation token fired.
    pub cancelled: bool,
}

impl Mlfn {
    /// Train the network on `train`.
    ///
    /// The best weights found are left in `self` (also on cancellation). Returns
    /// [`Error::Cancelled`] without touching the network if `cancel` has already
    /// fired.
    pub fn learn<R: Rng + ?Sized>(
        &mut self,
        train: &TrainingSet,
        cfg: &LearnConfig,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<LearnReport> {
        cfg.validate()?;
        self.check_training_set(train)?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let span = info_span!(
            "mlfn_learn",
            samples = train.len(),
            hidden_layers = self.layout().hidden().len(),
            domain = ?self.domain()
        );
        let _enter = span.enter();

        if train.is_empty() {
            self.set_error(0.0);
            return Ok(LearnReport {
                error: 0.0,
                evaluations: 0,
                temperatures: 0,
                cancelled: false,
            });
        }

        if self.layout().hidden().is_empty() {
            let mut solver = self.regression_solver(train);
            let error = self.regress(train, &mut solver)?;
            info!(error, "solved output layer by regression");
            return Ok(LearnReport {
                error,
                evaluations: 1,
                temperatures: 0,
                cancelled: false,
            });
        }

        let solver = if cfg.regress {
            let solver = self.regression_solver(train);
            if !solver.is_ok() {
                return Err(Error::SolverUnavailable);
            }
            Some(solver)
        } else {
            None
        };

        info!(pretries = cfg.pretries, retries = cfg.retries, "learning started");

        let mut annealer = Annealer {
            train,
            solver,
            regress: cfg.regress,
            quit_error: cfg.quit_error,
            rng,
            cancel,
            evaluations: 0,
            temperatures: 0,
        };

        let mut best = self.clone();
        let mut best_err = annealer.evaluate(&mut best)?;
        let start = best.clone();
        let mut found = best.clone();

        for _ in 0..cfg.pretries {
            if best_err <= cfg.quit_error || annealer.cancel.is_cancelled() {
                break;
            }
            let err = annealer.search(&start, &cfg.anneal.initial, &mut found)?;
            if err < best_err {
                best.copy_weights_from(&found);
                best_err = err;
            }
        }
        debug!(error = best_err, "initial searches done");

        let tol = cfg.tolerance();
        let mut failures = 0;
        while failures < cfg.retries && best_err > cfg.quit_error {
            if annealer.cancel.is_cancelled() {
                break;
            }
            let err = annealer.search(&best, &cfg.anneal.escape, &mut found)?;
            let improved = err < best_err * (1.0 - tol);
            if err < best_err {
                best.copy_weights_from(&found);
                best_err = err;
            }
            if improved {
                failures = 0;
            } else {
                failures += 1;
            }
            debug!(error = best_err, failures, "escape search done");
        }

        let cancelled = annealer.cancel.is_cancelled();
        let report = LearnReport {
            error: best_err,
            evaluations: annealer.evaluations,
            temperatures: annealer.temperatures,
            cancelled,
        };
        self.copy_weights_from(&best);

        info!(
            error = report.error,
            evaluations = report.evaluations,
            cancelled,
            "learning finished"
        );
        Ok(report)
    }
}

struct Annealer<'a, R: ?Sized> {
    train: &'a TrainingSet,
    solver: Option<SvdSolver>,
    regress: bool,
    quit_error: f64,
    rng: &'a mut R,
    cancel: &'a CancellationToken,
    evaluations: usize,
    temperatures: usize,
}

impl<R: Rng + ?Sized> Annealer<'_, R> {
    /// Error of `net`, regressing its output layer first when configured.
    fn evaluate(&mut self, net: &mut Mlfn) -> Result<f64> {
        self.evaluations += 1;
        match self.solver.as_mut() {
            Some(solver) => net.regress(self.train, solver),
            None => {
                let err = net.trial_error(self.train)?;
                net.set_error(err);
                Ok(err)
            }
        }
    }

    /// Run one annealing search starting at `start` (whose error must be
    /// current). The best configuration visited is written to `best` and its
    /// error returned.
    fn search(&mut self, start: &Mlfn, schedule: &AnnealSchedule, best: &mut Mlfn) -> Result<f64> {
        let mut current = start.clone();
        let mut trial = start.clone();
        best.copy_weights_from(start);
        let mut best_err = start.error();
        let mut stats = RunningStats::default();
        let mut ticks = 0;

        'temps: for (k, temp) in schedule.temperatures().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            self.temperatures += 1;

            let mut stale = 0;
            for _ in 0..schedule.n_iters {
                anneal::perturb(
                    &current,
                    &mut trial,
                    temp,
                    self.regress,
                    schedule.density,
                    &mut *self.rng,
                );
                let err = self.evaluate(&mut trial)?;
                stats.push(err);

                if err < best_err {
                    best.copy_weights_from(&trial);
                    best_err = err;
                    stale = 0;
                } else {
                    stale += 1;
                }

                let scale = schedule.ratio * stats.std_dev() * temp / schedule.start;
                if accept(schedule.climb, err - current.error(), scale, &mut *self.rng) {
                    current.copy_weights_from(&trial);
                }

                if best_err <= self.quit_error {
                    break 'temps;
                }
                if schedule.setback > 0 && stale >= schedule.setback {
                    break;
                }
            }

            let tick = (k + 1) * 10 / schedule.n_temps;
            if tick > ticks {
                ticks = tick;
                info!(
                    progress = tick * 10,
                    temperature = temp,
                    error = best_err,
                    "annealing"
                );
            }
        }

        Ok(best_err)
    }
}

/// Decide whether a move that changes the error by `delta` is taken.
///
/// `scale` is the acceptance temperature in error units. While it is zero only
/// improvements are taken.
fn accept<R: Rng + ?Sized>(climb: bool, delta: f64, scale: f64, rng: &mut R) -> bool {
    if climb && delta <= 0.0 {
        return true;
    }
    if scale.is_nan() || scale <= 0.0 {
        return delta < 0.0;
    }
    let p = if climb {
        (-delta / scale).exp()
    } else {
        1.0 / (1.0 + (delta / scale).exp())
    };
    rng.r#gen::<f64>() < p
}

/// Welford running mean and variance.
#[derive(Debug, Clone, Copy, Default)]
struct RunningStats {
    n: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn push(&mut self, x: f64) {
        self.n += 1;
        let d = x - self.mean;
        self.mean += d / self.n as f64;
        self.m2 += d * (x - self.mean);
    }

    fn std_dev(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            (self.m2 / (self.n - 1) as f64).sqrt()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn running_stats_match_sample_deviation() {
        let mut s = RunningStats::default();
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            s.push(x);
        }
        assert!((s.mean - 5.0).abs() < 1e-12);
        assert!((s.std_dev() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn zero_scale_only_accepts_improvements() {
        let mut rng = StdRng::seed_from_u64(0);
        for climb in [true, false] {
            assert!(accept(climb, -1.0, 0.0, &mut rng));
            assert!(!accept(climb, 1.0, 0.0, &mut rng));
        }
    }

    #[test]
    fn huge_uphill_moves_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(!accept(true, 1e6, 1.0, &mut rng));
            assert!(!accept(false, 1e6, 1.0, &mut rng));
        }
    }

    #[test]
    fn barker_takes_small_moves_about_half_the_time() {
        let mut rng = StdRng::seed_from_u64(2);
        let taken = (0..2000).filter(|_| accept(false, 1e-9, 1.0, &mut rng)).count();
        assert!((800..1200).contains(&taken), "taken {taken}");
    }

    #[test]
    fn learn_config_validation() {
        assert!(LearnConfig::default().validate().is_ok());
        let bad = LearnConfig {
            pretries: 0,
            ..LearnConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = LearnConfig {
            quit_error: -1.0,
            ..LearnConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
