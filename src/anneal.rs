//! Simulated-annealing primitives.
//!
//! [`perturb`] is the elementary move: add temperature-scaled noise to a center
//! configuration and clamp the result. [`AnnealSchedule`] describes one search
//! (temperatures, trials per temperature, acceptance). The search itself lives in
//! [`crate::train`].

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::{Error, Mlfn, Result};

/// Perturbed weights are clamped to `[-WEIGHT_LIMIT, WEIGHT_LIMIT]`.
pub const WEIGHT_LIMIT: f64 = 20.0;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Noise density used by [`perturb`].
pub enum RandomDensity {
    #[default]
    Normal,
    /// Heavy tailed; occasional long jumps.
    Cauchy,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// How the temperature falls from `start` to `end`.
pub enum Reduction {
    /// Geometric interpolation.
    #[default]
    Exponential,
    /// `t_k = start / (1 + c k)`, with `c` chosen so the last step is `end`.
    Fast,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
/// One annealing search.
pub struct AnnealSchedule {
    /// Number of temperature steps.
    pub n_temps: usize,
    /// Trials per temperature step.
    pub n_iters: usize,
    /// End a step after this many trials without a new best. `0` disables.
    pub setback: usize,
    pub start: f64,
    pub end: f64,
    /// Scales the acceptance temperature relative to the trial error spread.
    pub ratio: f64,
    pub density: RandomDensity,
    /// Always accept improvements and use Metropolis for uphill moves.
    /// Otherwise every move goes through the Barker rule.
    pub climb: bool,
    pub reduction: Reduction,
}

impl Default for AnnealSchedule {
    fn default() -> Self {
        Self {
            n_temps: 4,
            n_iters: 50,
            setback: 50,
            start: 4.0,
            end: 0.02,
            ratio: 0.01,
            density: RandomDensity::Normal,
            climb: true,
            reduction: Reduction::Exponential,
        }
    }
}

impl AnnealSchedule {
    pub fn validate(&self) -> Result<()> {
        if self.n_temps == 0 {
            return Err(Error::InvalidConfig("n_temps must be > 0".to_owned()));
        }
        if self.n_iters == 0 {
            return Err(Error::InvalidConfig("n_iters must be > 0".to_owned()));
        }
        if !(self.start.is_finite() && self.start > 0.0) {
            return Err(Error::InvalidConfig(
                "start temperature must be finite and > 0".to_owned(),
            ));
        }
        if !(self.end.is_finite() && self.end > 0.0) {
            return Err(Error::InvalidConfig(
                "end temperature must be finite and > 0".to_owned(),
            ));
        }
        if self.end > self.start {
            return Err(Error::InvalidConfig(format!(
                "end temperature {} exceeds start temperature {}",
                self.end, self.start
            )));
        }
        if !(self.ratio.is_finite() && self.ratio > 0.0) {
            return Err(Error::InvalidConfig("ratio must be finite and > 0".to_owned()));
        }
        Ok(())
    }

    /// Temperature of step `k` (`0 <= k < n_temps`).
    pub fn temperature(&self, k: usize) -> f64 {
        if self.n_temps <= 1 {
            return self.start;
        }
        let last = (self.n_temps - 1) as f64;
        let k = k as f64;
        match self.reduction {
            Reduction::Exponential => self.start * (self.end / self.start).powf(k / last),
            Reduction::Fast => {
                let c = (self.start / self.end - 1.0) / last;
                self.start / (1.0 + c * k)
            }
        }
    }

    pub fn temperatures(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.n_temps).map(|k| self.temperature(k))
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
/// The two searches run by [`Mlfn::learn`].
pub struct AnnealConfig {
    /// Search for a good starting point.
    pub initial: AnnealSchedule,
    /// Search out of a local minimum.
    pub escape: AnnealSchedule,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            initial: AnnealSchedule::default(),
            escape: AnnealSchedule {
                n_temps: 4,
                n_iters: 30,
                setback: 30,
                start: 1.0,
                end: 0.01,
                ..AnnealSchedule::default()
            },
        }
    }
}

impl AnnealConfig {
    pub fn validate(&self) -> Result<()> {
        self.initial
            .validate()
            .map_err(|e| Error::InvalidConfig(format!("initial schedule: {e}")))?;
        self.escape
            .validate()
            .map_err(|e| Error::InvalidConfig(format!("escape schedule: {e}")))
    }
}

/// Write `perturbed = center + temp * noise` into the layers being annealed,
/// clamping every written weight to [`WEIGHT_LIMIT`].
///
/// Hidden layers are always perturbed. The output layer is perturbed only when
/// it will not be regressed afterwards (`regress == false`) or when there is no
/// hidden layer to perturb. Layers that are skipped are left untouched.
///
/// Does not allocate. Panics if the two networks have different layouts.
pub fn perturb<R: Rng + ?Sized>(
    center: &Mlfn,
    perturbed: &mut Mlfn,
    temp: f64,
    regress: bool,
    density: RandomDensity,
    rng: &mut R,
) {
    assert_eq!(
        center.layout(),
        perturbed.layout(),
        "perturb requires identical layouts"
    );

    let layout = center.layout();
    let hidden = layout.hidden();
    let spans = if regress && !hidden.is_empty() {
        hidden
    } else {
        layout.layers()
    };

    for span in spans {
        let range = span.range();
        let src = &center.weights()[range.clone()];
        let dst = &mut perturbed.weights_mut()[range];
        shake(src, dst, temp, density, rng);
        limit(dst, WEIGHT_LIMIT);
    }
}

fn shake<R: Rng + ?Sized>(
    center: &[f64],
    out: &mut [f64],
    temp: f64,
    density: RandomDensity,
    rng: &mut R,
) {
    debug_assert_eq!(center.len(), out.len());
    match density {
        RandomDensity::Normal => {
            for (o, &c) in out.iter_mut().zip(center) {
                let z: f64 = StandardNormal.sample(rng);
                *o = c + temp * z;
            }
        }
        RandomDensity::Cauchy => {
            for (o, &c) in out.iter_mut().zip(center) {
                *o = c + temp * standard_cauchy(rng);
            }
        }
    }
}

/// Standard Cauchy deviate by inversion of its distribution function.
#[inline]
fn standard_cauchy<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u: f64 = rng.r#gen();
    (std::f64::consts::PI * (u - 0.5)).tan()
}

#[inline]
fn limit(x: &mut [f64], bound: f64) {
    for v in x {
        *v = v.clamp(-bound, bound);
    }
}
