//! Network builder.
//!
//! `MlfnBuilder` is the recommended way to define a network. It fixes the
//! structure (domain, layer sizes) and the training-relevant options, then draws
//! initial weights:
//!
//! - hidden layers: Xavier/Glorot uniform, `U(-a, a)` with `a = sqrt(6 / (fan_in + fan_out))`
//! - output layer: zeros (it is normally regressed before first use)

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::layer::{Domain, WeightLayout};
use crate::{Activation, Error, ErrorMetric, Mlfn, OutputMode, Result};

/// At most this many hidden layers are supported.
pub const MAX_HIDDEN_LAYERS: usize = 2;

#[derive(Debug, Clone)]
/// Builder for an `Mlfn`.
///
/// Example:
///
/// ```rust
/// use rust_mlfn::{Domain, MlfnBuilder};
///
/// # fn main() -> rust_mlfn::Result<()> {
/// let mlfn = MlfnBuilder::new(Domain::Real, 2, 1)?
///     .hidden(4)?
///     .linear_output(true)
///     .build_with_seed(0)?;
/// assert_eq!(mlfn.layout().hidden().len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MlfnBuilder {
    domain: Domain,
    n_inputs: usize,
    n_outputs: usize,
    hidden: Vec<usize>,
    output_mode: OutputMode,
    linear_output: bool,
    activation: Activation,
    error_metric: ErrorMetric,
}

impl MlfnBuilder {
    /// Start building a network with `n_inputs` inputs and `n_outputs` outputs.
    ///
    /// Both counts are logical units: a complex input or output is one unit.
    pub fn new(domain: Domain, n_inputs: usize, n_outputs: usize) -> Result<Self> {
        if n_inputs == 0 {
            return Err(Error::InvalidConfig("n_inputs must be > 0".to_owned()));
        }
        if n_outputs == 0 {
            return Err(Error::InvalidConfig("n_outputs must be > 0".to_owned()));
        }
        Ok(Self {
            domain,
            n_inputs,
            n_outputs,
            hidden: Vec::new(),
            output_mode: OutputMode::General,
            linear_output: false,
            activation: Activation::default(),
            error_metric: ErrorMetric::default(),
        })
    }

    /// Add a hidden layer of `n_units` units.
    pub fn hidden(mut self, n_units: usize) -> Result<Self> {
        if n_units == 0 {
            return Err(Error::InvalidConfig(
                "hidden layer must have > 0 units".to_owned(),
            ));
        }
        if self.hidden.len() == MAX_HIDDEN_LAYERS {
            return Err(Error::InvalidConfig(format!(
                "at most {MAX_HIDDEN_LAYERS} hidden layers are supported"
            )));
        }
        self.hidden.push(n_units);
        Ok(self)
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    /// Skip the output nonlinearity.
    pub fn linear_output(mut self, linear: bool) -> Self {
        self.linear_output = linear;
        self
    }

    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn error_metric(mut self, metric: ErrorMetric) -> Self {
        self.error_metric = metric;
        self
    }

    /// Build using a deterministic seed.
    pub fn build_with_seed(self, seed: u64) -> Result<Mlfn> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.build_with_rng(&mut rng)
    }

    /// Build using the provided RNG.
    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Mlfn> {
        let n_hidden1 = self.hidden.first().copied().unwrap_or(0);
        let n_hidden2 = self.hidden.get(1).copied().unwrap_or(0);
        let layout = WeightLayout::new(
            self.domain,
            self.n_inputs,
            n_hidden1,
            n_hidden2,
            self.n_outputs,
        )?;

        let mut weights = vec![0.0; layout.total()];
        for span in layout.hidden() {
            let fan_in = span.n_in_numeric() as f64;
            let fan_out = span.n_out_numeric() as f64;
            let a = (6.0 / (fan_in + fan_out)).sqrt();
            for w in &mut weights[span.range()] {
                *w = rng.gen_range(-a..a);
            }
        }

        Mlfn::from_parts(
            layout,
            weights,
            self.activation,
            self.linear_output,
            self.output_mode,
            self.error_metric,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_structure() {
        assert!(MlfnBuilder::new(Domain::Real, 0, 1).is_err());
        assert!(MlfnBuilder::new(Domain::Real, 1, 0).is_err());

        let b = MlfnBuilder::new(Domain::Real, 2, 1).unwrap();
        assert!(b.clone().hidden(0).is_err());
        let b = b.hidden(3).unwrap().hidden(2).unwrap();
        assert!(b.hidden(1).is_err());
    }

    #[test]
    fn seeded_build_is_deterministic() {
        let make = || {
            MlfnBuilder::new(Domain::ComplexHidden, 2, 1)
                .unwrap()
                .hidden(3)
                .unwrap()
                .build_with_seed(7)
                .unwrap()
        };
        let a = make();
        let b = make();
        assert_eq!(a.weights(), b.weights());
    }

    #[test]
    fn output_layer_starts_at_zero() {
        let mlfn = MlfnBuilder::new(Domain::Real, 3, 2)
            .unwrap()
            .hidden(4)
            .unwrap()
            .build_with_seed(1)
            .unwrap();
        let out = mlfn.layout().output().range();
        assert!(mlfn.weights()[out].iter().all(|&w| w == 0.0));
        let hidden = mlfn.layout().hidden()[0];
        let a = (6.0 / (hidden.n_in_numeric() + hidden.n_out_numeric()) as f64).sqrt();
        assert!(mlfn.layer_weights(0).iter().all(|w| w.abs() <= a));
        assert!(mlfn.layer_weights(0).iter().any(|&w| w != 0.0));
    }

    #[test]
    fn output_mode_is_checked_against_domain() {
        let err = MlfnBuilder::new(Domain::Complex, 1, 2)
            .unwrap()
            .output_mode(OutputMode::Classify)
            .build_with_seed(0);
        assert!(err.is_err());
    }
}
