//! Capability interface shared by trainable network models.

use rand::RngCore;

use crate::train::{LearnConfig, LearnReport};
use crate::{CancellationToken, Mlfn, Result, TrainingSet};

/// What a training front-end needs from a model.
///
/// Object safe: the random source is passed as `&mut dyn RngCore`.
pub trait Network {
    /// Numbers in one input vector.
    fn n_inputs(&self) -> usize;

    /// Numbers in one output vector.
    fn n_outputs(&self) -> usize;

    /// Evaluate one input vector into `out`.
    fn trial(&self, input: &[f64], out: &mut [f64]) -> Result<()>;

    /// Error over a whole training set.
    fn trial_error(&self, train: &TrainingSet) -> Result<f64>;

    fn learn(
        &mut self,
        train: &TrainingSet,
        cfg: &LearnConfig,
        rng: &mut dyn RngCore,
        cancel: &CancellationToken,
    ) -> Result<LearnReport>;

    /// Error recorded by the last training run.
    fn error(&self) -> f64;
}

impl Network for Mlfn {
    fn n_inputs(&self) -> usize {
        self.input_dim()
    }

    fn n_outputs(&self) -> usize {
        self.output_dim()
    }

    fn trial(&self, input: &[f64], out: &mut [f64]) -> Result<()> {
        let mut scratch = self.scratch();
        self.predict_into(input, &mut scratch, out)
    }

    fn trial_error(&self, train: &TrainingSet) -> Result<f64> {
        Mlfn::trial_error(self, train)
    }

    fn learn(
        &mut self,
        train: &TrainingSet,
        cfg: &LearnConfig,
        rng: &mut dyn RngCore,
        cancel: &CancellationToken,
    ) -> Result<LearnReport> {
        Mlfn::learn(self, train, cfg, rng, cancel)
    }

    fn error(&self) -> f64 {
        Mlfn::error(self)
    }
}
