//! Multilayer feedforward networks trained by regression and annealing.
//!
//! `rust-mlfn` implements the numerical core of a small MLFN package: real and
//! complex forward passes, closed-form least-squares training of the output layer
//! through a singular value decomposition, and simulated annealing of the hidden
//! layers.
//!
//! # Design goals
//!
//! - Predictable performance: the forward pass and the annealing move reuse
//!   caller-owned buffers and never allocate.
//! - Clear contracts: shapes are explicit and validated at the API boundary.
//! - Robust numerics: rank-deficient systems give the minimum-norm solution
//!   instead of a division fault.
//!
//! # Panics vs `Result`
//!
//! - Low-level hot path (panics on misuse): [`Mlfn::forward`], [`anneal::perturb`]
//!   and the kernels in [`dotprod`] and [`evaluate`]. Shape mismatches are
//!   programmer errors.
//! - High-level APIs (shape-checked): [`Mlfn::predict_into`], [`Mlfn::trial_error`],
//!   [`Mlfn::regress`], [`Mlfn::learn`]. These return [`Result`].
//!
//! # Data layout
//!
//! - Scalars are `f64`.
//! - Complex numbers are stored interleaved: `[re0, im0, re1, im1, ...]`.
//! - All weights of a network live in one arena described by [`WeightLayout`].
//!   Each unit's weight vector is its input weights followed by its bias.
//! - [`TrainingSet`] stores samples contiguously, one fixed-width row per sample.
//!
//! # Logging
//!
//! The crate logs through [`tracing`] and never installs a subscriber.
//! [`Mlfn::learn`] runs inside an `mlfn_learn` span.
//!
//! # Quick start
//!
//! ```rust
//! use rust_mlfn::{CancellationToken, Domain, LearnConfig, MlfnBuilder, TrainingSet};
//! use rand::SeedableRng;
//!
//! # fn main() -> rust_mlfn::Result<()> {
//! let xs: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64 / 10.0 - 1.0]).collect();
//! let ys: Vec<Vec<f64>> = xs.iter().map(|x| vec![0.5 + 0.3 * x[0] * x[0]]).collect();
//! let train = TrainingSet::from_rows(&xs, &ys)?;
//!
//! let mut mlfn = MlfnBuilder::new(Domain::Real, 1, 1)?
//!     .hidden(3)?
//!     .build_with_seed(0)?;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let report = mlfn.learn(&train, &LearnConfig::default(), &mut rng, &CancellationToken::new())?;
//! assert!(report.error.is_finite());
//! # Ok(())
//! # }
//! ```
//!
//! # Regression only
//!
//! With the hidden weights fixed, the output layer can be solved directly:
//!
//! ```rust
//! use rust_mlfn::{Domain, MlfnBuilder, TrainingSet};
//!
//! # fn main() -> rust_mlfn::Result<()> {
//! let xs = vec![vec![0.0], vec![1.0], vec![2.0]];
//! let ys = vec![vec![1.0], vec![3.0], vec![5.0]];
//! let train = TrainingSet::from_rows(&xs, &ys)?;
//!
//! let mut mlfn = MlfnBuilder::new(Domain::Real, 1, 1)?
//!     .linear_output(true)
//!     .build_with_seed(0)?;
//! let mut solver = mlfn.regression_solver(&train);
//! let error = mlfn.regress(&train, &mut solver)?;
//! assert!(error < 1e-18);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod anneal;
pub mod builder;
pub mod cancel;
pub mod data;
pub mod dotprod;
pub mod error;
pub mod evaluate;
pub mod layer;
pub mod metrics;
pub mod mlfn;
pub mod network;
pub mod regress;
pub mod svd;
pub mod train;

#[cfg(feature = "serde")]
pub mod serde_config;

pub use activation::{Activation, NEURON_OFF, NEURON_ON};
pub use anneal::{AnnealConfig, AnnealSchedule, RandomDensity, Reduction, WEIGHT_LIMIT};
pub use builder::MlfnBuilder;
pub use cancel::CancellationToken;
pub use data::{OutputMode, TrainingSet};
pub use error::{Error, Result};
pub use layer::{Domain, LayerSpan, UnitKind, WeightLayout};
pub use metrics::ErrorMetric;
pub use mlfn::{Mlfn, Scratch};
pub use network::Network;
pub use svd::SvdSolver;
pub use train::{LearnConfig, LearnReport};

/// Shape-safe, non-allocating inference.
///
/// Thin wrapper around [`Mlfn::predict_into`].
pub fn predict_into(
    mlfn: &Mlfn,
    input: &[f64],
    scratch: &mut Scratch,
    out: &mut [f64],
) -> Result<()> {
    mlfn.predict_into(input, scratch, out)
}
