use crate::activation::{Activation, NEURON_OFF, NEURON_ON};
use crate::evaluate::layer_forward;
use crate::layer::{Domain, WeightLayout};
use crate::svd::SvdSolver;
use crate::{Error, ErrorMetric, OutputMode, Result, TrainingSet};

/// A multilayer feedforward network with zero, one or two hidden layers.
///
/// All weights live in one arena; [`WeightLayout`] says which span belongs to
/// which layer. Hidden units are always nonlinear; output units are nonlinear
/// unless `linear_output` is set.
#[derive(Debug, Clone)]
pub struct Mlfn {
    layout: WeightLayout,
    weights: Vec<f64>,
    activation: Activation,
    linear_output: bool,
    output_mode: OutputMode,
    error_metric: ErrorMetric,
    error: f64,
}

/// Reusable buffers for `Mlfn::forward`.
///
/// The output of the most recent forward pass lives inside `Scratch`.
#[derive(Debug, Clone)]
pub struct Scratch {
    hidden: Vec<Vec<f64>>,
    output: Vec<f64>,
}

impl Mlfn {
    /// Assemble a network from a layout and a weight arena.
    pub fn from_parts(
        layout: WeightLayout,
        weights: Vec<f64>,
        activation: Activation,
        linear_output: bool,
        output_mode: OutputMode,
        error_metric: ErrorMetric,
    ) -> Result<Self> {
        if weights.len() != layout.total() {
            return Err(Error::InvalidShape(format!(
                "weights length {} does not match layout total {}",
                weights.len(),
                layout.total()
            )));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::InvalidData(
                "weights must contain only finite values".to_owned(),
            ));
        }
        validate_output_mode(&layout, output_mode)?;

        Ok(Self {
            layout,
            weights,
            activation,
            linear_output,
            output_mode,
            error_metric,
            error: f64::INFINITY,
        })
    }

    #[inline]
    pub fn layout(&self) -> &WeightLayout {
        &self.layout
    }

    #[inline]
    pub fn domain(&self) -> Domain {
        self.layout.domain()
    }

    /// Numbers in one input vector.
    #[inline]
    pub fn input_dim(&self) -> usize {
        self.layout.n_input_numeric()
    }

    /// Numbers in one output vector.
    #[inline]
    pub fn output_dim(&self) -> usize {
        self.layout.n_output_numeric()
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    #[inline]
    pub fn linear_output(&self) -> bool {
        self.linear_output
    }

    #[inline]
    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    #[inline]
    pub fn error_metric(&self) -> ErrorMetric {
        self.error_metric
    }

    /// Error recorded by the last regression or training run.
    #[inline]
    pub fn error(&self) -> f64 {
        self.error
    }

    #[inline]
    pub(crate) fn set_error(&mut self, error: f64) {
        self.error = error;
    }

    /// The whole weight arena.
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    /// Weights of layer `idx` (hidden layers first, output last).
    #[inline]
    pub fn layer_weights(&self, idx: usize) -> &[f64] {
        &self.weights[self.layout.layers()[idx].range()]
    }

    /// Copy weights and error from a network with the same layout.
    ///
    /// Does not allocate.
    pub fn copy_weights_from(&mut self, other: &Mlfn) {
        assert_eq!(
            self.layout, other.layout,
            "copy_weights_from requires identical layouts"
        );
        self.weights.copy_from_slice(&other.weights);
        self.error = other.error;
    }

    pub fn scratch(&self) -> Scratch {
        Scratch::new(self)
    }

    /// Forward pass for a single sample.
    ///
    /// Writes intermediate activations into `scratch` and returns the output
    /// numbers (interleaved pairs for complex outputs).
    ///
    /// Shape contract:
    /// - `input.len() == self.input_dim()`
    /// - `scratch` must be built for this `Mlfn`
    pub fn forward<'a>(&self, input: &[f64], scratch: &'a mut Scratch) -> &'a [f64] {
        self.hidden_forward(input, scratch);

        let span = self.layout.output();
        let prev: &[f64] = scratch.hidden.last().map_or(input, |h| h.as_slice());
        assert_eq!(
            scratch.output.len(),
            span.n_out_numeric(),
            "scratch output len {} does not match model output_dim {}",
            scratch.output.len(),
            span.n_out_numeric()
        );
        layer_forward(
            span.kind(),
            prev,
            &self.weights[span.range()],
            span.n_in(),
            self.linear_output,
            self.activation,
            &mut scratch.output,
        );

        &scratch.output
    }

    /// Evaluate only the hidden layers and return the vector feeding the output
    /// layer. With no hidden layer this is the input itself.
    pub fn pre_output<'a>(&self, input: &'a [f64], scratch: &'a mut Scratch) -> &'a [f64] {
        self.hidden_forward(input, scratch);
        scratch.hidden.last().map_or(input, |h| h.as_slice())
    }

    fn hidden_forward(&self, input: &[f64], scratch: &mut Scratch) {
        assert_eq!(
            input.len(),
            self.input_dim(),
            "input len {} does not match model input_dim {}",
            input.len(),
            self.input_dim()
        );
        let hidden = self.layout.hidden();
        assert_eq!(
            scratch.hidden.len(),
            hidden.len(),
            "scratch has {} hidden buffers, model has {} hidden layers",
            scratch.hidden.len(),
            hidden.len()
        );

        for (idx, span) in hidden.iter().enumerate() {
            // Borrow the previous output immutably and the current output mutably.
            let (left, right) = scratch.hidden.split_at_mut(idx);
            let prev: &[f64] = if idx == 0 { input } else { &left[idx - 1] };
            let out = &mut right[0];
            assert_eq!(
                out.len(),
                span.n_out_numeric(),
                "scratch hidden {idx} len {} does not match layer output {}",
                out.len(),
                span.n_out_numeric()
            );
            layer_forward(
                span.kind(),
                prev,
                &self.weights[span.range()],
                span.n_in(),
                false,
                self.activation,
                out,
            );
        }
    }

    /// Shape-safe, non-allocating inference.
    pub fn predict_into(&self, input: &[f64], scratch: &mut Scratch, out: &mut [f64]) -> Result<()> {
        if input.len() != self.input_dim() {
            return Err(Error::InvalidShape(format!(
                "input len {} does not match model input_dim {}",
                input.len(),
                self.input_dim()
            )));
        }
        if out.len() != self.output_dim() {
            return Err(Error::InvalidShape(format!(
                "output len {} does not match model output_dim {}",
                out.len(),
                self.output_dim()
            )));
        }
        if !scratch.fits(self) {
            return Err(Error::InvalidShape(
                "scratch was built for a different network".to_owned(),
            ));
        }
        out.copy_from_slice(self.forward(input, scratch));
        Ok(())
    }

    /// Check that `train` has the row layout this network trains on.
    pub fn check_training_set(&self, train: &TrainingSet) -> Result<()> {
        if train.mode() != self.output_mode {
            return Err(Error::InvalidData(format!(
                "training set output mode {:?} does not match network output mode {:?}",
                train.mode(),
                self.output_mode
            )));
        }
        if train.n_inputs() != self.input_dim() {
            return Err(Error::InvalidData(format!(
                "training set n_inputs {} does not match model input_dim {}",
                train.n_inputs(),
                self.input_dim()
            )));
        }
        let expected = match self.output_mode {
            OutputMode::Classify => self.layout.n_outputs(),
            OutputMode::Auto | OutputMode::General => self.output_dim(),
        };
        if train.n_outputs() != expected {
            return Err(Error::InvalidData(format!(
                "training set n_outputs {} does not match model ({expected})",
                train.n_outputs()
            )));
        }
        Ok(())
    }

    /// Desired value of output number `k` for sample `idx`.
    #[inline]
    pub(crate) fn desired(&self, train: &TrainingSet, idx: usize, k: usize) -> f64 {
        match self.output_mode {
            OutputMode::Auto => train.input(idx)[k],
            OutputMode::Classify => {
                if train.class(idx) == k + 1 {
                    NEURON_ON
                } else {
                    NEURON_OFF
                }
            }
            OutputMode::General => train.target(idx)[k],
        }
    }

    /// Network error over a whole training set under the configured metric.
    ///
    /// Zero samples give zero error.
    pub fn trial_error(&self, train: &TrainingSet) -> Result<f64> {
        self.check_training_set(train)?;

        let metric = self.error_metric;
        let complex_out = self.layout.output().kind().complex_out();
        let n_out = self.layout.n_outputs();
        let mut scratch = self.scratch();
        let mut sum = 0.0;

        for idx in 0..train.len() {
            let input = train.input(idx);
            let y = self.forward(input, &mut scratch);
            if complex_out {
                for o in 0..n_out {
                    let d_re = y[2 * o] - self.desired(train, idx, 2 * o);
                    let d_im = y[2 * o + 1] - self.desired(train, idx, 2 * o + 1);
                    sum += metric.complex_term(d_re, d_im);
                }
            } else {
                for (o, &yo) in y.iter().enumerate() {
                    sum += metric.real_term(yo - self.desired(train, idx, o));
                }
            }
        }

        Ok(metric.finish(sum, train.len(), n_out))
    }

    /// An SVD workspace sized for regressing this network's output layer on `train`.
    pub fn regression_solver(&self, train: &TrainingSet) -> SvdSolver {
        let output = self.layout.output();
        let rows_per_sample = output.kind().out_width();
        SvdSolver::new(
            train.len() * rows_per_sample,
            output.n_in_numeric(),
            false,
        )
    }
}

fn validate_output_mode(layout: &WeightLayout, mode: OutputMode) -> Result<()> {
    match mode {
        OutputMode::Classify => {
            if layout.output().kind().complex_out() {
                return Err(Error::InvalidConfig(
                    "classification requires real outputs".to_owned(),
                ));
            }
        }
        OutputMode::Auto => {
            if layout.n_output_numeric() != layout.n_input_numeric() {
                return Err(Error::InvalidConfig(format!(
                    "autoassociative network needs as many output numbers as inputs ({} vs {})",
                    layout.n_output_numeric(),
                    layout.n_input_numeric()
                )));
            }
        }
        OutputMode::General => {}
    }
    Ok(())
}

impl Scratch {
    pub fn new(mlfn: &Mlfn) -> Self {
        let hidden = mlfn
            .layout
            .hidden()
            .iter()
            .map(|span| vec![0.0; span.n_out_numeric()])
            .collect();
        Self {
            hidden,
            output: vec![0.0; mlfn.output_dim()],
        }
    }

    #[inline]
    pub fn output(&self) -> &[f64] {
        &self.output
    }

    fn fits(&self, mlfn: &Mlfn) -> bool {
        let hidden = mlfn.layout.hidden();
        self.output.len() == mlfn.output_dim()
            && self.hidden.len() == hidden.len()
            && self
                .hidden
                .iter()
                .zip(hidden)
                .all(|(buf, span)| buf.len() == span.n_out_numeric())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real_net(weights: Vec<f64>, linear: bool) -> Mlfn {
        let layout = WeightLayout::new(Domain::Real, 2, 1, 0, 1).unwrap();
        Mlfn::from_parts(
            layout,
            weights,
            Activation::Logistic,
            linear,
            OutputMode::General,
            ErrorMetric::MeanSquare,
        )
        .unwrap()
    }

    #[test]
    fn forward_chains_hidden_and_output_layers() {
        // hidden: logistic(1*x0 + 1*x1 + 0) ; output: 2*h - 1
        let mlfn = real_net(vec![1.0, 1.0, 0.0, 2.0, -1.0], true);
        let mut scratch = mlfn.scratch();
        let y = mlfn.forward(&[0.0, 0.0], &mut scratch);
        assert!(y[0].abs() < 1e-12);
        let pre = mlfn.pre_output(&[0.0, 0.0], &mut scratch).to_vec();
        assert!((pre[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn trial_error_uses_scaled_mse() {
        let mlfn = real_net(vec![0.0, 0.0, 0.0, 0.0, 0.0], true);
        let train = TrainingSet::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]], &[vec![0.2], vec![0.4]])
            .unwrap();
        let err = mlfn.trial_error(&train).unwrap();
        assert!((err - 25.0 * (0.04 + 0.16) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let layout = WeightLayout::new(Domain::Real, 2, 0, 0, 1).unwrap();
        let bad = Mlfn::from_parts(
            layout,
            vec![0.0; 2],
            Activation::Logistic,
            false,
            OutputMode::General,
            ErrorMetric::MeanSquare,
        );
        assert!(bad.is_err());

        let complex = WeightLayout::new(Domain::Complex, 1, 0, 0, 1).unwrap();
        let classify = Mlfn::from_parts(
            complex.clone(),
            vec![0.0; complex.total()],
            Activation::Logistic,
            false,
            OutputMode::Classify,
            ErrorMetric::MeanSquare,
        );
        assert!(classify.is_err());

        let mlfn = real_net(vec![0.0; 5], false);
        let mut scratch = mlfn.scratch();
        let mut out = [0.0; 2];
        assert!(mlfn.predict_into(&[0.0, 0.0], &mut scratch, &mut out).is_err());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic]
    fn forward_panics_on_input_shape_mismatch() {
        let mlfn = real_net(vec![0.0; 5], false);
        let mut scratch = mlfn.scratch();
        mlfn.forward(&[0.0; 3], &mut scratch);
    }
}
