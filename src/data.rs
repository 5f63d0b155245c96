//! Training set storage.
//!
//! Samples are fixed-width rows in one contiguous buffer. Every row starts with
//! the input numbers; what follows depends on the [`OutputMode`]:
//!
//! - `Classify`: one extra number, the 1-based class index of the sample.
//! - `Auto`: nothing. Targets are the inputs themselves.
//! - `General`: `n_outputs` explicit target numbers.
//!
//! Complex inputs and outputs are stored interleaved, so "numbers" here count
//! real and imaginary parts separately.

use crate::{Error, Result};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// How training targets are derived from a sample row.
pub enum OutputMode {
    /// Each output is a class; the row stores the 1-based class index.
    Classify,
    /// Autoassociative: outputs reproduce the inputs.
    Auto,
    /// Explicit targets follow the inputs.
    #[default]
    General,
}

#[derive(Debug, Clone)]
/// A training set with a fixed row layout.
pub struct TrainingSet {
    data: Vec<f64>,
    len: usize,
    n_inputs: usize,
    n_outputs: usize,
    mode: OutputMode,
}

impl TrainingSet {
    /// Build a training set from a flat row-major buffer.
    ///
    /// `n_inputs` and `n_outputs` count numbers, not complex values. For `Auto`,
    /// `n_outputs` must equal `n_inputs`; for `Classify` it is the class count.
    pub fn from_flat(
        data: Vec<f64>,
        n_inputs: usize,
        n_outputs: usize,
        mode: OutputMode,
    ) -> Result<Self> {
        if n_inputs == 0 {
            return Err(Error::InvalidData("n_inputs must be > 0".to_owned()));
        }
        if n_outputs == 0 {
            return Err(Error::InvalidData("n_outputs must be > 0".to_owned()));
        }
        if mode == OutputMode::Auto && n_outputs != n_inputs {
            return Err(Error::InvalidData(format!(
                "autoassociative set needs n_outputs == n_inputs, got {n_outputs} vs {n_inputs}"
            )));
        }

        let width = row_width(mode, n_inputs, n_outputs);
        if !data.len().is_multiple_of(width) {
            return Err(Error::InvalidData(format!(
                "data length {} is not divisible by row width {width}",
                data.len()
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "training data must contain only finite values".to_owned(),
            ));
        }

        let len = data.len() / width;
        let set = Self {
            data,
            len,
            n_inputs,
            n_outputs,
            mode,
        };

        if mode == OutputMode::Classify {
            for idx in 0..len {
                let c = set.row(idx)[n_inputs];
                if c.fract() != 0.0 || c < 1.0 || c > n_outputs as f64 {
                    return Err(Error::InvalidData(format!(
                        "sample {idx} has class {c}, expected an integer in 1..={n_outputs}"
                    )));
                }
            }
        }

        Ok(set)
    }

    /// Build a general-mapping set from per-sample input and target rows.
    ///
    /// This is a convenience constructor (it copies into contiguous storage).
    pub fn from_rows(inputs: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<Self> {
        if inputs.len() != targets.len() {
            return Err(Error::InvalidData(format!(
                "inputs/targets length mismatch: {} vs {}",
                inputs.len(),
                targets.len()
            )));
        }
        let n_inputs = inputs.first().map(|r| r.len()).unwrap_or(0);
        let n_outputs = targets.first().map(|r| r.len()).unwrap_or(0);

        let mut data = Vec::with_capacity(inputs.len() * (n_inputs + n_outputs));
        for (i, (x, t)) in inputs.iter().zip(targets).enumerate() {
            if x.len() != n_inputs || t.len() != n_outputs {
                return Err(Error::InvalidData(format!(
                    "row {i} has {} inputs and {} targets, expected {n_inputs} and {n_outputs}",
                    x.len(),
                    t.len()
                )));
            }
            data.extend_from_slice(x);
            data.extend_from_slice(t);
        }

        Self::from_flat(data, n_inputs, n_outputs, OutputMode::General)
    }

    /// Build a classification set from input rows and 1-based class indices.
    pub fn from_classes(inputs: &[Vec<f64>], classes: &[usize], n_classes: usize) -> Result<Self> {
        if inputs.len() != classes.len() {
            return Err(Error::InvalidData(format!(
                "inputs/classes length mismatch: {} vs {}",
                inputs.len(),
                classes.len()
            )));
        }
        let n_inputs = inputs.first().map(|r| r.len()).unwrap_or(0);

        let mut data = Vec::with_capacity(inputs.len() * (n_inputs + 1));
        for (i, (x, &c)) in inputs.iter().zip(classes).enumerate() {
            if x.len() != n_inputs {
                return Err(Error::InvalidData(format!(
                    "row {i} has {} inputs, expected {n_inputs}",
                    x.len()
                )));
            }
            data.extend_from_slice(x);
            data.push(c as f64);
        }

        Self::from_flat(data, n_inputs, n_classes, OutputMode::Classify)
    }

    #[inline]
    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    /// Input numbers per sample.
    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    #[inline]
    /// Output numbers per sample (class count for `Classify`).
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    #[inline]
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    #[inline]
    /// Numbers per stored row.
    pub fn row_width(&self) -> usize {
        row_width(self.mode, self.n_inputs, self.n_outputs)
    }

    #[inline]
    /// Returns the `idx`-th raw row.
    ///
    /// Panics if `idx >= len`.
    pub fn row(&self, idx: usize) -> &[f64] {
        let width = self.row_width();
        let start = idx * width;
        &self.data[start..start + width]
    }

    #[inline]
    /// Returns the `idx`-th input vector.
    pub fn input(&self, idx: usize) -> &[f64] {
        &self.row(idx)[..self.n_inputs]
    }

    #[inline]
    /// Returns the 1-based class of sample `idx`. Only meaningful for `Classify`.
    pub fn class(&self, idx: usize) -> usize {
        debug_assert_eq!(self.mode, OutputMode::Classify);
        self.row(idx)[self.n_inputs] as usize
    }

    #[inline]
    /// Target numbers of sample `idx` for `Auto` and `General` sets.
    ///
    /// Panics for `Classify` sets, whose targets are derived from the class.
    pub fn target(&self, idx: usize) -> &[f64] {
        let row = self.row(idx);
        match self.mode {
            OutputMode::Auto => &row[..self.n_inputs],
            OutputMode::General => &row[self.n_inputs..],
            OutputMode::Classify => panic!("classification rows store a class, not targets"),
        }
    }
}

#[inline]
fn row_width(mode: OutputMode, n_inputs: usize, n_outputs: usize) -> usize {
    match mode {
        OutputMode::Classify => n_inputs + 1,
        OutputMode::Auto => n_inputs,
        OutputMode::General => n_inputs + n_outputs,
    }
}
