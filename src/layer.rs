//! Weight layout.
//!
//! All weights of a network live in one contiguous arena. Each layer owns a
//! disjoint span of it, described by a [`LayerSpan`]. Within a span the weights
//! of one unit are contiguous (`n_in_numeric` numbers, inputs changing fastest,
//! bias last), and units follow each other.
//!
//! "Numeric" counts are the number of `f64`s: complex values take two, and every
//! layer input carries a bias term (one number for real inputs, a complex pair
//! for complex inputs).

use crate::{Error, Result};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Which layers of the network carry complex values.
pub enum Domain {
    /// Real inputs, real hidden layers, real outputs.
    #[default]
    Real,
    /// Complex inputs; the first layer maps complex to real, everything after is real.
    ComplexInput,
    /// Complex inputs and hidden layers; the output layer maps complex to real.
    ComplexHidden,
    /// Complex everywhere, including the outputs.
    Complex,
}

impl Domain {
    #[inline]
    pub fn complex_inputs(self) -> bool {
        !matches!(self, Domain::Real)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Numeric kind of the units in one layer.
pub enum UnitKind {
    RealToReal,
    ComplexToReal,
    ComplexToComplex,
}

impl UnitKind {
    #[inline]
    pub fn complex_in(self) -> bool {
        !matches!(self, UnitKind::RealToReal)
    }

    #[inline]
    pub fn complex_out(self) -> bool {
        matches!(self, UnitKind::ComplexToComplex)
    }

    /// Numbers per logical input value (2 for complex).
    #[inline]
    pub fn in_width(self) -> usize {
        if self.complex_in() { 2 } else { 1 }
    }

    /// Numbers per logical unit output (2 for complex).
    #[inline]
    pub fn out_width(self) -> usize {
        if self.complex_out() { 2 } else { 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// One layer's slice of the weight arena.
pub struct LayerSpan {
    offset: usize,
    n_in: usize,
    n_units: usize,
    kind: UnitKind,
}

impl LayerSpan {
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Logical inputs (complex inputs count once).
    #[inline]
    pub fn n_in(&self) -> usize {
        self.n_in
    }

    /// Logical units in this layer.
    #[inline]
    pub fn n_units(&self) -> usize {
        self.n_units
    }

    #[inline]
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Numbers feeding each unit, excluding the bias.
    #[inline]
    pub fn n_in_values(&self) -> usize {
        self.n_in * self.kind.in_width()
    }

    /// Numbers feeding each unit, including the bias.
    #[inline]
    pub fn n_in_numeric(&self) -> usize {
        self.n_in_values() + self.kind.in_width()
    }

    /// Numbers produced by this layer.
    #[inline]
    pub fn n_out_numeric(&self) -> usize {
        self.n_units * self.kind.out_width()
    }

    /// Total weights owned by this layer.
    #[inline]
    pub fn len(&self) -> usize {
        self.n_units * self.n_in_numeric()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Arena range of the whole layer.
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len()
    }

    /// Arena range of one unit's weight vector.
    #[inline]
    pub fn unit_range(&self, unit: usize) -> std::ops::Range<usize> {
        debug_assert!(unit < self.n_units);
        let start = self.offset + unit * self.n_in_numeric();
        start..start + self.n_in_numeric()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Per-layer spans of a network's weight arena.
///
/// Layers are ordered input -> hidden1 -> hidden2 -> output; missing hidden layers
/// are simply absent, so the output layer is always last.
pub struct WeightLayout {
    domain: Domain,
    n_inputs: usize,
    layers: Vec<LayerSpan>,
    total: usize,
}

impl WeightLayout {
    /// Build the layout for `n_inputs` logical inputs, up to two hidden layers
    /// (`0` means absent), and `n_outputs` logical outputs.
    pub fn new(
        domain: Domain,
        n_inputs: usize,
        n_hidden1: usize,
        n_hidden2: usize,
        n_outputs: usize,
    ) -> Result<Self> {
        if n_inputs == 0 {
            return Err(Error::InvalidConfig("n_inputs must be > 0".to_owned()));
        }
        if n_outputs == 0 {
            return Err(Error::InvalidConfig("n_outputs must be > 0".to_owned()));
        }
        if n_hidden1 == 0 && n_hidden2 > 0 {
            return Err(Error::InvalidConfig(
                "second hidden layer requires a first hidden layer".to_owned(),
            ));
        }

        let mut sizes = vec![n_inputs];
        sizes.extend([n_hidden1, n_hidden2].into_iter().filter(|&n| n > 0));
        sizes.push(n_outputs);

        let n_layers = sizes.len() - 1;
        let mut layers = Vec::with_capacity(n_layers);
        let mut offset = 0usize;
        for (idx, pair) in sizes.windows(2).enumerate() {
            let kind = unit_kind(domain, idx, n_layers);
            let span = LayerSpan {
                offset,
                n_in: pair[0],
                n_units: pair[1],
                kind,
            };
            offset = offset
                .checked_add(span.len())
                .ok_or_else(|| Error::InvalidConfig("weight count overflow".to_owned()))?;
            layers.push(span);
        }

        Ok(Self {
            domain,
            n_inputs,
            layers,
            total: offset,
        })
    }

    #[inline]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Logical inputs.
    #[inline]
    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    /// Numbers in one input vector.
    #[inline]
    pub fn n_input_numeric(&self) -> usize {
        self.layers[0].n_in_values()
    }

    /// Logical outputs.
    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.output().n_units()
    }

    /// Numbers in one output vector.
    #[inline]
    pub fn n_output_numeric(&self) -> usize {
        self.output().n_out_numeric()
    }

    #[inline]
    pub fn layers(&self) -> &[LayerSpan] {
        &self.layers
    }

    /// Hidden layers only (zero, one or two).
    #[inline]
    pub fn hidden(&self) -> &[LayerSpan] {
        &self.layers[..self.layers.len() - 1]
    }

    #[inline]
    pub fn output(&self) -> &LayerSpan {
        self.layers
            .last()
            .expect("layout always has an output layer")
    }

    /// Total weights in the arena.
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }
}

#[inline]
fn unit_kind(domain: Domain, idx: usize, n_layers: usize) -> UnitKind {
    let is_output = idx + 1 == n_layers;
    match domain {
        Domain::Real => UnitKind::RealToReal,
        Domain::ComplexInput => {
            if idx == 0 {
                UnitKind::ComplexToReal
            } else {
                UnitKind::RealToReal
            }
        }
        Domain::ComplexHidden => {
            if is_output {
                UnitKind::ComplexToReal
            } else {
                UnitKind::ComplexToComplex
            }
        }
        Domain::Complex => UnitKind::ComplexToComplex,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contiguous(layout: &WeightLayout) {
        let mut next = 0;
        for span in layout.layers() {
            assert_eq!(span.offset(), next);
            next = span.range().end;
        }
        assert_eq!(next, layout.total());
    }

    #[test]
    fn real_layout_counts_bias_once_per_unit() {
        let layout = WeightLayout::new(Domain::Real, 3, 4, 0, 2).unwrap();
        assert_eq!(layout.layers().len(), 2);
        assert_eq!(layout.layers()[0].n_in_numeric(), 4);
        assert_eq!(layout.output().n_in_numeric(), 5);
        assert_eq!(layout.total(), 4 * 4 + 2 * 5);
        assert_contiguous(&layout);
    }

    #[test]
    fn complex_layouts_double_values_and_bias() {
        let layout = WeightLayout::new(Domain::Complex, 2, 3, 0, 1).unwrap();
        assert_eq!(layout.n_input_numeric(), 4);
        assert_eq!(layout.layers()[0].n_in_numeric(), 6);
        assert_eq!(layout.output().n_in_numeric(), 8);
        assert_eq!(layout.n_output_numeric(), 2);
        assert_eq!(layout.total(), 3 * 6 + 8);
        assert_contiguous(&layout);

        let hidden = WeightLayout::new(Domain::ComplexHidden, 2, 3, 2, 1).unwrap();
        let kinds: Vec<_> = hidden.layers().iter().map(|l| l.kind()).collect();
        assert_eq!(
            kinds,
            [
                UnitKind::ComplexToComplex,
                UnitKind::ComplexToComplex,
                UnitKind::ComplexToReal
            ]
        );
        assert_eq!(hidden.n_output_numeric(), 1);
        assert_contiguous(&hidden);
    }

    #[test]
    fn complex_input_is_complex_only_in_the_first_layer() {
        let layout = WeightLayout::new(Domain::ComplexInput, 2, 3, 0, 1).unwrap();
        assert_eq!(layout.layers()[0].kind(), UnitKind::ComplexToReal);
        assert_eq!(layout.output().kind(), UnitKind::RealToReal);
        assert_eq!(layout.output().n_in_numeric(), 4);

        let direct = WeightLayout::new(Domain::ComplexInput, 2, 0, 0, 1).unwrap();
        assert_eq!(direct.output().kind(), UnitKind::ComplexToReal);
    }

    #[test]
    fn rejects_second_hidden_without_first() {
        assert!(WeightLayout::new(Domain::Real, 2, 0, 3, 1).is_err());
        assert!(WeightLayout::new(Domain::Real, 0, 2, 0, 1).is_err());
        assert!(WeightLayout::new(Domain::Real, 2, 2, 0, 0).is_err());
    }
}
