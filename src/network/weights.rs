//! Weight blocks handed to the network definition.

use rand::Rng;

/// A contiguous block of `f32` weights. An empty block means "not present".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Weights {
    values: Vec<f32>,
}

impl Weights {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// `count` weights drawn uniformly from `[0, 1)`.
    pub fn random<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Self {
        Self {
            values: (0..count).map(|_| rng.gen::<f32>()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

impl From<Vec<f32>> for Weights {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}
