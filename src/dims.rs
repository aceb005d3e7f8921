//! Tensor dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-sample tensor extents. The batch dimension is implicit and never stored.
///
/// Extents are signed so that a runtime can report unresolved (`-1`) or empty
/// dimensions; callers that size memory from them must go through
/// [`Dims::element_count`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dims(Vec<i64>);

impl Dims {
    pub fn new(extents: Vec<i64>) -> Self {
        Self(extents)
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// Product of all extents, or `None` when it overflows. A scalar (rank 0) has volume 1.
    pub fn volume(&self) -> Option<i64> {
        self.0
            .iter()
            .try_fold(1i64, |volume, &extent| volume.checked_mul(extent))
    }

    /// True when every extent is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0.iter().all(|&extent| extent > 0)
    }

    /// Extents as `usize`, or `None` when any extent is not strictly positive.
    pub fn to_usize(&self) -> Option<Vec<usize>> {
        if !self.is_positive() {
            return None;
        }
        Some(self.0.iter().map(|&extent| extent as usize).collect())
    }

    /// Number of elements as `usize`, or `None` when an extent is not positive
    /// or the volume overflows.
    pub fn element_count(&self) -> Option<usize> {
        if !self.is_positive() {
            return None;
        }
        self.volume().and_then(|volume| usize::try_from(volume).ok())
    }
}

impl From<Vec<i64>> for Dims {
    fn from(extents: Vec<i64>) -> Self {
        Self(extents)
    }
}

impl From<&[i64]> for Dims {
    fn from(extents: &[i64]) -> Self {
        Self(extents.to_vec())
    }
}

impl<const N: usize> From<[i64; N]> for Dims {
    fn from(extents: [i64; N]) -> Self {
        Self(extents.to_vec())
    }
}

impl From<&[usize]> for Dims {
    fn from(extents: &[usize]) -> Self {
        Self(extents.iter().map(|&extent| extent as i64).collect())
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "()");
        }
        let parts: Vec<String> = self.0.iter().map(|extent| extent.to_string()).collect();
        write!(f, "{}", parts.join("x"))
    }
}
