//! Class label lists.

use crate::errors::InferenceResult;
use std::fs;
use std::path::Path;

/// Class names indexed by output position. Line `i` of the source names class `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    labels: Vec<String>,
}

impl Labels {
    /// Splits on `'\n'` exactly, so a trailing newline yields a trailing empty label.
    pub fn parse(text: &str) -> Self {
        Self {
            labels: text.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn from_file(path: &Path) -> InferenceResult<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Labels {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().map(Into::into).collect(),
        }
    }
}
