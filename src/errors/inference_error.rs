//! Error types for the inference runner.

use crate::errors::RuntimeError;
use thiserror::Error;

/// Errors that can occur while preparing buffers, running the engine or reporting results.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("The engine declares {count} bindings, binding {index} is required")]
    MissingBinding { index: usize, count: usize },

    #[error("Binding {index} has shape {dims}, which does not describe a positive element count")]
    InvalidBindingVolume { index: usize, dims: String },

    #[error("The host buffer holds {host_bytes} bytes but its device mirror holds {device_bytes}")]
    BufferSizeMismatch {
        host_bytes: usize,
        device_bytes: usize,
    },

    #[error("The engine reported an unsuccessful execution")]
    ExecutionUnsuccessful,

    #[error("Input shape {dims} is not a 3-channel CHW image")]
    UnsupportedInputShape { dims: String },

    #[error("The input buffer holds {actual} values but the image needs {expected}")]
    InputSizeMismatch { expected: usize, actual: usize },

    #[error("Failed to decode the input image: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("The class index {index} is outside the label list of {labels} entries")]
    LabelIndexOutOfRange { index: usize, labels: usize },

    #[error("Requested the top {requested} results but only {available} are available")]
    NotEnoughScores { requested: usize, available: usize },
}
