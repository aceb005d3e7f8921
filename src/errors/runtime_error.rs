//! Error types raised by runtimes, devices and execution contexts.

use crate::errors::EngineError;
use thiserror::Error;

/// Errors that can occur while talking to a runtime or one of its devices.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Failed to load the engine: {0}")]
    Engine(#[from] EngineError),

    #[error("Device not available: {message}")]
    DeviceNotAvailable { message: String },

    #[error("Device allocation of {size_in_bytes} bytes failed: {message}")]
    AllocationFailed {
        size_in_bytes: usize,
        message: String,
    },

    #[error(
        "Copy size mismatch: the device buffer holds {buffer_size} bytes but {data_size} bytes were given"
    )]
    CopySizeMismatch { buffer_size: usize, data_size: usize },

    #[error("The binding index {index} must be within the {count} bindings of the engine")]
    BindingIndexOutOfBounds { index: usize, count: usize },

    #[error("The engine expects {expected} bindings but {actual} were given")]
    BindingCountMismatch { expected: usize, actual: usize },

    #[error(
        "Binding {index} needs at least {expected} bytes for the requested batch but holds {actual}"
    )]
    BindingSizeMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("The batch size {batch_size} must be between 1 and {max_batch_size}")]
    InvalidBatchSize {
        batch_size: usize,
        max_batch_size: usize,
    },

    #[error("Execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Reading device memory failed: {0}")]
    BufferMapFailed(#[from] wgpu::BufferAsyncError),
}
