//! Error types for building, loading and running inference engines.
//!
//! Each layer of the crate has its own error enum so failures stay specific:
//! plan decoding and validation, runtime and device calls, the inference
//! runner, and network description.

mod engine_error;
mod inference_error;
mod network_error;
mod runtime_error;

pub use engine_error::EngineError;
pub use inference_error::InferenceError;
pub use network_error::NetworkError;
pub use runtime_error::RuntimeError;

/// Result type alias for engine plan operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for runtime and device operations.
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Result type alias for inference runner operations.
pub type InferenceResult<T> = std::result::Result<T, InferenceError>;

/// Result type alias for network description and engine building.
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;
