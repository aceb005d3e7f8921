//! Error types for engine plan loading and validation.

use thiserror::Error;

/// Errors that can occur while decoding or validating a serialized engine plan.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("The serialized engine could not be decoded: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error(
        "The serialized engine was built for format version {found}, this runtime reads version {expected}"
    )]
    IncompatibleVersion { found: u32, expected: u32 },

    #[error("The maximum batch size must be greater than 0")]
    InvalidMaxBatchSize,

    #[error("At least one input binding and one output binding are required")]
    MissingBindings,

    #[error("Input bindings must precede output bindings, binding {index} breaks the order")]
    BindingOrder { index: usize },

    #[error("The tensor {tensor} is bound more than once")]
    DuplicateBinding { tensor: usize },

    #[error("The {label} tensor index {index} must be within the number of tensors")]
    TensorIndexOutOfBounds { label: String, index: usize },

    #[error("The tensor {name} has non-positive dimensions: {dims}")]
    InvalidTensorDims { name: String, dims: String },

    #[error("The weights {index} must be within the number of weight blocks")]
    WeightsIndexOutOfBounds { index: usize },

    #[error("The weights at index {index} are not used")]
    UnusedWeights { index: usize },

    #[error("The layer {layer} reads tensor {tensor} before it is produced")]
    TensorNotYetProduced { layer: String, tensor: usize },

    #[error("The tensor {tensor} is produced by more than one layer or is a network input")]
    TensorProducedTwice { tensor: usize },

    #[error("The output tensor {tensor} is never produced by any layer")]
    OutputNeverProduced { tensor: usize },

    #[error("The layer {layer} expects an input of rank {expected} but got rank {actual}")]
    InputRankMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },

    #[error("The layer {layer} has an invalid {parameter}: {value:?}")]
    InvalidLayerParameter {
        layer: String,
        parameter: String,
        value: Vec<usize>,
    },

    #[error(
        "The {label} weights of layer {layer} must hold {expected} values but hold {actual}"
    )]
    WeightsSizeMismatch {
        layer: String,
        label: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "The output tensor of layer {layer} declares dimensions {declared} but the layer produces {computed}"
    )]
    OutputDimsMismatch {
        layer: String,
        declared: String,
        computed: String,
    },

    #[error("The layer {layer} has no input tensors")]
    NoLayerInputs { layer: String },

    #[error("The concatenation {layer} cannot join {first} with {other} along axis {axis}")]
    ConcatenationShapeMismatch {
        layer: String,
        axis: usize,
        first: String,
        other: String,
    },

    #[error(
        "The computation buffer array size exceeds the maximum allowed elements: {actual} > {max}"
    )]
    ComputationBufferSizeExceedsLimit { actual: usize, max: usize },
}
