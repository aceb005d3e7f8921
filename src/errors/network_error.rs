//! Error types for network description and engine building.

use crate::errors::EngineError;
use thiserror::Error;

/// Errors that can occur while describing a network or building an engine from it.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Tensor {index} does not belong to this network")]
    UnknownTensor { index: usize },

    #[error("Layer {index} does not belong to this network")]
    UnknownLayer { index: usize },

    #[error("Layer {index} is a {actual} layer, not a {expected} layer")]
    LayerKindMismatch {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("A tensor named {name} already exists")]
    DuplicateTensorName { name: String },

    #[error("The input {name} must have positive dimensions, got {dims}")]
    InvalidInputDims { name: String, dims: String },

    #[error("The network has no inputs")]
    NoInputs,

    #[error("The network has no marked outputs")]
    NoOutputs,

    #[error("The network input {name} cannot be marked as an output")]
    InputMarkedAsOutput { name: String },

    #[error("The layer {layer} expects a CHW input but got {dims}")]
    InvalidConvolutionInput { layer: String, dims: String },

    #[error("The {parameter} of layer {layer} must be positive, got {value:?}")]
    NonPositiveParameter {
        layer: String,
        parameter: String,
        value: [usize; 2],
    },

    #[error("The kernel of layer {layer} must hold {expected} values but holds {actual}")]
    KernelSizeMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },

    #[error("The bias of layer {layer} must hold {expected} values but holds {actual}")]
    BiasSizeMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },

    #[error("The layer {layer} produces an empty output of shape {dims}")]
    EmptyOutput { layer: String, dims: String },

    #[error("The concatenation {layer} needs at least one input")]
    EmptyConcatenation { layer: String },

    #[error("The concatenation axis {axis} of layer {layer} is out of range for rank {rank}")]
    ConcatenationAxisOutOfRange {
        layer: String,
        axis: usize,
        rank: usize,
    },

    #[error("The concatenation {layer} cannot join {first} with {other} along axis {axis}")]
    ConcatenationShapeMismatch {
        layer: String,
        axis: usize,
        first: String,
        other: String,
    },

    #[error("The maximum batch size must be greater than 0")]
    InvalidMaxBatchSize,

    #[error("The built engine failed validation: {0}")]
    InvalidEngine(#[from] EngineError),
}
