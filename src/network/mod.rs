//! Network description.
//!
//! A [`NetworkDefinition`] records tensors and layers the way a caller adds
//! them. Shapes other than the inputs' are not known until the [`Builder`]
//! infers them, so stride and padding may be changed after a layer is added.
//! Layers can only read tensors that already exist, which keeps definition
//! order a valid execution order.

pub mod builder;
pub mod weights;

pub use builder::{Builder, BuilderConfig, platform_has_fast_fp16};
pub use weights::Weights;

use crate::activation::Activation;
use crate::dims::Dims;
use crate::errors::{NetworkError, NetworkResult};

/// Handle to a tensor of a [`NetworkDefinition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorId(usize);

impl TensorId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to a layer of a [`NetworkDefinition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(usize);

impl LayerId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NetworkTensor {
    pub(crate) name: String,
    /// Set for network inputs only.
    pub(crate) input_dims: Option<Dims>,
}

#[derive(Debug, Clone)]
pub(crate) struct ConvolutionDefinition {
    pub(crate) input: TensorId,
    pub(crate) num_output_maps: usize,
    pub(crate) kernel_shape: [usize; 2],
    pub(crate) stride: [usize; 2],
    pub(crate) padding: [usize; 2],
    pub(crate) kernel: Weights,
    pub(crate) bias: Weights,
}

#[derive(Debug, Clone)]
pub(crate) enum LayerKind {
    Convolution(ConvolutionDefinition),
    Activation {
        input: TensorId,
        activation: Activation,
    },
    Concatenation {
        inputs: Vec<TensorId>,
        axis: usize,
    },
}

impl LayerKind {
    fn type_name(&self) -> &'static str {
        match self {
            LayerKind::Convolution(_) => "CONVOLUTION",
            LayerKind::Activation { .. } => "ACTIVATION",
            LayerKind::Concatenation { .. } => "CONCATENATION",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NetworkLayer {
    pub(crate) name: String,
    pub(crate) kind: LayerKind,
    pub(crate) output: TensorId,
}

/// A network under construction.
#[derive(Debug, Clone, Default)]
pub struct NetworkDefinition {
    pub(crate) tensors: Vec<NetworkTensor>,
    pub(crate) layers: Vec<NetworkLayer>,
    pub(crate) inputs: Vec<TensorId>,
    pub(crate) outputs: Vec<TensorId>,
}

impl NetworkDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a network input with per-sample dimensions.
    pub fn add_input(&mut self, name: &str, dims: impl Into<Dims>) -> NetworkResult<TensorId> {
        let dims = dims.into();
        if dims.rank() == 0 || !dims.is_positive() {
            return Err(NetworkError::InvalidInputDims {
                name: name.to_string(),
                dims: dims.to_string(),
            });
        }
        self.check_unique_name(name)?;

        let id = TensorId(self.tensors.len());
        self.tensors.push(NetworkTensor {
            name: name.to_string(),
            input_dims: Some(dims),
        });
        self.inputs.push(id);
        Ok(id)
    }

    /// Adds a convolution with stride 1 and no padding.
    ///
    /// `kernel` holds `num_output_maps x C x kh x kw` values; an empty `bias`
    /// means the layer has none.
    pub fn add_convolution(
        &mut self,
        input: TensorId,
        num_output_maps: usize,
        kernel_shape: [usize; 2],
        kernel: Weights,
        bias: Weights,
    ) -> NetworkResult<LayerId> {
        self.check_tensor(input)?;
        self.push_layer(
            "conv",
            LayerKind::Convolution(ConvolutionDefinition {
                input,
                num_output_maps,
                kernel_shape,
                stride: [1, 1],
                padding: [0, 0],
                kernel,
                bias,
            }),
        )
    }

    pub fn add_activation(&mut self, input: TensorId, activation: Activation) -> NetworkResult<LayerId> {
        self.check_tensor(input)?;
        self.push_layer("activation", LayerKind::Activation { input, activation })
    }

    /// Adds a concatenation along the channel axis.
    pub fn add_concatenation(&mut self, inputs: &[TensorId]) -> NetworkResult<LayerId> {
        if inputs.is_empty() {
            return Err(NetworkError::EmptyConcatenation {
                layer: format!("concat_{}", self.layers.len()),
            });
        }
        for &input in inputs {
            self.check_tensor(input)?;
        }
        self.push_layer(
            "concat",
            LayerKind::Concatenation {
                inputs: inputs.to_vec(),
                axis: 0,
            },
        )
    }

    pub fn set_stride(&mut self, layer: LayerId, stride: [usize; 2]) -> NetworkResult<()> {
        self.convolution_mut(layer)?.stride = stride;
        Ok(())
    }

    pub fn set_padding(&mut self, layer: LayerId, padding: [usize; 2]) -> NetworkResult<()> {
        self.convolution_mut(layer)?.padding = padding;
        Ok(())
    }

    pub fn set_axis(&mut self, layer: LayerId, axis: usize) -> NetworkResult<()> {
        let network_layer = self.layer_mut(layer)?;
        match &mut network_layer.kind {
            LayerKind::Concatenation { axis: current, .. } => {
                *current = axis;
                Ok(())
            }
            other => Err(NetworkError::LayerKindMismatch {
                index: layer.0,
                expected: "CONCATENATION".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }

    pub fn layer_output(&self, layer: LayerId) -> NetworkResult<TensorId> {
        self.layers
            .get(layer.0)
            .map(|network_layer| network_layer.output)
            .ok_or(NetworkError::UnknownLayer { index: layer.0 })
    }

    /// Marks a tensor as a network output. Marking a tensor twice has no further effect.
    pub fn mark_output(&mut self, tensor: TensorId) -> NetworkResult<()> {
        self.check_tensor(tensor)?;
        if self.inputs.contains(&tensor) {
            return Err(NetworkError::InputMarkedAsOutput {
                name: self.tensors[tensor.0].name.clone(),
            });
        }
        if !self.outputs.contains(&tensor) {
            self.outputs.push(tensor);
        }
        Ok(())
    }

    pub fn set_tensor_name(&mut self, tensor: TensorId, name: &str) -> NetworkResult<()> {
        self.check_tensor(tensor)?;
        if self.tensors[tensor.0].name == name {
            return Ok(());
        }
        self.check_unique_name(name)?;
        self.tensors[tensor.0].name = name.to_string();
        Ok(())
    }

    pub fn tensor_name(&self, tensor: TensorId) -> NetworkResult<&str> {
        self.check_tensor(tensor)?;
        Ok(&self.tensors[tensor.0].name)
    }

    fn push_layer(&mut self, prefix: &str, kind: LayerKind) -> NetworkResult<LayerId> {
        let id = LayerId(self.layers.len());
        let name = format!("{}_{}", prefix, id.0);
        let output_name = format!("{}_output", name);
        self.check_unique_name(&output_name)?;

        let output = TensorId(self.tensors.len());
        self.tensors.push(NetworkTensor {
            name: output_name,
            input_dims: None,
        });
        self.layers.push(NetworkLayer { name, kind, output });
        Ok(id)
    }

    fn check_tensor(&self, tensor: TensorId) -> NetworkResult<()> {
        if tensor.0 >= self.tensors.len() {
            return Err(NetworkError::UnknownTensor { index: tensor.0 });
        }
        Ok(())
    }

    fn check_unique_name(&self, name: &str) -> NetworkResult<()> {
        if self.tensors.iter().any(|tensor| tensor.name == name) {
            return Err(NetworkError::DuplicateTensorName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn layer_mut(&mut self, layer: LayerId) -> NetworkResult<&mut NetworkLayer> {
        self.layers
            .get_mut(layer.0)
            .ok_or(NetworkError::UnknownLayer { index: layer.0 })
    }

    fn convolution_mut(&mut self, layer: LayerId) -> NetworkResult<&mut ConvolutionDefinition> {
        let network_layer = self.layer_mut(layer)?;
        match &mut network_layer.kind {
            LayerKind::Convolution(definition) => Ok(definition),
            other => Err(NetworkError::LayerKindMismatch {
                index: layer.0,
                expected: "CONVOLUTION".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }
}
