//! Engine builder.
//!
//! Turns a [`NetworkDefinition`] into a validated [`EnginePlan`]: every layer's
//! output shape is inferred in definition order, weights are checked against
//! the inferred shapes and collected into indexed blocks, and bindings are laid
//! out inputs first, then outputs in the order they were marked.

use crate::dims::Dims;
use crate::engine_plan::{
    ActivationLayerInfo, BindingInfo, ConcatenationLayerInfo, ConvolutionLayerInfo,
    ENGINE_FORMAT_VERSION, EnginePlan, LayerInfo, TensorInfo, concatenation_output_dims,
    convolution_output_dims,
};
use crate::errors::{NetworkError, NetworkResult};
use crate::network::{ConvolutionDefinition, LayerKind, NetworkDefinition, NetworkLayer, TensorId};
use log::{debug, info, warn};

/// Whether the runtimes in this crate have fast half-precision kernels.
///
/// Every kernel computes in `f32`, so this is always false.
pub fn platform_has_fast_fp16() -> bool {
    false
}

/// Options applied when building an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderConfig {
    /// Largest batch an execution context will accept.
    pub max_batch_size: usize,
    /// Requests half-precision kernels when the platform has fast ones.
    pub fp16_mode: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 1,
            fp16_mode: false,
        }
    }
}

/// Builds engine plans from network definitions.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: BuilderConfig,
}

impl Builder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    pub fn build_engine(&self, network: &NetworkDefinition) -> NetworkResult<EnginePlan> {
        if self.config.max_batch_size == 0 {
            return Err(NetworkError::InvalidMaxBatchSize);
        }
        if network.inputs.is_empty() {
            return Err(NetworkError::NoInputs);
        }
        if network.outputs.is_empty() {
            return Err(NetworkError::NoOutputs);
        }
        if self.config.fp16_mode && !platform_has_fast_fp16() {
            warn!("FP16 mode requested but the platform has no fast FP16 kernels, building in FP32");
        }

        let mut dims: Vec<Option<Dims>> = network
            .tensors
            .iter()
            .map(|tensor| tensor.input_dims.clone())
            .collect();
        let mut weights: Vec<Vec<f32>> = Vec::new();
        let mut layers = Vec::with_capacity(network.layers.len());

        for layer in &network.layers {
            let (info, output_dims) = match &layer.kind {
                LayerKind::Convolution(definition) => {
                    Self::build_convolution(layer, definition, &dims, &mut weights)?
                }
                LayerKind::Activation { input, activation } => {
                    let input_dims = Self::known_dims(&dims, input.index())?;
                    let info = LayerInfo::Activation(ActivationLayerInfo {
                        name: layer.name.clone(),
                        input: input.index(),
                        output: layer.output.index(),
                        activation: *activation,
                    });
                    (info, input_dims.clone())
                }
                LayerKind::Concatenation { inputs, axis } => {
                    Self::build_concatenation(layer, inputs, *axis, &dims)?
                }
            };

            debug!("Layer {} produces {}", layer.name, output_dims);
            dims[layer.output.index()] = Some(output_dims);
            layers.push(info);
        }

        let tensors = network
            .tensors
            .iter()
            .zip(dims)
            .enumerate()
            .map(|(index, (tensor, dims))| {
                Ok(TensorInfo {
                    name: tensor.name.clone(),
                    dims: dims.ok_or(NetworkError::UnknownTensor { index })?,
                })
            })
            .collect::<NetworkResult<Vec<_>>>()?;

        let bindings = network
            .inputs
            .iter()
            .map(|&input| (input, true))
            .chain(network.outputs.iter().map(|&output| (output, false)))
            .map(|(tensor, is_input)| BindingInfo {
                name: tensors[tensor.index()].name.clone(),
                tensor: tensor.index(),
                is_input,
            })
            .collect();

        let plan = EnginePlan {
            format_version: ENGINE_FORMAT_VERSION,
            max_batch_size: self.config.max_batch_size,
            tensors,
            bindings,
            layers,
            weights,
        };
        plan.validate()?;

        info!(
            "Built engine: {} layers, {} bindings, {} weight blocks",
            plan.layers.len(),
            plan.bindings.len(),
            plan.weights.len()
        );
        Ok(plan)
    }

    fn known_dims(dims: &[Option<Dims>], tensor: usize) -> NetworkResult<&Dims> {
        dims.get(tensor)
            .and_then(Option::as_ref)
            .ok_or(NetworkError::UnknownTensor { index: tensor })
    }

    fn build_convolution(
        layer: &NetworkLayer,
        definition: &ConvolutionDefinition,
        dims: &[Option<Dims>],
        weights: &mut Vec<Vec<f32>>,
    ) -> NetworkResult<(LayerInfo, Dims)> {
        let input_dims = Self::known_dims(dims, definition.input.index())?;
        if input_dims.rank() != 3 {
            return Err(NetworkError::InvalidConvolutionInput {
                layer: layer.name.clone(),
                dims: input_dims.to_string(),
            });
        }
        for (parameter, value) in [
            ("kernel_shape", definition.kernel_shape),
            ("stride", definition.stride),
        ] {
            if value.contains(&0) {
                return Err(NetworkError::NonPositiveParameter {
                    layer: layer.name.clone(),
                    parameter: parameter.to_string(),
                    value,
                });
            }
        }

        let in_channels = input_dims.as_slice()[0] as usize;
        let [kernel_h, kernel_w] = definition.kernel_shape;
        let expected_kernel = definition.num_output_maps * in_channels * kernel_h * kernel_w;
        if definition.kernel.len() != expected_kernel {
            return Err(NetworkError::KernelSizeMismatch {
                layer: layer.name.clone(),
                expected: expected_kernel,
                actual: definition.kernel.len(),
            });
        }
        if !definition.bias.is_empty() && definition.bias.len() != definition.num_output_maps {
            return Err(NetworkError::BiasSizeMismatch {
                layer: layer.name.clone(),
                expected: definition.num_output_maps,
                actual: definition.bias.len(),
            });
        }

        let output_dims = convolution_output_dims(
            input_dims.as_slice(),
            definition.num_output_maps,
            definition.kernel_shape,
            definition.stride,
            definition.padding,
        );
        if !output_dims.is_positive() {
            return Err(NetworkError::EmptyOutput {
                layer: layer.name.clone(),
                dims: output_dims.to_string(),
            });
        }

        let kernel = weights.len();
        weights.push(definition.kernel.as_slice().to_vec());
        let bias = if definition.bias.is_empty() {
            None
        } else {
            weights.push(definition.bias.as_slice().to_vec());
            Some(weights.len() - 1)
        };

        let info = LayerInfo::Convolution(ConvolutionLayerInfo {
            name: layer.name.clone(),
            input: definition.input.index(),
            output: layer.output.index(),
            num_output_maps: definition.num_output_maps,
            kernel_shape: definition.kernel_shape,
            stride: definition.stride,
            padding: definition.padding,
            kernel,
            bias,
        });
        Ok((info, output_dims))
    }

    fn build_concatenation(
        layer: &NetworkLayer,
        inputs: &[TensorId],
        axis: usize,
        dims: &[Option<Dims>],
    ) -> NetworkResult<(LayerInfo, Dims)> {
        let input_dims = inputs
            .iter()
            .map(|input| Self::known_dims(dims, input.index()))
            .collect::<NetworkResult<Vec<_>>>()?;
        let first = input_dims.first().ok_or_else(|| NetworkError::EmptyConcatenation {
            layer: layer.name.clone(),
        })?;
        if axis >= first.rank() {
            return Err(NetworkError::ConcatenationAxisOutOfRange {
                layer: layer.name.clone(),
                axis,
                rank: first.rank(),
            });
        }

        let output_dims = concatenation_output_dims(&input_dims, axis).map_err(|other| {
            NetworkError::ConcatenationShapeMismatch {
                layer: layer.name.clone(),
                axis,
                first: first.to_string(),
                other: input_dims[other].to_string(),
            }
        })?;

        let info = LayerInfo::Concatenation(ConcatenationLayerInfo {
            name: layer.name.clone(),
            inputs: inputs.iter().map(|input| input.index()).collect(),
            output: layer.output.index(),
            axis,
        });
        Ok((info, output_dims))
    }
}
