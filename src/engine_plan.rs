//! Serialized engine plans.
//!
//! An [`EnginePlan`] is the artifact produced by the engine builder and read back
//! by every runtime. It lists the tensors of the network with their per-sample
//! dimensions, the bindings the caller must supply device memory for, the layers
//! to execute in order, and the weight blocks the layers refer to by index.
//!
//! The plan is encoded as JSON. Layers use an internally tagged representation:
//!
//! ```json
//! { "type": "CONVOLUTION", "name": "conv_0", "input": 0, "output": 1, ... }
//! ```

use crate::activation::Activation;
use crate::dims::Dims;
use crate::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Version of the plan layout written by this crate.
pub const ENGINE_FORMAT_VERSION: u32 = 1;

/// A tensor of the compiled network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorInfo {
    pub name: String,
    /// Per-sample dimensions, channel first.
    pub dims: Dims,
}

/// A tensor the caller exchanges with the engine through device memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingInfo {
    pub name: String,
    /// Index of the bound tensor.
    pub tensor: usize,
    pub is_input: bool,
}

/// Information describing one layer of the compiled network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LayerInfo {
    #[serde(rename = "CONVOLUTION")]
    Convolution(ConvolutionLayerInfo),
    #[serde(rename = "ACTIVATION")]
    Activation(ActivationLayerInfo),
    #[serde(rename = "CONCATENATION")]
    Concatenation(ConcatenationLayerInfo),
}

impl LayerInfo {
    pub fn name(&self) -> &str {
        match self {
            LayerInfo::Convolution(info) => &info.name,
            LayerInfo::Activation(info) => &info.name,
            LayerInfo::Concatenation(info) => &info.name,
        }
    }

    /// Returns the list of tensor indices read by this layer.
    pub fn inputs(&self) -> Vec<usize> {
        match self {
            LayerInfo::Convolution(info) => vec![info.input],
            LayerInfo::Activation(info) => vec![info.input],
            LayerInfo::Concatenation(info) => info.inputs.clone(),
        }
    }

    /// Returns the tensor index written by this layer.
    pub fn output(&self) -> usize {
        match self {
            LayerInfo::Convolution(info) => info.output,
            LayerInfo::Activation(info) => info.output,
            LayerInfo::Concatenation(info) => info.output,
        }
    }
}

/// A 2D convolution over a CHW tensor, with optional bias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvolutionLayerInfo {
    pub name: String,
    pub input: usize,
    pub output: usize,
    pub num_output_maps: usize,
    /// Kernel height and width.
    pub kernel_shape: [usize; 2],
    pub stride: [usize; 2],
    /// Zero padding applied symmetrically on each spatial side.
    pub padding: [usize; 2],
    /// Weight block holding `num_output_maps x C x kh x kw` values.
    pub kernel: usize,
    /// Weight block holding `num_output_maps` values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bias: Option<usize>,
}

/// An element-wise activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationLayerInfo {
    pub name: String,
    pub input: usize,
    pub output: usize,
    pub activation: Activation,
}

/// Concatenation of tensors along one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcatenationLayerInfo {
    pub name: String,
    pub inputs: Vec<usize>,
    pub output: usize,
    /// Axis of the per-sample dimensions, 0 being the channel axis.
    #[serde(default)]
    pub axis: usize,
}

#[derive(Deserialize)]
struct PlanHeader {
    format_version: u32,
}

/// A compiled network ready to be loaded by a runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnginePlan {
    pub format_version: u32,
    pub max_batch_size: usize,
    pub tensors: Vec<TensorInfo>,
    /// Input bindings first, then output bindings.
    pub bindings: Vec<BindingInfo>,
    pub layers: Vec<LayerInfo>,
    pub weights: Vec<Vec<f32>>,
}

impl EnginePlan {
    /// Decodes and validates a serialized plan.
    pub fn from_bytes(serialized: &[u8]) -> EngineResult<Self> {
        let header: PlanHeader = serde_json::from_slice(serialized)?;
        if header.format_version != ENGINE_FORMAT_VERSION {
            return Err(EngineError::IncompatibleVersion {
                found: header.format_version,
                expected: ENGINE_FORMAT_VERSION,
            });
        }

        let plan: EnginePlan = serde_json::from_slice(serialized)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Encodes the plan into the bytes written to an engine file.
    pub fn serialize(&self) -> EngineResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn binding_dims(&self, index: usize) -> Option<&Dims> {
        self.bindings
            .get(index)
            .and_then(|binding| self.tensors.get(binding.tensor))
            .map(|tensor| &tensor.dims)
    }

    pub fn output_bindings(&self) -> impl Iterator<Item = (usize, &BindingInfo)> {
        self.bindings
            .iter()
            .enumerate()
            .filter(|(_, binding)| !binding.is_input)
    }

    /// Checks that the plan is internally consistent.
    ///
    /// Every tensor must have positive dimensions whose element count fits in
    /// `usize`. Layers may only read tensors produced earlier, each declared
    /// output shape must match what its layer computes, and every weight block
    /// must be referenced.
    pub fn validate(&self) -> EngineResult<()> {
        if self.format_version != ENGINE_FORMAT_VERSION {
            return Err(EngineError::IncompatibleVersion {
                found: self.format_version,
                expected: ENGINE_FORMAT_VERSION,
            });
        }
        if self.max_batch_size == 0 {
            return Err(EngineError::InvalidMaxBatchSize);
        }

        for tensor in &self.tensors {
            if tensor.dims.element_count().is_none() {
                return Err(EngineError::InvalidTensorDims {
                    name: tensor.name.clone(),
                    dims: tensor.dims.to_string(),
                });
            }
        }

        let mut produced = vec![false; self.tensors.len()];
        self.validate_bindings(&mut produced)?;

        let mut used_weights = vec![false; self.weights.len()];
        for layer in &self.layers {
            for input in layer.inputs() {
                self.validate_tensor_index("input", input)?;
                if !produced[input] {
                    return Err(EngineError::TensorNotYetProduced {
                        layer: layer.name().to_string(),
                        tensor: input,
                    });
                }
            }
            let output = layer.output();
            self.validate_tensor_index("output", output)?;
            if produced[output] {
                return Err(EngineError::TensorProducedTwice { tensor: output });
            }

            match layer {
                LayerInfo::Convolution(info) => self.validate_convolution(info, &mut used_weights)?,
                LayerInfo::Activation(info) => self.validate_activation(info)?,
                LayerInfo::Concatenation(info) => self.validate_concatenation(info)?,
            }

            produced[output] = true;
        }

        for (_, binding) in self.output_bindings() {
            if !produced[binding.tensor] {
                return Err(EngineError::OutputNeverProduced {
                    tensor: binding.tensor,
                });
            }
        }

        for (index, &used) in used_weights.iter().enumerate() {
            if !used {
                return Err(EngineError::UnusedWeights { index });
            }
        }

        Ok(())
    }

    fn validate_bindings(&self, produced: &mut [bool]) -> EngineResult<()> {
        let has_input = self.bindings.iter().any(|binding| binding.is_input);
        let has_output = self.bindings.iter().any(|binding| !binding.is_input);
        if !has_input || !has_output {
            return Err(EngineError::MissingBindings);
        }

        let mut seen_output = false;
        let mut bound = vec![false; self.tensors.len()];
        for (index, binding) in self.bindings.iter().enumerate() {
            self.validate_tensor_index("binding", binding.tensor)?;
            if binding.is_input && seen_output {
                return Err(EngineError::BindingOrder { index });
            }
            seen_output |= !binding.is_input;

            if bound[binding.tensor] {
                return Err(EngineError::DuplicateBinding {
                    tensor: binding.tensor,
                });
            }
            bound[binding.tensor] = true;

            if binding.is_input {
                produced[binding.tensor] = true;
            }
        }
        Ok(())
    }

    fn validate_tensor_index(&self, label: &str, index: usize) -> EngineResult<()> {
        if index >= self.tensors.len() {
            return Err(EngineError::TensorIndexOutOfBounds {
                label: label.to_string(),
                index,
            });
        }
        Ok(())
    }

    fn validate_convolution(
        &self,
        info: &ConvolutionLayerInfo,
        used_weights: &mut [bool],
    ) -> EngineResult<()> {
        let input_dims = &self.tensors[info.input].dims;
        if input_dims.rank() != 3 {
            return Err(EngineError::InputRankMismatch {
                layer: info.name.clone(),
                expected: 3,
                actual: input_dims.rank(),
            });
        }

        let invalid_parameter = |parameter: &str, value: Vec<usize>| EngineError::InvalidLayerParameter {
            layer: info.name.clone(),
            parameter: parameter.to_string(),
            value,
        };
        if info.num_output_maps == 0 {
            return Err(invalid_parameter("num_output_maps", vec![info.num_output_maps]));
        }
        if info.kernel_shape.contains(&0) {
            return Err(invalid_parameter("kernel_shape", info.kernel_shape.to_vec()));
        }
        if info.stride.contains(&0) {
            return Err(invalid_parameter("stride", info.stride.to_vec()));
        }

        let in_channels = input_dims.as_slice()[0] as usize;
        let expected_kernel = info
            .num_output_maps
            .saturating_mul(in_channels)
            .saturating_mul(info.kernel_shape[0])
            .saturating_mul(info.kernel_shape[1]);
        self.validate_weights(info, "kernel", info.kernel, expected_kernel, used_weights)?;
        if let Some(bias) = info.bias {
            self.validate_weights(info, "bias", bias, info.num_output_maps, used_weights)?;
        }

        let computed = convolution_output_dims(
            input_dims.as_slice(),
            info.num_output_maps,
            info.kernel_shape,
            info.stride,
            info.padding,
        );
        self.validate_output_dims(&info.name, info.output, &computed)
    }

    fn validate_weights(
        &self,
        info: &ConvolutionLayerInfo,
        label: &str,
        index: usize,
        expected: usize,
        used_weights: &mut [bool],
    ) -> EngineResult<()> {
        let block = self
            .weights
            .get(index)
            .ok_or(EngineError::WeightsIndexOutOfBounds { index })?;
        if block.len() != expected {
            return Err(EngineError::WeightsSizeMismatch {
                layer: info.name.clone(),
                label: label.to_string(),
                expected,
                actual: block.len(),
            });
        }
        used_weights[index] = true;
        Ok(())
    }

    fn validate_activation(&self, info: &ActivationLayerInfo) -> EngineResult<()> {
        let computed = self.tensors[info.input].dims.clone();
        self.validate_output_dims(&info.name, info.output, &computed)
    }

    fn validate_concatenation(&self, info: &ConcatenationLayerInfo) -> EngineResult<()> {
        if info.inputs.is_empty() {
            return Err(EngineError::NoLayerInputs {
                layer: info.name.clone(),
            });
        }

        let inputs: Vec<&Dims> = info
            .inputs
            .iter()
            .map(|&input| &self.tensors[input].dims)
            .collect();
        if info.axis >= inputs[0].rank() {
            return Err(EngineError::InvalidLayerParameter {
                layer: info.name.clone(),
                parameter: "axis".to_string(),
                value: vec![info.axis],
            });
        }

        let computed = concatenation_output_dims(&inputs, info.axis).map_err(|other| {
            EngineError::ConcatenationShapeMismatch {
                layer: info.name.clone(),
                axis: info.axis,
                first: inputs[0].to_string(),
                other: inputs[other].to_string(),
            }
        })?;
        self.validate_output_dims(&info.name, info.output, &computed)
    }

    fn validate_output_dims(&self, layer: &str, output: usize, computed: &Dims) -> EngineResult<()> {
        let declared = &self.tensors[output].dims;
        if declared != computed {
            return Err(EngineError::OutputDimsMismatch {
                layer: layer.to_string(),
                declared: declared.to_string(),
                computed: computed.to_string(),
            });
        }
        Ok(())
    }
}

/// Spatial extent produced by a convolution, 0 when the kernel does not fit.
pub(crate) fn convolution_output_extent(
    input: i64,
    kernel: usize,
    stride: usize,
    padding: usize,
) -> i64 {
    let (Ok(kernel), Ok(stride), Ok(padding)) =
        (i64::try_from(kernel), i64::try_from(stride), i64::try_from(padding))
    else {
        return 0;
    };
    let Some(padded) = padding.checked_mul(2).and_then(|padding| padding.checked_add(input)) else {
        return 0;
    };
    if stride == 0 || padded < kernel {
        return 0;
    }
    (padded - kernel) / stride + 1
}

/// Output dimensions of a convolution over a CHW input.
pub(crate) fn convolution_output_dims(
    input: &[i64],
    num_output_maps: usize,
    kernel_shape: [usize; 2],
    stride: [usize; 2],
    padding: [usize; 2],
) -> Dims {
    Dims::new(vec![
        i64::try_from(num_output_maps).unwrap_or(-1),
        convolution_output_extent(input[1], kernel_shape[0], stride[0], padding[0]),
        convolution_output_extent(input[2], kernel_shape[1], stride[1], padding[1]),
    ])
}

/// Output dimensions of a concatenation along `axis`.
///
/// Every input must share the rank and all non-axis extents of the first one;
/// on mismatch the index of the first offending input is returned.
pub(crate) fn concatenation_output_dims(inputs: &[&Dims], axis: usize) -> Result<Dims, usize> {
    let first = inputs[0].as_slice();
    let mut extents = first.to_vec();
    for (index, dims) in inputs.iter().enumerate().skip(1) {
        let other = dims.as_slice();
        if other.len() != first.len() {
            return Err(index);
        }
        for (dimension, (&a, &b)) in first.iter().zip(other.iter()).enumerate() {
            if dimension != axis && a != b {
                return Err(index);
            }
        }
        extents[axis] = extents[axis].checked_add(other[axis]).ok_or(index)?;
    }
    Ok(Dims::new(extents))
}
