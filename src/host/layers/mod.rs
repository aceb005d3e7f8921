//! Layer implementations for the host runtime.
//!
//! Each layer reads and writes regions of one unified computation buffer that
//! holds every tensor of a single sample back to back. The offsets are resolved
//! when the engine is created, so applying a layer is pure arithmetic.

use crate::engine_plan::{LayerInfo, TensorInfo};
use crate::errors::RuntimeResult;

pub mod activation_layer;
pub mod concatenation_layer;
pub mod convolution_layer;

pub use activation_layer::ActivationLayer;
pub use concatenation_layer::ConcatenationLayer;
pub use convolution_layer::ConvolutionLayer;

/// Base trait for all host layers.
pub trait Layer: Send + Sync {
    fn name(&self) -> &str;

    /// Applies the layer to the unified computation buffer.
    fn apply(&self, unified_computation_buffer: &mut [f32]) -> RuntimeResult<()>;
}

/// Creates a host layer from a validated plan layer.
pub fn create_layer(
    layer_info: &LayerInfo,
    tensor_offsets: &[usize],
    tensors: &[TensorInfo],
    weights: &[Vec<f32>],
) -> Box<dyn Layer> {
    let extents = |tensor: usize| -> Vec<usize> {
        tensors[tensor]
            .dims
            .to_usize()
            .unwrap_or_default()
    };

    match layer_info {
        LayerInfo::Convolution(info) => {
            let bias = info.bias.map(|index| weights[index].as_slice());
            Box::new(ConvolutionLayer::new(
                info.name.clone(),
                tensor_offsets[info.input],
                tensor_offsets[info.output],
                &extents(info.input),
                &extents(info.output),
                info.kernel_shape,
                info.stride,
                info.padding,
                &weights[info.kernel],
                bias,
            ))
        }
        LayerInfo::Activation(info) => Box::new(ActivationLayer::new(
            info.name.clone(),
            info.activation,
            tensor_offsets[info.input],
            tensor_offsets[info.output],
            extents(info.output).iter().product(),
        )),
        LayerInfo::Concatenation(info) => {
            let inputs = info
                .inputs
                .iter()
                .map(|&input| (tensor_offsets[input], extents(input)))
                .collect();
            Box::new(ConcatenationLayer::new(
                info.name.clone(),
                inputs,
                tensor_offsets[info.output],
                &extents(info.output),
                info.axis,
            ))
        }
    }
}
