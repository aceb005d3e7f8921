//! Paired host and device buffers for one input and one output binding.

use crate::errors::{InferenceError, InferenceResult};
use crate::runtime::{Device, DeviceBuffer, Engine};
use log::info;

/// Binding index of the model input.
pub const INPUT_BINDING: usize = 0;

/// Binding index of the model output.
pub const OUTPUT_BINDING: usize = 1;

/// A linear `f32` buffer in host memory.
#[derive(Debug, Clone, PartialEq)]
pub struct HostBuffer {
    data: Vec<f32>,
}

impl HostBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.data)
    }
}

/// The four buffers of a single-shot inference.
///
/// Each device buffer has exactly the byte size of its host counterpart; the
/// sizes are fixed for the lifetime of the set.
#[derive(Debug)]
pub struct InferenceBuffers<B> {
    pub(crate) host_input: HostBuffer,
    pub(crate) host_output: HostBuffer,
    pub(crate) device_input: B,
    pub(crate) device_output: B,
}

impl<B: DeviceBuffer> InferenceBuffers<B> {
    /// Pairs host and device buffers, failing when a pair differs in byte size.
    pub fn new(
        host_input: HostBuffer,
        host_output: HostBuffer,
        device_input: B,
        device_output: B,
    ) -> InferenceResult<Self> {
        for (host, device) in [(&host_input, &device_input), (&host_output, &device_output)] {
            if host.size_in_bytes() != device.size_in_bytes() {
                return Err(InferenceError::BufferSizeMismatch {
                    host_bytes: host.size_in_bytes(),
                    device_bytes: device.size_in_bytes(),
                });
            }
        }
        Ok(Self {
            host_input,
            host_output,
            device_input,
            device_output,
        })
    }

    pub fn host_input(&self) -> &[f32] {
        self.host_input.as_slice()
    }

    pub fn host_input_mut(&mut self) -> &mut [f32] {
        self.host_input.as_mut_slice()
    }

    pub fn host_output(&self) -> &[f32] {
        self.host_output.as_slice()
    }

    pub fn device_input(&self) -> &B {
        &self.device_input
    }

    pub fn device_output(&self) -> &B {
        &self.device_output
    }
}

/// Element count of a binding, from the shape the engine declares for it.
///
/// Every extent must be positive and their product must fit in `usize`.
pub fn binding_element_count<E: Engine>(engine: &E, index: usize) -> InferenceResult<usize> {
    let count = engine.num_bindings();
    if index >= count {
        return Err(InferenceError::MissingBinding { index, count });
    }

    let dims = engine.binding_shape(index)?;
    dims.element_count().ok_or_else(|| InferenceError::InvalidBindingVolume {
        index,
        dims: dims.to_string(),
    })
}

/// Allocates host and device buffers for binding 0 (input) and binding 1 (output).
///
/// Every call makes two fresh device allocations. Both volumes are checked
/// before anything is allocated.
pub fn allocate_buffers<D, E>(engine: &E, device: &D) -> InferenceResult<InferenceBuffers<D::Buffer>>
where
    D: Device,
    E: Engine<Buffer = D::Buffer>,
{
    let input_count = binding_element_count(engine, INPUT_BINDING)?;
    let output_count = binding_element_count(engine, OUTPUT_BINDING)?;

    let host_input = HostBuffer::new(input_count);
    let host_output = HostBuffer::new(output_count);
    let device_input = device.allocate(host_input.size_in_bytes())?;
    let device_output = device.allocate(host_output.size_in_bytes())?;
    info!(
        "Allocated inference buffers: {} input values, {} output values",
        input_count, output_count
    );

    InferenceBuffers::new(host_input, host_output, device_input, device_output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_buffer_sizes() {
        let buffer = HostBuffer::new(10);
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.size_in_bytes(), 40);
        assert_eq!(buffer.as_bytes().len(), 40);
        assert!(HostBuffer::new(0).is_empty());
    }

    #[test]
    fn test_bytes_alias_values() {
        let mut buffer = HostBuffer::new(1);
        buffer.as_bytes_mut().copy_from_slice(&1.0f32.to_ne_bytes());
        assert_eq!(buffer.as_slice(), &[1.0]);
    }
}
