//! Host "device" memory.
//!
//! Buffers live in their own heap allocations, distinct from whatever host
//! buffers the caller copies from or into, so the host runtime exercises the
//! same copy discipline as an accelerator.

use crate::errors::{RuntimeError, RuntimeResult};
use crate::runtime::{Device, DeviceBuffer};
use log::debug;

/// A block of host runtime memory.
///
/// Storage is kept as `f32` so layers can work on it directly; the byte size
/// requested at allocation is preserved and is what copies are checked against.
#[derive(Debug)]
pub struct HostDeviceBuffer {
    data: Vec<f32>,
    size_in_bytes: usize,
}

impl HostDeviceBuffer {
    fn new(size_in_bytes: usize) -> Self {
        let elements = size_in_bytes.div_ceil(std::mem::size_of::<f32>());
        Self {
            data: vec![0.0; elements],
            size_in_bytes,
        }
    }

    pub fn as_floats(&self) -> &[f32] {
        &self.data
    }

    pub fn as_floats_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.data)[..self.size_in_bytes]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let size_in_bytes = self.size_in_bytes;
        &mut bytemuck::cast_slice_mut(&mut self.data)[..size_in_bytes]
    }
}

impl DeviceBuffer for HostDeviceBuffer {
    fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }
}

/// Allocator and copy engine of the host runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostDevice;

impl HostDevice {
    pub fn new() -> Self {
        Self
    }
}

impl Device for HostDevice {
    type Buffer = HostDeviceBuffer;

    fn allocate(&self, size_in_bytes: usize) -> RuntimeResult<HostDeviceBuffer> {
        if size_in_bytes == 0 {
            return Err(RuntimeError::AllocationFailed {
                size_in_bytes,
                message: "zero-sized allocation".to_string(),
            });
        }
        debug!("Allocating {} bytes of host device memory", size_in_bytes);
        Ok(HostDeviceBuffer::new(size_in_bytes))
    }

    fn copy_to_device(&self, destination: &mut HostDeviceBuffer, source: &[u8]) -> RuntimeResult<()> {
        if destination.size_in_bytes != source.len() {
            return Err(RuntimeError::CopySizeMismatch {
                buffer_size: destination.size_in_bytes,
                data_size: source.len(),
            });
        }
        destination.as_bytes_mut().copy_from_slice(source);
        debug!("Copied {} bytes host to device", source.len());
        Ok(())
    }

    fn copy_to_host(&self, destination: &mut [u8], source: &HostDeviceBuffer) -> RuntimeResult<()> {
        if source.size_in_bytes != destination.len() {
            return Err(RuntimeError::CopySizeMismatch {
                buffer_size: source.size_in_bytes,
                data_size: destination.len(),
            });
        }
        destination.copy_from_slice(source.as_bytes());
        debug!("Copied {} bytes device to host", destination.len());
        Ok(())
    }
}
