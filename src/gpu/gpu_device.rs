//! GPU device memory and host transfers.

use crate::errors::{RuntimeError, RuntimeResult};
use crate::runtime::{Device, DeviceBuffer};
use log::debug;
use pollster::FutureExt;
use std::sync::Arc;
use std::sync::mpsc;

/// Rounds a byte count up to the copy alignment required by wgpu.
pub(crate) fn align_to_copy(size_in_bytes: usize) -> usize {
    let alignment = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    size_in_bytes.div_ceil(alignment) * alignment
}

/// A storage buffer on the GPU.
///
/// The underlying buffer is padded to the copy alignment; `size_in_bytes` is
/// the size requested at allocation and the one host copies must match.
#[derive(Debug)]
pub struct GpuBuffer {
    buffer: wgpu::Buffer,
    size_in_bytes: usize,
}

impl GpuBuffer {
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

impl DeviceBuffer for GpuBuffer {
    fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }
}

/// A wgpu device and its queue.
#[derive(Debug, Clone)]
pub struct GpuDevice {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl GpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Blocks until every submitted command has finished.
    pub fn wait_idle(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// Creates a buffer that kernels can read and write and that copies can use both ways.
    pub(crate) fn create_storage_buffer(&self, label: &str, size_in_bytes: usize) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: align_to_copy(size_in_bytes.max(1)) as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Reads `destination.len()` bytes from the start of `source`.
    fn read_buffer(&self, source: &wgpu::Buffer, destination: &mut [u8]) -> RuntimeResult<()> {
        let size = align_to_copy(destination.len()) as u64;
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_buffer_to_buffer(source, 0, &staging_buffer, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging_buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.wait_idle();

        receiver
            .recv()
            .map_err(|error| RuntimeError::ExecutionFailed {
                message: format!("buffer mapping never completed: {}", error),
            })??;

        {
            let data = slice.get_mapped_range();
            destination.copy_from_slice(&data[..destination.len()]);
        }
        staging_buffer.unmap();
        Ok(())
    }
}

impl Device for GpuDevice {
    type Buffer = GpuBuffer;

    fn allocate(&self, size_in_bytes: usize) -> RuntimeResult<GpuBuffer> {
        if size_in_bytes == 0 {
            return Err(RuntimeError::AllocationFailed {
                size_in_bytes,
                message: "zero-sized allocation".to_string(),
            });
        }
        let max_buffer_size = self.device.limits().max_buffer_size;
        if align_to_copy(size_in_bytes) as u64 > max_buffer_size {
            return Err(RuntimeError::AllocationFailed {
                size_in_bytes,
                message: format!("exceeds the device limit of {} bytes", max_buffer_size),
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.create_storage_buffer("Device Buffer", size_in_bytes);
        if let Some(error) = self.device.pop_error_scope().block_on() {
            return Err(RuntimeError::AllocationFailed {
                size_in_bytes,
                message: error.to_string(),
            });
        }

        debug!("Allocated {} bytes of GPU memory", size_in_bytes);
        Ok(GpuBuffer {
            buffer,
            size_in_bytes,
        })
    }

    fn copy_to_device(&self, destination: &mut GpuBuffer, source: &[u8]) -> RuntimeResult<()> {
        if destination.size_in_bytes != source.len() {
            return Err(RuntimeError::CopySizeMismatch {
                buffer_size: destination.size_in_bytes,
                data_size: source.len(),
            });
        }

        let aligned = align_to_copy(source.len());
        if aligned == source.len() {
            self.queue.write_buffer(&destination.buffer, 0, source);
        } else {
            let mut padded = source.to_vec();
            padded.resize(aligned, 0);
            self.queue.write_buffer(&destination.buffer, 0, &padded);
        }
        self.queue.submit(std::iter::empty());
        self.wait_idle();

        debug!("Copied {} bytes host to GPU", source.len());
        Ok(())
    }

    fn copy_to_host(&self, destination: &mut [u8], source: &GpuBuffer) -> RuntimeResult<()> {
        if source.size_in_bytes != destination.len() {
            return Err(RuntimeError::CopySizeMismatch {
                buffer_size: source.size_in_bytes,
                data_size: destination.len(),
            });
        }
        self.read_buffer(&source.buffer, destination)?;
        debug!("Copied {} bytes GPU to host", destination.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to_copy() {
        assert_eq!(align_to_copy(0), 0);
        assert_eq!(align_to_copy(1), 4);
        assert_eq!(align_to_copy(4), 4);
        assert_eq!(align_to_copy(6), 8);
        assert_eq!(align_to_copy(600_000), 600_000);
    }
}
