//! GPU runtime on wgpu.
//!
//! # Architecture
//!
//! Device buffers are `wgpu::Buffer`s with `STORAGE | COPY_SRC | COPY_DST`
//! usage. Host uploads go through `Queue::write_buffer`, downloads through a
//! mappable staging buffer, and every transfer waits for the device before
//! returning. Convolutions and activations are WGSL compute shaders (see
//! [`shaders`]); concatenations are buffer-to-buffer copies.
//!
//! # Usage
//!
//! ```ignore
//! use enginert_inference::gpu::GpuRuntime;
//! use enginert_inference::runtime::Runtime;
//!
//! let runtime = GpuRuntime::new()?;
//! let engine = runtime.deserialize_engine(&std::fs::read("cbr_engine16")?)?;
//! ```

pub mod gpu_device;
pub mod gpu_engine;
pub mod gpu_layer;
pub mod shaders;

pub use gpu_device::{GpuBuffer, GpuDevice};
pub use gpu_engine::{GpuEngine, GpuExecutionContext};

use crate::engine_plan::EnginePlan;
use crate::errors::{RuntimeError, RuntimeResult};
use crate::runtime::Runtime;
use log::info;
use pollster::FutureExt;

/// Runtime that deserializes engines onto the first suitable wgpu adapter.
pub struct GpuRuntime {
    device: GpuDevice,
}

impl GpuRuntime {
    /// Requests a high-performance adapter and a device with the adapter's buffer limits.
    ///
    /// Fails with [`RuntimeError::DeviceNotAvailable`] when the machine exposes no adapter.
    pub fn new() -> RuntimeResult<Self> {
        Self::request().block_on()
    }

    async fn request() -> RuntimeResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                ..Default::default()
            })
            .await
            .ok_or_else(|| RuntimeError::DeviceNotAvailable {
                message: "no GPU adapter found".to_string(),
            })?;

        let adapter_info = adapter.get_info();
        info!("GPU: {} ({:?})", adapter_info.name, adapter_info.backend);

        // Request the adapter's buffer size limits
        let limits = adapter.limits();
        let required_limits = wgpu::Limits {
            max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size,
            max_buffer_size: limits.max_buffer_size,
            ..Default::default()
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Inference Device"),
                    required_limits,
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|error| RuntimeError::DeviceNotAvailable {
                message: error.to_string(),
            })?;

        Ok(Self {
            device: GpuDevice::new(device, queue),
        })
    }
}

impl Runtime for GpuRuntime {
    type Device = GpuDevice;
    type Engine = GpuEngine;

    fn device(&self) -> &GpuDevice {
        &self.device
    }

    fn deserialize_engine(&self, serialized_engine: &[u8]) -> RuntimeResult<GpuEngine> {
        let plan = EnginePlan::from_bytes(serialized_engine)?;
        info!(
            "Deserialized engine with {} layers and {} bindings",
            plan.layers.len(),
            plan.bindings.len()
        );
        GpuEngine::new(self.device.clone(), plan)
    }
}
