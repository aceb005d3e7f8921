//! Host reference runtime.
//!
//! Executes engine plans on the CPU. "Device" memory is a separate heap
//! allocation per buffer and execution walks the compiled layer list one
//! sample at a time.

pub mod host_device;
pub mod host_engine;
pub mod layers;

pub use host_device::{HostDevice, HostDeviceBuffer};
pub use host_engine::{HostEngine, HostExecutionContext};

use crate::engine_plan::EnginePlan;
use crate::errors::RuntimeResult;
use crate::runtime::Runtime;
use log::info;

/// Runtime that deserializes engines for the host device.
#[derive(Debug, Default)]
pub struct HostRuntime {
    device: HostDevice,
}

impl HostRuntime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Runtime for HostRuntime {
    type Device = HostDevice;
    type Engine = HostEngine;

    fn device(&self) -> &HostDevice {
        &self.device
    }

    fn deserialize_engine(&self, serialized_engine: &[u8]) -> RuntimeResult<HostEngine> {
        let plan = EnginePlan::from_bytes(serialized_engine)?;
        info!(
            "Deserialized engine with {} layers and {} bindings",
            plan.layers.len(),
            plan.bindings.len()
        );
        HostEngine::new(plan)
    }
}
