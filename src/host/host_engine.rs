//! Engine and execution context of the host runtime.
//!
//! A [`HostEngine`] lays every tensor of the plan out back to back in one
//! unified computation buffer and turns each plan layer into a [`Layer`] that
//! reads and writes regions of that buffer. Contexts own the buffer; the layer
//! list is shared between all contexts of an engine.

use crate::dims::Dims;
use crate::engine_plan::EnginePlan;
use crate::errors::{EngineError, RuntimeError, RuntimeResult};
use crate::host::host_device::HostDeviceBuffer;
use crate::host::layers::{Layer, create_layer};
use crate::runtime::{DeviceBuffer, Engine, ExecutionContext};
use log::{debug, info};
use std::sync::Arc;

/// Maximum unified computation buffer size, in values per sample.
const MAX_COMPUTATION_BUFFER_SIZE: usize = 64_000_000;

/// Location of a bound tensor inside the unified computation buffer.
struct BindingSlot {
    name: String,
    dims: Dims,
    is_input: bool,
    offset: usize,
    /// Values per sample.
    data_size: usize,
}

struct CompiledPlan {
    layers: Vec<Box<dyn Layer>>,
    bindings: Vec<BindingSlot>,
    max_batch_size: usize,
    required_memory: usize,
}

/// A plan compiled for execution on the host.
pub struct HostEngine {
    compiled: Arc<CompiledPlan>,
}

impl HostEngine {
    /// Compiles a plan. The plan is validated again, so hand-built plans are safe to pass.
    pub fn new(plan: EnginePlan) -> RuntimeResult<Self> {
        plan.validate()?;

        let mut tensor_offsets = Vec::with_capacity(plan.tensors.len());
        let mut required_memory = 0usize;
        for tensor in &plan.tensors {
            tensor_offsets.push(required_memory);
            let count = tensor.dims.element_count().unwrap_or(0);
            required_memory = required_memory.saturating_add(count);
        }
        Self::validate_required_memory(required_memory)?;

        let layers: Vec<Box<dyn Layer>> = plan
            .layers
            .iter()
            .map(|layer| create_layer(layer, &tensor_offsets, &plan.tensors, &plan.weights))
            .collect();
        for layer in &layers {
            debug!("Compiled host layer {}", layer.name());
        }

        let bindings = plan
            .bindings
            .iter()
            .map(|binding| {
                let dims = plan.tensors[binding.tensor].dims.clone();
                BindingSlot {
                    name: binding.name.clone(),
                    data_size: dims.element_count().unwrap_or(0),
                    dims,
                    is_input: binding.is_input,
                    offset: tensor_offsets[binding.tensor],
                }
            })
            .collect();

        info!(
            "Host engine ready: {} layers, {} values of computation memory per sample",
            layers.len(),
            required_memory
        );

        Ok(Self {
            compiled: Arc::new(CompiledPlan {
                layers,
                bindings,
                max_batch_size: plan.max_batch_size,
                required_memory,
            }),
        })
    }

    /// Validate if the engine required memory is within the maximum allowed.
    fn validate_required_memory(required_memory: usize) -> RuntimeResult<()> {
        if required_memory > MAX_COMPUTATION_BUFFER_SIZE {
            return Err(EngineError::ComputationBufferSizeExceedsLimit {
                actual: required_memory,
                max: MAX_COMPUTATION_BUFFER_SIZE,
            }
            .into());
        }
        Ok(())
    }

    pub fn binding_name(&self, index: usize) -> RuntimeResult<&str> {
        Ok(&self.binding(index)?.name)
    }

    fn binding(&self, index: usize) -> RuntimeResult<&BindingSlot> {
        self.compiled
            .bindings
            .get(index)
            .ok_or(RuntimeError::BindingIndexOutOfBounds {
                index,
                count: self.compiled.bindings.len(),
            })
    }
}

impl Engine for HostEngine {
    type Buffer = HostDeviceBuffer;
    type Context = HostExecutionContext;

    fn num_bindings(&self) -> usize {
        self.compiled.bindings.len()
    }

    fn binding_shape(&self, index: usize) -> RuntimeResult<Dims> {
        Ok(self.binding(index)?.dims.clone())
    }

    fn binding_is_input(&self, index: usize) -> RuntimeResult<bool> {
        Ok(self.binding(index)?.is_input)
    }

    fn max_batch_size(&self) -> usize {
        self.compiled.max_batch_size
    }

    fn create_execution_context(&self) -> RuntimeResult<HostExecutionContext> {
        Ok(HostExecutionContext {
            compiled: Arc::clone(&self.compiled),
            unified_computation_buffer: vec![0.0; self.compiled.required_memory],
        })
    }
}

/// Execution state of a host engine: the unified computation buffer.
pub struct HostExecutionContext {
    compiled: Arc<CompiledPlan>,
    unified_computation_buffer: Vec<f32>,
}

impl HostExecutionContext {
    fn validate_bindings(
        &self,
        batch_size: usize,
        bindings: &[&mut HostDeviceBuffer],
    ) -> RuntimeResult<()> {
        let compiled = &self.compiled;
        if batch_size == 0 || batch_size > compiled.max_batch_size {
            return Err(RuntimeError::InvalidBatchSize {
                batch_size,
                max_batch_size: compiled.max_batch_size,
            });
        }
        if bindings.len() != compiled.bindings.len() {
            return Err(RuntimeError::BindingCountMismatch {
                expected: compiled.bindings.len(),
                actual: bindings.len(),
            });
        }
        for (index, (slot, buffer)) in compiled.bindings.iter().zip(bindings.iter()).enumerate() {
            let expected = batch_size * slot.data_size * std::mem::size_of::<f32>();
            if buffer.size_in_bytes() < expected {
                return Err(RuntimeError::BindingSizeMismatch {
                    index,
                    expected,
                    actual: buffer.size_in_bytes(),
                });
            }
        }
        Ok(())
    }
}

impl ExecutionContext for HostExecutionContext {
    type Buffer = HostDeviceBuffer;

    fn execute(
        &mut self,
        batch_size: usize,
        bindings: &mut [&mut HostDeviceBuffer],
    ) -> RuntimeResult<bool> {
        self.validate_bindings(batch_size, bindings)?;
        let compiled = Arc::clone(&self.compiled);

        for sample in 0..batch_size {
            for (slot, buffer) in compiled.bindings.iter().zip(bindings.iter()) {
                if slot.is_input {
                    let start = sample * slot.data_size;
                    self.unified_computation_buffer[slot.offset..slot.offset + slot.data_size]
                        .copy_from_slice(&buffer.as_floats()[start..start + slot.data_size]);
                }
            }

            for layer in &compiled.layers {
                layer.apply(&mut self.unified_computation_buffer)?;
            }

            for (slot, buffer) in compiled.bindings.iter().zip(bindings.iter_mut()) {
                if !slot.is_input {
                    let start = sample * slot.data_size;
                    buffer.as_floats_mut()[start..start + slot.data_size].copy_from_slice(
                        &self.unified_computation_buffer[slot.offset..slot.offset + slot.data_size],
                    );
                }
            }
        }

        debug!("Host execution of {} sample(s) finished", batch_size);
        Ok(true)
    }
}
