//! The narrow interface between the inference runner and an engine runtime.
//!
//! The runner only ever needs four things from a runtime: turn serialized bytes
//! into an [`Engine`], ask the engine for its binding shapes, create an
//! [`ExecutionContext`], and execute synchronously on device buffers. Device
//! memory itself is managed through [`Device`].
//!
//! Resources are released on drop. An execution context must be dropped before
//! the engine it was created from, and device buffers may be dropped at any time
//! after the last execution that used them returned.

use crate::dims::Dims;
use crate::errors::RuntimeResult;

/// A region of device memory.
pub trait DeviceBuffer {
    fn size_in_bytes(&self) -> usize;
}

/// Allocates device memory and moves bytes between the host and the device.
///
/// All copies are synchronous: when a copy returns, the destination holds the data.
pub trait Device {
    type Buffer: DeviceBuffer;

    /// Reserves `size_in_bytes` bytes of device memory.
    fn allocate(&self, size_in_bytes: usize) -> RuntimeResult<Self::Buffer>;

    /// Copies `source` into `destination`. Sizes must match exactly.
    fn copy_to_device(&self, destination: &mut Self::Buffer, source: &[u8]) -> RuntimeResult<()>;

    /// Copies `source` into `destination`. Sizes must match exactly.
    fn copy_to_host(&self, destination: &mut [u8], source: &Self::Buffer) -> RuntimeResult<()>;
}

/// Per-caller execution state derived from an engine.
///
/// A context runs one execution at a time; concurrent callers each need their own.
pub trait ExecutionContext {
    type Buffer: DeviceBuffer;

    /// Runs the engine synchronously over `batch_size` samples.
    ///
    /// `bindings` holds one device buffer per engine binding, in binding order.
    /// Returns `Ok(false)` when the runtime reports an unsuccessful execution
    /// without a more specific error.
    fn execute(
        &mut self,
        batch_size: usize,
        bindings: &mut [&mut Self::Buffer],
    ) -> RuntimeResult<bool>;
}

/// A deserialized, ready-to-run network.
pub trait Engine {
    type Buffer: DeviceBuffer;
    type Context: ExecutionContext<Buffer = Self::Buffer>;

    fn num_bindings(&self) -> usize;

    /// Per-sample dimensions of the tensor bound at `index`.
    fn binding_shape(&self, index: usize) -> RuntimeResult<Dims>;

    fn binding_is_input(&self, index: usize) -> RuntimeResult<bool>;

    fn max_batch_size(&self) -> usize;

    fn create_execution_context(&self) -> RuntimeResult<Self::Context>;
}

/// Entry point of a runtime: owns the device and deserializes engines for it.
pub trait Runtime {
    type Device: Device;
    type Engine: Engine<Buffer = <Self::Device as Device>::Buffer>;

    fn device(&self) -> &Self::Device;

    fn deserialize_engine(&self, serialized_engine: &[u8]) -> RuntimeResult<Self::Engine>;
}
