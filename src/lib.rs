//! Inference engine building and single-shot execution.
//!
//! Networks are described with [`network::NetworkDefinition`], compiled by
//! [`network::Builder`] into an [`EnginePlan`] and serialized to disk. A
//! [`runtime::Runtime`] turns the serialized bytes back into an engine; the
//! [`inference`] module allocates host and device buffers for it, runs one
//! sample and ranks the scores.
//!
//! Two runtimes are provided: [`host::HostRuntime`] executes on the CPU and
//! [`gpu::GpuRuntime`] executes WGSL compute shaders through wgpu.

pub mod activation;
pub mod dims;
pub mod engine_plan;
pub mod errors;
pub mod gpu;
pub mod host;
pub mod inference;
pub mod network;
pub mod runtime;

pub use activation::Activation;
pub use dims::Dims;
pub use engine_plan::{ENGINE_FORMAT_VERSION, EnginePlan};
pub use inference::InferenceSession;
pub use network::{Builder, BuilderConfig, NetworkDefinition, Weights};
