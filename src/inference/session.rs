//! An engine, one execution context and its buffers, held together.

use crate::errors::InferenceResult;
use crate::inference::buffers::{InferenceBuffers, allocate_buffers};
use crate::inference::executor::do_inference;
use crate::inference::input::load_input;
use crate::inference::labels::Labels;
use crate::inference::report::{Prediction, top_k};
use crate::runtime::{Device, Engine, Runtime};
use log::info;
use std::fs;
use std::path::Path;

type ContextOf<R> = <<R as Runtime>::Engine as Engine>::Context;
type BufferOf<R> = <<R as Runtime>::Device as Device>::Buffer;

/// The linear lifecycle of the runner: load engine, allocate buffers, then
/// materialize and execute as often as needed.
///
/// Fields drop in declaration order, so buffers and the execution context are
/// released before the engine.
pub struct InferenceSession<'r, R: Runtime> {
    runtime: &'r R,
    buffers: InferenceBuffers<BufferOf<R>>,
    context: ContextOf<R>,
    engine: R::Engine,
}

impl<'r, R: Runtime> InferenceSession<'r, R> {
    /// Deserializes an engine and prepares one context and one buffer set for it.
    pub fn load(runtime: &'r R, serialized_engine: &[u8]) -> InferenceResult<Self> {
        let engine = runtime.deserialize_engine(serialized_engine)?;
        let buffers = allocate_buffers(&engine, runtime.device())?;
        let context = engine.create_execution_context()?;
        Ok(Self {
            runtime,
            buffers,
            context,
            engine,
        })
    }

    pub fn from_file(runtime: &'r R, engine_path: &Path) -> InferenceResult<Self> {
        let serialized_engine = fs::read(engine_path)?;
        info!(
            "Read engine {} ({} bytes)",
            engine_path.display(),
            serialized_engine.len()
        );
        Self::load(runtime, &serialized_engine)
    }

    pub fn engine(&self) -> &R::Engine {
        &self.engine
    }

    pub fn input_mut(&mut self) -> &mut [f32] {
        self.buffers.host_input_mut()
    }

    pub fn output(&self) -> &[f32] {
        self.buffers.host_output()
    }

    /// Decodes an image into the host input buffer.
    pub fn load_image(&mut self, image_path: &Path) -> InferenceResult<()> {
        load_input(&self.engine, image_path, self.buffers.host_input_mut())
    }

    /// Runs one inference on the current host input.
    pub fn infer(&mut self) -> InferenceResult<&[f32]> {
        do_inference(self.runtime.device(), &mut self.context, &mut self.buffers)
    }

    /// Materializes an image, runs one inference and ranks the output.
    pub fn classify<'l>(
        &mut self,
        image_path: &Path,
        labels: &'l Labels,
        k: usize,
    ) -> InferenceResult<Vec<Prediction<'l>>> {
        self.load_image(image_path)?;
        let scores = self.infer()?;
        top_k(scores, labels, k)
    }
}
