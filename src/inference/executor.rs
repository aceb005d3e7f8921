//! Single-shot execution.

use crate::errors::{InferenceError, InferenceResult};
use crate::inference::buffers::InferenceBuffers;
use crate::runtime::{Device, ExecutionContext};
use log::info;
use std::time::Instant;

/// Runs one inference over `buffers` and returns the populated host output.
///
/// Copies the host input to the device, executes with a batch size of 1 and the
/// device input and output as bindings 0 and 1, then copies the device output
/// back. Every step blocks. Only the execute step is timed.
pub fn do_inference<'a, D, C>(
    device: &D,
    context: &mut C,
    buffers: &'a mut InferenceBuffers<D::Buffer>,
) -> InferenceResult<&'a [f32]>
where
    D: Device,
    C: ExecutionContext<Buffer = D::Buffer>,
{
    let InferenceBuffers {
        host_input,
        host_output,
        device_input,
        device_output,
    } = buffers;

    device.copy_to_device(device_input, host_input.as_bytes())?;

    let start = Instant::now();
    let succeeded = context.execute(1, &mut [&mut *device_input, &mut *device_output])?;
    let elapsed = start.elapsed();
    info!("Inference time: {:.3} [msec]", elapsed.as_secs_f64() * 1000.0);

    if !succeeded {
        return Err(InferenceError::ExecutionUnsuccessful);
    }

    device.copy_to_host(host_output.as_bytes_mut(), device_output)?;
    Ok(host_output.as_slice())
}
