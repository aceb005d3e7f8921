//! Engine and execution context of the GPU runtime.
//!
//! Weights and per-layer parameter uniforms are uploaded once when the engine is
//! created. Every tensor that is not bound by the caller lives in a buffer owned
//! by the execution context, sized for the maximum batch. One execute encodes
//! the whole plan into a single command buffer: convolutions and activations are
//! compute dispatches with the sample index on the z axis, concatenations are
//! buffer-to-buffer copies.

use crate::dims::Dims;
use crate::engine_plan::{EnginePlan, LayerInfo};
use crate::errors::{RuntimeError, RuntimeResult};
use crate::gpu::gpu_device::{GpuBuffer, GpuDevice};
use crate::gpu::gpu_layer::{ActivationParams, ConvParams, DispatchSize, dispatch_size};
use crate::gpu::shaders::{ACTIVATION_WGSL, CONV2D_WGSL};
use crate::runtime::{DeviceBuffer, Engine, ExecutionContext};
use log::{debug, info};
use pollster::FutureExt;
use std::sync::Arc;
use wgpu::util::DeviceExt;

const F32_SIZE: usize = std::mem::size_of::<f32>();

struct TensorSlot {
    dims: Dims,
    sample_bytes: usize,
    /// Binding that supplies this tensor's memory, if any.
    binding: Option<usize>,
}

struct BindingSlot {
    name: String,
    tensor: usize,
    is_input: bool,
}

/// Byte ranges moved by a concatenation, per sample and outer row.
struct ConcatenationCopy {
    tensor: usize,
    row_bytes: usize,
    sample_bytes: usize,
    destination_offset: usize,
}

enum GpuLayer {
    Convolution {
        name: String,
        input: usize,
        output: usize,
        kernel: usize,
        bias: Option<usize>,
        params: wgpu::Buffer,
        dispatch: DispatchSize,
    },
    Activation {
        name: String,
        input: usize,
        output: usize,
        params: wgpu::Buffer,
        dispatch: DispatchSize,
    },
    Concatenation {
        name: String,
        output: usize,
        outer: usize,
        output_row_bytes: usize,
        output_sample_bytes: usize,
        copies: Vec<ConcatenationCopy>,
    },
}

impl GpuLayer {
    fn name(&self) -> &str {
        match self {
            GpuLayer::Convolution { name, .. } => name,
            GpuLayer::Activation { name, .. } => name,
            GpuLayer::Concatenation { name, .. } => name,
        }
    }
}

struct CompiledPlan {
    device: GpuDevice,
    conv_layout: wgpu::BindGroupLayout,
    conv_pipeline: wgpu::ComputePipeline,
    activation_layout: wgpu::BindGroupLayout,
    activation_pipeline: wgpu::ComputePipeline,
    weights: Vec<wgpu::Buffer>,
    /// Bound in place of a missing bias; never read.
    bias_placeholder: wgpu::Buffer,
    layers: Vec<GpuLayer>,
    tensors: Vec<TensorSlot>,
    bindings: Vec<BindingSlot>,
    max_batch_size: usize,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    entries: &[wgpu::BindGroupLayoutEntry],
) -> (wgpu::BindGroupLayout, wgpu::ComputePipeline) {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries,
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    });
    (bind_group_layout, pipeline)
}

/// A plan compiled for execution on a wgpu device.
pub struct GpuEngine {
    compiled: Arc<CompiledPlan>,
}

impl GpuEngine {
    pub fn new(device: GpuDevice, plan: EnginePlan) -> RuntimeResult<Self> {
        plan.validate()?;
        let raw = device.device();

        let max_binding_size = raw.limits().max_storage_buffer_binding_size as usize;
        let mut tensors: Vec<TensorSlot> = plan
            .tensors
            .iter()
            .map(|tensor| TensorSlot {
                dims: tensor.dims.clone(),
                sample_bytes: tensor.dims.element_count().unwrap_or(0).saturating_mul(F32_SIZE),
                binding: None,
            })
            .collect();
        for (tensor, slot) in plan.tensors.iter().zip(tensors.iter()) {
            let size_in_bytes = slot.sample_bytes.saturating_mul(plan.max_batch_size);
            if size_in_bytes > max_binding_size {
                return Err(RuntimeError::AllocationFailed {
                    size_in_bytes,
                    message: format!(
                        "tensor {} exceeds the storage binding limit of {} bytes",
                        tensor.name, max_binding_size
                    ),
                });
            }
        }
        let bindings: Vec<BindingSlot> = plan
            .bindings
            .iter()
            .enumerate()
            .map(|(index, binding)| {
                tensors[binding.tensor].binding = Some(index);
                BindingSlot {
                    name: binding.name.clone(),
                    tensor: binding.tensor,
                    is_input: binding.is_input,
                }
            })
            .collect();

        raw.push_error_scope(wgpu::ErrorFilter::Validation);
        let (conv_layout, conv_pipeline) = create_pipeline(
            raw,
            "Conv2d",
            CONV2D_WGSL,
            &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
                uniform_entry(4),
            ],
        );
        let (activation_layout, activation_pipeline) = create_pipeline(
            raw,
            "Activation",
            ACTIVATION_WGSL,
            &[storage_entry(0, true), storage_entry(1, false), uniform_entry(2)],
        );

        let weights = plan
            .weights
            .iter()
            .map(|block| {
                raw.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Weights Buffer"),
                    contents: bytemuck::cast_slice(block),
                    usage: wgpu::BufferUsages::STORAGE,
                })
            })
            .collect();
        let bias_placeholder = raw.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Bias Placeholder"),
            contents: bytemuck::cast_slice(&[0.0f32]),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let layers = plan
            .layers
            .iter()
            .map(|layer| Self::compile_layer(raw, layer, &tensors))
            .collect();

        if let Some(error) = raw.pop_error_scope().block_on() {
            return Err(RuntimeError::ExecutionFailed {
                message: format!("GPU pipeline creation failed: {}", error),
            });
        }

        info!(
            "GPU engine ready: {} layers, {} weight blocks",
            plan.layers.len(),
            plan.weights.len()
        );

        Ok(Self {
            compiled: Arc::new(CompiledPlan {
                device,
                conv_layout,
                conv_pipeline,
                activation_layout,
                activation_pipeline,
                weights,
                bias_placeholder,
                layers,
                tensors,
                bindings,
                max_batch_size: plan.max_batch_size,
            }),
        })
    }

    fn compile_layer(device: &wgpu::Device, layer: &LayerInfo, tensors: &[TensorSlot]) -> GpuLayer {
        let extents = |tensor: usize| tensors[tensor].dims.to_usize().unwrap_or_default();
        let uniform = |label: &str, contents: &[u8]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::UNIFORM,
            })
        };

        match layer {
            LayerInfo::Convolution(info) => {
                let params = ConvParams::new(
                    &extents(info.input),
                    &extents(info.output),
                    info.kernel_shape,
                    info.stride,
                    info.padding,
                    info.bias.is_some(),
                );
                GpuLayer::Convolution {
                    name: info.name.clone(),
                    input: info.input,
                    output: info.output,
                    kernel: info.kernel,
                    bias: info.bias,
                    params: uniform("Conv Params", bytemuck::bytes_of(&params)),
                    dispatch: dispatch_size(params.output_sample_stride),
                }
            }
            LayerInfo::Activation(info) => {
                let count: usize = extents(info.output).iter().product();
                let params = ActivationParams::new(count, info.activation);
                GpuLayer::Activation {
                    name: info.name.clone(),
                    input: info.input,
                    output: info.output,
                    params: uniform("Activation Params", bytemuck::bytes_of(&params)),
                    dispatch: dispatch_size(params.count),
                }
            }
            LayerInfo::Concatenation(info) => {
                let output_extents = extents(info.output);
                let outer: usize = output_extents[..info.axis].iter().product();
                let inner: usize = output_extents[info.axis + 1..].iter().product();

                let mut destination_offset = 0;
                let copies = info
                    .inputs
                    .iter()
                    .map(|&tensor| {
                        let row_bytes = extents(tensor)[info.axis] * inner * F32_SIZE;
                        let copy = ConcatenationCopy {
                            tensor,
                            row_bytes,
                            sample_bytes: tensors[tensor].sample_bytes,
                            destination_offset,
                        };
                        destination_offset += row_bytes;
                        copy
                    })
                    .collect();

                GpuLayer::Concatenation {
                    name: info.name.clone(),
                    output: info.output,
                    outer,
                    output_row_bytes: output_extents[info.axis] * inner * F32_SIZE,
                    output_sample_bytes: tensors[info.output].sample_bytes,
                    copies,
                }
            }
        }
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

impl Engine for GpuEngine {
    type Buffer = GpuBuffer;
    type Context = GpuExecutionContext;

    fn num_bindings(&self) -> usize {
        self.compiled.bindings.len()
    }

    fn binding_shape(&self, index: usize) -> RuntimeResult<Dims> {
        let binding = self.binding(index)?;
        Ok(self.compiled.tensors[binding.tensor].dims.clone())
    }

    fn binding_is_input(&self, index: usize) -> RuntimeResult<bool> {
        Ok(self.binding(index)?.is_input)
    }

    fn max_batch_size(&self) -> usize {
        self.compiled.max_batch_size
    }

    fn create_execution_context(&self) -> RuntimeResult<GpuExecutionContext> {
        let compiled = &self.compiled;
        let intermediates = compiled
            .tensors
            .iter()
            .map(|tensor| match tensor.binding {
                Some(_) => None,
                None => Some(compiled.device.create_storage_buffer(
                    "Intermediate Tensor",
                    tensor.sample_bytes * compiled.max_batch_size,
                )),
            })
            .collect();
        Ok(GpuExecutionContext {
            compiled: Arc::clone(compiled),
            intermediates,
        })
    }
}

/// Execution state of a GPU engine: buffers of the tensors nobody binds.
pub struct GpuExecutionContext {
    compiled: Arc<CompiledPlan>,
    intermediates: Vec<Option<wgpu::Buffer>>,
}

impl GpuExecutionContext {
    fn validate_bindings(&self, batch_size: usize, bindings: &[&mut GpuBuffer]) -> RuntimeResult<()> {
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
            let expected = batch_size * compiled.tensors[slot.tensor].sample_bytes;
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

    fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        batch_size: usize,
        tensor_buffers: &[&wgpu::Buffer],
    ) {
        let compiled = &self.compiled;
        let device = compiled.device.device();

        for layer in &compiled.layers {
            match layer {
                GpuLayer::Convolution {
                    input,
                    output,
                    kernel,
                    bias,
                    params,
                    dispatch,
                    ..
                } => {
                    let bias_buffer = bias
                        .map(|index| &compiled.weights[index])
                        .unwrap_or(&compiled.bias_placeholder);
                    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(layer.name()),
                        layout: &compiled.conv_layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: tensor_buffers[*input].as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: compiled.weights[*kernel].as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 2,
                                resource: bias_buffer.as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 3,
                                resource: tensor_buffers[*output].as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 4,
                                resource: params.as_entire_binding(),
                            },
                        ],
                    });
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
                    pass.set_pipeline(&compiled.conv_pipeline);
                    pass.set_bind_group(0, &bind_group, &[]);
                    pass.dispatch_workgroups(
                        dispatch.workgroups_x,
                        dispatch.workgroups_y,
                        batch_size as u32,
                    );
                }
                GpuLayer::Activation {
                    input,
                    output,
                    params,
                    dispatch,
                    ..
                } => {
                    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(layer.name()),
                        layout: &compiled.activation_layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: tensor_buffers[*input].as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: tensor_buffers[*output].as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 2,
                                resource: params.as_entire_binding(),
                            },
                        ],
                    });
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
                    pass.set_pipeline(&compiled.activation_pipeline);
                    pass.set_bind_group(0, &bind_group, &[]);
                    pass.dispatch_workgroups(
                        dispatch.workgroups_x,
                        dispatch.workgroups_y,
                        batch_size as u32,
                    );
                }
                GpuLayer::Concatenation {
                    output,
                    outer,
                    output_row_bytes,
                    output_sample_bytes,
                    copies,
                    ..
                } => {
                    for sample in 0..batch_size {
                        for row in 0..*outer {
                            let row_start = sample * output_sample_bytes + row * output_row_bytes;
                            for copy in copies {
                                let source_offset = sample * copy.sample_bytes + row * copy.row_bytes;
                                encoder.copy_buffer_to_buffer(
                                    tensor_buffers[copy.tensor],
                                    source_offset as u64,
                                    tensor_buffers[*output],
                                    (row_start + copy.destination_offset) as u64,
                                    copy.row_bytes as u64,
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}

impl ExecutionContext for GpuExecutionContext {
    type Buffer = GpuBuffer;

    fn execute(&mut self, batch_size: usize, bindings: &mut [&mut GpuBuffer]) -> RuntimeResult<bool> {
        self.validate_bindings(batch_size, bindings)?;
        let compiled = &self.compiled;

        let mut tensor_buffers = Vec::with_capacity(compiled.tensors.len());
        for (tensor, intermediate) in compiled.tensors.iter().zip(self.intermediates.iter()) {
            let buffer = match (tensor.binding, intermediate) {
                (Some(binding), _) => bindings[binding].raw(),
                (None, Some(buffer)) => buffer,
                (None, None) => {
                    return Err(RuntimeError::ExecutionFailed {
                        message: "tensor has no backing buffer".to_string(),
                    });
                }
            };
            tensor_buffers.push(buffer);
        }

        let device = &compiled.device;
        device.device().push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        self.encode(&mut encoder, batch_size, &tensor_buffers);
        device.queue().submit(Some(encoder.finish()));
        device.wait_idle();

        if let Some(error) = device.device().pop_error_scope().block_on() {
            return Err(RuntimeError::ExecutionFailed {
                message: error.to_string(),
            });
        }

        debug!(
            "GPU execution of {} layers over {} sample(s) finished",
            compiled.layers.len(),
            batch_size
        );
        Ok(true)
    }
}
