//! Test double for the runtime interface.
//!
//! The stub engine declares whatever binding shapes a test asks for and its
//! execution either copies the input binding into the output binding, writes a
//! fixed vector, or fails.

#![allow(dead_code)]

use enginert_inference::dims::Dims;
use enginert_inference::errors::{RuntimeError, RuntimeResult};
use enginert_inference::runtime::{Device, DeviceBuffer, Engine, ExecutionContext, Runtime};
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum StubBehaviour {
    /// Copies as many bytes of binding 0 as fit into binding 1.
    PassThrough,
    /// Writes the given values at the start of binding 1.
    Fixed(Vec<f32>),
    /// Returns an execution error.
    Fail,
    /// Returns `Ok(false)`.
    Unsuccessful,
}

#[derive(Debug)]
pub struct StubBuffer {
    pub data: Vec<u8>,
}

impl DeviceBuffer for StubBuffer {
    fn size_in_bytes(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Default)]
pub struct StubDevice {
    pub allocations: Cell<usize>,
}

impl Device for StubDevice {
    type Buffer = StubBuffer;

    fn allocate(&self, size_in_bytes: usize) -> RuntimeResult<StubBuffer> {
        self.allocations.set(self.allocations.get() + 1);
        Ok(StubBuffer {
            data: vec![0; size_in_bytes],
        })
    }

    fn copy_to_device(&self, destination: &mut StubBuffer, source: &[u8]) -> RuntimeResult<()> {
        if destination.data.len() != source.len() {
            return Err(RuntimeError::CopySizeMismatch {
                buffer_size: destination.data.len(),
                data_size: source.len(),
            });
        }
        destination.data.copy_from_slice(source);
        Ok(())
    }

    fn copy_to_host(&self, destination: &mut [u8], source: &StubBuffer) -> RuntimeResult<()> {
        if source.data.len() != destination.len() {
            return Err(RuntimeError::CopySizeMismatch {
                buffer_size: source.data.len(),
                data_size: destination.len(),
            });
        }
        destination.copy_from_slice(&source.data);
        Ok(())
    }
}

pub struct StubEngine {
    shapes: Vec<Dims>,
    behaviour: StubBehaviour,
    executions: Rc<Cell<usize>>,
}

impl StubEngine {
    pub fn executions(&self) -> usize {
        self.executions.get()
    }
}

impl Engine for StubEngine {
    type Buffer = StubBuffer;
    type Context = StubContext;

    fn num_bindings(&self) -> usize {
        self.shapes.len()
    }

    fn binding_shape(&self, index: usize) -> RuntimeResult<Dims> {
        self.shapes
            .get(index)
            .cloned()
            .ok_or(RuntimeError::BindingIndexOutOfBounds {
                index,
                count: self.shapes.len(),
            })
    }

    fn binding_is_input(&self, index: usize) -> RuntimeResult<bool> {
        Ok(index == 0)
    }

    fn max_batch_size(&self) -> usize {
        1
    }

    fn create_execution_context(&self) -> RuntimeResult<StubContext> {
        Ok(StubContext {
            behaviour: self.behaviour.clone(),
            executions: Rc::clone(&self.executions),
        })
    }
}

pub struct StubContext {
    behaviour: StubBehaviour,
    executions: Rc<Cell<usize>>,
}

impl ExecutionContext for StubContext {
    type Buffer = StubBuffer;

    fn execute(&mut self, batch_size: usize, bindings: &mut [&mut StubBuffer]) -> RuntimeResult<bool> {
        assert_eq!(batch_size, 1);
        assert_eq!(bindings.len(), 2);
        self.executions.set(self.executions.get() + 1);

        let (inputs, outputs) = bindings.split_at_mut(1);
        let input = &inputs[0].data;
        let output = &mut outputs[0].data;
        match &self.behaviour {
            StubBehaviour::PassThrough => {
                let count = input.len().min(output.len());
                output[..count].copy_from_slice(&input[..count]);
                Ok(true)
            }
            StubBehaviour::Fixed(values) => {
                let bytes: &[u8] = bytemuck::cast_slice(values);
                output[..bytes.len()].copy_from_slice(bytes);
                Ok(true)
            }
            StubBehaviour::Fail => Err(RuntimeError::ExecutionFailed {
                message: "stubbed failure".to_string(),
            }),
            StubBehaviour::Unsuccessful => Ok(false),
        }
    }
}

/// Runtime whose engines ignore the serialized bytes.
pub struct StubRuntime {
    device: StubDevice,
    shapes: Vec<Dims>,
    behaviour: StubBehaviour,
    executions: Rc<Cell<usize>>,
}

impl StubRuntime {
    pub fn new(shapes: Vec<Dims>, behaviour: StubBehaviour) -> Self {
        Self {
            device: StubDevice::default(),
            shapes,
            behaviour,
            executions: Rc::new(Cell::new(0)),
        }
    }

    /// Number of executions over every engine of this runtime.
    pub fn executions(&self) -> usize {
        self.executions.get()
    }
}

impl Runtime for StubRuntime {
    type Device = StubDevice;
    type Engine = StubEngine;

    fn device(&self) -> &StubDevice {
        &self.device
    }

    fn deserialize_engine(&self, _serialized_engine: &[u8]) -> RuntimeResult<StubEngine> {
        Ok(StubEngine {
            shapes: self.shapes.clone(),
            behaviour: self.behaviour.clone(),
            executions: Rc::clone(&self.executions),
        })
    }
}

/// A two-branch network over a `1x3x3` input holding `1..=9`.
///
/// Branch A is a 2x2 all-ones convolution with bias -20 followed by ReLU,
/// branch B a 2x2 `[1, 0, 0, -1]` convolution without bias. Their channel
/// concatenation is the `prob` output, [`TWO_BRANCH_OUTPUT`] for that input.
pub fn two_branch_plan(max_batch_size: usize) -> enginert_inference::EnginePlan {
    use enginert_inference::network::{Builder, BuilderConfig, NetworkDefinition, Weights};
    use enginert_inference::Activation;

    let mut network = NetworkDefinition::new();
    let input = network.add_input("data", [1, 3, 3]).unwrap();

    let conv_a = network
        .add_convolution(input, 1, [2, 2], Weights::new(vec![1.0; 4]), Weights::new(vec![-20.0]))
        .unwrap();
    let relu_a = network
        .add_activation(network.layer_output(conv_a).unwrap(), Activation::Relu)
        .unwrap();
    let conv_b = network
        .add_convolution(
            input,
            1,
            [2, 2],
            Weights::new(vec![1.0, 0.0, 0.0, -1.0]),
            Weights::empty(),
        )
        .unwrap();

    let concat = network
        .add_concatenation(&[
            network.layer_output(relu_a).unwrap(),
            network.layer_output(conv_b).unwrap(),
        ])
        .unwrap();
    let output = network.layer_output(concat).unwrap();
    network.set_tensor_name(output, "prob").unwrap();
    network.mark_output(output).unwrap();

    Builder::new(BuilderConfig {
        max_batch_size,
        fp16_mode: false,
    })
    .build_engine(&network)
    .unwrap()
}

pub const TWO_BRANCH_INPUT: [f32; 9] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];

pub const TWO_BRANCH_OUTPUT: [f32; 8] = [0.0, 0.0, 4.0, 8.0, -4.0, -4.0, -4.0, -4.0];
