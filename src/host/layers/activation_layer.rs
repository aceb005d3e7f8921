//! Activation layer implementation.

use crate::activation::Activation;
use crate::errors::RuntimeResult;
use crate::host::layers::Layer;

/// Copies its input tensor to its output tensor and applies an activation there.
pub struct ActivationLayer {
    name: String,
    activation: Activation,
    input_ptr: usize,
    output_ptr: usize,
    data_size: usize,
}

impl ActivationLayer {
    pub fn new(
        name: String,
        activation: Activation,
        input_ptr: usize,
        output_ptr: usize,
        data_size: usize,
    ) -> Self {
        Self {
            name,
            activation,
            input_ptr,
            output_ptr,
            data_size,
        }
    }
}

impl Layer for ActivationLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, unified_computation_buffer: &mut [f32]) -> RuntimeResult<()> {
        let input_end = self.input_ptr + self.data_size;
        unified_computation_buffer.copy_within(self.input_ptr..input_end, self.output_ptr);

        let output_end = self.output_ptr + self.data_size;
        self.activation
            .apply_in_place(&mut unified_computation_buffer[self.output_ptr..output_end]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relu_writes_output_region_only() {
        let layer = ActivationLayer::new("relu".to_string(), Activation::Relu, 0, 3, 3);
        let mut buffer = [-1.0, 2.0, -3.0, 9.0, 9.0, 9.0];
        layer.apply(&mut buffer).unwrap();
        assert_eq!(buffer, [-1.0, 2.0, -3.0, 0.0, 2.0, 0.0]);
    }
}
