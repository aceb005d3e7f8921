//! Concatenation layer implementation.

use crate::errors::RuntimeResult;
use crate::host::layers::Layer;

/// Joins several tensors along one axis.
///
/// For an axis `a`, every input is seen as `outer x (extent_a * inner)` where
/// `outer` is the product of the extents before `a` and `inner` the product of
/// those after it. Each outer row of the output is the inputs' rows laid end to end.
pub struct ConcatenationLayer {
    name: String,
    /// Offset and row length (`extent_a * inner`) of each input.
    inputs: Vec<(usize, usize)>,
    output_ptr: usize,
    output_row: usize,
    outer: usize,
}

impl ConcatenationLayer {
    pub fn new(
        name: String,
        inputs: Vec<(usize, Vec<usize>)>,
        output_ptr: usize,
        output_extents: &[usize],
        axis: usize,
    ) -> Self {
        let outer: usize = output_extents[..axis].iter().product();
        let inner: usize = output_extents[axis + 1..].iter().product();
        let inputs = inputs
            .into_iter()
            .map(|(offset, extents)| (offset, extents[axis] * inner))
            .collect();

        Self {
            name,
            inputs,
            output_ptr,
            output_row: output_extents[axis] * inner,
            outer,
        }
    }
}

impl Layer for ConcatenationLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, unified_computation_buffer: &mut [f32]) -> RuntimeResult<()> {
        for row in 0..self.outer {
            let mut destination = self.output_ptr + row * self.output_row;
            for &(input_ptr, input_row) in &self.inputs {
                let source = input_ptr + row * input_row;
                unified_computation_buffer.copy_within(source..source + input_row, destination);
                destination += input_row;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_axis_is_contiguous() {
        // Two 1x2x1 tensors at 0 and 2, output 2x2x1 at 4.
        let layer = ConcatenationLayer::new(
            "concat".to_string(),
            vec![(0, vec![1, 2, 1]), (2, vec![1, 2, 1])],
            4,
            &[2, 2, 1],
            0,
        );
        let mut buffer = [1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0];
        layer.apply(&mut buffer).unwrap();
        assert_eq!(&buffer[4..], &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_inner_axis_interleaves_rows() {
        // a = [[1, 2]], b = [[3]] (1x1x2 and 1x1x1) joined on the last axis.
        let layer = ConcatenationLayer::new(
            "concat".to_string(),
            vec![(0, vec![1, 1, 2]), (2, vec![1, 1, 1])],
            3,
            &[1, 1, 3],
            2,
        );
        let mut buffer = [1.0, 2.0, 3.0, 0.0, 0.0, 0.0];
        layer.apply(&mut buffer).unwrap();
        assert_eq!(&buffer[3..], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_middle_axis() {
        // a: 2x1x1 = [1, 2], b: 2x2x1 = [3, 4, 5, 6] joined on axis 1 -> 2x3x1.
        let layer = ConcatenationLayer::new(
            "concat".to_string(),
            vec![(0, vec![2, 1, 1]), (2, vec![2, 2, 1])],
            6,
            &[2, 3, 1],
            1,
        );
        let mut buffer = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        layer.apply(&mut buffer).unwrap();
        assert_eq!(&buffer[6..], &[1.0, 3.0, 4.0, 2.0, 5.0, 6.0]);
    }
}
