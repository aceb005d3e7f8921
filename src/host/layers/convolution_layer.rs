//! Convolution layer implementation.
//!
//! Direct 2D convolution over a CHW tensor with symmetric zero padding, the
//! host counterpart of the `conv2d` compute shader.

use crate::errors::RuntimeResult;
use crate::host::layers::Layer;

/// Instruction-style convolution: reads the input region of the unified buffer
/// and writes `C_out x H_out x W_out` values at the output pointer.
pub struct ConvolutionLayer {
    name: String,
    input_ptr: usize,
    output_ptr: usize,
    in_channels: usize,
    in_height: usize,
    in_width: usize,
    out_channels: usize,
    out_height: usize,
    out_width: usize,
    kernel_shape: [usize; 2],
    stride: [usize; 2],
    padding: [usize; 2],
    /// `C_out x C_in x kh x kw`, row major.
    kernel: Vec<f32>,
    bias: Option<Vec<f32>>,
}

impl ConvolutionLayer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        input_ptr: usize,
        output_ptr: usize,
        input_extents: &[usize],
        output_extents: &[usize],
        kernel_shape: [usize; 2],
        stride: [usize; 2],
        padding: [usize; 2],
        kernel: &[f32],
        bias: Option<&[f32]>,
    ) -> Self {
        Self {
            name,
            input_ptr,
            output_ptr,
            in_channels: input_extents[0],
            in_height: input_extents[1],
            in_width: input_extents[2],
            out_channels: output_extents[0],
            out_height: output_extents[1],
            out_width: output_extents[2],
            kernel_shape,
            stride,
            padding,
            kernel: kernel.to_vec(),
            bias: bias.map(<[f32]>::to_vec),
        }
    }

    #[inline(always)]
    fn accumulate(&self, buffer: &[f32], out_channel: usize, oy: usize, ox: usize) -> f32 {
        let [kernel_h, kernel_w] = self.kernel_shape;
        let in_plane = self.in_height * self.in_width;
        let mut sum = self
            .bias
            .as_ref()
            .map_or(0.0, |bias| bias[out_channel]);

        // Row and column of the top-left kernel tap, in padded coordinates.
        let origin_y = (oy * self.stride[0]) as isize - self.padding[0] as isize;
        let origin_x = (ox * self.stride[1]) as isize - self.padding[1] as isize;

        for in_channel in 0..self.in_channels {
            let kernel_base = (out_channel * self.in_channels + in_channel) * kernel_h * kernel_w;
            let input_base = self.input_ptr + in_channel * in_plane;
            for ky in 0..kernel_h {
                let iy = origin_y + ky as isize;
                if iy < 0 || iy >= self.in_height as isize {
                    continue;
                }
                let input_row = input_base + iy as usize * self.in_width;
                let kernel_row = kernel_base + ky * kernel_w;
                for kx in 0..kernel_w {
                    let ix = origin_x + kx as isize;
                    if ix < 0 || ix >= self.in_width as isize {
                        continue;
                    }
                    sum += self.kernel[kernel_row + kx] * buffer[input_row + ix as usize];
                }
            }
        }
        sum
    }
}

impl Layer for ConvolutionLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, unified_computation_buffer: &mut [f32]) -> RuntimeResult<()> {
        let mut output_index = self.output_ptr;
        for out_channel in 0..self.out_channels {
            for oy in 0..self.out_height {
                for ox in 0..self.out_width {
                    let value = self.accumulate(unified_computation_buffer, out_channel, oy, ox);
                    unified_computation_buffer[output_index] = value;
                    output_index += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELTA: f32 = 1e-6;

    #[test]
    fn test_single_channel_valid_convolution() {
        // 1x3x3 input, 2x2 kernel of ones, stride 1, no padding -> 1x2x2.
        let layer = ConvolutionLayer::new(
            "conv".to_string(),
            0,
            9,
            &[1, 3, 3],
            &[1, 2, 2],
            [2, 2],
            [1, 1],
            [0, 0],
            &[1.0; 4],
            None,
        );
        let mut buffer = vec![0.0f32; 13];
        buffer[..9].copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        layer.apply(&mut buffer).unwrap();
        assert_eq!(&buffer[9..], &[12.0, 16.0, 24.0, 28.0]);
    }

    #[test]
    fn test_padding_stride_and_bias() {
        // 1x2x2 input, 3x3 kernel with only the centre tap set, pad 1, stride 2.
        let mut kernel = [0.0f32; 9];
        kernel[4] = 2.0;
        let layer = ConvolutionLayer::new(
            "conv".to_string(),
            0,
            4,
            &[1, 2, 2],
            &[1, 1, 1],
            [3, 3],
            [2, 2],
            [1, 1],
            &kernel,
            Some(&[0.5]),
        );
        let mut buffer = vec![3.0, 1.0, 1.0, 1.0, 0.0];
        layer.apply(&mut buffer).unwrap();
        assert!((buffer[4] - 6.5).abs() < DELTA);
    }

    #[test]
    fn test_multiple_channels() {
        // 2x1x1 input [1, 2], two output maps with 1x1 kernels.
        let layer = ConvolutionLayer::new(
            "conv".to_string(),
            0,
            2,
            &[2, 1, 1],
            &[2, 1, 1],
            [1, 1],
            [1, 1],
            [0, 0],
            &[1.0, 1.0, 0.5, -1.0],
            Some(&[0.0, 1.0]),
        );
        let mut buffer = vec![1.0, 2.0, 0.0, 0.0];
        layer.apply(&mut buffer).unwrap();
        assert!((buffer[2] - 3.0).abs() < DELTA);
        assert!((buffer[3] - (0.5 - 2.0 + 1.0)).abs() < DELTA);
    }
}
