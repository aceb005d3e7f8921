//! Uniform parameter encoding for the GPU kernels.
//!
//! Both structs mirror the WGSL declarations in `shaders/` field for field.

use crate::activation::Activation;
use crate::gpu::shaders::WORKGROUP_SIZE;

/// Maximum number of workgroups along one dispatch dimension.
pub const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65_535;

/// Parameters of one convolution dispatch (64 bytes / 16 u32s).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ConvParams {
    pub in_channels: u32,
    pub in_height: u32,
    pub in_width: u32,
    pub out_channels: u32,
    pub out_height: u32,
    pub out_width: u32,
    pub kernel_h: u32,
    pub kernel_w: u32,
    pub stride_y: u32,
    pub stride_x: u32,
    pub pad_y: u32,
    pub pad_x: u32,
    pub has_bias: u32,
    pub input_sample_stride: u32,
    pub output_sample_stride: u32,
    pub dispatch_width: u32,
}

impl ConvParams {
    pub const SIZE_BYTES: usize = 64;

    pub fn new(
        input_extents: &[usize],
        output_extents: &[usize],
        kernel_shape: [usize; 2],
        stride: [usize; 2],
        padding: [usize; 2],
        has_bias: bool,
    ) -> Self {
        let output_count = output_extents.iter().product::<usize>() as u32;
        Self {
            in_channels: input_extents[0] as u32,
            in_height: input_extents[1] as u32,
            in_width: input_extents[2] as u32,
            out_channels: output_extents[0] as u32,
            out_height: output_extents[1] as u32,
            out_width: output_extents[2] as u32,
            kernel_h: kernel_shape[0] as u32,
            kernel_w: kernel_shape[1] as u32,
            stride_y: stride[0] as u32,
            stride_x: stride[1] as u32,
            pad_y: padding[0] as u32,
            pad_x: padding[1] as u32,
            has_bias: u32::from(has_bias),
            input_sample_stride: input_extents.iter().product::<usize>() as u32,
            output_sample_stride: output_count,
            dispatch_width: dispatch_size(output_count).dispatch_width,
        }
    }
}

/// Parameters of one activation dispatch (16 bytes / 4 u32s).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ActivationParams {
    pub count: u32,
    pub activation: u32,
    pub dispatch_width: u32,
    pub padding: u32,
}

impl ActivationParams {
    pub const SIZE_BYTES: usize = 16;

    pub fn new(count: usize, activation: Activation) -> Self {
        let count = count as u32;
        Self {
            count,
            activation: activation.shader_id(),
            dispatch_width: dispatch_size(count).dispatch_width,
            padding: 0,
        }
    }
}

/// Workgroup grid covering a number of invocations.
///
/// Invocations are laid out row by row, `dispatch_width` per row, so that large
/// tensors stay within the per-dimension workgroup limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSize {
    pub workgroups_x: u32,
    pub workgroups_y: u32,
    /// Invocations per row: `workgroups_x * WORKGROUP_SIZE`.
    pub dispatch_width: u32,
}

pub fn dispatch_size(invocations: u32) -> DispatchSize {
    let workgroups = invocations.div_ceil(WORKGROUP_SIZE).max(1);
    let workgroups_x = workgroups.min(MAX_WORKGROUPS_PER_DIMENSION);
    let workgroups_y = workgroups.div_ceil(workgroups_x);
    DispatchSize {
        workgroups_x,
        workgroups_y,
        dispatch_width: workgroups_x * WORKGROUP_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<ConvParams>(), ConvParams::SIZE_BYTES);
        assert_eq!(
            std::mem::size_of::<ActivationParams>(),
            ActivationParams::SIZE_BYTES
        );
    }

    #[test]
    fn test_small_dispatch() {
        let size = dispatch_size(100);
        assert_eq!(size.workgroups_x, 2);
        assert_eq!(size.workgroups_y, 1);
        assert_eq!(size.dispatch_width, 128);
    }

    #[test]
    fn test_large_dispatch_wraps_rows() {
        let invocations = MAX_WORKGROUPS_PER_DIMENSION * WORKGROUP_SIZE + 1;
        let size = dispatch_size(invocations);
        assert_eq!(size.workgroups_x, MAX_WORKGROUPS_PER_DIMENSION);
        assert_eq!(size.workgroups_y, 2);
        assert!(size.workgroups_x * size.workgroups_y * WORKGROUP_SIZE >= invocations);
    }

    #[test]
    fn test_conv_params() {
        let params = ConvParams::new(&[3, 224, 224], &[64, 112, 112], [7, 7], [2, 2], [3, 3], false);
        assert_eq!(params.input_sample_stride, 3 * 224 * 224);
        assert_eq!(params.output_sample_stride, 64 * 112 * 112);
        assert_eq!(params.has_bias, 0);
        assert_eq!(params.dispatch_width % WORKGROUP_SIZE, 0);
    }
}
