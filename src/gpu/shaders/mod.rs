//! WGSL shader sources for the GPU runtime.

/// Workgroup size declared by every compute shader.
pub const WORKGROUP_SIZE: u32 = 64;

/// Direct convolution kernel, one invocation per output value.
pub const CONV2D_WGSL: &str = include_str!("conv2d.wgsl");

/// Element-wise activation kernel, one invocation per value.
pub const ACTIVATION_WGSL: &str = include_str!("activation.wgsl");
