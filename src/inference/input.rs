//! Image input materialization.

use crate::dims::Dims;
use crate::errors::{InferenceError, InferenceResult};
use crate::inference::buffers::INPUT_BINDING;
use crate::runtime::Engine;
use image::DynamicImage;
use image::imageops::{self, FilterType};
use log::debug;
use std::path::Path;

/// Pixel values are mapped from `[0, 255]` to `[-1, 1]` as `value / NORMALIZATION_SCALE - 1`.
pub const NORMALIZATION_SCALE: f32 = 127.5;

/// Decodes an image and writes it into `host_input` in the layout of the engine's input binding.
pub fn load_input<E: Engine>(engine: &E, image_path: &Path, host_input: &mut [f32]) -> InferenceResult<()> {
    let dims = engine.binding_shape(INPUT_BINDING)?;
    let image = image::open(image_path)?;
    debug!(
        "Decoded {} ({}x{})",
        image_path.display(),
        image.width(),
        image.height()
    );
    materialize(&image, &dims, host_input)
}

/// Resizes `image` to the spatial extents of `dims` (`C x H x W`, `C` = 3) with
/// bilinear filtering and writes it channel first, normalized, into `host_input`.
pub fn materialize(image: &DynamicImage, dims: &Dims, host_input: &mut [f32]) -> InferenceResult<()> {
    let (channels, height, width) = match dims.to_usize().as_deref() {
        Some(&[channels, height, width]) if channels == 3 => (channels, height, width),
        _ => {
            return Err(InferenceError::UnsupportedInputShape {
                dims: dims.to_string(),
            });
        }
    };

    let expected = channels * height * width;
    if host_input.len() != expected {
        return Err(InferenceError::InputSizeMismatch {
            expected,
            actual: host_input.len(),
        });
    }

    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, width as u32, height as u32, FilterType::Triangle);

    let plane = height * width;
    for (x, y, pixel) in resized.enumerate_pixels() {
        let position = y as usize * width + x as usize;
        for (channel, &value) in pixel.0.iter().enumerate() {
            host_input[channel * plane + position] = f32::from(value) / NORMALIZATION_SCALE - 1.0;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_channel_first_normalization() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([0, 255, 51])));
        let mut buffer = vec![0.0; 12];
        materialize(&image, &Dims::from([3, 2, 2]), &mut buffer).unwrap();

        assert!(buffer[..4].iter().all(|&v| v == -1.0));
        assert!(buffer[4..8].iter().all(|&v| v == 1.0));
        assert!(buffer[8..].iter().all(|&v| (v - (51.0 / 127.5 - 1.0)).abs() < 1e-6));
    }

    #[test]
    fn test_resize_to_binding_extents() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(7, 5, Rgb([255, 255, 255])));
        let mut buffer = vec![0.0; 3 * 4 * 3];
        materialize(&image, &Dims::from([3, 4, 3]), &mut buffer).unwrap();
        assert!(buffer.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_grayscale_is_converted() {
        let image = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(2, 2, image::Luma([255])));
        let mut buffer = vec![0.0; 12];
        materialize(&image, &Dims::from([3, 2, 2]), &mut buffer).unwrap();
        assert!(buffer.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        let mut buffer = vec![0.0; 11];
        assert!(matches!(
            materialize(&image, &Dims::from([3, 2, 2]), &mut buffer),
            Err(InferenceError::InputSizeMismatch {
                expected: 12,
                actual: 11
            })
        ));
    }

    #[test]
    fn test_unsupported_shape() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        let mut buffer = vec![0.0; 4];
        assert!(matches!(
            materialize(&image, &Dims::from([1, 2, 2]), &mut buffer),
            Err(InferenceError::UnsupportedInputShape { .. })
        ));
    }
}
