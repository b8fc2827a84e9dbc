//! Raster buffer helpers
//!
//! The pipeline passes `DynamicImage` values between stages but only two
//! layouts ever travel through it: `ImageLuma8` (gray or binary) and
//! `ImageRgb8` (color).

use crate::error::PreprocessError;
use image::{DynamicImage, GrayImage, RgbImage};
use std::path::Path;

/// Channel count of a pipeline buffer, `None` for layouts the pipeline does not carry
pub fn channel_count(image: &DynamicImage) -> Option<u8> {
    match image {
        DynamicImage::ImageLuma8(_) => Some(1),
        DynamicImage::ImageRgb8(_) => Some(3),
        _ => None,
    }
}

/// Bring a freshly decoded capture into one of the two pipeline layouts
pub fn normalize_capture(image: DynamicImage) -> Result<DynamicImage, PreprocessError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessError::invalid_parameter(
            "capture",
            format!("image has empty dimensions {}x{}", image.width(), image.height()),
        ));
    }

    Ok(match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
        DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
            DynamicImage::ImageLuma8(image.to_luma8())
        }
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    })
}

/// Collapse an RGB image whose pixels are all gray (r == g == b) to one channel
pub fn collapse_gray(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        image::Luma([image.get_pixel(x, y).0[0]])
    })
}

/// Decode an image file and normalize it for the pipeline
pub fn load(path: &Path) -> Result<DynamicImage, PreprocessError> {
    let image = image::open(path)?;
    normalize_capture(image)
}

pub fn save(image: &DynamicImage, path: &Path) -> Result<(), PreprocessError> {
    image.save(path)?;
    Ok(())
}
