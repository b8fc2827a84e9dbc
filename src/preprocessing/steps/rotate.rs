use crate::error::PreprocessError;
use crate::preprocessing::params::normalize_degrees;
use image::{DynamicImage, ImageBuffer, Luma, Pixel, Rgb};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// Rotate the capture by a user-facing angle in degrees.
///
/// Positive angles turn the content clockwise. The canvas grows so the
/// whole rotated content stays visible; uncovered corners are filled black.
/// Quarter turns are exact pixel permutations.
pub fn apply(image: DynamicImage, degrees: f32) -> Result<DynamicImage, PreprocessError> {
    if !degrees.is_finite() {
        return Err(PreprocessError::invalid_parameter(
            "rotate",
            format!("rotation must be finite, got {}", degrees),
        ));
    }

    let degrees = normalize_degrees(degrees);
    if degrees == 0.0 {
        return Ok(image);
    }

    if degrees == 90.0 {
        return Ok(image.rotate90());
    }
    if degrees == 180.0 {
        return Ok(image.rotate180());
    }
    if degrees == -90.0 {
        return Ok(image.rotate270());
    }

    let theta = degrees.to_radians();
    match image {
        DynamicImage::ImageLuma8(gray) => Ok(DynamicImage::ImageLuma8(rotate_expanded(
            &gray,
            theta,
            Luma([0u8]),
        ))),
        DynamicImage::ImageRgb8(rgb) => Ok(DynamicImage::ImageRgb8(rotate_expanded(
            &rgb,
            theta,
            Rgb([0u8, 0, 0]),
        ))),
        other => Err(PreprocessError::unsupported_image(
            "rotate",
            format!("expected gray or RGB buffer, got {:?}", other.color()),
        )),
    }
}

/// Size of the canvas that fully contains a `width`x`height` image turned by `theta`
pub fn expanded_dimensions(width: u32, height: u32, theta: f32) -> (u32, u32) {
    let (sin, cos) = theta.sin_cos();
    let (w, h) = (width as f32, height as f32);
    let new_w = (w * cos.abs() + h * sin.abs()).round().max(1.0);
    let new_h = (w * sin.abs() + h * cos.abs()).round().max(1.0);
    (new_w as u32, new_h as u32)
}

fn rotate_expanded<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    theta: f32,
    background: P,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    let (width, height) = image.dimensions();
    let (out_w, out_h) = expanded_dimensions(width, height, theta);

    let projection = Projection::translate(out_w as f32 / 2.0, out_h as f32 / 2.0)
        * Projection::rotate(theta)
        * Projection::translate(-(width as f32) / 2.0, -(height as f32) / 2.0);

    let mut out = ImageBuffer::from_pixel(out_w, out_h, background);
    warp_into(image, &projection, Interpolation::Bilinear, background, &mut out);
    out
}
