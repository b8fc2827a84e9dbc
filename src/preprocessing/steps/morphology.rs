use crate::error::PreprocessError;
use crate::tools::{FilterRunner, FilterTool};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

/// Largest structuring element side `Mask` can hold
const MAX_KERNEL: u32 = 511;

/// Soften stroke edges with a blur followed by a level remap that pushes
/// mid-tones back toward black and white, reconnecting broken strokes
pub fn feather<R: FilterRunner + ?Sized>(
    runner: &R,
    image: DynamicImage,
    radius: f32,
) -> Result<DynamicImage, PreprocessError> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(PreprocessError::invalid_parameter(
            "feather",
            format!("radius must be >= 0, got {}", radius),
        ));
    }
    // sub-pixel radii leave the image alone, like erosion and dilation
    if radius < 1.0 {
        return Ok(image);
    }

    let args = vec![
        "-blur".to_string(),
        format!("{}x{}", radius, runner.quantum_range()),
        "-level".to_string(),
        "50%,100%".to_string(),
        "-define".to_string(),
        "png:color-type=6".to_string(),
    ];
    runner.apply("feather", FilterTool::Feather, &image, &args)
}

/// Grayscale erosion with a `radius`x`radius` square (integer part of `radius`)
pub fn erode(image: DynamicImage, radius: f32) -> Result<DynamicImage, PreprocessError> {
    square_filter("erode", image, radius, grayscale_erode)
}

/// Grayscale dilation with a `radius`x`radius` square (integer part of `radius`)
pub fn dilate(image: DynamicImage, radius: f32) -> Result<DynamicImage, PreprocessError> {
    square_filter("dilate", image, radius, grayscale_dilate)
}

fn square_filter(
    stage: &'static str,
    image: DynamicImage,
    radius: f32,
    filter: fn(&GrayImage, &Mask) -> GrayImage,
) -> Result<DynamicImage, PreprocessError> {
    let Some(mask) = square_mask(stage, radius)? else {
        return Ok(image);
    };

    match image {
        DynamicImage::ImageLuma8(gray) => Ok(DynamicImage::ImageLuma8(filter(&gray, &mask))),
        other => Err(PreprocessError::unsupported_image(
            stage,
            format!("expected single-channel buffer, got {:?}", other.color()),
        )),
    }
}

/// Square structuring element anchored at `size / 2`, `None` when the
/// integer size is zero
fn square_mask(stage: &'static str, radius: f32) -> Result<Option<Mask>, PreprocessError> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(PreprocessError::invalid_parameter(
            stage,
            format!("radius must be >= 0, got {}", radius),
        ));
    }
    if radius >= (MAX_KERNEL + 1) as f32 {
        return Err(PreprocessError::invalid_parameter(
            stage,
            format!("radius must be below {}, got {}", MAX_KERNEL + 1, radius),
        ));
    }

    let size = radius as u32;
    if size == 0 {
        return Ok(None);
    }

    let anchor = (size / 2) as u8;
    let element = GrayImage::from_pixel(size, size, Luma([255u8]));
    Ok(Some(Mask::from_image(&element, anchor, anchor)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::test_support::FakeRunner;

    fn dot(size: u32, at: (u32, u32), value: u8, background: u8) -> GrayImage {
        let mut img = GrayImage::from_pixel(size, size, Luma([background]));
        img.put_pixel(at.0, at.1, Luma([value]));
        img
    }

    #[test]
    fn test_zero_radius_is_passthrough() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(5, 5, |x, y| Luma([(x ^ y) as u8])));
        assert_eq!(erode(img.clone(), 0.0).unwrap(), img);
        assert_eq!(dilate(img.clone(), 0.9).unwrap(), img);
    }

    #[test]
    fn test_dilate_grows_bright_dot_into_square() {
        let img = dot(9, (4, 4), 255, 0);
        let result = dilate(DynamicImage::ImageLuma8(img), 3.0).unwrap().to_luma8();

        let bright: Vec<(u32, u32)> = result
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] == 255)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(bright.len(), 9);
        assert!(bright.iter().all(|&(x, y)| (3..=5).contains(&x) && (3..=5).contains(&y)));
    }

    #[test]
    fn test_erode_grows_dark_text_stroke() {
        // on white paper erosion thickens black strokes
        let img = dot(7, (3, 3), 0, 255);
        let result = erode(DynamicImage::ImageLuma8(img), 3.0).unwrap().to_luma8();
        assert_eq!(result.get_pixel(2, 2).0[0], 0);
        assert_eq!(result.get_pixel(4, 4).0[0], 0);
        assert_eq!(result.get_pixel(1, 1).0[0], 255);
    }

    #[test]
    fn test_even_size_anchor() {
        // size 2 covers the pixel and its left/top neighbor positions
        let img = dot(5, (2, 2), 255, 0);
        let result = dilate(DynamicImage::ImageLuma8(img), 2.0).unwrap().to_luma8();
        assert_eq!(result.get_pixel(2, 2).0[0], 255);
        assert_eq!(result.get_pixel(3, 3).0[0], 255);
        assert_eq!(result.get_pixel(1, 1).0[0], 0);
    }

    #[test]
    fn test_negative_radius_is_rejected() {
        let img = DynamicImage::new_luma8(3, 3);
        let err = erode(img.clone(), -1.0).unwrap_err();
        assert!(matches!(err, PreprocessError::InvalidParameter { stage: "erode", .. }));
        assert!(dilate(img.clone(), -0.5).is_err());
        assert!(erode(img, 600.0).is_err());
    }

    #[test]
    fn test_wide_kernel_clears_small_image() {
        let img = dot(4, (1, 2), 0, 255);
        let result = dilate(DynamicImage::ImageLuma8(img), 9.0).unwrap().to_luma8();
        assert!(result.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_feather_invokes_tool_with_blur_and_level() {
        let runner = FakeRunner::new();
        let img = DynamicImage::ImageLuma8(dot(6, (2, 2), 0, 255));

        let result = feather(&runner, img.clone(), 1.5).unwrap();
        assert_eq!(result, img);

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool, FilterTool::Feather);
        assert_eq!(
            calls[0].args,
            vec!["-blur", "1.5x65535", "-level", "50%,100%", "-define", "png:color-type=6"]
        );
    }

    #[test]
    fn test_feather_sub_pixel_radius_skips_tool() {
        let runner = FakeRunner::new();
        let img = DynamicImage::new_luma8(3, 3);
        assert_eq!(feather(&runner, img.clone(), 0.0).unwrap(), img);
        assert_eq!(feather(&runner, img.clone(), 0.7).unwrap(), img);
        assert!(runner.calls().is_empty());
    }
}
