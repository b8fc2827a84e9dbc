//! Channel reduction and value remapping: color difference, grayscale, invert

use crate::error::PreprocessError;
use crate::preprocessing::params::RgbColor;
use image::{DynamicImage, Rgb, RgbImage};

/// Replace the image with its per-channel distance from `reference`.
///
/// Pixels close to the reference color go dark, which lets a text color
/// picked from the capture be isolated before grayscale conversion.
/// No-op unless enabled with a reference color set.
pub fn difference(
    image: DynamicImage,
    enabled: bool,
    reference: Option<RgbColor>,
) -> Result<DynamicImage, PreprocessError> {
    let Some(RgbColor(reference)) = reference.filter(|_| enabled) else {
        return Ok(image);
    };

    let rgb = match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        DynamicImage::ImageLuma8(_) => image.to_rgb8(),
        other => {
            return Err(PreprocessError::unsupported_image(
                "color_difference",
                format!("expected gray or RGB buffer, got {:?}", other.color()),
            ))
        }
    };

    let diff = RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let px = rgb.get_pixel(x, y).0;
        Rgb([
            px[0].abs_diff(reference[0]),
            px[1].abs_diff(reference[1]),
            px[2].abs_diff(reference[2]),
        ])
    });

    Ok(DynamicImage::ImageRgb8(diff))
}

/// Convert to single-channel luminance; gray input passes through untouched
pub fn grayscale(image: DynamicImage) -> Result<DynamicImage, PreprocessError> {
    match image {
        DynamicImage::ImageLuma8(_) => Ok(image),
        DynamicImage::ImageRgb8(_) => Ok(DynamicImage::ImageLuma8(image.to_luma8())),
        other => Err(PreprocessError::unsupported_image(
            "grayscale",
            format!("expected gray or RGB buffer, got {:?}", other.color()),
        )),
    }
}

/// Bitwise complement of every sample when enabled
pub fn invert(mut image: DynamicImage, enabled: bool) -> Result<DynamicImage, PreprocessError> {
    if !enabled {
        return Ok(image);
    }

    match &mut image {
        DynamicImage::ImageLuma8(gray) => gray.iter_mut().for_each(|v| *v = !*v),
        DynamicImage::ImageRgb8(rgb) => rgb.iter_mut().for_each(|v| *v = !*v),
        other => {
            return Err(PreprocessError::unsupported_image(
                "invert",
                format!("expected gray or RGB buffer, got {:?}", other.color()),
            ))
        }
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_difference_against_reference() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([200, 10, 10]));
        img.put_pixel(1, 1, Rgb([20, 200, 30]));

        let result = difference(
            DynamicImage::ImageRgb8(img),
            true,
            Some(RgbColor([200, 10, 10])),
        )
        .unwrap()
        .to_rgb8();

        assert_eq!(result.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(result.get_pixel(1, 1).0, [180, 190, 20]);
    }

    #[test]
    fn test_difference_disabled_or_missing_color_is_noop() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 3, Rgb([1, 2, 3])));
        let color = Some(RgbColor([9, 9, 9]));
        assert_eq!(difference(img.clone(), false, color).unwrap(), img);
        assert_eq!(difference(img.clone(), true, None).unwrap(), img);
    }

    #[test]
    fn test_grayscale_reduces_channels() {
        let img = RgbImage::from_pixel(5, 3, Rgb([255, 255, 255]));
        let result = grayscale(DynamicImage::ImageRgb8(img)).unwrap();
        assert!(matches!(result, DynamicImage::ImageLuma8(_)));
        assert_eq!(result.to_luma8().get_pixel(0, 0).0[0], 255);
        assert_eq!((result.width(), result.height()), (5, 3));
    }

    #[test]
    fn test_grayscale_accepts_gray_input() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(4, 4, |x, _| Luma([x as u8 * 9])));
        assert_eq!(grayscale(img.clone()).unwrap(), img);
    }

    #[test]
    fn test_invert_is_involution() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(16, 16, |x, y| {
            Luma([(x * 16 + y) as u8])
        }));
        let once = invert(img.clone(), true).unwrap();
        assert_ne!(once, img);
        assert_eq!(once.to_luma8().get_pixel(0, 0).0[0], 255);
        assert_eq!(invert(once, true).unwrap(), img);
    }

    #[test]
    fn test_invert_disabled_is_identity() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([5, 6, 7])));
        assert_eq!(invert(img.clone(), false).unwrap(), img);
    }
}
