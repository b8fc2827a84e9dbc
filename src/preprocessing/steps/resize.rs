use crate::error::PreprocessError;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageBuffer, Pixel};

/// Scale the image by `factor`.
///
/// Enlarging uses Lanczos3; shrinking averages the covered source area so
/// thin strokes fade instead of disappearing. A factor of exactly 1 returns
/// the input untouched.
pub fn apply(image: DynamicImage, factor: f32) -> Result<DynamicImage, PreprocessError> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(PreprocessError::invalid_parameter(
            "resize",
            format!("factor must be > 0, got {}", factor),
        ));
    }

    if factor == 1.0 {
        return Ok(image);
    }

    let (width, height) = image.dimensions();
    let new_width = ((width as f32 * factor) as u32).max(1);
    let new_height = ((height as f32 * factor) as u32).max(1);

    if (new_width, new_height) == (width, height) {
        return Ok(image);
    }

    if factor > 1.0 {
        return Ok(image.resize_exact(new_width, new_height, FilterType::Lanczos3));
    }

    match image {
        DynamicImage::ImageLuma8(gray) => Ok(DynamicImage::ImageLuma8(area_average(
            &gray, new_width, new_height,
        ))),
        DynamicImage::ImageRgb8(rgb) => Ok(DynamicImage::ImageRgb8(area_average(
            &rgb, new_width, new_height,
        ))),
        other => Err(PreprocessError::unsupported_image(
            "resize",
            format!("expected gray or RGB buffer, got {:?}", other.color()),
        )),
    }
}

/// For each destination index along one axis, the source indices it covers
/// and the fraction of each one that falls inside it
fn coverage(src_len: u32, dst_len: u32) -> Vec<Vec<(u32, f32)>> {
    let scale = src_len as f64 / dst_len as f64;

    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = (start + scale).min(src_len as f64);
            let mut spans = Vec::new();
            let mut s = start.floor() as u32;
            while (s as f64) < end && s < src_len {
                let lo = start.max(s as f64);
                let hi = end.min(s as f64 + 1.0);
                let weight = (hi - lo) / scale;
                if weight > 1e-9 {
                    spans.push((s, weight as f32));
                }
                s += 1;
            }
            spans
        })
        .collect()
}

fn area_average<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    new_width: u32,
    new_height: u32,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let channels = P::CHANNEL_COUNT as usize;
    let cols = coverage(image.width(), new_width);
    let rows = coverage(image.height(), new_height);

    let mut out: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(new_width, new_height);
    let mut acc = vec![0f32; channels];

    for (y, row_spans) in rows.iter().enumerate() {
        for (x, col_spans) in cols.iter().enumerate() {
            acc.iter_mut().for_each(|a| *a = 0.0);
            for &(sy, wy) in row_spans {
                for &(sx, wx) in col_spans {
                    let src = image.get_pixel(sx, sy).channels();
                    for (a, &v) in acc.iter_mut().zip(src) {
                        *a += v as f32 * wx * wy;
                    }
                }
            }

            let dst = out.get_pixel_mut(x as u32, y as u32).channels_mut();
            for (d, a) in dst.iter_mut().zip(&acc) {
                *d = a.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage};

    #[test]
    fn test_identity_factor_is_exact() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(7, 5, |x, y| Luma([(x * y) as u8])));
        assert_eq!(apply(img.clone(), 1.0).unwrap(), img);
    }

    #[test]
    fn test_enlarge_keeps_channel_layout() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(10, 8));
        let result = apply(img, 2.5).unwrap();
        assert_eq!((result.width(), result.height()), (25, 20));
        assert!(matches!(result, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_shrink_averages_area() {
        // 2x2 blocks of 0 and 255 collapse to their mean
        let img = GrayImage::from_fn(4, 2, |x, _| if x < 2 { Luma([0]) } else { Luma([255]) });
        let result = apply(DynamicImage::ImageLuma8(img), 0.5).unwrap().to_luma8();
        assert_eq!(result.dimensions(), (2, 1));
        assert_eq!(result.get_pixel(0, 0).0[0], 0);
        assert_eq!(result.get_pixel(1, 0).0[0], 255);

        let stripes = GrayImage::from_fn(4, 4, |x, _| Luma([if x % 2 == 0 { 0 } else { 200 }]));
        let result = apply(DynamicImage::ImageLuma8(stripes), 0.5).unwrap().to_luma8();
        assert!(result.pixels().all(|p| p.0[0] == 100));
    }

    #[test]
    fn test_shrink_with_fractional_scale_preserves_uniform_color() {
        let img = GrayImage::from_pixel(10, 10, Luma([77]));
        let result = apply(DynamicImage::ImageLuma8(img), 0.3).unwrap().to_luma8();
        assert_eq!(result.dimensions(), (3, 3));
        assert!(result.pixels().all(|p| p.0[0] == 77));
    }

    #[test]
    fn test_rejects_non_positive_factor() {
        let img = DynamicImage::new_luma8(4, 4);
        for factor in [0.0, -1.0, f32::NAN] {
            let err = apply(img.clone(), factor).unwrap_err();
            assert!(matches!(err, PreprocessError::InvalidParameter { stage: "resize", .. }));
        }
    }
}
