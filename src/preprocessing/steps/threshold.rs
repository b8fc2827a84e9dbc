use crate::error::PreprocessError;
use image::{DynamicImage, GrayImage, Luma};

/// Offset subtracted from the local mean in adaptive mode
const ADAPTIVE_OFFSET: f64 = 2.0;

/// Binarize the image.
///
/// With `adaptive_filter_size > 1` each pixel is compared against the mean of
/// its neighborhood (size forced odd, at least 3) minus a small offset.
/// Otherwise pixels at or above `fixed_value` become white and the rest black.
pub fn apply(
    image: DynamicImage,
    fixed_value: u8,
    adaptive_filter_size: u32,
) -> Result<DynamicImage, PreprocessError> {
    let gray = match image {
        DynamicImage::ImageLuma8(gray) => gray,
        other => {
            return Err(PreprocessError::unsupported_image(
                "threshold",
                format!("expected single-channel buffer, got {:?}", other.color()),
            ))
        }
    };

    let binarized = if adaptive_filter_size > 1 {
        adaptive_mean_threshold(&gray, odd_window(adaptive_filter_size))
    } else {
        fixed_threshold(&gray, fixed_value)
    };

    Ok(DynamicImage::ImageLuma8(binarized))
}

/// Round even window sizes up to the next odd value, never below 3
pub fn odd_window(size: u32) -> u32 {
    let size = size.max(3);
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

fn fixed_threshold(img: &GrayImage, cutoff: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y).0[0] >= cutoff {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Local mean thresholding over a `window_size` square, clipped at the borders
fn adaptive_mean_threshold(img: &GrayImage, window_size: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    let half_window = window_size as i32 / 2;

    let integral = compute_integral_image(img);

    GrayImage::from_fn(width, height, |x, y| {
        let x1 = (x as i32 - half_window).max(0) as u32;
        let y1 = (y as i32 - half_window).max(0) as u32;
        let x2 = (x as i32 + half_window).min(width as i32 - 1) as u32;
        let y2 = (y as i32 + half_window).min(height as i32 - 1) as u32;

        let mean = window_mean(&integral, x1, y1, x2, y2);
        let pixel = img.get_pixel(x, y).0[0] as f64;

        if pixel > mean.round() - ADAPTIVE_OFFSET {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Summed-area table with a zero row and column in front
fn compute_integral_image(img: &GrayImage) -> Vec<Vec<f64>> {
    let (width, height) = img.dimensions();
    let mut integral = vec![vec![0.0f64; width as usize + 1]; height as usize + 1];

    for y in 0..height as usize {
        for x in 0..width as usize {
            let val = img.get_pixel(x as u32, y as u32).0[0] as f64;
            integral[y + 1][x + 1] = val + integral[y][x + 1] + integral[y + 1][x] - integral[y][x];
        }
    }

    integral
}

fn window_mean(integral: &[Vec<f64>], x1: u32, y1: u32, x2: u32, y2: u32) -> f64 {
    let (x1, y1, x2, y2) = (x1 as usize, y1 as usize, x2 as usize + 1, y2 as usize + 1);
    let area = ((x2 - x1) * (y2 - y1)) as f64;
    let sum = integral[y2][x2] - integral[y1][x2] - integral[y2][x1] + integral[y1][x1];
    sum / area
}
