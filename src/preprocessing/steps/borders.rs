//! Border clearing
//!
//! Anything connected to the image border is treated as capture noise
//! (window chrome, neighbouring glyphs cut by the selection) and flooded with
//! the background color.
//!
//! When the document cleaner flipped polarity, the border-touching background
//! may be black instead of white. That case uses a marker color so that
//! "white" and "black" stay distinguishable while regions are being flooded:
//!
//! 1. tag: near-white pixels become [`SENTINEL`]
//! 2. fill: border regions are flooded with the background color
//! 3. detag: a black background is turned white, the rest flipped to match,
//!    and sentinel pixels take the text color
//!
//! The order matters. Between steps the image is only meaningful together
//! with the knowledge of which step ran last.

use crate::error::PreprocessError;
use crate::preprocessing::params::CleanerInvertMode;
use crate::preprocessing::raster::collapse_gray;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};

/// Marker for "was white before the fill pass"
pub const SENTINEL: Rgb<u8> = Rgb([255, 0, 0]);

/// Pixels with every channel at or above this are tagged as white
pub const NEAR_WHITE: u8 = 200;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Background color of the image entering the border clearer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    White,
    Black,
}

impl Background {
    /// The cleaner output background is black exactly when one, but not both,
    /// of the main inversion and the cleaner's one-way inversion applied
    pub fn for_polarity(inverted: bool, mode: CleanerInvertMode) -> Self {
        if inverted != mode.flips_polarity() {
            Self::Black
        } else {
            Self::White
        }
    }

    fn color(self) -> Rgb<u8> {
        match self {
            Self::White => WHITE,
            Self::Black => BLACK,
        }
    }
}

/// Counters for the flood-fill work done on one image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillStats {
    /// Number of flood-fill calls that recolored something
    pub fills: usize,
    pub pixels_filled: usize,
}

impl FillStats {
    fn record(&mut self, filled: usize) {
        if filled > 0 {
            self.fills += 1;
            self.pixels_filled += filled;
        }
    }
}

/// Clear border-connected regions when `clear` is set.
///
/// With the cleaner off, regions are flooded white. Otherwise the dual
/// polarity pass runs and its output is always dark-on-white.
pub fn apply(
    image: DynamicImage,
    clear: bool,
    inverted: bool,
    mode: CleanerInvertMode,
) -> Result<DynamicImage, PreprocessError> {
    if !clear {
        return Ok(image);
    }

    let gray = match image {
        DynamicImage::ImageLuma8(gray) => gray,
        other => {
            return Err(PreprocessError::unsupported_image(
                "clear_borders",
                format!("expected single-channel buffer, got {:?}", other.color()),
            ))
        }
    };

    let (cleared, stats) = if mode == CleanerInvertMode::Off {
        let mut gray = gray;
        let stats = clear_simple(&mut gray);
        (gray, stats)
    } else {
        let background = Background::for_polarity(inverted, mode);
        let mut rgb = DynamicImage::ImageLuma8(gray).to_rgb8();
        let stats = clear_dual(&mut rgb, background);
        (collapse_gray(&rgb), stats)
    };

    tracing::debug!(
        "Border clearing: {} fills, {} pixels recolored",
        stats.fills,
        stats.pixels_filled
    );

    Ok(DynamicImage::ImageLuma8(cleared))
}

/// Flood every non-white border region with white
pub fn clear_simple(img: &mut GrayImage) -> FillStats {
    fill_border(img, Luma([255u8]))
}

/// Tag, fill and detag in that order
pub fn clear_dual(img: &mut RgbImage, background: Background) -> FillStats {
    tag_near_white(img);
    let stats = fill_border(img, background.color());
    detag(img, background);
    stats
}

/// Mark near-white pixels with the sentinel color
pub fn tag_near_white(img: &mut RgbImage) {
    for pixel in img.pixels_mut() {
        if pixel.0.iter().all(|&c| c >= NEAR_WHITE) {
            *pixel = SENTINEL;
        }
    }
}

/// Resolve the sentinel and normalize to a white background.
///
/// On a white background only the sentinel needs resolving (to white). On a
/// black background the remaining pixels are complemented first, which turns
/// the flooded background white, and then the sentinel becomes black text.
pub fn detag(img: &mut RgbImage, background: Background) {
    if background == Background::Black {
        for pixel in img.pixels_mut() {
            if *pixel != SENTINEL {
                pixel.invert();
            }
        }
    }

    let terminal = match background {
        Background::White => WHITE,
        Background::Black => BLACK,
    };
    for pixel in img.pixels_mut() {
        if *pixel == SENTINEL {
            *pixel = terminal;
        }
    }
}

/// Visit the top and bottom rows, then the left and right columns, and flood
/// each seed that does not already hold `fill`
fn fill_border<P>(img: &mut ImageBuffer<P, Vec<P::Subpixel>>, fill: P) -> FillStats
where
    P: Pixel + PartialEq,
{
    let (width, height) = img.dimensions();
    let mut stats = FillStats::default();

    for x in 0..width {
        for seed in [(x, 0), (x, height - 1)] {
            if *img.get_pixel(seed.0, seed.1) != fill {
                stats.record(flood_fill(img, seed, fill));
            }
        }
    }
    for y in 0..height {
        for seed in [(0, y), (width - 1, y)] {
            if *img.get_pixel(seed.0, seed.1) != fill {
                stats.record(flood_fill(img, seed, fill));
            }
        }
    }

    stats
}

/// Recolor the 4-connected region of pixels equal to the seed pixel.
/// Returns the number of pixels changed.
pub fn flood_fill<P>(img: &mut ImageBuffer<P, Vec<P::Subpixel>>, seed: (u32, u32), fill: P) -> usize
where
    P: Pixel + PartialEq,
{
    let (width, height) = img.dimensions();
    let target = *img.get_pixel(seed.0, seed.1);
    if target == fill {
        return 0;
    }

    let mut filled = 0;
    let mut stack = vec![seed];

    while let Some((x, y)) = stack.pop() {
        if *img.get_pixel(x, y) != target {
            continue;
        }

        let mut left = x;
        while left > 0 && *img.get_pixel(left - 1, y) == target {
            left -= 1;
        }
        let mut right = x;
        while right + 1 < width && *img.get_pixel(right + 1, y) == target {
            right += 1;
        }

        for cx in left..=right {
            img.put_pixel(cx, y, fill);
            filled += 1;

            if y > 0 && *img.get_pixel(cx, y - 1) == target {
                stack.push((cx, y - 1));
            }
            if y + 1 < height && *img.get_pixel(cx, y + 1) == target {
                stack.push((cx, y + 1));
            }
        }
    }

    filled
}
