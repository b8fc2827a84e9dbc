use crate::error::PreprocessError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the document cleaner treats polarity relative to its input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanerInvertMode {
    /// Cleaner runs without any inversion flag
    #[default]
    Off,
    /// Cleaner inverts its input and inverts the result back
    SamePolarity,
    /// Cleaner inverts its input only, so the result has flipped polarity
    InvertedPolarity,
}

impl CleanerInvertMode {
    /// Parse the numeric profile value (0, 1, 2)
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            1 => Some(Self::SamePolarity),
            2 => Some(Self::InvertedPolarity),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Off => 0,
            Self::SamePolarity => 1,
            Self::InvertedPolarity => 2,
        }
    }

    /// True when the cleaner output is polarity-flipped relative to its input
    pub fn flips_polarity(&self) -> bool {
        *self == Self::InvertedPolarity
    }
}

/// An RGB reference color, written as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RgbColor(pub [u8; 3]);

impl FromStr for RgbColor {
    type Err = PreprocessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || {
            PreprocessError::invalid_parameter("color_difference", format!("invalid color '{}'", s))
        };

        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }

        let mut rgb = [0u8; 3];
        for (i, channel) in rgb.iter_mut().enumerate() {
            *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(rgb))
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl TryFrom<String> for RgbColor {
    type Error = PreprocessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RgbColor> for String {
    fn from(color: RgbColor) -> Self {
        color.to_string()
    }
}

/// Every setting the preprocessing pipeline reads.
///
/// A value of 0 for an optional stage means the stage is skipped and the
/// buffer passes through untouched. `resize_factor` of 1.0 is likewise a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParameters {
    /// User-facing rotation in degrees; positive turns the content clockwise
    pub rotation_degrees: f32,
    pub resize_factor: f32,
    /// Global cutoff used when adaptive thresholding is disabled
    pub threshold_value: u8,
    /// Neighborhood size for adaptive thresholding, values <= 1 select the fixed cutoff
    pub adaptive_filter_size: u32,
    /// Filter size handed to the document cleaner, 0 skips the cleaner
    pub cleaner_filter_size: f32,
    pub invert_colors: bool,
    pub clear_borders: bool,
    pub color_diff_enabled: bool,
    pub reference_color: Option<RgbColor>,
    pub cleaner_inverted_mode: CleanerInvertMode,
    pub feathering_radius: f32,
    pub erosion_radius: f32,
    pub dilation_radius: f32,
    pub isonoise_radius: f32,
}

impl Default for PipelineParameters {
    fn default() -> Self {
        Self {
            rotation_degrees: 0.0,
            resize_factor: 1.0,
            threshold_value: 127,
            adaptive_filter_size: 0,
            cleaner_filter_size: 0.0,
            invert_colors: false,
            clear_borders: false,
            color_diff_enabled: false,
            reference_color: None,
            cleaner_inverted_mode: CleanerInvertMode::Off,
            feathering_radius: 0.0,
            erosion_radius: 0.0,
            dilation_radius: 0.0,
            isonoise_radius: 0.0,
        }
    }
}

impl PipelineParameters {
    /// Rotation folded into (-180, 180] so repeated edits do not drift
    pub fn normalized_rotation(&self) -> f32 {
        normalize_degrees(self.rotation_degrees)
    }

    /// Cleaner polarity as seen by later stages; a skipped cleaner flips nothing
    pub fn effective_cleaner_mode(&self) -> CleanerInvertMode {
        if self.cleaner_filter_size == 0.0 {
            CleanerInvertMode::Off
        } else {
            self.cleaner_inverted_mode
        }
    }
}

pub fn normalize_degrees(degrees: f32) -> f32 {
    let folded = degrees.rem_euclid(360.0);
    if folded > 180.0 {
        folded - 360.0
    } else {
        folded
    }
}
