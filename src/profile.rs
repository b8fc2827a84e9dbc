//! Named parameter sets stored as flat key-value files
//!
//! A profile is an INI-style file with a `[settings]` section:
//!
//! ```text
//! [settings]
//! rotation_factor = -3
//! treshold_factor = 140
//! invert_colors = True
//! lang = jpn
//! ```
//!
//! Keys the pipeline does not use (OCR language, page segmentation mode, ...)
//! are kept verbatim and written back on save.

use crate::error::PreprocessError;
use crate::preprocessing::{CleanerInvertMode, PipelineParameters, RgbColor};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SECTION: &str = "settings";
const STAGE: &str = "profile";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub params: PipelineParameters,
    /// Settings owned by other components, preserved as-is
    pub extra: BTreeMap<String, String>,
}

impl Profile {
    pub fn from_parameters(params: PipelineParameters) -> Self {
        Self {
            params,
            extra: BTreeMap::new(),
        }
    }

    pub fn parameters(&self) -> PipelineParameters {
        self.params.clone()
    }

    pub fn load(path: &Path) -> Result<Self, PreprocessError> {
        let text = fs::read_to_string(path)?;
        let profile = Self::parse(&text)?;
        tracing::debug!(
            "Loaded profile {} ({} extra keys)",
            path.display(),
            profile.extra.len()
        );
        Ok(profile)
    }

    pub fn save(&self, path: &Path) -> Result<(), PreprocessError> {
        fs::write(path, self.to_ini_string())?;
        Ok(())
    }

    pub fn parse(text: &str) -> Result<Self, PreprocessError> {
        let mut profile = Self::default();
        let mut in_settings = true;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                in_settings = name.trim().eq_ignore_ascii_case(SECTION);
                continue;
            }

            let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) else {
                return Err(PreprocessError::invalid_parameter(
                    STAGE,
                    format!("line {}: expected 'key = value', got '{}'", index + 1, line),
                ));
            };

            if in_settings {
                profile.set(key.trim(), value.trim())?;
            }
        }

        Ok(profile)
    }

    /// Apply one setting; unknown keys go to `extra`
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), PreprocessError> {
        let p = &mut self.params;
        match key.to_ascii_lowercase().as_str() {
            "rotation_factor" | "rotation_degrees" => p.rotation_degrees = number(key, value)?,
            "resizing_factor" | "resize_factor" => p.resize_factor = number(key, value)?,
            "treshold_factor" | "threshold_value" => p.threshold_value = byte(key, value)?,
            "adaptive_filter_size" => p.adaptive_filter_size = count(key, value)?,
            "filter_size" | "clean_filter_factor" | "cleaner_filter_size" => {
                p.cleaner_filter_size = number(key, value)?
            }
            "invert_colors" => p.invert_colors = boolean(key, value)?,
            "clear_borders" => p.clear_borders = boolean(key, value)?,
            "color_diff_enabled" => p.color_diff_enabled = boolean(key, value)?,
            "color_selection" | "reference_color" => {
                p.reference_color = if value.is_empty() {
                    None
                } else {
                    Some(value.parse::<RgbColor>()?)
                }
            }
            "cleaner_inverted_mod" | "cleaner_inverted_mode" => {
                let code = byte(key, value)?;
                p.cleaner_inverted_mode = CleanerInvertMode::from_code(code).ok_or_else(|| {
                    PreprocessError::invalid_parameter(
                        STAGE,
                        format!("{}: expected 0, 1 or 2, got {}", key, code),
                    )
                })?
            }
            "feathering_factor" | "feathering_radius" => p.feathering_radius = number(key, value)?,
            "erosion_factor" | "erosion_radius" => p.erosion_radius = number(key, value)?,
            "dilation_factor" | "dilation_radius" => p.dilation_radius = number(key, value)?,
            "isonoise" | "isonoise_radius" => p.isonoise_radius = number(key, value)?,
            _ => {
                self.extra.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    pub fn to_ini_string(&self) -> String {
        let p = &self.params;
        let color = p.reference_color.map(|c| c.to_string()).unwrap_or_default();

        let entries: [(&str, String); 14] = [
            ("rotation_factor", p.rotation_degrees.to_string()),
            ("resizing_factor", p.resize_factor.to_string()),
            ("treshold_factor", p.threshold_value.to_string()),
            ("adaptive_filter_size", p.adaptive_filter_size.to_string()),
            ("filter_size", p.cleaner_filter_size.to_string()),
            ("invert_colors", python_bool(p.invert_colors).to_string()),
            ("clear_borders", python_bool(p.clear_borders).to_string()),
            ("color_diff_enabled", python_bool(p.color_diff_enabled).to_string()),
            ("color_selection", color),
            ("cleaner_inverted_mod", p.cleaner_inverted_mode.code().to_string()),
            ("feathering_factor", p.feathering_radius.to_string()),
            ("erosion_factor", p.erosion_radius.to_string()),
            ("dilation_factor", p.dilation_radius.to_string()),
            ("isonoise", p.isonoise_radius.to_string()),
        ];

        let mut out = format!("[{}]\n", SECTION);
        let extras = self.extra.iter().map(|(k, v)| (k.as_str(), v.clone()));
        for (key, value) in entries.into_iter().chain(extras) {
            out.push_str(&format!("{} = {}\n", key, value));
        }
        out
    }
}

/// All `*.ini` profiles in `dir`, sorted by path
pub fn list_profiles(dir: &Path) -> Result<Vec<PathBuf>, PreprocessError> {
    let mut profiles: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("ini"))
        .collect();
    profiles.sort();
    Ok(profiles)
}

fn python_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn invalid(key: &str, value: &str, expected: &str) -> PreprocessError {
    PreprocessError::invalid_parameter(
        STAGE,
        format!("{}: expected {}, got '{}'", key, expected, value),
    )
}

fn number<T: FromStr>(key: &str, value: &str) -> Result<T, PreprocessError> {
    value.parse().map_err(|_| invalid(key, value, "a number"))
}

/// Integer setting in 0..=255; sliders may have stored it as "127.0"
fn byte(key: &str, value: &str) -> Result<u8, PreprocessError> {
    let n: f32 = number(key, value)?;
    if !(0.0..=255.0).contains(&n) {
        return Err(invalid(key, value, "a value in 0..=255"));
    }
    Ok(n.round() as u8)
}

fn count(key: &str, value: &str) -> Result<u32, PreprocessError> {
    let n: f64 = number(key, value)?;
    if !(0.0..=u32::MAX as f64).contains(&n) {
        return Err(invalid(key, value, "a non-negative integer"));
    }
    Ok(n.round() as u32)
}

fn boolean(key: &str, value: &str) -> Result<bool, PreprocessError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "True or False")),
    }
}
