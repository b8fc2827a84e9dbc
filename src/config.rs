use crate::error::PreprocessError;
use crate::preprocessing::{CleanerInvertMode, PipelineParameters, RgbColor};
use crate::profile::Profile;
use crate::tools::{ToolPrograms, DEFAULT_QUANTUM_RANGE};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "screen-ocr-prep")]
#[command(about = "Prepare a screen capture for OCR")]
#[command(version)]
pub struct Args {
    /// Captured image to process
    #[arg(long, short, env = "PREP_INPUT")]
    pub input: PathBuf,

    /// Where to write the processed image
    #[arg(long, short, env = "PREP_OUTPUT", default_value = "current_image.png")]
    pub output: PathBuf,

    /// Profile (.ini) to read parameters from; flags below override it
    #[arg(long, env = "PREP_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Write the effective parameters to this profile after a successful run
    #[arg(long)]
    pub save_profile: Option<PathBuf>,

    /// Rotation in degrees, positive turns the content clockwise
    #[arg(long, allow_negative_numbers = true)]
    pub rotation: Option<f32>,

    /// Scale factor (1.0 keeps the size)
    #[arg(long, allow_negative_numbers = true)]
    pub resize: Option<f32>,

    /// Global threshold cutoff (0-255)
    #[arg(long)]
    pub threshold: Option<u8>,

    /// Adaptive threshold window; 0 or 1 uses the global cutoff
    #[arg(long)]
    pub adaptive_filter_size: Option<u32>,

    /// Invert colors after grayscale conversion
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub invert: Option<bool>,

    /// Flood-fill regions touching the image border to background
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub clear_borders: Option<bool>,

    /// Replace the image with its difference from this color (#rrggbb)
    #[arg(long)]
    pub reference_color: Option<RgbColor>,

    /// Document cleaner filter size; 0 skips the cleaner
    #[arg(long, allow_negative_numbers = true)]
    pub cleaner_filter_size: Option<f32>,

    /// Document cleaner polarity: 0 off, 1 same, 2 inverted
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub cleaner_inverted_mode: Option<u8>,

    #[arg(long, allow_negative_numbers = true)]
    pub feathering: Option<f32>,

    #[arg(long, allow_negative_numbers = true)]
    pub erosion: Option<f32>,

    #[arg(long, allow_negative_numbers = true)]
    pub dilation: Option<f32>,

    #[arg(long, allow_negative_numbers = true)]
    pub isonoise: Option<f32>,

    #[arg(long, env = "PREP_TEXTCLEANER", default_value = "textcleaner")]
    pub textcleaner: PathBuf,

    #[arg(long, env = "PREP_ISONOISE", default_value = "isonoise")]
    pub isonoise_bin: PathBuf,

    #[arg(long, env = "PREP_NOISECLEANER", default_value = "noisecleaner")]
    pub noisecleaner: PathBuf,

    /// ImageMagick `convert` used for feathering
    #[arg(long, env = "PREP_MAGICK", default_value = "convert")]
    pub magick: PathBuf,

    /// Quantum range of the ImageMagick build (65535 for Q16)
    #[arg(long, env = "PREP_QUANTUM_RANGE", default_value_t = DEFAULT_QUANTUM_RANGE)]
    pub quantum_range: u32,

    /// Keep tool hand-off files here instead of a temporary directory
    #[arg(long, env = "PREP_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Print the executed stages and timings as JSON
    #[arg(long)]
    pub report: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Parameter values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub rotation: Option<f32>,
    pub resize: Option<f32>,
    pub threshold: Option<u8>,
    pub adaptive_filter_size: Option<u32>,
    pub invert: Option<bool>,
    pub clear_borders: Option<bool>,
    pub reference_color: Option<RgbColor>,
    pub cleaner_filter_size: Option<f32>,
    pub cleaner_inverted_mode: Option<CleanerInvertMode>,
    pub feathering: Option<f32>,
    pub erosion: Option<f32>,
    pub dilation: Option<f32>,
    pub isonoise: Option<f32>,
}

impl Overrides {
    pub fn apply(&self, params: &mut PipelineParameters) {
        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }

        set(&mut params.rotation_degrees, &self.rotation);
        set(&mut params.resize_factor, &self.resize);
        set(&mut params.threshold_value, &self.threshold);
        set(&mut params.adaptive_filter_size, &self.adaptive_filter_size);
        set(&mut params.invert_colors, &self.invert);
        set(&mut params.clear_borders, &self.clear_borders);
        set(&mut params.cleaner_filter_size, &self.cleaner_filter_size);
        set(&mut params.cleaner_inverted_mode, &self.cleaner_inverted_mode);
        set(&mut params.feathering_radius, &self.feathering);
        set(&mut params.erosion_radius, &self.erosion);
        set(&mut params.dilation_radius, &self.dilation);
        set(&mut params.isonoise_radius, &self.isonoise);

        // Picking a color is what turns the difference stage on
        if let Some(color) = self.reference_color {
            params.reference_color = Some(color);
            params.color_diff_enabled = true;
        }
    }
}

/// Run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub output: PathBuf,
    pub profile: Option<PathBuf>,
    pub save_profile: Option<PathBuf>,
    pub overrides: Overrides,
    pub programs: ToolPrograms,
    pub quantum_range: u32,
    pub work_dir: Option<PathBuf>,
    pub report: bool,
}

impl Config {
    /// Profile contents (or defaults) with command-line overrides applied
    pub fn profile(&self) -> Result<Profile, PreprocessError> {
        let mut profile = match &self.profile {
            Some(path) => Profile::load(path)?,
            None => Profile::default(),
        };
        self.overrides.apply(&mut profile.params);
        Ok(profile)
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            input: args.input,
            output: args.output,
            profile: args.profile,
            save_profile: args.save_profile,
            overrides: Overrides {
                rotation: args.rotation,
                resize: args.resize,
                threshold: args.threshold,
                adaptive_filter_size: args.adaptive_filter_size,
                invert: args.invert,
                clear_borders: args.clear_borders,
                reference_color: args.reference_color,
                cleaner_filter_size: args.cleaner_filter_size,
                cleaner_inverted_mode: args
                    .cleaner_inverted_mode
                    .and_then(CleanerInvertMode::from_code),
                feathering: args.feathering,
                erosion: args.erosion,
                dilation: args.dilation,
                isonoise: args.isonoise,
            },
            programs: ToolPrograms {
                textcleaner: args.textcleaner,
                isonoise: args.isonoise_bin,
                noisecleaner: args.noisecleaner,
                magick: args.magick,
            },
            quantum_range: args.quantum_range,
            work_dir: args.work_dir,
            report: args.report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config(argv: &[&str]) -> Config {
        let mut full = vec!["screen-ocr-prep", "--input", "capture.png"];
        full.extend_from_slice(argv);
        Config::from(Args::try_parse_from(full).unwrap())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.output, PathBuf::from("current_image.png"));
        assert_eq!(config.quantum_range, 65535);
        assert_eq!(config.programs.magick, PathBuf::from("convert"));
        assert_eq!(config.profile().unwrap().params, PipelineParameters::default());
    }

    #[test]
    fn test_overrides_on_top_of_profile() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jp.ini");
        fs::write(&path, "[settings]\ntreshold_factor = 90\nerosion_factor = 2\nlang = jpn\n").unwrap();

        let config = config(&[
            "--profile",
            path.to_str().unwrap(),
            "--erosion",
            "1",
            "--rotation",
            "-2.5",
            "--clear-borders",
            "--reference-color",
            "#102030",
            "--cleaner-inverted-mode",
            "2",
        ]);
        let profile = config.profile().unwrap();
        let p = &profile.params;

        assert_eq!(p.threshold_value, 90);
        assert_eq!(p.erosion_radius, 1.0);
        assert_eq!(p.rotation_degrees, -2.5);
        assert!(p.clear_borders);
        assert!(p.color_diff_enabled);
        assert_eq!(p.reference_color, Some(RgbColor([0x10, 0x20, 0x30])));
        assert_eq!(p.cleaner_inverted_mode, CleanerInvertMode::InvertedPolarity);
        assert_eq!(profile.extra.get("lang").map(String::as_str), Some("jpn"));
    }

    #[test]
    fn test_explicit_false_flag() {
        let config = config(&["--invert", "false"]);
        assert_eq!(config.overrides.invert, Some(false));
    }

    #[test]
    fn test_out_of_range_mode_is_rejected() {
        let argv = ["screen-ocr-prep", "--input", "a.png", "--cleaner-inverted-mode", "3"];
        assert!(Args::try_parse_from(argv).is_err());
    }
}
