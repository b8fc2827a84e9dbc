//! Stages delegated to the external document filters

use crate::error::PreprocessError;
use crate::preprocessing::params::CleanerInvertMode;
use crate::tools::{FilterRunner, FilterTool};
use image::DynamicImage;

/// Offset handed to the text cleaner's local thresholding
const CLEANER_OFFSET: u32 = 10;

/// Run the scanned-text cleaner with the given filter size.
///
/// `mode` maps onto the cleaner's own inversion switch: one-way inversion
/// leaves the output polarity flipped, two-way inversion restores it.
pub fn clean_text<R: FilterRunner + ?Sized>(
    runner: &R,
    image: DynamicImage,
    mode: CleanerInvertMode,
    filter_size: f32,
) -> Result<DynamicImage, PreprocessError> {
    let filter_size = checked_size("clean_text", "filter size", filter_size)?;
    if filter_size == 0 {
        return Ok(image);
    }

    let args = cleaner_args(mode, filter_size);
    runner.apply("clean_text", FilterTool::TextCleaner, &image, &args)
}

/// Isolated-noise removal chained with the general noise cleaner.
///
/// `stage` names the pass ("first_filter" or "second_filter") so each pass
/// gets its own hand-off files and errors point at the right place.
pub fn denoise<R: FilterRunner + ?Sized>(
    runner: &R,
    stage: &'static str,
    image: DynamicImage,
    radius: f32,
) -> Result<DynamicImage, PreprocessError> {
    let radius = checked_size(stage, "isonoise radius", radius)?;
    if radius == 0 {
        return Ok(image);
    }

    let isolated = runner.apply(
        stage,
        FilterTool::IsoNoise,
        &image,
        &["-r".to_string(), radius.to_string()],
    )?;
    runner.apply(stage, FilterTool::NoiseCleaner, &isolated, &[])
}

pub fn cleaner_args(mode: CleanerInvertMode, filter_size: u32) -> Vec<String> {
    let mut args: Vec<String> = ["-g", "-e", "normalize", "-f"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.push(filter_size.to_string());
    args.push("-o".to_string());
    args.push(CLEANER_OFFSET.to_string());

    match mode {
        CleanerInvertMode::Off => {}
        CleanerInvertMode::SamePolarity => args.extend(["-i".to_string(), "2".to_string()]),
        CleanerInvertMode::InvertedPolarity => args.extend(["-i".to_string(), "1".to_string()]),
    }

    args
}

/// Validate a real-valued size and round it to the integer the tools accept.
/// Positive sizes never round down to zero.
fn checked_size(stage: &'static str, what: &str, value: f32) -> Result<u32, PreprocessError> {
    if !value.is_finite() || value < 0.0 {
        return Err(PreprocessError::invalid_parameter(
            stage,
            format!("{} must be >= 0, got {}", what, value),
        ));
    }
    if value == 0.0 {
        return Ok(0);
    }
    Ok((value.round() as u32).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::test_support::FakeRunner;
    use image::{GrayImage, Luma};

    fn sample() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(8, 8, |x, y| Luma([(x * 30 + y) as u8])))
    }

    #[test]
    fn test_zero_filter_size_skips_cleaner() {
        let runner = FakeRunner::new();
        let img = sample();
        assert_eq!(clean_text(&runner, img.clone(), CleanerInvertMode::Off, 0.0).unwrap(), img);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_cleaner_receives_mode_flag() {
        let runner = FakeRunner::new();
        clean_text(&runner, sample(), CleanerInvertMode::InvertedPolarity, 14.6).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool, FilterTool::TextCleaner);
        assert_eq!(calls[0].args, cleaner_args(CleanerInvertMode::InvertedPolarity, 15));
        assert!(calls[0].args.ends_with(&["-i".to_string(), "1".to_string()]));
    }

    #[test]
    fn test_cleaner_args_without_inversion() {
        let args = cleaner_args(CleanerInvertMode::Off, 3);
        assert_eq!(args, vec!["-g", "-e", "normalize", "-f", "3", "-o", "10"]);
    }

    #[test]
    fn test_denoise_chains_two_tools() {
        let runner = FakeRunner::new();
        denoise(&runner, "first_filter", sample(), 0.4).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tool, FilterTool::IsoNoise);
        assert_eq!(calls[0].args, vec!["-r", "1"]);
        assert_eq!(calls[1].tool, FilterTool::NoiseCleaner);
        assert!(calls.iter().all(|c| c.stage == "first_filter"));
    }

    #[test]
    fn test_negative_radius_is_rejected() {
        let runner = FakeRunner::new();
        let err = denoise(&runner, "second_filter", sample(), -1.0).unwrap_err();
        assert_eq!(err.stage(), Some("second_filter"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_tool_failure_propagates() {
        let runner = FakeRunner::failing(FilterTool::TextCleaner);
        let err = clean_text(&runner, sample(), CleanerInvertMode::Off, 5.0).unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::ExternalToolFailure { stage: "clean_text", .. }
        ));
    }
}
