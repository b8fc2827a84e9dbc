use crate::error::PreprocessError;
use crate::tools::FilterRunner;
use image::DynamicImage;
use serde::Serialize;
use std::time::Instant;

use super::params::PipelineParameters;
use super::steps;

/// Pipeline stages in execution order.
///
/// `FirstFilter` and `SecondFilter` are the two isonoise passes; the second
/// filter group is `SecondFilter`, `Feather`, `Erode` and `Dilate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Rotate,
    Resize,
    ColorDifference,
    Grayscale,
    Invert,
    CleanText,
    Threshold,
    FirstFilter,
    ClearBorders,
    SecondFilter,
    Feather,
    Erode,
    Dilate,
}

impl Stage {
    pub const ORDER: [Stage; 13] = [
        Stage::Rotate,
        Stage::Resize,
        Stage::ColorDifference,
        Stage::Grayscale,
        Stage::Invert,
        Stage::CleanText,
        Stage::Threshold,
        Stage::FirstFilter,
        Stage::ClearBorders,
        Stage::SecondFilter,
        Stage::Feather,
        Stage::Erode,
        Stage::Dilate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rotate => "rotate",
            Self::Resize => "resize",
            Self::ColorDifference => "color_difference",
            Self::Grayscale => "grayscale",
            Self::Invert => "invert",
            Self::CleanText => "clean_text",
            Self::Threshold => "threshold",
            Self::FirstFilter => "first_filter",
            Self::ClearBorders => "clear_borders",
            Self::SecondFilter => "second_filter",
            Self::Feather => "feather",
            Self::Erode => "erode",
            Self::Dilate => "dilate",
        }
    }

    /// Whether `params` ask this stage to do anything.
    ///
    /// Out-of-domain values count as enabled so the stage gets to reject them.
    pub fn is_enabled(&self, params: &PipelineParameters) -> bool {
        match self {
            Self::Rotate => params.normalized_rotation() != 0.0,
            Self::Resize => params.resize_factor != 1.0,
            Self::ColorDifference => {
                params.color_diff_enabled && params.reference_color.is_some()
            }
            Self::Grayscale | Self::Threshold => true,
            Self::Invert => params.invert_colors,
            Self::CleanText => params.cleaner_filter_size != 0.0,
            Self::FirstFilter | Self::SecondFilter => params.isonoise_radius != 0.0,
            Self::ClearBorders => params.clear_borders,
            Self::Feather => params.feathering_radius != 0.0,
            Self::Erode => params.erosion_radius != 0.0,
            Self::Dilate => params.dilation_radius != 0.0,
        }
    }
}

/// Timing information for a single stage
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub stage: Stage,
    pub time_ms: u64,
}

/// Result of a pipeline run including which stages executed
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Processed image (not serialized)
    #[serde(skip)]
    pub image: DynamicImage,
    /// Total processing time in milliseconds
    pub total_time_ms: u64,
    /// Stages that ran, with timings
    pub executed: Vec<StepTiming>,
    /// Stages left at their identity value
    pub skipped: Vec<Stage>,
}

impl PipelineResult {
    pub fn ran(&self, stage: Stage) -> bool {
        self.executed.iter().any(|t| t.stage == stage)
    }
}

/// Preprocessing pipeline applying every stage in a fixed order
pub struct Pipeline<R> {
    params: PipelineParameters,
    runner: R,
}

impl<R: FilterRunner> Pipeline<R> {
    pub fn new(params: PipelineParameters, runner: R) -> Self {
        Self { params, runner }
    }

    pub fn params(&self) -> &PipelineParameters {
        &self.params
    }

    pub fn set_params(&mut self, params: PipelineParameters) {
        self.params = params;
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Process a copy of `original`; the source buffer is never modified
    pub fn process(&self, original: &DynamicImage) -> Result<PipelineResult, PreprocessError> {
        let start = Instant::now();
        let p = &self.params;
        let runner = &self.runner;

        let mut result = PipelineResult {
            image: DynamicImage::new_luma8(1, 1),
            total_time_ms: 0,
            executed: Vec::new(),
            skipped: Vec::new(),
        };

        let mut img = original.clone();

        img = self.run_step(Stage::Rotate, img, &mut result, |i| {
            steps::rotate::apply(i, p.rotation_degrees)
        })?;
        img = self.run_step(Stage::Resize, img, &mut result, |i| {
            steps::resize::apply(i, p.resize_factor)
        })?;
        img = self.run_step(Stage::ColorDifference, img, &mut result, |i| {
            steps::color::difference(i, p.color_diff_enabled, p.reference_color)
        })?;
        img = self.run_step(Stage::Grayscale, img, &mut result, steps::color::grayscale)?;
        img = self.run_step(Stage::Invert, img, &mut result, |i| {
            steps::color::invert(i, p.invert_colors)
        })?;
        img = self.run_step(Stage::CleanText, img, &mut result, |i| {
            steps::clean::clean_text(runner, i, p.cleaner_inverted_mode, p.cleaner_filter_size)
        })?;
        img = self.run_step(Stage::Threshold, img, &mut result, |i| {
            steps::threshold::apply(i, p.threshold_value, p.adaptive_filter_size)
        })?;
        img = self.run_step(Stage::FirstFilter, img, &mut result, |i| {
            steps::clean::denoise(runner, "first_filter", i, p.isonoise_radius)
        })?;
        img = self.run_step(Stage::ClearBorders, img, &mut result, |i| {
            let mode = p.effective_cleaner_mode();
            steps::borders::apply(i, p.clear_borders, p.invert_colors, mode)
        })?;
        img = self.run_step(Stage::SecondFilter, img, &mut result, |i| {
            steps::clean::denoise(runner, "second_filter", i, p.isonoise_radius)
        })?;
        img = self.run_step(Stage::Feather, img, &mut result, |i| {
            steps::morphology::feather(runner, i, p.feathering_radius)
        })?;
        img = self.run_step(Stage::Erode, img, &mut result, |i| {
            steps::morphology::erode(i, p.erosion_radius)
        })?;
        img = self.run_step(Stage::Dilate, img, &mut result, |i| {
            steps::morphology::dilate(i, p.dilation_radius)
        })?;

        result.image = img;
        result.total_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            "Pipeline finished in {}ms: {} stages run, {} skipped, output {}x{}",
            result.total_time_ms,
            result.executed.len(),
            result.skipped.len(),
            result.image.width(),
            result.image.height()
        );

        Ok(result)
    }

    fn run_step<F>(
        &self,
        stage: Stage,
        img: DynamicImage,
        result: &mut PipelineResult,
        step_fn: F,
    ) -> Result<DynamicImage, PreprocessError>
    where
        F: FnOnce(DynamicImage) -> Result<DynamicImage, PreprocessError>,
    {
        if !stage.is_enabled(&self.params) {
            result.skipped.push(stage);
            return Ok(img);
        }

        let step_start = Instant::now();
        let out = step_fn(img).map_err(|e| {
            tracing::error!("Stage {} aborted the run: {}", stage.as_str(), e);
            e.at_stage(stage.as_str())
        })?;

        let time_ms = step_start.elapsed().as_millis() as u64;
        tracing::debug!(
            "Stage {} done in {}ms ({}x{})",
            stage.as_str(),
            time_ms,
            out.width(),
            out.height()
        );

        result.executed.push(StepTiming { stage, time_ms });
        Ok(out)
    }
}

/// Which buffer a viewer should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Original,
    Processed,
}

/// A capture and its latest processed version.
///
/// Every reprocess starts again from the original capture, so a given
/// parameter set always yields the same output.
pub struct Session {
    original: DynamicImage,
    last: Option<PipelineResult>,
    view: View,
}

impl Session {
    pub fn new(original: DynamicImage) -> Self {
        Self {
            original,
            last: None,
            view: View::Original,
        }
    }

    pub fn original(&self) -> &DynamicImage {
        &self.original
    }

    pub fn current(&self) -> Option<&DynamicImage> {
        self.last.as_ref().map(|r| &r.image)
    }

    pub fn last_result(&self) -> Option<&PipelineResult> {
        self.last.as_ref()
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Run `pipeline` on the original. On failure the previous result is kept.
    pub fn reprocess<R: FilterRunner>(
        &mut self,
        pipeline: &Pipeline<R>,
    ) -> Result<&PipelineResult, PreprocessError> {
        let result = pipeline.process(&self.original)?;
        self.view = View::Processed;
        Ok(self.last.insert(result))
    }

    /// Flip between original and processed; stays on the original until
    /// something has been processed
    pub fn toggle_view(&mut self) -> View {
        self.view = match (self.view, self.last.is_some()) {
            (View::Original, true) => View::Processed,
            _ => View::Original,
        };
        self.view
    }

    pub fn displayed(&self) -> &DynamicImage {
        match (self.view, self.current()) {
            (View::Processed, Some(current)) => current,
            _ => &self.original,
        }
    }
}
