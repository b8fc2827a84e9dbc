//! Image preprocessing module for OCR preparation
//!
//! Turns a captured screenshot into a binarized, noise-reduced image through
//! a fixed sequence of stages driven by one parameter set.

pub mod params;
pub mod pipeline;
pub mod raster;
pub mod steps;

#[cfg(test)]
pub(crate) mod test_support;

pub use params::{CleanerInvertMode, PipelineParameters, RgbColor};
pub use pipeline::{Pipeline, PipelineResult, Session, Stage, StepTiming, View};
