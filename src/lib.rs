//! Screenshot preprocessing for OCR
//!
//! The core is [`preprocessing::Pipeline`]: rotate, resize, reduce to gray,
//! binarize and clean a capture so an OCR engine can read it. External
//! document filters are reached through [`tools::FilterRunner`].

pub mod config;
pub mod error;
pub mod preprocessing;
pub mod profile;
pub mod tools;

pub use error::PreprocessError;
pub use preprocessing::{Pipeline, PipelineParameters, PipelineResult};
