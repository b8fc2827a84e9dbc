//! Individual preprocessing steps

pub mod borders;
pub mod clean;
pub mod color;
pub mod morphology;
pub mod resize;
pub mod rotate;
pub mod threshold;
