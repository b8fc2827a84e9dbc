use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Invalid parameter for stage '{stage}': {message}")]
    InvalidParameter { stage: &'static str, message: String },

    #[error("External tool '{tool}' failed during stage '{stage}': {reason}")]
    ExternalToolFailure {
        stage: &'static str,
        tool: &'static str,
        reason: String,
    },

    #[error("Unsupported image state at stage '{stage}': {message}")]
    UnsupportedImageState { stage: &'static str, message: String },

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<PreprocessError>,
    },

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PreprocessError {
    /// Attach a stage name to errors that do not carry one yet
    pub fn at_stage(self, stage: &'static str) -> Self {
        if self.stage().is_some() {
            return self;
        }
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    pub fn invalid_parameter(stage: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            stage,
            message: message.into(),
        }
    }

    pub fn unsupported_image(stage: &'static str, message: impl Into<String>) -> Self {
        Self::UnsupportedImageState {
            stage,
            message: message.into(),
        }
    }

    /// Name of the stage that aborted the run, if the error carries one
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::InvalidParameter { stage, .. }
            | Self::ExternalToolFailure { stage, .. }
            | Self::UnsupportedImageState { stage, .. }
            | Self::Stage { stage, .. } => Some(*stage),
            Self::Image(_) | Self::Io(_) => None,
        }
    }
}
