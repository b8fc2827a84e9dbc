//! External document filters
//!
//! The cleaner, denoiser and feather stages hand the buffer to command-line
//! tools. Everything that touches processes and scratch files lives here so
//! the pixel stages stay pure.

use crate::error::PreprocessError;
use image::DynamicImage;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// ImageMagick quantum range for a default Q16 build
pub const DEFAULT_QUANTUM_RANGE: u32 = 65535;

/// The external collaborators the pipeline knows how to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterTool {
    /// Scanned-text cleaner (binarization, background normalization)
    TextCleaner,
    /// Isolated-noise remover
    IsoNoise,
    /// General speckle cleaner chained after `IsoNoise`
    NoiseCleaner,
    /// Blur plus level remap for document feathering
    Feather,
}

impl FilterTool {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TextCleaner => "textcleaner",
            Self::IsoNoise => "isonoise",
            Self::NoiseCleaner => "noisecleaner",
            Self::Feather => "feather",
        }
    }

    pub fn default_program(&self) -> &'static str {
        match self {
            Self::TextCleaner => "textcleaner",
            Self::IsoNoise => "isonoise",
            Self::NoiseCleaner => "noisecleaner",
            Self::Feather => "convert",
        }
    }

    /// ImageMagick's `convert` wants the input before the operators
    fn input_first(&self) -> bool {
        matches!(self, Self::Feather)
    }
}

/// Narrow interface to the external filters.
///
/// `run` consumes an input file and returns the path of the output file it
/// produced. `apply` wraps that round trip for in-memory buffers.
pub trait FilterRunner {
    /// Directory the image hand-off files are written to
    fn work_dir(&self) -> &Path;

    fn run(
        &self,
        stage: &'static str,
        tool: FilterTool,
        input: &Path,
        args: &[String],
    ) -> Result<PathBuf, PreprocessError>;

    fn quantum_range(&self) -> u32 {
        DEFAULT_QUANTUM_RANGE
    }

    /// Write `image` out, run `tool` on it and read the result back as gray
    fn apply(
        &self,
        stage: &'static str,
        tool: FilterTool,
        image: &DynamicImage,
        args: &[String],
    ) -> Result<DynamicImage, PreprocessError> {
        let input = self
            .work_dir()
            .join(format!("{}_{}_in.png", stage, tool.name()));
        image.save(&input)?;

        let output = self.run(stage, tool, &input, args)?;
        if !output.is_file() {
            return Err(PreprocessError::ExternalToolFailure {
                stage,
                tool: tool.name(),
                reason: format!("declared output {} was not produced", output.display()),
            });
        }

        let result = image::open(&output).map_err(|e| PreprocessError::ExternalToolFailure {
            stage,
            tool: tool.name(),
            reason: format!("unreadable output {}: {}", output.display(), e),
        })?;

        Ok(DynamicImage::ImageLuma8(result.to_luma8()))
    }
}

/// Program paths for each external tool
#[derive(Debug, Clone)]
pub struct ToolPrograms {
    pub textcleaner: PathBuf,
    pub isonoise: PathBuf,
    pub noisecleaner: PathBuf,
    pub magick: PathBuf,
}

impl Default for ToolPrograms {
    fn default() -> Self {
        Self {
            textcleaner: FilterTool::TextCleaner.default_program().into(),
            isonoise: FilterTool::IsoNoise.default_program().into(),
            noisecleaner: FilterTool::NoiseCleaner.default_program().into(),
            magick: FilterTool::Feather.default_program().into(),
        }
    }
}

impl ToolPrograms {
    pub fn program(&self, tool: FilterTool) -> &Path {
        match tool {
            FilterTool::TextCleaner => &self.textcleaner,
            FilterTool::IsoNoise => &self.isonoise,
            FilterTool::NoiseCleaner => &self.noisecleaner,
            FilterTool::Feather => &self.magick,
        }
    }
}

enum WorkDir {
    Temp(TempDir),
    Fixed(PathBuf),
}

/// Runs the external filters as synchronous child processes
pub struct CommandRunner {
    programs: ToolPrograms,
    quantum_range: u32,
    work_dir: WorkDir,
}

impl CommandRunner {
    /// Runner with a private scratch directory removed on drop
    pub fn new(programs: ToolPrograms) -> Result<Self, PreprocessError> {
        let dir = tempfile::Builder::new().prefix("screen-ocr-prep").tempdir()?;
        Ok(Self {
            programs,
            quantum_range: DEFAULT_QUANTUM_RANGE,
            work_dir: WorkDir::Temp(dir),
        })
    }

    /// Runner that keeps its hand-off files in `dir` for inspection
    pub fn with_work_dir(programs: ToolPrograms, dir: PathBuf) -> Result<Self, PreprocessError> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            programs,
            quantum_range: DEFAULT_QUANTUM_RANGE,
            work_dir: WorkDir::Fixed(dir),
        })
    }

    pub fn quantum_range_override(mut self, quantum_range: u32) -> Self {
        self.quantum_range = quantum_range;
        self
    }
}

impl FilterRunner for CommandRunner {
    fn work_dir(&self) -> &Path {
        match &self.work_dir {
            WorkDir::Temp(dir) => dir.path(),
            WorkDir::Fixed(path) => path,
        }
    }

    fn quantum_range(&self) -> u32 {
        self.quantum_range
    }

    fn run(
        &self,
        stage: &'static str,
        tool: FilterTool,
        input: &Path,
        args: &[String],
    ) -> Result<PathBuf, PreprocessError> {
        let failure = |reason: String| PreprocessError::ExternalToolFailure {
            stage,
            tool: tool.name(),
            reason,
        };

        let output = self
            .work_dir()
            .join(format!("{}_{}_out.png", stage, tool.name()));

        // A leftover file from an earlier run must not pass for fresh output
        match fs::remove_file(&output) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        let program = self.programs.program(tool);
        let mut cmd = Command::new(program);
        if tool.input_first() {
            cmd.arg(input).args(args).arg(&output);
        } else {
            cmd.args(args).arg(input).arg(&output);
        }

        tracing::debug!(
            "Running {} for stage {}: {} {:?}",
            tool.name(),
            stage,
            program.display(),
            args
        );

        let result = cmd
            .output()
            .map_err(|e| failure(format!("failed to start {}: {}", program.display(), e)))?;

        let stderr = String::from_utf8_lossy(&result.stderr);
        if !result.status.success() {
            return Err(failure(format!("{} ({})", result.status, stderr.trim())));
        }
        if !stderr.trim().is_empty() {
            tracing::warn!("{} reported: {}", tool.name(), stderr.trim());
        }

        if !output.is_file() {
            return Err(failure(format!(
                "declared output {} was not produced",
                output.display()
            )));
        }

        Ok(output)
    }
}
