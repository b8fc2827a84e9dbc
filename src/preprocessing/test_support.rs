use crate::error::PreprocessError;
use crate::tools::{FilterRunner, FilterTool};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct Call {
    pub stage: &'static str,
    pub tool: FilterTool,
    pub args: Vec<String>,
}

/// In-process stand-in for the external tools: copies input to output
pub struct FakeRunner {
    dir: TempDir,
    fail_on: Option<FilterTool>,
    calls: RefCell<Vec<Call>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            fail_on: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(tool: FilterTool) -> Self {
        Self {
            fail_on: Some(tool),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

impl FilterRunner for FakeRunner {
    fn work_dir(&self) -> &Path {
        self.dir.path()
    }

    fn run(
        &self,
        stage: &'static str,
        tool: FilterTool,
        input: &Path,
        args: &[String],
    ) -> Result<PathBuf, PreprocessError> {
        self.calls.borrow_mut().push(Call {
            stage,
            tool,
            args: args.to_vec(),
        });

        if self.fail_on == Some(tool) {
            return Err(PreprocessError::ExternalToolFailure {
                stage,
                tool: tool.name(),
                reason: "exit status: 1".to_string(),
            });
        }

        let output = self.work_dir().join(format!("{}_{}_out.png", stage, tool.name()));
        fs::copy(input, &output)?;
        Ok(output)
    }
}
