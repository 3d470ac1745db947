//! Stage command definitions.

use impact_core::Stage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where a stage's stdout and stderr go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutput {
    /// Share the parent's stdout/stderr.
    #[default]
    Inherit,
    /// Discard output.
    Null,
    /// Write stdout and stderr to a log file (created fresh).
    LogFile(PathBuf),
}

/// A concrete subprocess invocation for one stage of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCommand {
    /// Stage this command implements.
    pub stage: Stage,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Environment overrides applied on top of the inherited environment.
    pub env: Vec<(String, String)>,

    /// Working directory; inherited when `None`.
    pub current_dir: Option<PathBuf>,

    pub output: StageOutput,
}

impl StageCommand {
    /// Create a stage command from an argv vector.
    pub fn new(stage: Stage, command: Vec<String>) -> Self {
        Self {
            stage,
            command,
            env: Vec::new(),
            current_dir: None,
            output: StageOutput::Inherit,
        }
    }

    /// Create a stage command from string slices.
    pub fn from_args(stage: Stage, args: &[&str]) -> Self {
        Self::new(stage, args.iter().map(|a| (*a).to_string()).collect())
    }

    /// Add an environment override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run the command from `dir`.
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn with_output(mut self, output: StageOutput) -> Self {
        self.output = output;
        self
    }

    /// Executable name, if the command is non-empty.
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args() {
        let cmd = StageCommand::from_args(Stage::Fetch, &["go", "get", "-t", "pkg"]);
        assert_eq!(cmd.stage, Stage::Fetch);
        assert_eq!(cmd.program(), Some("go"));
        assert_eq!(cmd.command.len(), 4);
        assert_eq!(cmd.output, StageOutput::Inherit);
        assert!(cmd.current_dir.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let cmd = StageCommand::from_args(Stage::PrePatchTest, &["go", "test"])
            .with_env("GOPATH", "/w/0001")
            .in_dir(Path::new("/w/0001"))
            .with_output(StageOutput::LogFile(PathBuf::from("/w/0001/pre-test.log")));

        assert_eq!(cmd.env, vec![("GOPATH".to_string(), "/w/0001".to_string())]);
        assert_eq!(cmd.current_dir, Some(PathBuf::from("/w/0001")));
        assert!(matches!(cmd.output, StageOutput::LogFile(_)));
    }

    #[test]
    fn test_empty_command_has_no_program() {
        let cmd = StageCommand::new(Stage::PatchApply, Vec::new());
        assert!(cmd.program().is_none());
    }
}
