//! Run configuration and patch identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ImpactError, Result};

/// Default fetch deadline (one hour).
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default capacity of the item and reply hand-off queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Report file layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// One comma-separated line per reply.
    #[default]
    Text,
    /// Pretty JSON artifact with run metadata.
    Json,
}

impl FromStr for ReportFormat {
    type Err = ImpactError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(ImpactError::InvalidConfig(format!(
                "unknown report format: {other}"
            ))),
        }
    }
}

/// Everything a run needs to know, independent of how it was supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactConfig {
    /// Library whose source tree receives the patch. Patch paths are relative
    /// to this package's directory.
    pub package_under_test: String,

    /// Newline-delimited list of consumer identifiers.
    pub package_list: PathBuf,

    /// Candidate patch.
    pub patch_file: PathBuf,

    /// Deadline for the fetch stage.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,

    pub report_file: PathBuf,

    #[serde(default)]
    pub report_format: ReportFormat,

    /// Worker pool size.
    pub concurrency: usize,

    /// Directory under which per-item workspaces are created.
    pub work_root: PathBuf,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl ImpactConfig {
    /// Configuration with the stock defaults for everything but the package.
    pub fn new(package_under_test: impl Into<String>) -> Self {
        Self {
            package_under_test: package_under_test.into(),
            package_list: PathBuf::from("packages.txt"),
            patch_file: PathBuf::from("delta.patch"),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            report_file: PathBuf::from("report.txt"),
            report_format: ReportFormat::Text,
            concurrency: DEFAULT_CONCURRENCY,
            work_root: PathBuf::from("."),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Reject configurations no run can succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.package_under_test.trim().is_empty() {
            return Err(ImpactError::InvalidConfig(
                "must specify a package to test".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ImpactError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ImpactError::InvalidConfig(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ImpactError::InvalidConfig(
                "fetch timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve every path against `base`.
    ///
    /// Workers run subprocesses from inside item workspaces, so relative
    /// paths would otherwise resolve against the wrong directory.
    pub fn absolutize(mut self, base: &Path) -> Self {
        self.package_list = absolute(base, &self.package_list);
        self.patch_file = absolute(base, &self.patch_file);
        self.report_file = absolute(base, &self.report_file);
        self.work_root = absolute(base, &self.work_root);
        self
    }

    /// [`ImpactConfig::absolutize`] against the current directory.
    pub fn absolutize_from_cwd(self) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(self.absolutize(&cwd))
    }

    /// SHA-256 hex digest of the patch file contents.
    pub fn patch_digest(&self) -> Result<String> {
        let bytes = std::fs::read(&self.patch_file).map_err(|source| ImpactError::Patch {
            path: self.patch_file.clone(),
            source,
        })?;
        Ok(compute_digest(&bytes))
    }
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Compute the hex SHA-256 of a byte slice.
pub fn compute_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ImpactConfig::new("github.com/stretchr/testify");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.fetch_timeout, Duration::from_secs(3600));
        assert_eq!(config.package_list, PathBuf::from("packages.txt"));
        assert_eq!(config.patch_file, PathBuf::from("delta.patch"));
        assert_eq!(config.report_file, PathBuf::from("report.txt"));
        assert_eq!(config.report_format, ReportFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_package() {
        let config = ImpactConfig::new("  ");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must specify a package"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = ImpactConfig::new("lib");
        config.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = ImpactConfig::new("lib");
        config.fetch_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_absolutize_keeps_absolute_paths() {
        let mut config = ImpactConfig::new("lib");
        config.report_file = PathBuf::from("/tmp/out/report.txt");
        let config = config.absolutize(Path::new("/work"));

        assert_eq!(config.package_list, PathBuf::from("/work/packages.txt"));
        assert_eq!(config.patch_file, PathBuf::from("/work/delta.patch"));
        assert_eq!(config.report_file, PathBuf::from("/tmp/out/report.txt"));
        assert_eq!(config.work_root, PathBuf::from("/work/."));
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("TEXT".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert!("yaml".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_config_serde_humantime() {
        let json = r#"{
            "package_under_test": "lib",
            "package_list": "/p.txt",
            "patch_file": "/d.patch",
            "fetch_timeout": "90s",
            "report_file": "/r.txt",
            "concurrency": 2,
            "work_root": "/w"
        }"#;
        let config: ImpactConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.fetch_timeout, Duration::from_secs(90));
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.report_format, ReportFormat::Text);
    }

    #[test]
    fn test_patch_digest() {
        let dir = tempfile::tempdir().unwrap();
        let patch = dir.path().join("delta.patch");
        std::fs::write(&patch, b"--- a\n+++ b\n").unwrap();

        let mut config = ImpactConfig::new("lib");
        config.patch_file = patch;
        let digest = config.patch_digest().unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, compute_digest(b"--- a\n+++ b\n"));
    }

    #[test]
    fn test_patch_digest_missing_file() {
        let mut config = ImpactConfig::new("lib");
        config.patch_file = PathBuf::from("/definitely/not/here.patch");
        assert!(matches!(
            config.patch_digest(),
            Err(ImpactError::Patch { .. })
        ));
    }
}
