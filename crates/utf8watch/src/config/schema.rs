use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_MAX_WORKERS: usize = 2;

/// Environment keys recognised by the loader.
pub const INPUT_DIRECTORY: &str = "INPUT_DIRECTORY";
pub const OUTPUT_DIRECTORY: &str = "OUTPUT_DIRECTORY";
pub const MAX_WORKERS: &str = "MAX_WORKERS";
pub const WATCH_POLL_INTERVAL_MS: &str = "WATCH_POLL_INTERVAL_MS";

/// Raw key/value view of the configuration, before required keys are checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawSettings {
    #[serde(default)]
    pub input_directory: Option<PathBuf>,
    #[serde(default)]
    pub output_directory: Option<PathBuf>,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub watch_poll_interval_ms: Option<u64>,
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub max_workers: usize,
    /// When set, the input directory is polled at this interval instead of
    /// using the platform's native notification facility.
    pub watch_poll_interval: Option<Duration>,
}

impl Settings {
    pub fn new<I: AsRef<Path>, O: AsRef<Path>>(input_directory: I, output_directory: O) -> Self {
        Self {
            input_directory: input_directory.as_ref().to_path_buf(),
            output_directory: output_directory.as_ref().to_path_buf(),
            max_workers: DEFAULT_MAX_WORKERS,
            watch_poll_interval: None,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.watch_poll_interval = Some(interval);
        self
    }

    pub fn processed_directory(&self) -> PathBuf {
        self.input_directory.join("processed")
    }

    pub fn error_directory(&self) -> PathBuf {
        self.input_directory.join("errors")
    }
}
