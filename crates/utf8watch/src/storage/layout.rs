use std::path::{Path, PathBuf};

use log::debug;

use crate::config::Settings;
use crate::error::StorageError;
use crate::storage::filesystem::ensure_directory;

/// The four directories the converter works with. `processed` and `errors`
/// are direct children of `input`; the watcher and scanner are
/// non-recursive so nothing archived there is picked up again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directories {
    pub input: PathBuf,
    pub output: PathBuf,
    pub processed: PathBuf,
    pub errors: PathBuf,
}

impl Directories {
    pub fn new<I: AsRef<Path>, O: AsRef<Path>>(input: I, output: O) -> Self {
        let input = input.as_ref().to_path_buf();
        Self {
            processed: input.join("processed"),
            errors: input.join("errors"),
            output: output.as_ref().to_path_buf(),
            input,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            input: settings.input_directory.clone(),
            output: settings.output_directory.clone(),
            processed: settings.processed_directory(),
            errors: settings.error_directory(),
        }
    }

    /// Creates every directory that does not exist yet.
    pub fn ensure(&self) -> Result<(), StorageError> {
        for dir in [&self.input, &self.output, &self.processed, &self.errors] {
            if !dir.is_dir() {
                ensure_directory(dir)?;
                debug!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }
}
