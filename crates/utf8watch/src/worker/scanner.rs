use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::WorkerError;
use crate::worker::job::ConversionTask;

/// Lists the `.txt` files already sitting in the input directory at startup.
pub struct DirectoryScanner {
    input_directory: PathBuf,
}

impl DirectoryScanner {
    pub fn new<P: AsRef<Path>>(input_directory: P) -> Self {
        Self {
            input_directory: input_directory.as_ref().to_path_buf(),
        }
    }

    pub fn input_directory(&self) -> &Path {
        &self.input_directory
    }

    pub fn scan(&self) -> Result<Vec<ConversionTask>, WorkerError> {
        let mut tasks = Vec::new();

        for entry in WalkDir::new(&self.input_directory)
            .min_depth(1)
            .max_depth(1) // Top level only; processed/ and errors/ are never entered
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(WorkerError::ScanFailed {
                        path: self.input_directory.clone(),
                        source: e,
                    });
                }
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let is_txt = entry
                .file_name()
                .to_str()
                .map(|n| n.ends_with(".txt"))
                .unwrap_or(false);
            if is_txt {
                debug!("Found text file: {}", entry.path().display());
                tasks.push(ConversionTask::new(entry.path()));
            }
        }

        info!(
            "Scanned {} text files in {}",
            tasks.len(),
            self.input_directory.display()
        );
        Ok(tasks)
    }
}
