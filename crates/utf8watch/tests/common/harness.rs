//! Test harness for isolated pipeline runs.
//!
//! `TestHarness` owns a temporary input/output pair and builds a
//! `ConversionManager` over it.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use utf8watch::{ConversionManager, Settings};

pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let input_dir = temp_dir.path().join("input");
        let output_dir = temp_dir.path().join("output");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        Self {
            temp_dir,
            input_dir,
            output_dir,
        }
    }

    pub fn settings(&self, max_workers: usize) -> Settings {
        Settings::new(&self.input_dir, &self.output_dir).with_max_workers(max_workers)
    }

    pub fn manager(&self, max_workers: usize) -> ConversionManager {
        ConversionManager::new(&self.settings(max_workers)).expect("Failed to build manager")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.input_dir.join("processed")
    }

    pub fn error_dir(&self) -> PathBuf {
        self.input_dir.join("errors")
    }

    pub fn write_input(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.input_dir.join(name);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    pub fn output_for(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{}_utf8_converted.txt", stem))
    }

    pub fn output_files(&self) -> Vec<String> {
        list(&self.output_dir)
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }
}

fn list(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
