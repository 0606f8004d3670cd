pub mod config;
pub mod converter;
pub mod error;
pub mod manager;
pub mod progress;
pub mod queue;
pub mod storage;
pub mod watcher;
pub mod worker;

pub use config::{load_settings, load_settings_from, Settings};
pub use converter::{FileConverter, TextConverter};
pub use error::{ConfigError, ConvertError, Result, StorageError, Utf8WatchError, WorkerError};
pub use manager::ConversionManager;
pub use progress::{ProgressState, ProgressTracker};
pub use queue::{TaskQueue, TaskSender};
pub use storage::Directories;
pub use watcher::{DirectoryWatcher, EventSink, QueueingSink};
pub use worker::{ConversionResult, ConversionTask, DirectoryScanner, JobHandle, WorkerPool};
