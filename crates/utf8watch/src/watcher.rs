//! Bridges filesystem "created" notifications into the task queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use notify::event::CreateKind;
use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};

use crate::error::WorkerError;
use crate::progress::ProgressTracker;
use crate::queue::TaskSender;
use crate::worker::job::ConversionTask;

/// Receiver of directory events. Only creation is of interest.
pub trait EventSink: Send + Sync {
    fn on_created(&self, path: &Path, is_dir: bool);
}

/// Queues every newly created file and counts it as submitted. Extension
/// checks are left to the converter, so ineligible files still flow through
/// the pipeline and end up in the error directory.
pub struct QueueingSink {
    sender: TaskSender,
    progress: Arc<ProgressTracker>,
}

impl QueueingSink {
    pub fn new(sender: TaskSender, progress: Arc<ProgressTracker>) -> Self {
        Self { sender, progress }
    }
}

impl EventSink for QueueingSink {
    fn on_created(&self, path: &Path, is_dir: bool) {
        if is_dir {
            return;
        }

        debug!("New file detected: {}", path.display());

        // Count before queueing so a fast completion never overtakes `total`.
        self.progress.record_submitted();
        if let Err(e) = self.sender.push(ConversionTask::new(path)) {
            error!("Failed to queue {}: {}", path.display(), e);
            return;
        }
        self.progress.report();
    }
}

/// Forwards the create events in `event` to `sink`.
pub fn dispatch_event(event: &Event, sink: &dyn EventSink) {
    if let EventKind::Create(kind) = event.kind {
        for path in &event.paths {
            let is_dir = matches!(kind, CreateKind::Folder) || path.is_dir();
            sink.on_created(path, is_dir);
        }
    }
}

/// Non-recursive watch over one directory. Watching stops when this value is
/// dropped.
pub struct DirectoryWatcher {
    directory: PathBuf,
    _watcher: Box<dyn Watcher + Send>,
}

impl DirectoryWatcher {
    /// Starts watching `directory`. With `poll_interval` set the directory is
    /// polled instead of relying on native notifications, which is needed for
    /// network mounts and some container volumes.
    pub fn start(
        directory: &Path,
        sink: Arc<dyn EventSink>,
        poll_interval: Option<Duration>,
    ) -> Result<Self, WorkerError> {
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => dispatch_event(&event, sink.as_ref()),
            Err(e) => warn!("Watch error: {}", e),
        };

        let mut watcher: Box<dyn Watcher + Send> = match poll_interval {
            Some(interval) => {
                let config = NotifyConfig::default().with_poll_interval(interval);
                Box::new(
                    PollWatcher::new(handler, config)
                        .map_err(|e| WorkerError::WatchError(e.to_string()))?,
                )
            }
            None => Box::new(
                notify::recommended_watcher(handler)
                    .map_err(|e| WorkerError::WatchError(e.to_string()))?,
            ),
        };

        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        info!("Monitoring folder: {}", directory.display());

        Ok(Self {
            directory: directory.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        debug!("Stopped watching {}", self.directory.display());
    }
}
