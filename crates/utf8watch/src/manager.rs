use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, Receiver};
use log::{debug, error, info, warn};

use crate::config::Settings;
use crate::converter::{FileConverter, TextConverter};
use crate::error::{Result, WorkerError};
use crate::progress::{ProgressState, ProgressTracker};
use crate::queue::TaskQueue;
use crate::storage::{archive_into, Directories};
use crate::watcher::{DirectoryWatcher, EventSink, QueueingSink};
use crate::worker::{ConversionResult, ConversionTask, DirectoryScanner, JobHandle, WorkerPool};

/// Owns the directory layout, the task queue, the worker pool and the
/// progress counters, and wires them together.
pub struct ConversionManager {
    directories: Directories,
    pool: WorkerPool,
    queue: TaskQueue,
    progress: Arc<ProgressTracker>,
    poll_interval: Option<Duration>,
}

impl ConversionManager {
    /// Creates any missing directories and starts the worker pool with the
    /// UTF-8 text converter.
    pub fn new(settings: &Settings) -> Result<Self> {
        let directories = Directories::from_settings(settings);
        let converter = Arc::new(TextConverter::new(
            &directories.output,
            &directories.processed,
        ));
        Self::start(settings, directories, converter)
    }

    /// Like [`ConversionManager::new`] with a caller-supplied converter.
    pub fn with_converter(settings: &Settings, converter: Arc<dyn FileConverter>) -> Result<Self> {
        Self::start(settings, Directories::from_settings(settings), converter)
    }

    fn start(
        settings: &Settings,
        directories: Directories,
        converter: Arc<dyn FileConverter>,
    ) -> Result<Self> {
        directories.ensure()?;

        let pool = WorkerPool::new(converter, settings.max_workers)?;

        Ok(Self {
            directories,
            pool,
            queue: TaskQueue::new(),
            progress: Arc::new(ProgressTracker::new()),
            poll_interval: settings.watch_poll_interval,
        })
    }

    pub fn directories(&self) -> &Directories {
        &self.directories
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// The watch adapter feeding this manager's queue.
    pub fn event_sink(&self) -> Arc<QueueingSink> {
        Arc::new(QueueingSink::new(
            self.queue.sender(),
            Arc::clone(&self.progress),
        ))
    }

    /// Submits every `.txt` file already present in the input directory
    /// straight to the pool. All of them are counted before the first one is
    /// submitted.
    pub fn process_existing_files(&self) -> Result<Vec<JobHandle>> {
        let tasks = DirectoryScanner::new(&self.directories.input).scan()?;
        let count = tasks.len();

        self.progress.record_submitted_many(count);

        let mut handles = Vec::with_capacity(count);
        for task in tasks {
            handles.push(self.submit(task)?);
        }

        if count > 0 {
            info!("Found {} existing .txt files to process.", count);
            self.progress.report();
        }

        Ok(handles)
    }

    /// Hands `task` to the pool. The caller must already have counted it as
    /// submitted.
    pub fn submit(&self, task: ConversionTask) -> std::result::Result<JobHandle, WorkerError> {
        let error_directory = self.directories.errors.clone();
        let progress = Arc::clone(&self.progress);

        self.pool.submit_with(task, move |result: &ConversionResult| {
            if !result.success {
                move_to_errors(&result.source_path, &error_directory);
            }
            progress.record_completed(&result.source_path);
        })
    }

    /// Drains the queue into the pool until `shutdown` receives a message or
    /// is disconnected. Blocks while the queue is empty. Each task is
    /// submitted without waiting for its conversion; error routing and
    /// progress happen in the completion callback. Returns how many tasks
    /// were dispatched.
    pub fn run_dispatch_loop(&self, shutdown: &Receiver<()>) -> Result<usize> {
        let mut dispatched = 0;

        loop {
            select! {
                recv(self.queue.receiver()) -> task => {
                    let task = task.map_err(|_| WorkerError::ChannelClosed)?;
                    debug!("Dispatching {}", task.source_path.display());
                    self.submit(task)?;
                    dispatched += 1;
                }
                recv(shutdown) -> _ => break,
            }
        }

        info!("Dispatch loop stopped after {} tasks", dispatched);
        Ok(dispatched)
    }

    /// Watches the input directory and dispatches new arrivals until
    /// `shutdown` fires.
    pub fn run(&self, shutdown: &Receiver<()>) -> Result<()> {
        let sink: Arc<dyn EventSink> = self.event_sink();
        let watcher = DirectoryWatcher::start(&self.directories.input, sink, self.poll_interval)?;

        let outcome = self.run_dispatch_loop(shutdown);

        drop(watcher);
        outcome.map(|_| ())
    }

    /// Waits for submitted jobs to finish and returns the final counters.
    pub fn finish(self) -> ProgressState {
        let pending = self.queue.len();
        if pending > 0 {
            warn!("{} queued files were not dispatched", pending);
        }

        self.pool.wait();
        self.progress.snapshot()
    }
}

fn move_to_errors(source: &Path, error_directory: &Path) {
    match archive_into(source, error_directory) {
        Ok(target) => {
            info!("Moved {} to {}", source.display(), target.display());
        }
        Err(e) => {
            error!(
                "Failed to move {} to error directory: {}",
                source.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::thread;
    use std::time::Instant;
    use tempfile::TempDir;

    fn settings(temp_dir: &TempDir) -> Settings {
        Settings::new(temp_dir.path().join("input"), temp_dir.path().join("output"))
    }

    #[test]
    fn test_new_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConversionManager::new(&settings(&temp_dir)).unwrap();

        let dirs = manager.directories().clone();
        assert!(dirs.output.is_dir());
        assert!(dirs.processed.is_dir());
        assert!(dirs.errors.is_dir());

        let state = manager.finish();
        assert_eq!(state, ProgressState::default());
    }

    #[test]
    fn test_existing_files_counted_before_submission() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(&temp_dir);
        std::fs::create_dir_all(&settings.input_directory).unwrap();
        for name in ["one.txt", "two.txt", "three.txt"] {
            std::fs::write(settings.input_directory.join(name), name).unwrap();
        }

        let manager = ConversionManager::new(&settings).unwrap();
        let handles = manager.process_existing_files().unwrap();
        assert_eq!(handles.len(), 3);
        assert_eq!(manager.progress().total(), 3);

        for handle in handles {
            assert!(handle.wait().unwrap().success);
        }

        let state = manager.finish();
        assert_eq!(state.total, 3);
        assert_eq!(state.processed, 3);
    }

    #[test]
    fn test_failed_submission_routes_to_errors() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConversionManager::new(&settings(&temp_dir)).unwrap();
        let dirs = manager.directories().clone();

        let source = dirs.input.join("data.csv");
        std::fs::write(&source, b"a,b").unwrap();

        manager.progress().record_submitted();
        let result = manager.submit(ConversionTask::new(&source)).unwrap().wait().unwrap();

        assert!(!result.success);
        assert!(!source.exists());
        assert!(dirs.errors.join("data.csv").exists());
        assert_eq!(manager.progress().processed(), 1);

        manager.finish();
    }

    #[test]
    fn test_dispatch_loop_stops_on_shutdown() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConversionManager::new(&settings(&temp_dir)).unwrap();
        let (stop, shutdown) = bounded::<()>(1);
        drop(stop);

        let dispatched = manager.run_dispatch_loop(&shutdown).unwrap();
        assert_eq!(dispatched, 0);

        manager.finish();
    }

    #[test]
    fn test_dispatch_loop_blocks_until_work_arrives() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConversionManager::new(&settings(&temp_dir)).unwrap();
        let sink = manager.event_sink();
        let (stop, shutdown) = bounded::<()>(1);

        let dispatched = thread::scope(|scope| {
            let dispatcher = scope.spawn(|| manager.run_dispatch_loop(&shutdown));

            // The loop is parked on an empty queue; nothing can be dispatched.
            thread::sleep(Duration::from_millis(50));
            assert!(!dispatcher.is_finished());
            assert_eq!(manager.progress().total(), 0);

            let source = manager.directories().input.join("late.txt");
            std::fs::write(&source, b"late").unwrap();
            sink.on_created(&source, false);

            let deadline = Instant::now() + Duration::from_secs(10);
            while manager.progress().processed() < 1 {
                assert!(Instant::now() < deadline, "task was never dispatched");
                thread::sleep(Duration::from_millis(10));
            }

            stop.send(()).unwrap();
            dispatcher.join().unwrap().unwrap()
        });

        assert_eq!(dispatched, 1);
        let state = manager.finish();
        assert_eq!(state, ProgressState { total: 1, processed: 1 });
    }
}
