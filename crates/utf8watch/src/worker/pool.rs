use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::converter::FileConverter;
use crate::error::{ConvertError, WorkerError};
use crate::worker::job::{ConversionResult, ConversionTask};

/// Runs on the worker thread after every job, success or not.
pub type CompletionCallback = Box<dyn FnOnce(&ConversionResult) + Send + 'static>;

struct Job {
    task: ConversionTask,
    on_complete: Option<CompletionCallback>,
    reply: Sender<ConversionResult>,
}

/// Handle to a submitted job. Dropping it does not cancel the job.
pub struct JobHandle {
    source_path: std::path::PathBuf,
    receiver: Receiver<ConversionResult>,
}

impl JobHandle {
    pub fn source_path(&self) -> &std::path::Path {
        &self.source_path
    }

    /// Blocks until the job (and its completion callback) has finished.
    /// Returns `None` if the worker stopped before running the job.
    pub fn wait(self) -> Option<ConversionResult> {
        self.receiver.recv().ok()
    }
}

/// Fixed set of worker threads. Every submitted job runs to completion,
/// callback included; the pool stops only once [`WorkerPool::wait`] closes
/// the job channel and the remaining jobs are drained.
pub struct WorkerPool {
    job_sender: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `worker_count` worker threads sharing `converter`.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(converter: Arc<dyn FileConverter>, worker_count: usize) -> Result<Self, WorkerError> {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (job_sender, job_receiver) = unbounded::<Job>();

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let worker_converter = Arc::clone(&converter);

            let handle = thread::Builder::new()
                .name(format!("convert-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, job_rx, worker_converter);
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            workers,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn submit(&self, task: ConversionTask) -> Result<JobHandle, WorkerError> {
        self.enqueue(task, None)
    }

    /// Submits `task` and registers `on_complete` to run once its result is
    /// known. Never blocks on the conversion itself.
    pub fn submit_with<F>(&self, task: ConversionTask, on_complete: F) -> Result<JobHandle, WorkerError>
    where
        F: FnOnce(&ConversionResult) + Send + 'static,
    {
        self.enqueue(task, Some(Box::new(on_complete)))
    }

    fn enqueue(
        &self,
        task: ConversionTask,
        on_complete: Option<CompletionCallback>,
    ) -> Result<JobHandle, WorkerError> {
        let (reply, receiver) = bounded(1);
        let handle = JobHandle {
            source_path: task.source_path.clone(),
            receiver,
        };

        self.job_sender
            .send(Job {
                task,
                on_complete,
                reply,
            })
            .map_err(|_| WorkerError::ChannelClosed)?;

        Ok(handle)
    }

    /// Closes the pool and joins every worker once all submitted jobs have
    /// run.
    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(worker_id: usize, job_receiver: Receiver<Job>, converter: Arc<dyn FileConverter>) {
    debug!("Worker {} started", worker_id);

    // Ends once the pool drops its sender and the channel is drained.
    for job in job_receiver.iter() {
        debug!("Worker {} processing: {:?}", worker_id, job.task.source_path);
        run_job(worker_id, job, converter.as_ref());
    }

    debug!("Worker {} stopped", worker_id);
}

// A panic in the converter or the callback must not take the worker down or
// skip the callback, otherwise progress would never reach its total.
fn run_job(worker_id: usize, job: Job, converter: &dyn FileConverter) {
    let Job {
        task,
        on_complete,
        reply,
    } = job;

    let result = match panic::catch_unwind(AssertUnwindSafe(|| converter.convert(&task))) {
        Ok(result) => result,
        Err(payload) => {
            let err = ConvertError::Panicked(panic_message(payload.as_ref()));
            error!(
                "Worker {} failed converting {}: {}",
                worker_id,
                task.source_path.display(),
                err
            );
            ConversionResult::failure(&task, err.to_string())
        }
    };

    if let Some(callback) = on_complete {
        if panic::catch_unwind(AssertUnwindSafe(|| callback(&result))).is_err() {
            error!(
                "Worker {} completion callback panicked for {}",
                worker_id,
                task.source_path.display()
            );
        }
    }

    // The submitter may have dropped its handle.
    let _ = reply.send(result);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::TextConverter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct PanickingConverter;

    impl FileConverter for PanickingConverter {
        fn convert(&self, _task: &ConversionTask) -> ConversionResult {
            panic!("decoder exploded");
        }
    }

    fn text_converter(temp_dir: &TempDir) -> Arc<dyn FileConverter> {
        let output_dir = temp_dir.path().join("output");
        let processed_dir = temp_dir.path().join("input/processed");
        std::fs::create_dir_all(&output_dir).unwrap();
        std::fs::create_dir_all(&processed_dir).unwrap();
        Arc::new(TextConverter::new(output_dir, processed_dir))
    }

    #[test]
    fn test_worker_pool_creation() {
        let temp_dir = TempDir::new().unwrap();
        let pool = WorkerPool::new(text_converter(&temp_dir), 2).unwrap();

        assert_eq!(pool.worker_count(), 2);

        pool.wait();
    }

    #[test]
    fn test_submit_and_process_text_job() {
        let temp_dir = TempDir::new().unwrap();
        let pool = WorkerPool::new(text_converter(&temp_dir), 2).unwrap();

        let test_file = temp_dir.path().join("input/test.txt");
        std::fs::write(&test_file, "Hello, World!\n").unwrap();

        let handle = pool.submit(ConversionTask::new(&test_file)).unwrap();
        assert_eq!(handle.source_path(), test_file.as_path());

        let result = handle.wait().unwrap();
        assert!(result.success, "Job failed: {:?}", result.error);
        assert!(result.output_path.is_some());
        assert!(result.archive_path.is_some());

        pool.wait();
    }

    #[test]
    fn test_callback_runs_for_failures() {
        let temp_dir = TempDir::new().unwrap();
        let pool = WorkerPool::new(text_converter(&temp_dir), 1).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let handle = pool
            .submit_with(ConversionTask::new(temp_dir.path().join("x.bin")), move |result| {
                assert!(!result.success);
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let result = handle.wait().unwrap();
        assert!(!result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        pool.wait();
    }

    #[test]
    fn test_converter_panic_becomes_failure() {
        let pool = WorkerPool::new(Arc::new(PanickingConverter), 1).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let counter = Arc::clone(&calls);
                pool.submit_with(ConversionTask::new(format!("{}.txt", i)), move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
            })
            .collect();

        for handle in handles {
            let result = handle.wait().unwrap();
            assert!(!result.success);
            assert!(result.error.unwrap().contains("decoder exploded"));
        }
        // The single worker survived all three panics.
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        pool.wait();
    }

    #[test]
    fn test_callback_panic_does_not_kill_worker() {
        let temp_dir = TempDir::new().unwrap();
        let pool = WorkerPool::new(text_converter(&temp_dir), 1).unwrap();

        let first = pool
            .submit_with(ConversionTask::new("a.bin"), |_| panic!("callback bug"))
            .unwrap();
        assert!(first.wait().is_some());

        let second = pool.submit(ConversionTask::new("b.bin")).unwrap();
        assert!(second.wait().is_some());

        pool.wait();
    }

    #[test]
    fn test_wait_drains_submitted_jobs() {
        let temp_dir = TempDir::new().unwrap();
        let pool = WorkerPool::new(text_converter(&temp_dir), 2).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        for i in 0..10 {
            let counter = Arc::clone(&calls);
            pool.submit_with(ConversionTask::new(format!("{}.bin", i)), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.wait();
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    struct SlowConverter;

    impl FileConverter for SlowConverter {
        fn convert(&self, task: &ConversionTask) -> ConversionResult {
            thread::sleep(Duration::from_millis(20));
            ConversionResult::failure(task, "slow".to_string())
        }
    }

    #[test]
    fn test_every_queued_callback_runs_before_wait_returns() {
        let pool = WorkerPool::new(Arc::new(SlowConverter), 1).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        // Far more jobs than workers, so most are still queued when the pool
        // is closed.
        for i in 0..8 {
            let counter = Arc::clone(&calls);
            pool.submit_with(ConversionTask::new(format!("{}.txt", i)), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.wait();
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }
}
