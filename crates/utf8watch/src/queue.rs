//! Unbounded FIFO of pending conversion tasks.
//!
//! Producers are the startup scan and the watch adapter; the dispatch loop is
//! the consumer and blocks on the receiving end until a task arrives.
//! Enqueue order is preserved for dequeue.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::WorkerError;
use crate::worker::job::ConversionTask;

/// Producer handle. Cheap to clone; each clone feeds the same queue.
#[derive(Debug, Clone)]
pub struct TaskSender {
    sender: Sender<ConversionTask>,
}

impl TaskSender {
    pub fn push(&self, task: ConversionTask) -> Result<(), WorkerError> {
        self.sender
            .send(task)
            .map_err(|_| WorkerError::ChannelClosed)
    }
}

#[derive(Debug, Clone)]
pub struct TaskQueue {
    sender: Sender<ConversionTask>,
    receiver: Receiver<ConversionTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> TaskSender {
        TaskSender {
            sender: self.sender.clone(),
        }
    }

    pub fn push(&self, task: ConversionTask) -> Result<(), WorkerError> {
        self.sender
            .send(task)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Consumer side, for blocking receives and `select!`.
    pub(crate) fn receiver(&self) -> &Receiver<ConversionTask> {
        &self.receiver
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
