//! Per-channel handoff between the tick thread and the writer thread.
//!
//! Unbounded on purpose: if the disk stalls, memory grows instead of the
//! tick blocking. The consumer half wakes as soon as a line is pushed, so
//! the writer does not have to spin on a fixed poll.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

pub fn sample_queue() -> (SampleProducer, SampleConsumer) {
    let (tx, rx) = unbounded();
    (SampleProducer { tx }, SampleConsumer { rx })
}

#[derive(Debug)]
pub struct SampleProducer {
    tx: Sender<String>,
}

impl SampleProducer {
    /// Never blocks. Returns false only if every consumer is gone.
    pub fn push(&self, line: String) -> bool {
        self.tx.send(line).is_ok()
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SampleConsumer {
    rx: Receiver<String>,
}

/// Outcome of one poll of the queue.
#[derive(Debug, PartialEq, Eq)]
pub enum Poll {
    Line(String),
    /// Nothing queued yet. Expected, not an error.
    Idle,
    /// The producer is gone and the queue is empty.
    Closed,
}

impl SampleConsumer {
    pub fn try_pop(&self) -> Poll {
        match self.rx.try_recv() {
            Ok(line) => Poll::Line(line),
            Err(TryRecvError::Empty) => Poll::Idle,
            Err(TryRecvError::Disconnected) => Poll::Closed,
        }
    }

    /// Waits up to `idle` for a line. Returns early when one is pushed.
    pub fn pop_timeout(&self, idle: Duration) -> Poll {
        match self.rx.recv_timeout(idle) {
            Ok(line) => Poll::Line(line),
            Err(RecvTimeoutError::Timeout) => Poll::Idle,
            Err(RecvTimeoutError::Disconnected) => Poll::Closed,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
