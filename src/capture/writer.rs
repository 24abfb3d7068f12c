//! Background persistence for one channel.
//!
//! The writer thread owns the cadence of disk I/O: it pulls lines off the
//! channel's queue, writes them through a buffered file, and flushes every
//! `flush_every` lines. Stopping always drains whatever is still queued
//! before the file is closed.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::channel::{ChannelState, StateCell};
use super::queue::{Poll, SampleConsumer};
use super::record::HEADER;
use crate::error::{CaptureError, Result};

const FILE_BUFFER_BYTES: usize = 1 << 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Data rows written, header excluded.
    pub lines_written: u64,
    pub flushes: u64,
    /// The writer missed its join deadline and the stopping thread drained
    /// and closed the file instead.
    pub degraded: bool,
}

/// Open capture file plus flush bookkeeping.
#[derive(Debug)]
pub struct LineSink {
    path: PathBuf,
    out: BufWriter<File>,
    flush_every: usize,
    since_flush: usize,
    stats: WriterStats,
}

impl LineSink {
    /// Creates (truncating) the file and writes the header straight through to disk.
    pub fn create(path: impl AsRef<Path>, flush_every: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| CaptureError::CreateFile {
            path: path.clone(),
            source,
        })?;

        let mut sink = Self {
            path,
            out: BufWriter::with_capacity(FILE_BUFFER_BYTES, file),
            flush_every: flush_every.max(1),
            since_flush: 0,
            stats: WriterStats::default(),
        };
        sink.write_raw(HEADER)?;
        sink.flush()?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.write_raw(line)?;
        self.stats.lines_written += 1;
        self.since_flush += 1;
        if self.since_flush >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(|source| self.io_error(source))?;
        self.since_flush = 0;
        self.stats.flushes += 1;
        Ok(())
    }

    /// Final flush plus fsync. The file closes when the sink drops.
    pub fn finish(mut self) -> Result<WriterStats> {
        self.flush()?;
        self.out
            .get_ref()
            .sync_data()
            .map_err(|source| self.io_error(source))?;
        Ok(self.stats)
    }

    fn write_raw(&mut self, line: &str) -> Result<()> {
        self.out
            .write_all(line.as_bytes())
            .and_then(|_| self.out.write_all(b"\n"))
            .map_err(|source| CaptureError::Write {
                path: self.path.clone(),
                source,
            })
    }

    fn io_error(&self, source: std::io::Error) -> CaptureError {
        CaptureError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[derive(Debug)]
struct WriterShared {
    run: AtomicBool,
    /// Set by the stopping thread after a missed deadline. The writer stops
    /// popping and leaves the file where it is.
    handoff: AtomicBool,
    sink: Mutex<Option<LineSink>>,
}

impl WriterShared {
    fn sink(&self) -> MutexGuard<'_, Option<LineSink>> {
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// How the writer thread left its loop.
#[derive(Debug)]
enum WriterExit {
    Closed(WriterStats),
    /// The file is still open and the queue may hold lines; the stopping
    /// thread finishes both.
    HandedOff,
}

/// Owning handle to a running writer thread.
#[derive(Debug)]
pub struct WriterHandle {
    label: String,
    shared: Arc<WriterShared>,
    consumer: SampleConsumer,
    done_rx: Receiver<()>,
    thread: Option<JoinHandle<Result<WriterExit>>>,
}

#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub idle_poll: Duration,
}

/// Lower bound on how long a late writer gets to give up the file.
const MIN_HANDOFF_WAIT: Duration = Duration::from_millis(100);

impl WriterHandle {
    pub fn spawn(
        label: &str,
        sink: LineSink,
        consumer: SampleConsumer,
        state: Arc<StateCell>,
        options: WriterOptions,
    ) -> Result<Self> {
        let shared = Arc::new(WriterShared {
            run: AtomicBool::new(true),
            handoff: AtomicBool::new(false),
            sink: Mutex::new(Some(sink)),
        });
        let (done_tx, done_rx) = bounded(1);

        let thread = std::thread::Builder::new()
            .name(format!("writer-{}", label))
            .spawn({
                let shared = shared.clone();
                let consumer = consumer.clone();
                let label = label.to_string();
                move || writer_main(label, shared, consumer, state, options, done_tx)
            })
            .map_err(CaptureError::WriterSpawn)?;

        Ok(Self {
            label: label.to_string(),
            shared,
            consumer,
            done_rx,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.shared.run.load(Ordering::Acquire)
    }

    /// Signals the writer and waits up to `join_timeout` for it to drain and
    /// close. If it misses the deadline, the writer is told to hand the file
    /// over after its current line and this thread drains and closes it.
    pub fn stop(mut self, join_timeout: Duration) -> Result<WriterStats> {
        self.shared.run.store(false, Ordering::Release);

        if let Err(RecvTimeoutError::Timeout) = self.done_rx.recv_timeout(join_timeout) {
            warn!(
                "writer-{} did not exit within {:?}, degraded shutdown",
                self.label, join_timeout
            );
            self.shared.handoff.store(true, Ordering::Release);

            let wait = join_timeout.max(MIN_HANDOFF_WAIT);
            if let Err(RecvTimeoutError::Timeout) = self.done_rx.recv_timeout(wait) {
                error!(
                    "writer-{} is blocked inside file I/O, capture file left open",
                    self.label
                );
                // Dropping the JoinHandle detaches the thread
                self.thread.take();
                return Err(CaptureError::WriterStuck {
                    label: self.label.clone(),
                    waited: join_timeout + wait,
                });
            }
            return self.join().map(|stats| WriterStats {
                degraded: true,
                ..stats
            });
        }

        self.join()
    }

    fn join(&mut self) -> Result<WriterStats> {
        let Some(thread) = self.thread.take() else {
            return self.close_from_caller();
        };
        match thread.join() {
            Ok(Ok(WriterExit::Closed(stats))) => Ok(stats),
            Ok(Ok(WriterExit::HandedOff)) => self.close_from_caller(),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                error!("writer-{} panicked, closing capture file from caller", self.label);
                self.close_from_caller()
            }
        }
    }

    /// Only called once the writer thread has exited, so the lock is free.
    fn close_from_caller(&self) -> Result<WriterStats> {
        let Some(mut sink) = self.shared.sink().take() else {
            warn!("writer-{} exited without a capture file to close", self.label);
            return Ok(WriterStats {
                degraded: true,
                ..WriterStats::default()
            });
        };

        drain_into(&mut sink, &self.consumer)?;
        let stats = sink.finish()?;
        info!(
            "writer-{} closed by caller: {} lines, {} flushes",
            self.label, stats.lines_written, stats.flushes
        );
        Ok(stats)
    }
}

fn writer_main(
    label: String,
    shared: Arc<WriterShared>,
    consumer: SampleConsumer,
    state: Arc<StateCell>,
    options: WriterOptions,
    done_tx: Sender<()>,
) -> Result<WriterExit> {
    debug!("writer-{} started", label);
    let result = run_writer(&shared, &consumer, options.idle_poll);

    match &result {
        Ok(WriterExit::Closed(stats)) => info!(
            "writer-{} finished: {} lines, {} flushes",
            label, stats.lines_written, stats.flushes
        ),
        Ok(WriterExit::HandedOff) => debug!("writer-{} handed its file to the caller", label),
        Err(e) => {
            state.set(ChannelState::Failed);
            shared.run.store(false, Ordering::Release);
            error!("writer-{} failed, channel disabled: {}", label, e);
        }
    }

    let _ = done_tx.send(());
    result
}

/// Pops and writes until the queue closes, or until it runs dry after a
/// stop. A line is only popped after checking for a handoff, and is written
/// before the next check, so no line is lost between the two threads.
fn run_writer(shared: &WriterShared, consumer: &SampleConsumer, idle: Duration) -> Result<WriterExit> {
    loop {
        if shared.handoff.load(Ordering::Acquire) {
            return Ok(WriterExit::HandedOff);
        }

        let stopping = !shared.run.load(Ordering::Acquire);
        let poll = if stopping {
            consumer.try_pop()
        } else {
            consumer.pop_timeout(idle)
        };

        match poll {
            Poll::Line(line) => {
                let mut guard = shared.sink();
                let Some(sink) = guard.as_mut() else {
                    return Ok(WriterExit::HandedOff);
                };
                if let Err(e) = sink.write_line(&line) {
                    // Close what we can; the error is what gets reported
                    guard.take();
                    return Err(e);
                }
            }
            Poll::Idle if stopping => break,
            Poll::Idle => {}
            Poll::Closed => break,
        }
    }

    match shared.sink().take() {
        Some(sink) => sink.finish().map(WriterExit::Closed),
        None => Ok(WriterExit::HandedOff),
    }
}

fn drain_into(sink: &mut LineSink, consumer: &SampleConsumer) -> Result<()> {
    while let Poll::Line(line) = consumer.try_pop() {
        sink.write_line(&line)?;
    }
    Ok(())
}
