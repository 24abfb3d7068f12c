//! Fixed-rate device capture.
//!
//! # REAL-TIME INVARIANT
//! Nothing reachable from [`session::CaptureSession::on_tick`] may block,
//! take a lock, or touch the filesystem. File I/O belongs to the per-channel
//! writer thread only.
//!
//! # DRAIN INVARIANT
//! Every row enqueued before a channel is deactivated ends up in its file.

pub mod channel;
pub mod clock;
pub mod queue;
pub mod record;
pub mod sampler;
pub mod session;
pub mod writer;
