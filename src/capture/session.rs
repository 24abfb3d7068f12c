//! Capture session lifecycle and the control surface exposed to game logic.
//!
//! The session is owned by whatever drives the simulation tick and is
//! driven through three calls: `start()` when capture is enabled,
//! `on_tick()` once per fixed step, `stop()` when capture is disabled.
//! Game logic on other threads goes through a cloned [`CaptureControl`].

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::channel::{ChannelShared, ChannelState, DeviceChannel, Pipeline};
use super::clock::{ClockSource, MonotonicClock};
use super::queue::sample_queue;
use super::record::EventCode;
use super::sampler::{sample_channel, SampleOutcome};
use super::writer::{LineSink, WriterHandle, WriterOptions, WriterStats};
use crate::config::CaptureConfig;
use crate::device::HapticDevice;
use crate::error::{CaptureError, Result};

/// `yyyyMMdd_HHmmss_fff`, UTC.
pub fn format_session_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S_%3f").to_string()
}

pub fn capture_file_name(session_id: &str, stamp: &str, label: &str, index: usize) -> String {
    format!("{}_{}_{}_idx{}.csv", session_id, stamp, label, index)
}

pub struct CaptureSession {
    config: CaptureConfig,
    session_id: String,
    session_stamp: String,
    clock: Arc<dyn ClockSource>,
    channels: Vec<DeviceChannel>,
    control: CaptureControl,
    running: bool,
}

impl CaptureSession {
    /// One channel per configured device. `plugins` is matched by index;
    /// slots without a plugin are sampled as "not connected".
    pub fn new(config: CaptureConfig, plugins: Vec<Option<Arc<dyn HapticDevice>>>) -> Result<Self> {
        config.validate()?;

        let mut plugins = plugins.into_iter();
        let channels: Vec<DeviceChannel> = config
            .devices
            .iter()
            .map(|device| DeviceChannel::new(device.label.clone(), plugins.next().flatten()))
            .collect();

        let control = CaptureControl {
            channels: channels.iter().map(|c| c.shared.clone()).collect(),
        };

        Ok(Self {
            session_id: config.resolve_session_id(),
            session_stamp: format_session_stamp(Utc::now()),
            config,
            clock: Arc::new(MonotonicClock::new()),
            channels,
            control,
            running: false,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_stamp(&self) -> &str {
        &self.session_stamp
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn control(&self) -> CaptureControl {
        self.control.clone()
    }

    /// Swaps the plugin behind a channel. `None` means the device went away.
    pub fn attach_device(&mut self, index: usize, plugin: Option<Arc<dyn HapticDevice>>) -> Result<()> {
        let channel = self
            .channels
            .get_mut(index)
            .ok_or(CaptureError::InvalidChannel(index))?;
        channel.plugin = plugin;
        Ok(())
    }

    /// Activates every channel. Channels that fail stay inactive; the first
    /// failure is returned after all channels were attempted.
    pub fn start(&mut self) -> Result<()> {
        info!(
            "capture session {} ({}) starting with {} channel(s)",
            self.session_id,
            self.session_stamp,
            self.channels.len()
        );
        self.running = true;

        let mut first_err = None;
        for index in 0..self.channels.len() {
            if let Err(e) = self.activate(index) {
                error!("channel {} failed to activate: {}", index, e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Samples every active channel. Returns how many rows were enqueued.
    pub fn on_tick(&mut self, realtime_s: f64) -> usize {
        if !self.running {
            return 0;
        }

        let clock = self.clock.as_ref();
        self.channels
            .iter_mut()
            .map(|channel| sample_channel(channel, clock, realtime_s))
            .filter(|outcome| *outcome == SampleOutcome::Enqueued)
            .count()
    }

    /// Deactivates every channel. Every channel is attempted; the first
    /// failure is returned.
    pub fn stop(&mut self) -> Result<()> {
        self.running = false;

        let mut first_err = None;
        for index in 0..self.channels.len() {
            if self.channels[index].pipeline.is_none() {
                continue;
            }
            if let Err(e) = self.deactivate(index) {
                error!("channel {} did not close cleanly: {}", index, e);
                first_err.get_or_insert(e);
            }
        }
        info!("capture session {} stopped", self.session_id);
        first_err.map_or(Ok(()), Err)
    }

    /// Opens a fresh capture file for one channel and starts its writer.
    pub fn activate(&mut self, index: usize) -> Result<PathBuf> {
        let channel = self
            .channels
            .get(index)
            .ok_or(CaptureError::InvalidChannel(index))?;

        match channel.state() {
            ChannelState::Active => {
                if let Some(path) = channel.shared.file_path() {
                    return Ok(path);
                }
            }
            ChannelState::Failed => {
                // Tear the dead writer down before reopening
                if let Err(e) = self.deactivate(index) {
                    warn!("channel {} closed with error before reactivation: {}", index, e);
                }
            }
            ChannelState::Inactive => {}
        }

        let dir = &self.config.output_dir;
        std::fs::create_dir_all(dir).map_err(|source| CaptureError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let channel = &mut self.channels[index];
        let path = dir.join(capture_file_name(
            &self.session_id,
            &self.session_stamp,
            channel.label(),
            index,
        ));
        let sink = LineSink::create(&path, self.config.flush_every_lines)?;

        let (producer, consumer) = sample_queue();
        let writer = WriterHandle::spawn(
            channel.label(),
            sink,
            consumer,
            channel.shared.state.clone(),
            WriterOptions {
                idle_poll: self.config.idle_poll(),
            },
        )?;

        channel.last_sample_ns = None;
        channel.shared.store_rate(0.0);
        channel.shared.signals.reset();
        channel.pipeline = Some(Pipeline { producer, writer });
        channel.shared.set_file_path(Some(path.clone()));
        channel.shared.state.set(ChannelState::Active);

        info!("channel {} ({}) capturing to {}", index, channel.label(), path.display());
        Ok(path)
    }

    /// Stops the channel's writer, draining everything already queued.
    pub fn deactivate(&mut self, index: usize) -> Result<WriterStats> {
        let join_timeout = self.config.join_timeout();
        let channel = self
            .channels
            .get_mut(index)
            .ok_or(CaptureError::InvalidChannel(index))?;

        let was_failed = channel.state() == ChannelState::Failed;
        channel.shared.state.set(ChannelState::Inactive);

        let Some(Pipeline { producer, writer }) = channel.pipeline.take() else {
            return Ok(WriterStats::default());
        };
        // The producer goes first so the writer sees the queue close
        drop(producer);

        let result = writer.stop(join_timeout);
        // A writer failing mid-drain may have flagged the channel after we did
        channel.shared.state.set(ChannelState::Inactive);
        if was_failed {
            if let Err(e) = &result {
                warn!("channel {} ({}) had failed: {}", index, channel.label(), e);
            }
        }
        if let Ok(stats) = &result {
            info!(
                "channel {} ({}) closed: {} lines{}",
                index,
                channel.label(),
                stats.lines_written,
                if stats.degraded { ", degraded shutdown" } else { "" }
            );
        }
        result
    }

    pub fn channel(&self, index: usize) -> Option<&DeviceChannel> {
        self.channels.get(index)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.channels.iter().any(|c| c.pipeline.is_some()) {
            let _ = self.stop();
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("session_id", &self.session_id)
            .field("session_stamp", &self.session_stamp)
            .field("running", &self.running)
            .field("channels", &self.channels)
            .finish()
    }
}

/// Thread-safe handle for game logic. Every call is a handful of atomic
/// operations; out-of-range or inactive channels are ignored.
#[derive(Debug, Clone)]
pub struct CaptureControl {
    channels: Arc<[Arc<ChannelShared>]>,
}

impl CaptureControl {
    fn active(&self, index: usize) -> Option<&ChannelShared> {
        self.channels
            .get(index)
            .map(|c| &**c)
            .filter(|c| c.is_active())
    }

    pub fn set_holding(&self, index: usize, holding: bool, ring_id: i32) {
        if let Some(channel) = self.active(index) {
            channel.signals.set_holding(holding, ring_id);
        }
    }

    pub fn post_event(&self, index: usize, code: EventCode) {
        if let Some(channel) = self.active(index) {
            channel.signals.post_event(code);
        }
    }

    /// Path of the channel's most recent capture file.
    pub fn file_path(&self, index: usize) -> Option<PathBuf> {
        self.channels.get(index).and_then(|c| c.file_path())
    }

    pub fn channel_state(&self, index: usize) -> Option<ChannelState> {
        self.channels.get(index).map(|c| c.state.get())
    }

    pub fn smoothed_rate(&self, index: usize) -> Option<f32> {
        self.channels.get(index).map(|c| c.smoothed_rate())
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.channels.get(index).map(|c| c.label.as_str())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
