use portable_atomic::AtomicF32;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use super::queue::SampleProducer;
use super::record::{EventCode, NO_RING};
use super::writer::WriterHandle;
use crate::device::HapticDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    Inactive = 0,
    Active = 1,
    /// The writer hit an I/O error. Sampling for this channel is suspended
    /// until it is deactivated.
    Failed = 2,
}

#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ChannelState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> ChannelState {
        match self.0.load(Ordering::Acquire) {
            1 => ChannelState::Active,
            2 => ChannelState::Failed,
            _ => ChannelState::Inactive,
        }
    }

    pub fn set(&self, state: ChannelState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Fields game logic writes from arbitrary threads and the sampler reads
/// once per tick. Each is a single atomic so no read can observe a torn value.
#[derive(Debug)]
pub struct ChannelSignals {
    /// Holding flag in the high half, held ring id in the low half, so the
    /// sampler always sees a pair that was stored together.
    held: AtomicI64,
    pending_event: AtomicI32,
}

fn pack_held(holding: bool, ring_id: i32) -> i64 {
    ((holding as i64) << 32) | (ring_id as u32 as i64)
}

fn unpack_held(packed: i64) -> (bool, i32) {
    ((packed >> 32) != 0, packed as i32)
}

impl ChannelSignals {
    pub fn new() -> Self {
        Self {
            held: AtomicI64::new(pack_held(false, NO_RING)),
            pending_event: AtomicI32::new(EventCode::None.code()),
        }
    }

    pub fn set_holding(&self, holding: bool, ring_id: i32) {
        let ring_id = if holding { ring_id } else { NO_RING };
        self.held.store(pack_held(holding, ring_id), Ordering::Release);
    }

    /// Overwrites any event not yet consumed; the last post in a tick wins.
    pub fn post_event(&self, code: EventCode) -> EventCode {
        EventCode::from_code(self.pending_event.swap(code.code(), Ordering::AcqRel))
    }

    /// Read-and-clear, so each posted event lands in at most one record.
    pub fn take_event(&self) -> EventCode {
        EventCode::from_code(self.pending_event.swap(EventCode::None.code(), Ordering::AcqRel))
    }

    pub fn holding(&self) -> (bool, i32) {
        unpack_held(self.held.load(Ordering::Acquire))
    }

    /// Back to "not holding, no event" for a fresh capture file.
    pub fn reset(&self) {
        self.set_holding(false, NO_RING);
        self.pending_event
            .store(EventCode::None.code(), Ordering::Release);
    }
}

impl Default for ChannelSignals {
    fn default() -> Self {
        Self::new()
    }
}

/// The part of a channel visible to control callers.
#[derive(Debug)]
pub struct ChannelShared {
    pub label: String,
    pub signals: ChannelSignals,
    pub state: Arc<StateCell>,
    fps: AtomicF32,
    // Only touched on activate/deactivate and by control queries, never per tick
    file_path: RwLock<Option<PathBuf>>,
}

impl ChannelShared {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            signals: ChannelSignals::new(),
            state: Arc::new(StateCell::new(ChannelState::Inactive)),
            fps: AtomicF32::new(0.0),
            file_path: RwLock::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.get() == ChannelState::Active
    }

    pub fn smoothed_rate(&self) -> f32 {
        self.fps.load(Ordering::Acquire)
    }

    pub(crate) fn store_rate(&self, fps: f32) {
        self.fps.store(fps, Ordering::Release);
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.file_path
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn set_file_path(&self, path: Option<PathBuf>) {
        *self
            .file_path
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = path;
    }
}

/// Queue and writer of an active channel. Created and torn down together.
#[derive(Debug)]
pub struct Pipeline {
    pub producer: SampleProducer,
    pub writer: WriterHandle,
}

/// One physical device's sampling-to-file pipeline.
pub struct DeviceChannel {
    pub shared: Arc<ChannelShared>,
    pub plugin: Option<Arc<dyn HapticDevice>>,
    /// Session time of the previous sample; `None` until the first one.
    pub last_sample_ns: Option<u64>,
    pub pipeline: Option<Pipeline>,
}

impl DeviceChannel {
    pub fn new(label: impl Into<String>, plugin: Option<Arc<dyn HapticDevice>>) -> Self {
        Self {
            shared: Arc::new(ChannelShared::new(label)),
            plugin,
            last_sample_ns: None,
            pipeline: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state.get()
    }
}

impl std::fmt::Debug for DeviceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceChannel")
            .field("label", &self.shared.label)
            .field("state", &self.state())
            .field("has_plugin", &self.plugin.is_some())
            .field("last_sample_ns", &self.last_sample_ns)
            .finish()
    }
}
