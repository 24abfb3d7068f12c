//! Per-tick sampling.
//!
//! Runs on the simulation tick thread. Everything here is bounded work:
//! a handful of atomic loads, one formatted line, one non-blocking push.
//! No locks, no I/O.

use super::channel::{ChannelState, DeviceChannel};
use super::clock::ClockSource;
use super::record::{format_line, SampleRecord};
use crate::device::resolve_orientation;

/// Weight of the newest instantaneous rate in the running estimate.
pub const RATE_SMOOTHING: f32 = 0.05;

/// Deltas at or below this are treated as "no time passed" for rate purposes.
pub const MIN_RATE_DT_S: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Enqueued,
    /// No plugin attached. Not an error; the tick is skipped.
    NoDevice,
    /// Channel inactive, failed, or its queue has no consumer.
    Skipped,
}

/// Folds one inter-sample delta into the running rate estimate.
///
/// The first usable delta seeds the estimate directly. Deltas that are zero,
/// negative or too small to mean anything leave it untouched.
pub fn smooth_rate(previous: f32, dt_s: f64) -> f32 {
    if dt_s <= MIN_RATE_DT_S {
        return previous;
    }
    let instantaneous = (1.0 / dt_s) as f32;
    if previous <= 0.0 {
        instantaneous
    } else {
        previous + (instantaneous - previous) * RATE_SMOOTHING
    }
}

/// Delta since the previous sample in seconds. The first sample gets 0, and
/// so does a clock that stalled or stepped backwards.
pub fn frame_delta(last_ns: Option<u64>, now_ns: u64) -> f64 {
    match last_ns {
        Some(last) => now_ns.saturating_sub(last) as f64 / 1e9,
        None => 0.0,
    }
}

pub fn sample_channel(
    channel: &mut DeviceChannel,
    clock: &dyn ClockSource,
    realtime_s: f64,
) -> SampleOutcome {
    if channel.state() != ChannelState::Active {
        return SampleOutcome::Skipped;
    }
    let Some(plugin) = channel.plugin.as_deref() else {
        return SampleOutcome::NoDevice;
    };
    let Some(pipeline) = channel.pipeline.as_ref() else {
        return SampleOutcome::Skipped;
    };

    let now_ns = clock.now_ns();
    let dt_s = frame_delta(channel.last_sample_ns, now_ns);
    channel.last_sample_ns = Some(now_ns);

    let shared = &channel.shared;
    let fps = smooth_rate(shared.smoothed_rate(), dt_s);
    shared.store_rate(fps);

    let event = shared.signals.take_event();
    let (is_holding, held_ring_id) = shared.signals.holding();

    let record = SampleRecord {
        system_time_ns: now_ns,
        realtime_s,
        position_mm: plugin.current_position(),
        rotation: resolve_orientation(plugin),
        joint_rad: plugin.joint_angles().to_radians(),
        gimbal_rad: plugin.gimbal_angles().to_radians(),
        force_n: plugin.current_force(),
        is_holding,
        held_ring_id,
        event,
        fps,
        dt_s,
    };

    if pipeline.producer.push(format_line(&record)) {
        SampleOutcome::Enqueued
    } else {
        SampleOutcome::Skipped
    }
}
