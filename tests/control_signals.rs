use hapticap::capture::channel::ChannelSignals;
use hapticap::capture::record::HEADER;
use hapticap::device::{HapticDevice, SimulatedDevice};
use hapticap::{CaptureConfig, CaptureSession, ChannelState, EventCode, ManualClock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn session_in(dir: &std::path::Path, clock: Arc<ManualClock>) -> CaptureSession {
    let config = CaptureConfig {
        output_dir: dir.to_path_buf(),
        session_id: Some("Star".to_string()),
        ..CaptureConfig::default()
    };
    let device: Arc<dyn HapticDevice> = Arc::new(SimulatedDevice::default());
    CaptureSession::new(config, vec![Some(device)])
        .unwrap()
        .with_clock(clock)
}

#[test]
fn test_take_event_clears_pending() {
    let signals = ChannelSignals::new();
    assert_eq!(signals.take_event(), EventCode::None);

    signals.post_event(EventCode::RingContactEnd);
    assert_eq!(signals.take_event(), EventCode::RingContactEnd);
    assert_eq!(signals.take_event(), EventCode::None);

    // Overwrite returns what was pending
    assert_eq!(signals.post_event(EventCode::GrabBegin), EventCode::None);
    assert_eq!(signals.post_event(EventCode::GrabEnd), EventCode::GrabBegin);
    assert_eq!(signals.take_event(), EventCode::GrabEnd);
}

#[test]
fn test_release_clears_held_ring() {
    let signals = ChannelSignals::new();
    assert_eq!(signals.holding(), (false, -1));
    signals.set_holding(true, 3);
    assert_eq!(signals.holding(), (true, 3));
    signals.set_holding(false, 3);
    assert_eq!(signals.holding(), (false, -1));
}

#[test]
fn test_control_calls_on_inactive_or_missing_channels_are_noops() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Duration::from_secs(1)));
    let mut session = session_in(dir.path(), clock.clone());
    let control = session.control();

    // Before activation
    control.post_event(0, EventCode::PegPlace);
    control.set_holding(0, true, 9);
    assert_eq!(control.file_path(0), None);
    assert_eq!(control.channel_state(0), Some(ChannelState::Inactive));

    // Out of range
    control.post_event(5, EventCode::PegPlace);
    control.set_holding(usize::MAX, true, 1);
    assert_eq!(control.file_path(5), None);
    assert_eq!(control.channel_state(5), None);
    assert_eq!(control.smoothed_rate(5), None);

    session.start().unwrap();
    clock.advance(Duration::from_millis(1));
    session.on_tick(0.0);
    let path = control.file_path(0).unwrap();
    session.stop().unwrap();

    // Nothing posted while inactive leaked into the capture
    let content = std::fs::read_to_string(&path).unwrap();
    let row: Vec<&str> = content.lines().nth(1).unwrap().split(',').collect();
    assert_eq!(row[18..21], ["0", "-1", "0"]);
    assert_eq!(content.lines().next(), Some(HEADER));
}

#[test]
fn test_concurrent_signal_updates_are_never_torn() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Duration::from_secs(1)));
    let mut session = session_in(dir.path(), clock.clone());
    session.start().unwrap();
    let control = session.control();
    let done = Arc::new(AtomicBool::new(false));

    // 1. Four game-logic threads hammer the control surface
    let writers: Vec<_> = (0..4)
        .map(|t| {
            let control = control.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let ring = 1_000_000 * (t + 1);
                let events = [EventCode::GrabBegin, EventCode::PegDrop, EventCode::Other];
                let mut i = 0usize;
                while !done.load(Ordering::Acquire) {
                    control.set_holding(0, i % 2 == 0, ring);
                    control.post_event(0, events[i % events.len()]);
                    i += 1;
                }
            })
        })
        .collect();

    // 2. Tick thread samples concurrently
    for _ in 0..2000 {
        clock.advance(Duration::from_millis(1));
        session.on_tick(0.0);
    }
    done.store(true, Ordering::Release);
    for w in writers {
        w.join().unwrap();
    }

    let path = control.file_path(0).unwrap();
    session.stop().unwrap();

    // 3. Every field holds a value some caller wrote in full
    let content = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<Vec<&str>> = content.lines().skip(1).map(|l| l.split(',').collect()).collect();
    assert_eq!(rows.len(), 2000);
    let valid_rings = ["-1", "1000000", "2000000", "3000000", "4000000"];
    for row in &rows {
        assert!(row[18] == "0" || row[18] == "1", "holding {}", row[18]);
        assert!(valid_rings.contains(&row[19]), "ring {}", row[19]);
        // Flag and ring id are always a pair some caller stored together
        assert_eq!(row[18] == "1", row[19] != "-1", "pair {} {}", row[18], row[19]);
        assert!(["0", "1", "6", "99"].contains(&row[20]), "event {}", row[20]);
    }
}

#[test]
fn test_holding_pair_keeps_negative_and_extreme_ids() {
    let signals = ChannelSignals::new();
    for id in [0, 7, i32::MAX, i32::MIN, -5] {
        signals.set_holding(true, id);
        assert_eq!(signals.holding(), (true, id));
    }
    signals.set_holding(false, i32::MAX);
    assert_eq!(signals.holding(), (false, -1));
}

#[test]
fn test_reset_clears_holding_and_pending_event() {
    let signals = ChannelSignals::new();
    signals.set_holding(true, 4);
    signals.post_event(EventCode::PegPlace);

    signals.reset();
    assert_eq!(signals.holding(), (false, -1));
    assert_eq!(signals.take_event(), EventCode::None);
}
