use hapticap::capture::sampler::{frame_delta, smooth_rate, RATE_SMOOTHING};
use hapticap::device::{HapticDevice, SimulatedDevice};
use hapticap::{CaptureConfig, CaptureSession, ClockSource, ManualClock};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_first_valid_delta_seeds_estimate() {
    assert_eq!(smooth_rate(0.0, 0.004), 250.0);
}

#[test]
fn test_blend_weights_new_sample_by_smoothing_factor() {
    let blended = smooth_rate(100.0, 0.005);
    let expected = 100.0 + (200.0 - 100.0) * RATE_SMOOTHING;
    assert!((blended - expected).abs() < 1e-4, "{} vs {}", blended, expected);
}

#[test]
fn test_degenerate_deltas_leave_estimate_untouched() {
    assert_eq!(smooth_rate(480.0, 0.0), 480.0);
    assert_eq!(smooth_rate(480.0, 1e-6), 480.0);
    assert_eq!(smooth_rate(480.0, -0.002), 480.0);
    assert_eq!(smooth_rate(0.0, 0.0), 0.0);
}

#[test]
fn test_converges_to_constant_tick_rate() {
    // Seeded at 100 Hz, then fed a steady 2 ms interval
    let mut rate = smooth_rate(0.0, 0.01);
    for _ in 0..200 {
        rate = smooth_rate(rate, 0.002);
    }
    assert!((rate - 500.0).abs() / 500.0 < 0.01, "rate {} did not converge", rate);
}

#[test]
fn test_frame_delta_clamps_regressing_clock() {
    assert_eq!(frame_delta(None, 5_000_000), 0.0);
    assert_eq!(frame_delta(Some(1_000_000), 3_000_000), 0.002);
    assert_eq!(frame_delta(Some(3_000_000), 1_000_000), 0.0);
}

#[test]
fn test_session_rate_tracks_tick_interval() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Duration::from_secs(1)));
    let config = CaptureConfig {
        output_dir: dir.path().to_path_buf(),
        session_id: Some("rate".to_string()),
        ..CaptureConfig::default()
    };
    let device: Arc<dyn HapticDevice> = Arc::new(SimulatedDevice::default());
    let mut session = CaptureSession::new(config, vec![Some(device)])
        .unwrap()
        .with_clock(clock.clone());
    session.start().unwrap();
    let control = session.control();

    // One slow step, then a long run at 1 kHz
    session.on_tick(0.0);
    clock.advance(Duration::from_millis(20));
    session.on_tick(0.0);
    assert_eq!(control.smoothed_rate(0), Some(50.0));

    for _ in 0..300 {
        clock.advance(Duration::from_millis(1));
        session.on_tick(0.0);
    }
    let rate = control.smoothed_rate(0).unwrap();
    assert!((rate - 1000.0).abs() / 1000.0 < 0.01, "rate {}", rate);

    // A stalled clock does not disturb the estimate
    session.on_tick(0.0);
    assert_eq!(control.smoothed_rate(0), Some(rate));

    session.stop().unwrap();
}

#[test]
fn test_monotonic_clock_never_goes_backwards() {
    let clock = hapticap::MonotonicClock::new();
    let mut last = clock.now_ns();
    for _ in 0..10_000 {
        let now = clock.now_ns();
        assert!(now >= last);
        last = now;
    }
}
