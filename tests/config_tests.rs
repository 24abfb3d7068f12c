use hapticap::{CaptureConfig, CaptureError, DeviceConfig};
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_defaults_match_reference_rig() {
    let config = CaptureConfig::default();
    assert_eq!(config.output_dir, PathBuf::from("HapticLogs"));
    assert_eq!(config.flush_every_lines, 256);
    assert_eq!(config.idle_poll(), Duration::from_millis(1));
    assert_eq!(config.join_timeout(), Duration::from_millis(500));
    assert_eq!(config.devices, vec![DeviceConfig { label: "left_device".into() }]);
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_fills_missing_fields_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.json");
    std::fs::write(
        &path,
        r#"{
            "output_dir": "/tmp/peg_transfer",
            "session_id": "Triangle",
            "flush_every_lines": 64,
            "devices": [{ "label": "left" }, { "label": "right" }]
        }"#,
    )
    .unwrap();

    let config = CaptureConfig::load(&path).unwrap();
    assert_eq!(config.output_dir, PathBuf::from("/tmp/peg_transfer"));
    assert_eq!(config.resolve_session_id(), "Triangle");
    assert_eq!(config.flush_every_lines, 64);
    assert_eq!(config.devices.len(), 2);
    assert_eq!(config.join_timeout_ms, 500);
    assert_eq!(config.tick_hz, 500);
}

#[test]
fn test_load_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let cases = [
        r#"{ "flush_every_lines": 0 }"#,
        r#"{ "devices": [] }"#,
        r#"{ "devices": [{ "label": "a" }, { "label": "a" }] }"#,
        r#"{ "devices": [{ "label": "  " }] }"#,
        r#"{ "tick_hz": 5000 }"#,
    ];
    for (i, raw) in cases.iter().enumerate() {
        let path = dir.path().join(format!("bad{}.json", i));
        std::fs::write(&path, raw).unwrap();
        let err = CaptureConfig::load(&path).unwrap_err();
        assert!(matches!(err, CaptureError::Config(_)), "case {}: {:?}", i, err);
    }
}

#[test]
fn test_load_reports_parse_and_read_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        CaptureConfig::load(&path),
        Err(CaptureError::ConfigParse(_))
    ));

    assert!(matches!(
        CaptureConfig::load(dir.path().join("missing.json")),
        Err(CaptureError::ConfigRead { .. })
    ));
}

#[test]
fn test_blank_session_id_is_generated() {
    let config = CaptureConfig {
        session_id: Some("   ".into()),
        ..CaptureConfig::default()
    };
    let a = config.resolve_session_id();
    let b = config.resolve_session_id();
    assert_eq!(a.len(), 32);
    assert_ne!(a, b);
}
