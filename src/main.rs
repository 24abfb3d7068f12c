use anyhow::Context;
use hapticap::device::{HapticDevice, SimulatedDevice};
use hapticap::{CaptureConfig, CaptureSession, EventCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "HAPTICAP_CONFIG";

fn load_config(arg: Option<String>) -> anyhow::Result<CaptureConfig> {
    match arg.or_else(|| std::env::var(CONFIG_ENV).ok()) {
        Some(path) => CaptureConfig::load(&path).with_context(|| format!("loading {}", path)),
        None => Ok(CaptureConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let config = load_config(args.next())?;
    let run_for = args
        .next()
        .map(|s| s.parse::<f64>().context("run duration must be seconds"))
        .transpose()?
        .map(Duration::from_secs_f64);

    // Stand-in for the simulation engine: one synthetic device per slot
    let devices: Vec<Arc<SimulatedDevice>> = config
        .devices
        .iter()
        .enumerate()
        .map(|(i, _)| Arc::new(SimulatedDevice::new(40.0 + 10.0 * i as f32)))
        .collect();
    let plugins = devices
        .iter()
        .map(|d| Some(d.clone() as Arc<dyn HapticDevice>))
        .collect();

    let tick_interval = config.tick_interval();
    let mut session = CaptureSession::new(config, plugins)?;
    session.start()?;
    tracing::info!(
        "capturing at {:.0} Hz into {}. Press Ctrl+C to stop.",
        1.0 / tick_interval.as_secs_f64(),
        session.output_dir().display()
    );

    let shutdown = CancellationToken::new();

    // Game-logic stand-in: grab and release ring 1 every couple of seconds
    let control = session.control();
    let grabber = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let mut holding = false;
            let mut cadence = tokio::time::interval(Duration::from_secs(2));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = cadence.tick() => {}
                }
                holding = !holding;
                for index in 0..control.channel_count() {
                    control.set_holding(index, holding, 1);
                    control.post_event(
                        index,
                        if holding { EventCode::GrabBegin } else { EventCode::GrabEnd },
                    );
                }
            }
        }
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let started = Instant::now();
    let mut cadence = tokio::time::interval(tick_interval);
    cadence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = cadence.tick() => {}
        }

        let realtime_s = started.elapsed().as_secs_f64();
        if run_for.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }

        // Engine step: devices update first, then capture samples them
        for device in &devices {
            device.set_time(realtime_s);
        }
        session.on_tick(realtime_s);
    }

    shutdown.cancel();
    let _ = grabber.await;

    let control = session.control();
    tokio::task::block_in_place(|| session.stop())?;
    for index in 0..control.channel_count() {
        if let Some(path) = control.file_path(index) {
            tracing::info!("channel {} written to {}", index, path.display());
        }
    }
    Ok(())
}
