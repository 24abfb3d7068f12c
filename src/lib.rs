pub mod capture;
pub mod config;
pub mod device;
pub mod error;

pub use capture::channel::ChannelState;
pub use capture::clock::{ClockSource, ManualClock, MonotonicClock};
pub use capture::record::{EventCode, SampleRecord};
pub use capture::session::{CaptureControl, CaptureSession};
pub use capture::writer::WriterStats;
pub use config::{CaptureConfig, DeviceConfig};
pub use error::{CaptureError, Result};
