use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create capture file {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write to {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("malformed config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("no channel at index {0}")]
    InvalidChannel(usize),

    #[error("failed to spawn writer thread: {0}")]
    WriterSpawn(#[source] std::io::Error),

    #[error("writer-{label} still holds its capture file after {waited:?}")]
    WriterStuck { label: String, waited: Duration },
}

pub type Result<T> = std::result::Result<T, CaptureError>;
