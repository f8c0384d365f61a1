use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error};

/// Failures of the memory query itself. The monitor maps these to Critical.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Current process id unavailable: {0}")]
    NoPid(String),

    #[error("Process {0} not found in process table")]
    ProcessMissing(u32),

    #[error("System memory query returned no data")]
    NoSystemMemory,

    #[error("Probe error: {0}")]
    Other(String),
}

/// Errors from serializing one record into a batch stream.
#[derive(Debug, Error)]
pub enum RecordWriteError {
    /// The record itself could not be serialized; nothing was written for it.
    #[error("Record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The output stream failed; the batch can no longer be trusted.
    #[error("Output stream error: {0}")]
    Io(#[from] io::Error),
}

impl RecordWriteError {
    pub fn is_record_local(&self) -> bool {
        !matches!(self, RecordWriteError::Io(_))
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to open batch output {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Batch output write failed: {0}")]
    Write(#[from] io::Error),

    #[error("Batch header serialization failed: {0}")]
    Header(#[from] serde_json::Error),

    #[error("Failed to finalize batch output {path}: {source}")]
    Finalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Engine level failures. These end a run in the Failed state.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to spawn merge worker: {0}")]
    Spawn(io::Error),

    #[error("Merge worker panicked")]
    WorkerPanicked,

    #[error("Memory monitor unavailable: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Resume state error: {0}")]
    State(#[from] StateError),
}

impl MergeError {
    pub fn log_error(&self) {
        match self {
            MergeError::OutputDir { path, source } => {
                error!("Cannot create output directory {}: {}", path.display(), source);
                debug!("Output directory error details: {:?}", source);
            }
            MergeError::Spawn(e) => {
                error!("Failed to spawn merge worker: {}", e);
                debug!("Spawn error details: {:?}", e);
            }
            MergeError::WorkerPanicked => {
                error!("Merge worker panicked");
            }
            MergeError::Monitor(e) => {
                error!("Memory monitor unavailable: {}", e);
                debug!("Memory monitor error details: {:?}", e);
            }
            MergeError::Batch(e) => {
                error!("Batch error: {}", e);
                debug!("Batch error details: {:?}", e);
            }
            MergeError::State(e) => {
                error!("Resume state error: {}", e);
                debug!("Resume state error details: {:?}", e);
            }
        }
    }
}
