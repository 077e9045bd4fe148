use std::path::PathBuf;

use fleet_common::config::PortKind;
use fleet_common::error::CommonError;
use thiserror::Error;
use tokio::task::JoinError;

pub type ExecutionResult<T> = Result<T, ExecutionError>;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("configuration error: {0}")]
    CommonError(#[from] CommonError),
    #[error("worker index {index} is out of range for a fleet of {fleet_size}")]
    IndexOutOfRange { index: usize, fleet_size: usize },
    #[error("invalid port stride {stride}: must be at least {minimum}")]
    InvalidPortStride { stride: u16, minimum: u16 },
    #[error("{kind} of worker {index} does not fit in a port number")]
    PortOverflow { index: usize, kind: PortKind },
    #[error("worker ID of worker {index} overflows")]
    WorkerIdOverflow { index: usize },
    #[error("port {port} is assigned to both {first} and {second}")]
    PortCollision {
        port: u16,
        first: PortAssignment,
        second: PortAssignment,
    },
    #[error("failed to reset output directory {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read result file {}: {source}", path.display())]
    ResultFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("result path {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },
    #[error("{}:{line}: invalid number {value:?}", path.display())]
    ParseError {
        path: PathBuf,
        line: usize,
        value: String,
    },
    #[error("invalid result pattern: {0}")]
    InvalidPattern(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<JoinError> for ExecutionError {
    fn from(error: JoinError) -> Self {
        ExecutionError::InternalError(error.to_string())
    }
}

/// A port of a specific kind owned by a specific worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortAssignment {
    pub index: usize,
    pub kind: PortKind,
}

impl std::fmt::Display for PortAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of worker {}", self.kind, self.index)
    }
}
