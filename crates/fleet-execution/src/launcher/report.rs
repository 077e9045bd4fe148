use std::fmt;
use std::process::ExitStatus;

use crate::id::WorkerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    /// The worker exited with the exit code.
    Exited(i32),
    /// The worker was terminated by the signal.
    Signaled(i32),
    /// The worker process could not be created.
    SpawnFailed(String),
    /// Waiting for the worker failed.
    WaitFailed(String),
    /// The worker was killed after running past the timeout.
    TimedOut,
}

impl WorkerStatus {
    /// The code reported for the worker, if any.
    /// A worker terminated by a signal reports the negated signal number.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            WorkerStatus::Exited(code) => Some(*code),
            WorkerStatus::Signaled(signal) => Some(-signal),
            WorkerStatus::SpawnFailed(_) | WorkerStatus::WaitFailed(_) | WorkerStatus::TimedOut => {
                None
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkerStatus::Exited(0))
    }
}

impl From<ExitStatus> for WorkerStatus {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return WorkerStatus::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;

            if let Some(signal) = status.signal() {
                return WorkerStatus::Signaled(signal);
            }
        }
        WorkerStatus::WaitFailed(format!("unknown exit status: {status}"))
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Exited(code) => write!(f, "exited with code {code}"),
            WorkerStatus::Signaled(signal) => write!(f, "terminated by signal {signal}"),
            WorkerStatus::SpawnFailed(reason) => write!(f, "failed to spawn: {reason}"),
            WorkerStatus::WaitFailed(reason) => write!(f, "failed to wait: {reason}"),
            WorkerStatus::TimedOut => write!(f, "killed after timeout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub index: usize,
    pub worker_id: WorkerId,
    pub pid: Option<u32>,
    pub status: WorkerStatus,
}

/// The status line shown to the operator, e.g. `Thread 3 exit with 0.`
/// Workers without an exit code are shown as `None`.
impl fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status.exit_code() {
            Some(code) => write!(f, "Thread {} exit with {code}.", self.index),
            None => write!(f, "Thread {} exit with None.", self.index),
        }
    }
}

/// One report per launched worker, in the order of the specifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetReport {
    workers: Vec<WorkerReport>,
}

impl FleetReport {
    pub(super) fn new(workers: Vec<WorkerReport>) -> Self {
        Self { workers }
    }

    pub fn workers(&self) -> &[WorkerReport] {
        &self.workers
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.workers
            .iter()
            .filter(|worker| !worker.status.is_success())
            .count()
    }
}
