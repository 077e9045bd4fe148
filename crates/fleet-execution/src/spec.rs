use std::fmt::Display;

use fleet_common::config::{BaseConfig, PortKind, PortSet};

use crate::error::{ExecutionError, ExecutionResult};
use crate::id::{CpuCore, WorkerId};

/// The prefix of every flag passed to the worker executable.
/// The flag names and their order are a contract with the worker.
pub const WORKER_FLAG_PREFIX: &str = "--DERECHO/";
pub const WORKER_ID_FLAG: &str = "local_id";

/// Workers are pinned to even-numbered cores only,
/// leaving the odd-numbered siblings free for housekeeping.
pub const CPU_AFFINITY_STRIDE: usize = 2;

pub const MIN_PORT_STRIDE: u16 = 2;
pub const DEFAULT_PORT_STRIDE: u16 = 20;

/// The increment applied to every base port per worker index.
///
/// A stride of `1` places the ports of neighboring workers next to each other,
/// which collides as soon as the worker opens more than one port per base port.
/// The safe minimum depends on how many consecutive ports the worker uses,
/// so the value is configurable, but never below [`MIN_PORT_STRIDE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStride(u16);

impl PortStride {
    pub fn try_new(stride: u16) -> ExecutionResult<Self> {
        if stride < MIN_PORT_STRIDE {
            return Err(ExecutionError::InvalidPortStride {
                stride,
                minimum: MIN_PORT_STRIDE,
            });
        }
        Ok(Self(stride))
    }

    pub fn get(&self) -> u16 {
        self.0
    }
}

impl Default for PortStride {
    fn default() -> Self {
        Self(DEFAULT_PORT_STRIDE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub index: usize,
    pub cpu_affinity: CpuCore,
    pub worker_id: WorkerId,
    pub ports: PortSet,
    pub executable: String,
    pub args: Vec<String>,
}

impl WorkerSpec {
    /// The full command line, starting with the executable.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.executable.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

/// Derives the specification of every worker from the base configuration.
/// The result only depends on the base configuration, the stride, the
/// command, and the worker index.
#[derive(Debug, Clone)]
pub struct WorkerSpecBuilder {
    base: BaseConfig,
    stride: PortStride,
    executable: String,
    leading_args: Vec<String>,
}

impl WorkerSpecBuilder {
    pub fn new(base: BaseConfig, stride: PortStride, executable: impl Into<String>) -> Self {
        Self {
            base,
            stride,
            executable: executable.into(),
            leading_args: vec![],
        }
    }

    /// Arguments placed between the executable and the derived flags.
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    pub fn fleet_size(&self) -> usize {
        self.base.fleet_size
    }

    pub fn build(&self, index: usize) -> ExecutionResult<WorkerSpec> {
        let fleet_size = self.base.fleet_size;
        if index >= fleet_size {
            return Err(ExecutionError::IndexOutOfRange { index, fleet_size });
        }
        let cpu_affinity = index
            .checked_mul(CPU_AFFINITY_STRIDE)
            .ok_or(ExecutionError::IndexOutOfRange { index, fleet_size })?;
        let worker_id = self.worker_id(index)?;
        let base = &self.base.ports;
        let ports = PortSet {
            gms: self.port(index, PortKind::Gms, base.gms)?,
            state_transfer: self.port(index, PortKind::StateTransfer, base.state_transfer)?,
            sst: self.port(index, PortKind::Sst, base.sst)?,
            rdmc: self.port(index, PortKind::Rdmc, base.rdmc)?,
            external: self.port(index, PortKind::External, base.external)?,
        };
        let args = self
            .leading_args
            .iter()
            .cloned()
            .chain(std::iter::once(flag(WORKER_ID_FLAG, worker_id)))
            .chain(ports.iter().map(|(kind, port)| flag(kind.key(), port)))
            .collect();
        Ok(WorkerSpec {
            index,
            cpu_affinity: CpuCore::from(cpu_affinity),
            worker_id,
            ports,
            executable: self.executable.clone(),
            args,
        })
    }

    fn worker_id(&self, index: usize) -> ExecutionResult<WorkerId> {
        let overflow = || ExecutionError::WorkerIdOverflow { index };
        let fleet_size = u64::try_from(self.base.fleet_size).map_err(|_| overflow())?;
        let offset = u64::try_from(index).map_err(|_| overflow())?;
        self.base
            .local_id
            .checked_mul(fleet_size)
            .and_then(|x| x.checked_add(offset))
            .map(WorkerId::from)
            .ok_or_else(overflow)
    }

    fn port(&self, index: usize, kind: PortKind, base: u16) -> ExecutionResult<u16> {
        u16::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(self.stride.get()))
            .and_then(|offset| base.checked_add(offset))
            .ok_or(ExecutionError::PortOverflow { index, kind })
    }
}

fn flag(key: &str, value: impl Display) -> String {
    format!("{WORKER_FLAG_PREFIX}{key}={value}")
}
