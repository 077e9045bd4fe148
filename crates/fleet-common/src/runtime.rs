use tokio::runtime::{Handle, Runtime};

use crate::config::RuntimeConfig;
use crate::error::{CommonError, CommonResult};

/// Owns the runtime that hosts the worker supervisor tasks.
#[derive(Debug)]
pub struct RuntimeManager {
    runtime: Runtime,
}

impl RuntimeManager {
    pub fn try_new(config: &RuntimeConfig) -> CommonResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_stack_size(config.stack_size)
            .enable_all()
            .build()
            .map_err(|e| CommonError::internal(e.to_string()))?;
        Ok(Self { runtime })
    }

    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }
}
