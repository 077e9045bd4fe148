use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::config::deserialize_non_zero;
use crate::error::{CommonError, CommonResult};

const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// The prefix of environment variables that override the application configuration.
/// Nested keys are separated by `__`, e.g. `FLEET__LAUNCHER__SIZE=16`.
pub const APP_CONFIG_ENV_PREFIX: &str = "FLEET__";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub launcher: LauncherConfig,
    pub worker: WorkerConfig,
    pub output: OutputConfig,
    pub runtime: RuntimeConfig,
}

impl AppConfig {
    /// Returns the layered configuration sources: the embedded defaults
    /// followed by the environment variables.
    pub fn figment() -> Figment {
        Figment::from(Toml::string(DEFAULT_CONFIG)).admerge(Self::env())
    }

    /// Same as [`AppConfig::figment`], with a TOML file layered between
    /// the defaults and the environment variables.
    pub fn figment_with_file(path: &Path) -> Figment {
        Figment::from(Toml::string(DEFAULT_CONFIG))
            .admerge(Toml::file_exact(path))
            .admerge(Self::env())
    }

    pub fn extract(figment: Figment) -> CommonResult<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| CommonError::InvalidArgument(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn env() -> Env {
        Env::prefixed(APP_CONFIG_ENV_PREFIX).map(|p| p.as_str().replace("__", ".").into())
    }

    fn validate(&self) -> CommonResult<()> {
        if self.launcher.size == 0 {
            return Err(CommonError::invalid("launcher.size must be positive"));
        }
        if self.worker.executable.is_empty() {
            return Err(CommonError::invalid("worker.executable must not be empty"));
        }
        if self.output.result_pattern.is_empty() {
            return Err(CommonError::invalid(
                "output.result_pattern must not be empty",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    pub size: usize,
    pub port_stride: u16,
    pub pin_cpu: bool,
    pub config_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub executable: String,
    /// Arguments placed before the flags derived for each worker.
    pub args: Vec<String>,
    #[serde(deserialize_with = "deserialize_non_zero")]
    pub timeout_secs: Option<u64>,
}

impl WorkerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: String,
    pub result_pattern: String,
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub stack_size: usize,
}
