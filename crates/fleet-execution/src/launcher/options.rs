use std::time::Duration;

use fleet_common::config::AppConfig;

#[derive(Debug, Clone, Default)]
pub struct FleetLauncherOptions {
    /// Whether each worker is pinned to the CPU core of its specification.
    pub pin_cpu: bool,
    /// The time after which a running worker is killed.
    /// Workers are waited for indefinitely if this is [`None`].
    pub timeout: Option<Duration>,
}

impl FleetLauncherOptions {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            pin_cpu: config.launcher.pin_cpu,
            timeout: config.worker.timeout(),
        }
    }
}
