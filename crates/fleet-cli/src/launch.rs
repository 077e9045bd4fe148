use clap::Args;
use figment::providers::Serialized;
use figment::Figment;
use fleet_common::config::AppConfig;
use fleet_common::runtime::RuntimeManager;
use fleet_execution::{load_plan, run_fleet};

/// Overrides for the launcher settings.
#[derive(Args, Debug, Default)]
pub(crate) struct FleetArgs {
    /// The INI file with the `DERECHO` section.
    #[arg(long)]
    config: Option<String>,
    /// The number of workers.
    #[arg(long)]
    size: Option<usize>,
    /// The worker executable.
    #[arg(long)]
    executable: Option<String>,
    /// The directory that is emptied before the workers start.
    #[arg(long)]
    output_dir: Option<String>,
    /// The port increment per worker index.
    #[arg(long)]
    port_stride: Option<u16>,
    /// Kill workers still running after this many seconds (0 waits forever).
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Do not pin workers to CPU cores.
    #[arg(long)]
    no_pin_cpu: bool,
}

impl FleetArgs {
    pub(crate) fn apply(&self, mut figment: Figment) -> Figment {
        if let Some(config) = &self.config {
            figment = figment.merge(Serialized::default("launcher.config_file", config));
        }
        if let Some(size) = self.size {
            figment = figment.merge(Serialized::default("launcher.size", size));
        }
        if let Some(executable) = &self.executable {
            figment = figment.merge(Serialized::default("worker.executable", executable));
        }
        if let Some(directory) = &self.output_dir {
            figment = figment.merge(Serialized::default("output.directory", directory));
        }
        if let Some(stride) = self.port_stride {
            figment = figment.merge(Serialized::default("launcher.port_stride", stride));
        }
        if let Some(timeout) = self.timeout_secs {
            figment = figment.merge(Serialized::default("worker.timeout_secs", timeout));
        }
        if self.no_pin_cpu {
            figment = figment.merge(Serialized::default("launcher.pin_cpu", false));
        }
        figment
    }
}

pub(crate) fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = RuntimeManager::try_new(&config.runtime)?;
    let report = runtime.handle().block_on(run_fleet(&config))?;
    for worker in report.workers() {
        println!("{worker}");
    }
    Ok(())
}

pub(crate) fn plan(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let plan = load_plan(&config)?;
    for spec in plan.specs() {
        let core = if config.launcher.pin_cpu {
            format!("core {}", spec.cpu_affinity)
        } else {
            "unpinned".to_string()
        };
        println!(
            "worker {} (ID {}, {core}): {}",
            spec.index,
            spec.worker_id,
            spec.argv().join(" ")
        );
    }
    Ok(())
}
