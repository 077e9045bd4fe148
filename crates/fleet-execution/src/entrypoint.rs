use fleet_common::config::{AppConfig, BaseConfig};
use log::{info, warn};

use crate::aggregator::{AggregateSummary, ParsePolicy, ResultAggregator};
use crate::error::ExecutionResult;
use crate::launcher::{FleetLauncher, FleetLauncherOptions, FleetReport};
use crate::output::ResultDirectory;
use crate::plan::FleetPlan;
use crate::spec::{PortStride, WorkerSpecBuilder};

/// Derives the specification of every worker without touching the filesystem
/// beyond reading the base configuration.
pub fn load_plan(config: &AppConfig) -> ExecutionResult<FleetPlan> {
    let base = BaseConfig::load(&config.launcher.config_file, config.launcher.size)?;
    let stride = PortStride::try_new(config.launcher.port_stride)?;
    let builder = WorkerSpecBuilder::new(base, stride, config.worker.executable.clone())
        .with_leading_args(config.worker.args.clone());
    FleetPlan::try_new(&builder)
}

/// Resets the output directory, launches the fleet, and waits for every worker.
/// Nothing is spawned if the configuration or the output directory is invalid.
pub async fn run_fleet(config: &AppConfig) -> ExecutionResult<FleetReport> {
    let plan = load_plan(config)?;
    ResultDirectory::new(&config.output.directory).reset()?;
    info!(
        "launching {} workers of {}",
        plan.len(),
        config.worker.executable
    );
    let launcher = FleetLauncher::new(FleetLauncherOptions::new(config));
    let report = launcher.run(plan.specs()).await?;
    match report.failures() {
        0 => info!("all {} workers succeeded", report.len()),
        n => warn!("{n} of {} workers failed", report.len()),
    }
    Ok(report)
}

pub fn aggregate_results(config: &AppConfig) -> ExecutionResult<AggregateSummary> {
    let policy = if config.output.strict {
        ParsePolicy::Strict
    } else {
        ParsePolicy::Lenient
    };
    ResultAggregator::new(&config.output.directory, config.output.result_pattern.clone())
        .with_policy(policy)
        .aggregate()
}
