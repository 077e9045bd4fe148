use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fleet_common::config::AppConfig;
use fleet_telemetry::telemetry::{init_telemetry, shutdown_telemetry};

use crate::launch::FleetArgs;
use crate::sum::SumArgs;

#[derive(Parser)]
#[command(
    version,
    name = "fleet",
    about = "Launches the worker processes of one benchmark node"
)]
struct Cli {
    /// A TOML file with launcher settings, layered between the defaults
    /// and the `FLEET__*` environment variables.
    #[arg(long, global = true)]
    app_config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Launch all workers and wait for every one of them to exit.
    Run(FleetArgs),
    /// Print the command line of every worker without launching anything.
    Plan(FleetArgs),
    /// Sum the numbers in the result files written by the workers.
    Sum(SumArgs),
}

pub fn main(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_from(args);
    init_telemetry()?;
    let result = dispatch(cli);
    shutdown_telemetry();
    result
}

fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let figment = match &cli.app_config {
        Some(path) => AppConfig::figment_with_file(path),
        None => AppConfig::figment(),
    };
    match cli.command {
        Command::Run(args) => crate::launch::run(AppConfig::extract(args.apply(figment))?),
        Command::Plan(args) => crate::launch::plan(AppConfig::extract(args.apply(figment))?),
        Command::Sum(args) => crate::sum::run(AppConfig::extract(args.apply(figment))?),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use figment::Jail;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_overrides() {
        Jail::expect_with(|_| {
            let cli = Cli::try_parse_from([
                "fleet",
                "run",
                "--config",
                "node.cfg",
                "--size",
                "4",
                "--port-stride",
                "40",
                "--executable",
                "./worker",
                "--output-dir",
                "out",
                "--timeout-secs",
                "60",
                "--no-pin-cpu",
            ])
            .map_err(|e| e.to_string())?;
            let Command::Run(args) = cli.command else {
                panic!("expected the run command");
            };
            let config =
                AppConfig::extract(args.apply(AppConfig::figment())).map_err(|e| e.to_string())?;
            assert_eq!(config.launcher.config_file, "node.cfg");
            assert_eq!(config.launcher.size, 4);
            assert_eq!(config.launcher.port_stride, 40);
            assert!(!config.launcher.pin_cpu);
            assert_eq!(config.worker.executable, "./worker");
            assert_eq!(config.worker.timeout_secs, Some(60));
            assert_eq!(config.output.directory, "out");
            Ok(())
        });
    }

    #[test]
    fn test_cli_overrides_env() {
        Jail::expect_with(|jail| {
            jail.set_env("FLEET__LAUNCHER__SIZE", "16");
            jail.set_env("FLEET__LAUNCHER__PORT_STRIDE", "30");
            let cli = Cli::try_parse_from(["fleet", "plan", "--size", "2"])
                .map_err(|e| e.to_string())?;
            let Command::Plan(args) = cli.command else {
                panic!("expected the plan command");
            };
            let config =
                AppConfig::extract(args.apply(AppConfig::figment())).map_err(|e| e.to_string())?;
            assert_eq!(config.launcher.size, 2);
            assert_eq!(config.launcher.port_stride, 30);
            assert!(config.launcher.pin_cpu);
            Ok(())
        });
    }

    #[test]
    fn test_sum_overrides() {
        Jail::expect_with(|_| {
            let cli = Cli::try_parse_from([
                "fleet",
                "sum",
                "--output-dir",
                "out",
                "--pattern",
                "lat_*.txt",
                "--lenient",
            ])
            .map_err(|e| e.to_string())?;
            let Command::Sum(args) = cli.command else {
                panic!("expected the sum command");
            };
            let config =
                AppConfig::extract(args.apply(AppConfig::figment())).map_err(|e| e.to_string())?;
            assert_eq!(config.output.directory, "out");
            assert_eq!(config.output.result_pattern, "lat_*.txt");
            assert!(!config.output.strict);
            Ok(())
        });
    }

    #[test]
    fn test_app_config_is_global() {
        let cli = Cli::try_parse_from(["fleet", "sum", "--app-config", "fleet.toml"]);
        assert!(matches!(cli, Ok(Cli { app_config: Some(_), .. })));
    }
}
