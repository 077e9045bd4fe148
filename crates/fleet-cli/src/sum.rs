use clap::Args;
use figment::providers::Serialized;
use figment::Figment;
use fleet_common::config::AppConfig;
use fleet_execution::aggregate_results;

#[derive(Args, Debug, Default)]
pub(crate) struct SumArgs {
    /// The directory with the result files.
    #[arg(long)]
    output_dir: Option<String>,
    /// The glob pattern of result file names.
    #[arg(long)]
    pattern: Option<String>,
    /// Skip lines that are not numbers instead of failing.
    #[arg(long)]
    lenient: bool,
}

impl SumArgs {
    pub(crate) fn apply(&self, mut figment: Figment) -> Figment {
        if let Some(directory) = &self.output_dir {
            figment = figment.merge(Serialized::default("output.directory", directory));
        }
        if let Some(pattern) = &self.pattern {
            figment = figment.merge(Serialized::default("output.result_pattern", pattern));
        }
        if self.lenient {
            figment = figment.merge(Serialized::default("output.strict", false));
        }
        figment
    }
}

pub(crate) fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let summary = aggregate_results(&config)?;
    if summary.skipped > 0 {
        log::warn!("skipped {} invalid lines", summary.skipped);
    }
    println!("{summary}");
    Ok(())
}
