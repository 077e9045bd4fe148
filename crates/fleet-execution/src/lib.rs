pub mod aggregator;
pub mod entrypoint;
pub mod error;
pub mod id;
pub mod launcher;
pub mod output;
pub mod plan;
pub mod spec;

pub use entrypoint::{aggregate_results, load_plan, run_fleet};
