mod affinity;
mod core;
mod options;
mod report;

pub use options::FleetLauncherOptions;
pub use report::{FleetReport, WorkerReport, WorkerStatus};

/// Runs one process per worker specification and waits for all of them.
///
/// All workers are spawned before any of them is awaited. Each worker is
/// supervised by its own task, and the failure of a worker, including the
/// failure to spawn it, never affects its siblings.
pub struct FleetLauncher {
    options: FleetLauncherOptions,
}
