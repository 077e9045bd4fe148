use std::collections::BTreeMap;
use std::time::Duration;

use log::{info, warn};
use tokio::process::{Child, Command};
use tokio::task::JoinSet;

use crate::error::{ExecutionError, ExecutionResult};
use crate::launcher::affinity::pin_to_core;
use crate::launcher::{FleetLauncher, FleetLauncherOptions, FleetReport, WorkerReport, WorkerStatus};
use crate::spec::WorkerSpec;

impl FleetLauncher {
    pub fn new(options: FleetLauncherOptions) -> Self {
        Self { options }
    }

    /// Launches all workers and returns once every one of them has terminated.
    /// The report has one entry per specification, in the same order.
    pub async fn run(&self, specs: &[WorkerSpec]) -> ExecutionResult<FleetReport> {
        let mut reports = BTreeMap::new();
        let mut supervisors = JoinSet::new();
        for (position, spec) in specs.iter().enumerate() {
            let index = spec.index;
            let worker_id = spec.worker_id;
            match self.spawn(spec) {
                Ok(child) => {
                    let pid = child.id();
                    info!(
                        "worker {index} (ID {worker_id}) started with PID {}",
                        pid.map(|x| x.to_string()).unwrap_or_else(|| "?".to_string())
                    );
                    // Replaced by the supervisor's report unless the supervisor fails.
                    let placeholder = WorkerReport {
                        index,
                        worker_id,
                        pid,
                        status: WorkerStatus::WaitFailed(
                            "the worker supervisor terminated without a status".to_string(),
                        ),
                    };
                    reports.insert(position, placeholder);
                    let timeout = self.options.timeout;
                    supervisors.spawn(async move {
                        let status = supervise(index, child, timeout).await;
                        let report = WorkerReport {
                            index,
                            worker_id,
                            pid,
                            status,
                        };
                        (position, report)
                    });
                }
                Err(e) => {
                    warn!("failed to spawn worker {index} ({}): {e}", spec.executable);
                    let report = WorkerReport {
                        index,
                        worker_id,
                        pid: None,
                        status: WorkerStatus::SpawnFailed(e.to_string()),
                    };
                    reports.insert(position, report);
                }
            }
        }
        join_supervisors(&mut supervisors, &mut reports).await;
        if reports.len() != specs.len() {
            return Err(ExecutionError::InternalError(format!(
                "expected {} worker reports, got {}",
                specs.len(),
                reports.len()
            )));
        }
        Ok(FleetReport::new(reports.into_values().collect()))
    }

    fn spawn(&self, spec: &WorkerSpec) -> std::io::Result<Child> {
        let mut command = Command::new(&spec.executable);
        command.args(&spec.args).kill_on_drop(true);
        if self.options.pin_cpu {
            pin_to_core(&mut command, spec.cpu_affinity.into());
        }
        command.spawn()
    }
}

/// Waits for every supervisor. A supervisor that panics or is cancelled
/// leaves the existing report of its worker in place.
async fn join_supervisors(
    supervisors: &mut JoinSet<(usize, WorkerReport)>,
    reports: &mut BTreeMap<usize, WorkerReport>,
) {
    while let Some(result) = supervisors.join_next().await {
        match result {
            Ok((position, report)) => {
                reports.insert(position, report);
            }
            Err(e) => warn!("worker supervisor failed: {e}"),
        }
    }
}

async fn supervise(index: usize, mut child: Child, timeout: Option<Duration>) -> WorkerStatus {
    let result = match timeout {
        None => child.wait().await,
        Some(timeout) => {
            let waited = tokio::time::timeout(timeout, child.wait()).await;
            match waited {
                Ok(result) => result,
                Err(_) => {
                    warn!("worker {index} is still running after {timeout:?} and will be killed");
                    if let Err(e) = child.kill().await {
                        warn!("failed to kill worker {index}: {e}");
                    }
                    return WorkerStatus::TimedOut;
                }
            }
        }
    };
    let status = match result {
        Ok(status) => WorkerStatus::from(status),
        Err(e) => WorkerStatus::WaitFailed(e.to_string()),
    };
    if status.is_success() {
        info!("worker {index} {status}");
    } else {
        warn!("worker {index} {status}");
    }
    status
}

#[cfg(all(test, unix))]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use std::time::Instant;

    use fleet_common::config::{BaseConfig, PortSet};

    use super::*;
    use crate::id::WorkerId;
    use crate::plan::FleetPlan;
    use crate::spec::{PortStride, WorkerSpecBuilder};

    /// Builds workers that run the shell script with the worker ID flag as `$0`.
    fn shell_workers(script: &str, fleet_size: usize) -> Vec<WorkerSpec> {
        let ports = PortSet {
            gms: 23580,
            state_transfer: 28366,
            sst: 37683,
            rdmc: 31675,
            external: 32645,
        };
        let base = BaseConfig::new(0, ports, fleet_size).unwrap();
        let builder = WorkerSpecBuilder::new(base, PortStride::default(), "sh")
            .with_leading_args(vec!["-c".to_string(), script.to_string()]);
        FleetPlan::try_new(&builder).unwrap().specs().to_vec()
    }

    fn launcher(timeout: Option<Duration>) -> FleetLauncher {
        FleetLauncher::new(FleetLauncherOptions {
            pin_cpu: false,
            timeout,
        })
    }

    fn statuses(report: &FleetReport) -> Vec<WorkerStatus> {
        report.workers().iter().map(|x| x.status.clone()).collect()
    }

    #[tokio::test]
    async fn test_run_reports_every_sibling() {
        let specs = shell_workers(r#"case "$0" in *=1) exit 1;; esac; exit 0"#, 2);
        let report = launcher(None).run(&specs).await.unwrap();
        assert_eq!(
            statuses(&report),
            vec![WorkerStatus::Exited(0), WorkerStatus::Exited(1)]
        );
        let lines = report
            .workers()
            .iter()
            .map(|x| x.to_string())
            .collect::<Vec<_>>();
        assert_eq!(lines, vec!["Thread 0 exit with 0.", "Thread 1 exit with 1."]);
        assert_eq!(report.failures(), 1);
    }

    #[tokio::test]
    async fn test_spawn_failure_does_not_affect_siblings() {
        let mut specs = shell_workers("exit 0", 3);
        specs[1].executable = "/nonexistent/fleet-worker".to_string();
        let report = launcher(None).run(&specs).await.unwrap();
        assert_eq!(report.len(), 3);
        let workers = report.workers();
        assert_eq!(workers[0].status, WorkerStatus::Exited(0));
        assert!(matches!(workers[1].status, WorkerStatus::SpawnFailed(_)));
        assert_eq!(workers[1].pid, None);
        assert_eq!(workers[2].status, WorkerStatus::Exited(0));
        assert_eq!(workers[1].to_string(), "Thread 1 exit with None.");
    }

    #[tokio::test]
    async fn test_all_spawns_fail() {
        let mut specs = shell_workers("exit 0", 4);
        for spec in &mut specs {
            spec.executable = "/nonexistent/fleet-worker".to_string();
        }
        let report = launcher(None).run(&specs).await.unwrap();
        assert_eq!(report.len(), 4);
        assert_eq!(report.failures(), 4);
        for (i, worker) in report.workers().iter().enumerate() {
            assert_eq!(worker.index, i);
        }
    }

    #[tokio::test]
    async fn test_signaled_worker() {
        let specs = shell_workers("kill -9 $$", 1);
        let report = launcher(None).run(&specs).await.unwrap();
        assert_eq!(statuses(&report), vec![WorkerStatus::Signaled(9)]);
        assert_eq!(report.workers()[0].to_string(), "Thread 0 exit with -9.");
    }

    #[tokio::test]
    async fn test_timeout_kills_only_the_slow_worker() {
        let specs = shell_workers(r#"case "$0" in *=0) exec sleep 30;; esac; exit 0"#, 2);
        let start = Instant::now();
        let report = launcher(Some(Duration::from_millis(500)))
            .run(&specs)
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(20));
        assert_eq!(
            statuses(&report),
            vec![WorkerStatus::TimedOut, WorkerStatus::Exited(0)]
        );
    }

    #[tokio::test]
    async fn test_workers_run_concurrently() {
        let specs = shell_workers("sleep 1", 4);
        let start = Instant::now();
        let report = launcher(None).run(&specs).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(3500));
        assert_eq!(report.failures(), 0);
    }

    /// Returns the `Cpus_allowed_list` entry of a `/proc/<pid>/status` file.
    #[cfg(target_os = "linux")]
    fn allowed_cpus(status: &str) -> String {
        status
            .lines()
            .find_map(|x| x.strip_prefix("Cpus_allowed_list:"))
            .unwrap()
            .trim()
            .to_string()
    }

    #[cfg(target_os = "linux")]
    fn allows_core(list: &str, core: usize) -> bool {
        list.split(',').any(|range| match range.split_once('-') {
            Some((start, end)) => {
                (start.parse::<usize>().unwrap()..=end.parse::<usize>().unwrap()).contains(&core)
            }
            None => range.parse::<usize>().unwrap() == core,
        })
    }

    /// Runs two workers that record the CPUs they are allowed to run on.
    #[cfg(target_os = "linux")]
    async fn worker_cpus(pin_cpu: bool) -> Vec<String> {
        let directory = tempfile::tempdir().unwrap();
        let script = format!(
            r#"cat /proc/self/status > "{}/cpus_${{0##*=}}""#,
            directory.path().display()
        );
        let specs = shell_workers(&script, 2);
        let launcher = FleetLauncher::new(FleetLauncherOptions {
            pin_cpu,
            timeout: None,
        });
        let report = launcher.run(&specs).await.unwrap();
        assert_eq!(report.failures(), 0);
        (0..2)
            .map(|i| {
                let status =
                    std::fs::read_to_string(directory.path().join(format!("cpus_{i}"))).unwrap();
                allowed_cpus(&status)
            })
            .collect()
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_pinned_workers() {
        let parent = allowed_cpus(&std::fs::read_to_string("/proc/thread-self/status").unwrap());
        let cpus = worker_cpus(true).await;
        // Worker `i` is pinned to core `2 * i`, or keeps the inherited set if that core is unavailable.
        for (index, cpus) in cpus.iter().enumerate() {
            let core = 2 * index;
            if allows_core(&parent, core) {
                assert_eq!(cpus, &core.to_string(), "worker {index}");
            } else {
                assert_eq!(cpus, &parent, "worker {index}");
            }
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_unpinned_workers_inherit_affinity() {
        let parent = allowed_cpus(&std::fs::read_to_string("/proc/thread-self/status").unwrap());
        let cpus = worker_cpus(false).await;
        assert_eq!(cpus, vec![parent.clone(), parent]);
    }

    async fn failing_supervisor() -> (usize, WorkerReport) {
        panic!("supervisor failure");
    }

    fn pending_report(index: usize, status: WorkerStatus) -> WorkerReport {
        WorkerReport {
            index,
            worker_id: WorkerId::from(index as u64),
            pid: None,
            status,
        }
    }

    #[tokio::test]
    async fn test_failed_supervisor_keeps_the_worker_entry() {
        let pending = WorkerStatus::WaitFailed("pending".to_string());
        let mut reports = BTreeMap::new();
        reports.insert(0, pending_report(0, pending.clone()));
        reports.insert(1, pending_report(1, pending.clone()));
        let mut supervisors = JoinSet::new();
        supervisors.spawn(async { (0, pending_report(0, WorkerStatus::Exited(0))) });
        supervisors.spawn(failing_supervisor());
        join_supervisors(&mut supervisors, &mut reports).await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[&0].status, WorkerStatus::Exited(0));
        assert_eq!(reports[&1].status, pending);
        assert_eq!(reports[&1].to_string(), "Thread 1 exit with None.");
    }

    #[tokio::test]
    async fn test_empty_fleet() {
        let report = launcher(None).run(&[]).await.unwrap();
        assert!(report.is_empty());
    }
}
