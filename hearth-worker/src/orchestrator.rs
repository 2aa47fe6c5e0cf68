/// Worker orchestrator
///
/// This module implements the main worker loop. Every tick runs the
/// registered jobs one after the other with a shared reference time, then
/// sleeps for the poll interval.
///
/// # Architecture
///
/// ```text
/// WorkerOrchestrator
///   ├─> RecurrenceScheduler: Regenerate due recurring tasks
///   ├─> ExpirySweeper: Archive overdue tasks, downgrade moods
///   └─> JoinCodePurge: Delete expired join codes
/// ```
///
/// Regeneration runs before the sweep so it sees an overdue recurring task
/// before that task is archived.
///
/// # Failures
///
/// A failing job is logged and recorded in the [`TickReport`]; the jobs
/// after it still run and the loop keeps going.
///
/// # Example
///
/// ```no_run
/// use hearth_worker::orchestrator::WorkerOrchestrator;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> anyhow::Result<()> {
/// let orchestrator = WorkerOrchestrator::new(pool, Default::default());
/// let shutdown = orchestrator.shutdown_token();
///
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     shutdown.cancel();
/// });
///
/// orchestrator.run().await;
/// # Ok(())
/// # }
/// ```

use crate::jobs::ScheduledJob;
use crate::purge::JoinCodePurge;
use crate::recurrence::RecurrenceScheduler;
use crate::sweeper::ExpirySweeper;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Worker orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Poll interval in seconds
    pub poll_interval_secs: u64,

    /// Items each job handles per tick, at most
    pub batch_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            poll_interval_secs: crate::config::DEFAULT_POLL_INTERVAL_SECS,
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
        }
    }
}

/// Result of one job within a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(u64),
    Failed(String),
}

/// What a tick did, in job order
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub jobs: Vec<(&'static str, JobOutcome)>,
}

impl TickReport {
    /// Items handled by the named job, `None` if it failed or did not run
    pub fn handled(&self, name: &str) -> Option<u64> {
        self.jobs.iter().find_map(|(job, outcome)| match outcome {
            JobOutcome::Completed(count) if *job == name => Some(*count),
            _ => None,
        })
    }

    pub fn total_handled(&self) -> u64 {
        self.jobs
            .iter()
            .map(|(_, outcome)| match outcome {
                JobOutcome::Completed(count) => *count,
                JobOutcome::Failed(_) => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.jobs
            .iter()
            .filter(|(_, outcome)| matches!(outcome, JobOutcome::Failed(_)))
            .count()
    }
}

pub struct WorkerOrchestrator {
    /// Jobs in execution order
    jobs: Vec<Arc<dyn ScheduledJob>>,

    config: OrchestratorConfig,

    /// Shutdown token
    shutdown_token: CancellationToken,
}

impl WorkerOrchestrator {
    /// Creates an orchestrator with the standard jobs
    pub fn new(db: PgPool, config: OrchestratorConfig) -> Self {
        let jobs: Vec<Arc<dyn ScheduledJob>> = vec![
            Arc::new(RecurrenceScheduler::new(db.clone(), config.batch_size)),
            Arc::new(ExpirySweeper::new(db.clone(), config.batch_size)),
            Arc::new(JoinCodePurge::new(db)),
        ];

        Self::with_jobs(jobs, config)
    }

    /// Creates an orchestrator running exactly `jobs`, in order
    pub fn with_jobs(jobs: Vec<Arc<dyn ScheduledJob>>, config: OrchestratorConfig) -> Self {
        WorkerOrchestrator {
            jobs,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Gets shutdown token
    ///
    /// Used to signal graceful shutdown from external handlers.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs every job once against `now`
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        for job in &self.jobs {
            let outcome = match job.run(now).await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(job = job.name(), handled = count, "Job finished");
                    }
                    JobOutcome::Completed(count)
                }
                Err(e) => {
                    tracing::error!(job = job.name(), error = %e, "Job failed");
                    JobOutcome::Failed(e.to_string())
                }
            };
            report.jobs.push((job.name(), outcome));
        }

        report
    }

    /// Ticks until the shutdown token fires
    ///
    /// A tick in progress is finished before returning; the sleep between
    /// ticks is cut short.
    pub async fn run(&self) {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval_secs,
            batch_size = self.config.batch_size,
            jobs = self.jobs.len(),
            "Worker orchestrator starting"
        );

        let interval = Duration::from_secs(self.config.poll_interval_secs);

        while !self.shutdown_token.is_cancelled() {
            let report = self.tick(Utc::now()).await;
            tracing::debug!(
                handled = report.total_handled(),
                failures = report.failures(),
                "Tick complete"
            );

            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        tracing::info!("Worker orchestrator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobResult, SchedulerError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        handled: u64,
        fail: bool,
        calls: AtomicU64,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Recording {
        fn new(name: &'static str, handled: u64, log: &Arc<Mutex<Vec<&'static str>>>) -> Self {
            Recording {
                name,
                handled,
                fail: false,
                calls: AtomicU64::new(0),
                log: log.clone(),
            }
        }

        fn failing(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Self {
            Recording {
                fail: true,
                ..Self::new(name, 0, log)
            }
        }
    }

    #[async_trait]
    impl ScheduledJob for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, _now: DateTime<Utc>) -> JobResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(SchedulerError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(self.handled)
        }
    }

    #[test]
    fn test_orchestrator_config_default() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.batch_size, 50);
    }

    #[tokio::test]
    async fn test_tick_runs_jobs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = WorkerOrchestrator::with_jobs(
            vec![
                Arc::new(Recording::new("recurrence", 2, &log)),
                Arc::new(Recording::new("sweep", 3, &log)),
                Arc::new(Recording::new("join_code_purge", 0, &log)),
            ],
            OrchestratorConfig::default(),
        );

        let report = orchestrator.tick(Utc::now()).await;

        assert_eq!(*log.lock().unwrap(), vec!["recurrence", "sweep", "join_code_purge"]);
        assert_eq!(report.handled("recurrence"), Some(2));
        assert_eq!(report.handled("sweep"), Some(3));
        assert_eq!(report.total_handled(), 5);
        assert_eq!(report.failures(), 0);
    }

    #[tokio::test]
    async fn test_failed_job_does_not_stop_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = WorkerOrchestrator::with_jobs(
            vec![
                Arc::new(Recording::failing("recurrence", &log)),
                Arc::new(Recording::new("sweep", 1, &log)),
            ],
            OrchestratorConfig::default(),
        );

        let report = orchestrator.tick(Utc::now()).await;

        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(report.failures(), 1);
        assert_eq!(report.handled("recurrence"), None);
        assert_eq!(report.handled("sweep"), Some(1));
        assert!(matches!(report.jobs[0].1, JobOutcome::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancellation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let job = Arc::new(Recording::new("sweep", 0, &log));
        let orchestrator = Arc::new(WorkerOrchestrator::with_jobs(
            vec![job.clone()],
            OrchestratorConfig {
                poll_interval_secs: 10,
                batch_size: 1,
            },
        ));

        let shutdown = orchestrator.shutdown_token();
        let runner = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.run().await })
        };

        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.cancel();
        runner.await.unwrap();

        assert_eq!(job.calls.load(Ordering::SeqCst), 3);
    }
}
