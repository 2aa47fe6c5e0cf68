/// Scheduled job contract
///
/// Every periodic unit of work the worker runs implements [`ScheduledJob`].
/// The orchestrator calls [`ScheduledJob::run`] once per tick with the tick's
/// reference time, so a whole tick agrees on what "now" is.
///
/// # Contract
///
/// Jobs must:
/// 1. Handle at most their configured batch per call
/// 2. Commit each item in its own transaction
/// 3. Be safe to run concurrently on several workers
/// 4. Return how many items they handled
///
/// # Example
///
/// ```no_run
/// use hearth_worker::jobs::{JobResult, ScheduledJob};
/// use async_trait::async_trait;
/// use chrono::{DateTime, Utc};
///
/// struct Noop;
///
/// #[async_trait]
/// impl ScheduledJob for Noop {
///     fn name(&self) -> &'static str {
///         "noop"
///     }
///
///     async fn run(&self, _now: DateTime<Utc>) -> JobResult<u64> {
///         Ok(0)
///     }
/// }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Scheduler error types
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type JobResult<T> = Result<T, SchedulerError>;

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Short name used in logs and tick reports
    fn name(&self) -> &'static str;

    /// Runs one batch and returns the number of items handled
    async fn run(&self, now: DateTime<Utc>) -> JobResult<u64>;
}
