/// Expiry sweep
///
/// Archives every non-archived task whose due date has passed. A task that
/// was never validated costs each of its animals one step of mood; a `done`
/// task is archived as is.
///
/// Each task is claimed with `FOR UPDATE SKIP LOCKED` and handled in its own
/// transaction, so the mood change and the archive flag land together.

use crate::jobs::{JobResult, ScheduledJob};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hearth_shared::models::{
    animal::{Animal, MoodShift},
    task::{Task, TaskStatus},
};
use sqlx::PgPool;
use uuid::Uuid;

/// One archived task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweptTask {
    pub task_id: Uuid,
    pub status: TaskStatus,
    /// Animals whose mood went down
    pub downgraded: u64,
}

pub struct ExpirySweeper {
    db: PgPool,
    batch_size: usize,
}

impl ExpirySweeper {
    pub fn new(db: PgPool, batch_size: usize) -> Self {
        ExpirySweeper { db, batch_size }
    }

    /// Claims and archives a single overdue task
    pub async fn sweep_one(&self, now: DateTime<Utc>) -> JobResult<Option<SweptTask>> {
        let mut tx = self.db.begin().await?;

        let Some(task) = Task::claim_overdue(&mut *tx, now).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        let downgraded = if task.status == TaskStatus::Done {
            0
        } else {
            Animal::shift_mood_for_task(&mut *tx, task.id, MoodShift::Downgrade).await?
        };

        Task::archive(&mut *tx, task.id).await?;
        tx.commit().await?;

        tracing::debug!(
            task_id = %task.id,
            house_id = %task.house_id,
            status = task.status.as_str(),
            downgraded,
            "Overdue task archived"
        );

        Ok(Some(SweptTask {
            task_id: task.id,
            status: task.status,
            downgraded,
        }))
    }
}

#[async_trait]
impl ScheduledJob for ExpirySweeper {
    fn name(&self) -> &'static str {
        "sweep"
    }

    async fn run(&self, now: DateTime<Utc>) -> JobResult<u64> {
        let mut handled = 0;

        while handled < self.batch_size as u64 {
            if self.sweep_one(now).await?.is_none() {
                break;
            }
            handled += 1;
        }

        Ok(handled)
    }
}
