/// Recurring task regeneration
///
/// A rule is due once the date of its current task has passed. Regenerating
/// it inserts a copy of that task (title, description, assignees, animals)
/// at the next occurrence strictly after now, then moves the rule onto the
/// copy. The old task is left for the expiry sweep.
///
/// Occurrences are counted from the rule's anchor, which moving leaves
/// untouched.
///
/// Sealed columns are copied as stored, so no key is needed here.
///
/// # Concurrency
///
/// Each rule is claimed with `FOR UPDATE SKIP LOCKED` and regenerated in its
/// own transaction. Two workers never move the same rule twice.

use crate::jobs::{JobResult, ScheduledJob};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hearth_shared::models::{recurrence::Recurrence, task::Task};
use sqlx::PgPool;
use uuid::Uuid;

/// Outcome of one regeneration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Regeneration {
    /// The rule moved from `previous_task_id` onto `task_id`
    Moved {
        recurrence_id: Uuid,
        previous_task_id: Uuid,
        task_id: Uuid,
        date: DateTime<Utc>,
    },

    /// No next date exists; the rule was dropped
    Dropped { recurrence_id: Uuid },
}

pub struct RecurrenceScheduler {
    db: PgPool,
    batch_size: usize,
}

impl RecurrenceScheduler {
    pub fn new(db: PgPool, batch_size: usize) -> Self {
        RecurrenceScheduler { db, batch_size }
    }

    /// Claims and regenerates a single due rule
    ///
    /// Returns `None` when nothing is due.
    pub async fn regenerate_one(&self, now: DateTime<Utc>) -> JobResult<Option<Regeneration>> {
        let mut tx = self.db.begin().await?;

        let Some(due) = Recurrence::claim_due(&mut *tx, now).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        let Some(next_date) = due.recurrence_type.next_after(due.anchor, due.task_date, now) else {
            Recurrence::delete_for_task(&mut *tx, due.task_id).await?;
            tx.commit().await?;

            tracing::warn!(
                recurrence_id = %due.id,
                task_id = %due.task_id,
                "Recurrence has no next date, dropping it"
            );
            return Ok(Some(Regeneration::Dropped { recurrence_id: due.id }));
        };

        let task = Task::duplicate_at(&mut *tx, due.task_id, next_date).await?;
        Recurrence::move_to_task(&mut *tx, due.id, task.id).await?;
        tx.commit().await?;

        tracing::debug!(
            recurrence_id = %due.id,
            previous_task_id = %due.task_id,
            task_id = %task.id,
            recurrence_type = due.recurrence_type.as_str(),
            date = %next_date,
            "Recurring task regenerated"
        );

        Ok(Some(Regeneration::Moved {
            recurrence_id: due.id,
            previous_task_id: due.task_id,
            task_id: task.id,
            date: next_date,
        }))
    }
}

#[async_trait]
impl ScheduledJob for RecurrenceScheduler {
    fn name(&self) -> &'static str {
        "recurrence"
    }

    async fn run(&self, now: DateTime<Utc>) -> JobResult<u64> {
        let mut handled = 0;

        while handled < self.batch_size as u64 {
            if self.regenerate_one(now).await?.is_none() {
                break;
            }
            handled += 1;
        }

        Ok(handled)
    }
}
