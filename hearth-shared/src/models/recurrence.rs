/// Recurrence rules for tasks
///
/// A rule is attached to exactly one task: the current occurrence. When that
/// task's due date passes, the worker inserts the next occurrence and moves
/// the rule onto it.
///
/// The rule's `date` is its anchor: the due date it was set up with. Every
/// occurrence is a whole number of periods after the anchor, so a monthly
/// rule anchored on the 31st lands on each month's last day without
/// drifting to the 28th.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE recurrence_type AS ENUM ('daily', 'weekly', 'monthly');
///
/// CREATE TABLE recurrences (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     task_id UUID NOT NULL UNIQUE REFERENCES tasks(id) ON DELETE CASCADE,
///     recurrence_type recurrence_type NOT NULL,
///     date TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```
/// use hearth_shared::models::recurrence::RecurrenceType;
/// use chrono::{TimeZone, Utc};
///
/// let jan_31 = Utc.with_ymd_and_hms(2024, 1, 31, 9, 0, 0).unwrap();
/// let feb_29 = Utc.with_ymd_and_hms(2024, 2, 29, 9, 0, 0).unwrap();
/// assert_eq!(RecurrenceType::Monthly.advance(jan_31), Some(feb_29));
///
/// // The next step still counts from the 31st
/// let next = RecurrenceType::Monthly.next_after(jan_31, feb_29, feb_29).unwrap();
/// assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 31, 9, 0, 0).unwrap());
/// ```

use chrono::{DateTime, Datelike, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

const RECURRENCE_COLUMNS: &str = "id, task_id, recurrence_type, date, created_at, updated_at";

/// Steps tried past the estimated occurrence before giving up
const MAX_CATCH_UP_STEPS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "recurrence_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    Daily,
    Weekly,
    Monthly,
}

impl RecurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::Daily => "daily",
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::Monthly => "monthly",
        }
    }

    /// One period after `date`
    ///
    /// Months are calendar months clamped to the last day, so Jan 31 becomes
    /// Feb 28 or 29. Returns `None` only past the representable range.
    pub fn advance(&self, date: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.nth(date, 1)
    }

    /// The occurrence `n` periods after `anchor`
    pub fn nth(&self, anchor: DateTime<Utc>, n: u32) -> Option<DateTime<Utc>> {
        match self {
            RecurrenceType::Daily => anchor.checked_add_signed(Duration::days(i64::from(n))),
            RecurrenceType::Weekly => anchor.checked_add_signed(Duration::weeks(i64::from(n))),
            RecurrenceType::Monthly => anchor.checked_add_months(Months::new(n)),
        }
    }

    /// First occurrence of the rule anchored at `anchor` that falls strictly
    /// after both `current` and `now`
    ///
    /// Missed occurrences are skipped rather than replayed. Returns `None`
    /// only past the representable range.
    pub fn next_after(
        &self,
        anchor: DateTime<Utc>,
        current: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let floor = current.max(now);
        let start = self.periods_between(anchor, floor).max(1);

        (0..MAX_CATCH_UP_STEPS)
            .map_while(|step| start.checked_add(step))
            .filter_map(|n| self.nth(anchor, n))
            .find(|next| *next > floor)
    }

    /// Whole periods from `anchor` to `until`, never more than the true
    /// count
    fn periods_between(&self, anchor: DateTime<Utc>, until: DateTime<Utc>) -> u32 {
        let periods = match self {
            RecurrenceType::Daily => (until - anchor).num_days(),
            RecurrenceType::Weekly => (until - anchor).num_weeks(),
            RecurrenceType::Monthly => {
                let months = i64::from(until.year() - anchor.year()) * 12
                    + i64::from(until.month()) - i64::from(anchor.month());
                months - 1
            }
        };

        u32::try_from(periods.max(0)).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Recurrence {
    pub id: Uuid,

    /// Current occurrence
    pub task_id: Uuid,

    pub recurrence_type: RecurrenceType,

    /// Anchor the occurrences are counted from
    pub date: DateTime<Utc>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// A rule due for regeneration, claimed inside a transaction
#[derive(Debug, Clone, FromRow)]
pub struct DueRecurrence {
    pub id: Uuid,
    pub task_id: Uuid,
    pub recurrence_type: RecurrenceType,
    pub anchor: DateTime<Utc>,
    /// Due date of the current occurrence's task
    pub task_date: DateTime<Utc>,
}

impl Recurrence {
    /// Attaches a rule to a task, replacing any existing one
    pub async fn upsert_for_task(
        conn: &mut PgConnection,
        task_id: Uuid,
        recurrence_type: RecurrenceType,
        date: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Recurrence>(&format!(
            r#"
            INSERT INTO recurrences (task_id, recurrence_type, date)
            VALUES ($1, $2, $3)
            ON CONFLICT (task_id) DO UPDATE
            SET recurrence_type = EXCLUDED.recurrence_type,
                date = EXCLUDED.date,
                updated_at = NOW()
            RETURNING {RECURRENCE_COLUMNS}
            "#
        ))
        .bind(task_id)
        .bind(recurrence_type)
        .bind(date)
        .fetch_one(conn)
        .await
    }

    /// Re-anchors the rule on a rescheduled task
    pub async fn sync_date(
        conn: &mut PgConnection,
        task_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE recurrences SET date = $2, updated_at = NOW() WHERE task_id = $1")
            .bind(task_id)
            .bind(date)
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Recurrence>(&format!(
            "SELECT {RECURRENCE_COLUMNS} FROM recurrences WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Looks up a rule only if its task belongs to `house_id`
    pub async fn find_in_house(
        pool: &PgPool,
        id: Uuid,
        house_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Recurrence>(
            r#"
            SELECT r.id, r.task_id, r.recurrence_type, r.date, r.created_at, r.updated_at
            FROM recurrences r
            JOIN tasks t ON t.id = r.task_id
            WHERE r.id = $1 AND t.house_id = $2
            "#,
        )
        .bind(id)
        .bind(house_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_task(pool: &PgPool, task_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Recurrence>(&format!(
            "SELECT {RECURRENCE_COLUMNS} FROM recurrences WHERE task_id = $1"
        ))
        .bind(task_id)
        .fetch_optional(pool)
        .await
    }

    /// Rules for a batch of tasks, keyed by task id
    pub async fn list_for_tasks(pool: &PgPool, task_ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Recurrence>(&format!(
            "SELECT {RECURRENCE_COLUMNS} FROM recurrences WHERE task_id = ANY($1)"
        ))
        .bind(task_ids)
        .fetch_all(pool)
        .await
    }

    /// Locks one rule whose current task is due
    ///
    /// Concurrent workers skip rows another transaction already holds.
    pub async fn claim_due(
        conn: &mut PgConnection,
        now: DateTime<Utc>,
    ) -> Result<Option<DueRecurrence>, sqlx::Error> {
        sqlx::query_as::<_, DueRecurrence>(
            r#"
            SELECT r.id, r.task_id, r.recurrence_type, r.date AS anchor, t.date AS task_date
            FROM recurrences r
            JOIN tasks t ON t.id = r.task_id
            WHERE t.date <= $1
            ORDER BY t.date ASC
            LIMIT 1
            FOR UPDATE OF r SKIP LOCKED
            "#,
        )
        .bind(now)
        .fetch_optional(conn)
        .await
    }

    /// Moves a rule onto the next occurrence, keeping its anchor
    pub async fn move_to_task(
        conn: &mut PgConnection,
        id: Uuid,
        task_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE recurrences SET task_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(task_id)
            .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM recurrences WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_for_task(conn: &mut PgConnection, task_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM recurrences WHERE task_id = $1")
            .bind(task_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_advance() {
        let start = at(2024, 3, 10, 8);
        assert_eq!(RecurrenceType::Daily.advance(start), Some(at(2024, 3, 11, 8)));
        assert_eq!(RecurrenceType::Weekly.advance(start), Some(at(2024, 3, 17, 8)));
        assert_eq!(RecurrenceType::Monthly.advance(start), Some(at(2024, 4, 10, 8)));
    }

    #[test]
    fn test_monthly_clamps_to_month_end() {
        assert_eq!(RecurrenceType::Monthly.advance(at(2023, 1, 31, 8)), Some(at(2023, 2, 28, 8)));
        assert_eq!(RecurrenceType::Monthly.advance(at(2024, 1, 31, 8)), Some(at(2024, 2, 29, 8)));
        assert_eq!(RecurrenceType::Monthly.advance(at(2024, 12, 15, 8)), Some(at(2025, 1, 15, 8)));
    }

    #[test]
    fn test_nth_counts_from_anchor() {
        let anchor = at(2024, 1, 31, 8);
        assert_eq!(RecurrenceType::Monthly.nth(anchor, 0), Some(anchor));
        assert_eq!(RecurrenceType::Monthly.nth(anchor, 1), Some(at(2024, 2, 29, 8)));
        assert_eq!(RecurrenceType::Monthly.nth(anchor, 2), Some(at(2024, 3, 31, 8)));
        assert_eq!(RecurrenceType::Weekly.nth(anchor, 2), Some(at(2024, 2, 14, 8)));
    }

    #[test]
    fn test_next_after_single_step() {
        let due = at(2024, 3, 10, 8);
        let now = at(2024, 3, 10, 9);
        assert_eq!(RecurrenceType::Daily.next_after(due, due, now), Some(at(2024, 3, 11, 8)));
    }

    #[test]
    fn test_next_after_skips_missed_occurrences() {
        let due = at(2024, 3, 1, 8);
        let now = at(2024, 3, 10, 12);

        assert_eq!(RecurrenceType::Daily.next_after(due, due, now), Some(at(2024, 3, 11, 8)));
        assert_eq!(RecurrenceType::Weekly.next_after(due, due, now), Some(at(2024, 3, 15, 8)));
        assert_eq!(RecurrenceType::Monthly.next_after(due, due, now), Some(at(2024, 4, 1, 8)));
    }

    #[test]
    fn test_next_after_exact_boundary_moves_on() {
        let due = at(2024, 3, 1, 8);
        let now = at(2024, 3, 2, 8);
        assert_eq!(RecurrenceType::Daily.next_after(due, due, now), Some(at(2024, 3, 3, 8)));
    }

    #[test]
    fn test_next_after_long_idle_daily_rule() {
        let due = at(2020, 1, 1, 7);
        let now = at(2024, 6, 15, 12);
        assert_eq!(RecurrenceType::Daily.next_after(due, due, now), Some(at(2024, 6, 16, 7)));
    }

    #[test]
    fn test_next_after_long_idle_monthly_rule() {
        let due = at(2019, 5, 31, 7);
        let now = at(2024, 6, 15, 12);
        assert_eq!(RecurrenceType::Monthly.next_after(due, due, now), Some(at(2024, 6, 30, 7)));
    }

    #[test]
    fn test_next_after_future_task_is_one_period() {
        let due = at(2030, 1, 1, 0);
        let now = at(2024, 1, 1, 0);
        assert_eq!(RecurrenceType::Weekly.next_after(due, due, now), Some(at(2030, 1, 8, 0)));
    }

    #[test]
    fn test_monthly_rule_keeps_its_anchor_day() {
        let anchor = at(2024, 1, 31, 9);
        let feb = RecurrenceType::Monthly.next_after(anchor, anchor, anchor).unwrap();
        assert_eq!(feb, at(2024, 2, 29, 9));

        let mar = RecurrenceType::Monthly.next_after(anchor, feb, feb).unwrap();
        assert_eq!(mar, at(2024, 3, 31, 9));

        let apr = RecurrenceType::Monthly.next_after(anchor, mar, mar).unwrap();
        assert_eq!(apr, at(2024, 4, 30, 9));
    }
}
