/// Task (chore) model and database operations
///
/// Tasks belong to a house, are assigned to any number of its users and may
/// concern any number of its animals.
///
/// # Lifecycle
///
/// ```text
/// todo ──check──▶ to_validate ──validate──▶ done
///   ▲                  │
///   └─────refuse───────┘
/// ```
///
/// Independently of status, a task whose due date passes is archived by the
/// expiry sweep. Archived tasks are read-only.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'to_validate', 'done');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     house_id UUID NOT NULL REFERENCES houses(id) ON DELETE CASCADE,
///     title TEXT NOT NULL,      -- sealed
///     description TEXT,         -- sealed
///     status task_status NOT NULL DEFAULT 'todo',
///     message TEXT,             -- sealed
///     date TIMESTAMPTZ NOT NULL,
///     is_archived BOOLEAN NOT NULL DEFAULT FALSE,
///     archived_at TIMESTAMPTZ,
///     picture_id UUID REFERENCES media(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE task_users (task_id UUID, user_id UUID, PRIMARY KEY (task_id, user_id));
/// CREATE TABLE task_animals (task_id UUID, animal_id UUID, PRIMARY KEY (task_id, animal_id));
/// ```
///
/// # Example
///
/// ```no_run
/// use hearth_shared::models::task::{CreateTask, Task};
/// use hearth_shared::db::pool::{create_pool, DatabaseConfig};
/// use chrono::{Duration, Utc};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let mut tx = pool.begin().await?;
///
/// let task = Task::create(&mut tx, CreateTask {
///     house_id: Uuid::new_v4(),
///     title: "string:crypto:...".to_string(),
///     description: None,
///     date: Utc::now() + Duration::hours(6),
/// }).await?;
/// Task::replace_users(&mut tx, task.id, &[Uuid::new_v4()]).await?;
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, house_id, title, description, status, message, date, \
                            is_archived, archived_at, picture_id, created_at, updated_at";

/// Columns task lists may be ordered by. Sealed columns are excluded.
pub const TASK_ORDER_COLUMNS: &[&str] = &["created_at", "updated_at", "date", "status"];

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be done
    Todo,

    /// Done by an assignee, waiting for a parent
    ToValidate,

    /// Validated by a parent
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::ToValidate => "to_validate",
            TaskStatus::Done => "done",
        }
    }

    /// Checks if transition to target status is valid
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Todo, TaskStatus::ToValidate)
                | (TaskStatus::ToValidate, TaskStatus::Done)
                | (TaskStatus::ToValidate, TaskStatus::Todo)
        )
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "to_validate" => Ok(TaskStatus::ToValidate),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!("Unknown task status: {}", other)),
        }
    }
}

/// Task row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,

    pub house_id: Uuid,

    /// Sealed
    pub title: String,

    /// Sealed
    pub description: Option<String>,

    pub status: TaskStatus,

    /// Sealed refusal reason, cleared on the next check
    pub message: Option<String>,

    /// Due date
    pub date: DateTime<Utc>,

    pub is_archived: bool,

    pub archived_at: Option<DateTime<Utc>>,

    /// Proof photo attached by the last check
    pub picture_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub house_id: Uuid,
    /// Already sealed
    pub title: String,
    /// Already sealed
    pub description: Option<String>,
    pub date: DateTime<Utc>,
}

/// Partial update of the editable fields
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub date: Option<DateTime<Utc>>,
}

/// Filters for task lists
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub archived: bool,
    pub status: Option<TaskStatus>,
    /// Half-open `[start, end)` on the due date
    pub due_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub animal_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// A guarded status change
#[derive(Debug, Clone)]
pub struct TaskTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub picture_id: Option<Uuid>,
    /// Already sealed
    pub message: Option<String>,
}

/// Assignees and animals of one task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskRelations {
    pub user_ids: Vec<Uuid>,
    pub animal_ids: Vec<Uuid>,
}

impl Task {
    pub async fn create(conn: &mut PgConnection, data: CreateTask) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (house_id, title, description, date)
            VALUES ($1, $2, $3, $4)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(data.house_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.date)
        .fetch_one(conn)
        .await
    }

    /// Replaces the assignee set
    pub async fn replace_users(
        conn: &mut PgConnection,
        id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM task_users WHERE task_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            "INSERT INTO task_users (task_id, user_id) SELECT $1, UNNEST($2::UUID[]) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(user_ids)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Replaces the linked animal set
    pub async fn replace_animals(
        conn: &mut PgConnection,
        id: Uuid,
        animal_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM task_animals WHERE task_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            "INSERT INTO task_animals (task_id, animal_id) SELECT $1, UNNEST($2::UUID[]) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(animal_ids)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Looks up a task only if it belongs to `house_id`
    pub async fn find_in_house(
        pool: &PgPool,
        id: Uuid,
        house_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND house_id = $2"
        ))
        .bind(id)
        .bind(house_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists a house's tasks
    ///
    /// `order` must come from [`crate::search::SearchParams::order_clause`]
    /// with [`TASK_ORDER_COLUMNS`].
    pub async fn list_by_house(
        pool: &PgPool,
        house_id: Uuid,
        query: &TaskQuery,
        order: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut sql: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM tasks WHERE house_id = "));
        sql.push_bind(house_id);
        sql.push(" AND is_archived = ").push_bind(query.archived);

        if let Some(status) = query.status {
            sql.push(" AND status = ").push_bind(status);
        }
        if let Some((start, end)) = query.due_between {
            sql.push(" AND date >= ").push_bind(start);
            sql.push(" AND date < ").push_bind(end);
        }
        if let Some(animal_id) = query.animal_id {
            sql.push(" AND id IN (SELECT task_id FROM task_animals WHERE animal_id = ")
                .push_bind(animal_id)
                .push(")");
        }
        if let Some(user_id) = query.user_id {
            sql.push(" AND id IN (SELECT task_id FROM task_users WHERE user_id = ")
                .push_bind(user_id)
                .push(")");
        }

        sql.push(" ORDER BY ").push(order);

        sql.build_query_as::<Task>().fetch_all(pool).await
    }

    /// Assignees and animals for a batch of tasks
    ///
    /// Every id in `ids` is present in the result, with empty lists when the
    /// task has no links.
    pub async fn relations(
        pool: &PgPool,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, TaskRelations>, sqlx::Error> {
        let mut map: HashMap<Uuid, TaskRelations> =
            ids.iter().map(|id| (*id, TaskRelations::default())).collect();

        let users: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT task_id, user_id FROM task_users WHERE task_id = ANY($1) ORDER BY user_id",
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        let animals: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT task_id, animal_id FROM task_animals WHERE task_id = ANY($1) ORDER BY animal_id",
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        for (task_id, user_id) in users {
            map.entry(task_id).or_default().user_ids.push(user_id);
        }
        for (task_id, animal_id) in animals {
            map.entry(task_id).or_default().animal_ids.push(animal_id);
        }

        Ok(map)
    }

    pub async fn is_assigned(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM task_users WHERE task_id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Updates editable fields of a non-archived task
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut sql: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE tasks SET updated_at = NOW()");

        if let Some(title) = data.title {
            sql.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            sql.push(", description = ").push_bind(description);
        }
        if let Some(date) = data.date {
            sql.push(", date = ").push_bind(date);
        }

        sql.push(" WHERE is_archived = FALSE AND id = ").push_bind(id);
        sql.push(format!(" RETURNING {TASK_COLUMNS}"));

        sql.build_query_as::<Task>().fetch_optional(conn).await
    }

    /// Applies a status change if the task is still in `transition.from`
    ///
    /// Returns `None` when the task is archived or its status moved on
    /// concurrently. Callers validate the transition beforehand.
    pub async fn transition(
        conn: &mut PgConnection,
        id: Uuid,
        transition: TaskTransition,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET status = $3, picture_id = $4, message = $5, updated_at = NOW()
            WHERE id = $1 AND status = $2 AND is_archived = FALSE
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(transition.from)
        .bind(transition.to)
        .bind(transition.picture_id)
        .bind(transition.message)
        .fetch_optional(conn)
        .await
    }

    /// Inserts the next occurrence of `source` due at `date`
    ///
    /// Title and description are copied as stored, together with assignees
    /// and animals. The copy starts over as `todo`.
    pub async fn duplicate_at(
        conn: &mut PgConnection,
        source_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (house_id, title, description, date)
            SELECT house_id, title, description, $2 FROM tasks WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(source_id)
        .bind(date)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("INSERT INTO task_users (task_id, user_id) SELECT $2, user_id FROM task_users WHERE task_id = $1")
            .bind(source_id)
            .bind(task.id)
            .execute(&mut *conn)
            .await?;

        sqlx::query("INSERT INTO task_animals (task_id, animal_id) SELECT $2, animal_id FROM task_animals WHERE task_id = $1")
            .bind(source_id)
            .bind(task.id)
            .execute(&mut *conn)
            .await?;

        Ok(task)
    }

    /// Locks one overdue, non-archived task for the sweep
    pub async fn claim_overdue(
        conn: &mut PgConnection,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM tasks
            WHERE is_archived = FALSE AND date < $1
            ORDER BY date ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#
        ))
        .bind(now)
        .fetch_optional(conn)
        .await
    }

    pub async fn archive(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET is_archived = TRUE, archived_at = NOW(), updated_at = NOW() WHERE id = $1 AND is_archived = FALSE",
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
