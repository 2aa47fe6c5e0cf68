/// Task (chore) endpoints, scoped to the caller's house
///
/// # Endpoints
///
/// - `GET /tasks` - Active tasks (search params, `period`, `status`)
/// - `GET /tasks/status/:status` - Active tasks with a status
/// - `GET /tasks/archive` - Archived tasks
/// - `GET /tasks/animal/:id` - Active tasks of an animal
/// - `POST /tasks` - Create (parent)
/// - `GET /tasks/:id`
/// - `PATCH /tasks/:id` - Edit (parent)
/// - `PATCH /tasks/:id/check` - Mark done with a proof picture (assignee or parent)
/// - `PATCH /tasks/:id/validate` - Accept a checked task (parent)
/// - `PATCH /tasks/:id/refuse` - Send a checked task back (parent)
/// - `DELETE /tasks/:id` - Delete (parent)
///
/// Titles and descriptions are sealed, so text search decrypts every
/// candidate and paginates afterwards.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{media::remove_media, views::TaskView},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use hearth_shared::{
    auth::{
        authorization::{require_house, require_parent},
        middleware::AuthContext,
    },
    models::{
        animal::{Animal, MoodShift},
        media::Media,
        recurrence::{Recurrence, RecurrenceType},
        task::{
            CreateTask, Task, TaskQuery, TaskStatus, TaskTransition, UpdateTask,
            TASK_ORDER_COLUMNS,
        },
        user::User,
    },
    period::TaskPeriod,
    search::{Page, SearchParams},
};
use serde::Deserialize;
use std::collections::BTreeSet;
use uuid::Uuid;
use validator::Validate;

/// Task-specific list filters, read from the same query string as
/// [`SearchParams`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub period: Option<TaskPeriod>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub recurrence: Option<RecurrenceType>,

    /// Due date
    pub date: DateTime<Utc>,

    #[serde(default)]
    pub user_ids: Vec<Uuid>,

    #[serde(default)]
    pub animal_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: Option<String>,

    /// An empty string clears the description
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub date: Option<DateTime<Utc>>,

    /// Creates or replaces the task's rule
    pub recurrence: Option<RecurrenceType>,

    /// Replaces the assignees
    pub user_ids: Option<Vec<Uuid>>,

    /// Replaces the linked animals
    pub animal_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct CheckTaskRequest {
    /// Proof photo, uploaded through `POST /media`
    pub picture_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefuseTaskRequest {
    #[validate(length(min = 1, max = 500, message = "Message must be 1 to 500 characters"))]
    pub message: String,
}

/// Sorted, de-duplicated ids
fn unique_ids(ids: &[Uuid]) -> Vec<Uuid> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Rejects a status change the lifecycle does not allow
fn ensure_transition(task: &Task, target: TaskStatus) -> ApiResult<()> {
    if task.is_archived {
        return Err(ApiError::Conflict("Archived tasks cannot be changed".to_string()));
    }
    if !task.status.can_transition_to(target) {
        return Err(ApiError::Conflict(format!(
            "Cannot move a task from {} to {}",
            task.status.as_str(),
            target.as_str()
        )));
    }
    Ok(())
}

fn concurrent_change() -> ApiError {
    ApiError::Conflict("Task was changed concurrently, reload and retry".to_string())
}

async fn load_task(state: &AppState, id: Uuid, house_id: Uuid) -> ApiResult<Task> {
    Task::find_in_house(&state.db, id, house_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

/// Checks that every assignee and animal belongs to the house
async fn check_relations(
    state: &AppState,
    house_id: Uuid,
    user_ids: &[Uuid],
    animal_ids: &[Uuid],
) -> ApiResult<()> {
    if !user_ids.is_empty()
        && User::count_in_house(&state.db, house_id, user_ids).await? != user_ids.len() as i64
    {
        return Err(ApiError::invalid_field(
            "user_ids",
            "Every assignee must be a member of your house",
        ));
    }

    if !animal_ids.is_empty()
        && Animal::count_in_house(&state.db, house_id, animal_ids).await? != animal_ids.len() as i64
    {
        return Err(ApiError::invalid_field(
            "animal_ids",
            "Every animal must belong to your house",
        ));
    }

    Ok(())
}

/// Lists, searches and paginates a house's tasks
async fn list_page(
    state: &AppState,
    house_id: Uuid,
    query: TaskQuery,
    params: &SearchParams,
) -> ApiResult<Page<TaskView>> {
    let order = params.order_clause(TASK_ORDER_COLUMNS);
    let tasks = Task::list_by_house(&state.db, house_id, &query, &order).await?;

    let mut matching = Vec::with_capacity(tasks.len());
    for task in tasks {
        if params.search_term().is_some() {
            let title: String = state.cipher.open(&task.title)?;
            let description: Option<String> =
                state.cipher.open_opt(task.description.as_deref())?;

            let hit = params.matches(&title)
                || description.as_deref().is_some_and(|d| params.matches(d));
            if !hit {
                continue;
            }
        }
        matching.push(task);
    }

    let page = params.paginate(matching);
    let items = TaskView::open_all(state, page.items).await?;

    Ok(Page {
        items,
        total: page.total,
        page: page.page,
        page_size: page.page_size,
    })
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<SearchParams>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<Page<TaskView>>> {
    let house_id = require_house(&auth)?;

    let query = TaskQuery {
        status: filter.status,
        due_between: filter.period.map(|p| p.range(Utc::now())),
        ..Default::default()
    };

    Ok(Json(list_page(&state, house_id, query, &params).await?))
}

pub async fn list_tasks_by_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(status): Path<String>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Page<TaskView>>> {
    let house_id = require_house(&auth)?;
    let status: TaskStatus = status.parse().map_err(ApiError::BadRequest)?;

    let query = TaskQuery {
        status: Some(status),
        ..Default::default()
    };

    Ok(Json(list_page(&state, house_id, query, &params).await?))
}

pub async fn list_archived_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Page<TaskView>>> {
    let house_id = require_house(&auth)?;

    let query = TaskQuery {
        archived: true,
        ..Default::default()
    };

    Ok(Json(list_page(&state, house_id, query, &params).await?))
}

pub async fn list_animal_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(animal_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let house_id = require_house(&auth)?;

    if Animal::find_in_house(&state.db, animal_id, house_id).await?.is_none() {
        return Err(ApiError::NotFound("Animal not found".to_string()));
    }

    let query = TaskQuery {
        animal_id: Some(animal_id),
        ..Default::default()
    };
    let tasks = Task::list_by_house(&state.db, house_id, &query, "date ASC").await?;

    Ok(Json(TaskView::open_all(&state, tasks).await?))
}

/// Create a task
///
/// Assignees and animals must belong to the caller's house. A `recurrence`
/// attaches a rule anchored on the task's date.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskView>)> {
    let house_id = require_parent(&auth)?;
    req.validate()?;

    let user_ids = unique_ids(&req.user_ids);
    let animal_ids = unique_ids(&req.animal_ids);
    check_relations(&state, house_id, &user_ids, &animal_ids).await?;

    let description = req
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let mut tx = state.db.begin().await?;

    let task = Task::create(
        &mut *tx,
        CreateTask {
            house_id,
            title: state.cipher.seal(&req.title.trim().to_string())?,
            description: state.cipher.seal_opt(description.as_ref())?,
            date: req.date,
        },
    )
    .await?;

    Task::replace_users(&mut *tx, task.id, &user_ids).await?;
    Task::replace_animals(&mut *tx, task.id, &animal_ids).await?;

    if let Some(recurrence_type) = req.recurrence {
        Recurrence::upsert_for_task(&mut *tx, task.id, recurrence_type, task.date).await?;
    }

    tx.commit().await?;

    tracing::info!(task_id = %task.id, %house_id, recurring = req.recurrence.is_some(), "Task created");

    Ok((StatusCode::CREATED, Json(TaskView::open(&state, task).await?)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskView>> {
    let task = load_task(&state, id, require_house(&auth)?).await?;
    Ok(Json(TaskView::open(&state, task).await?))
}

/// Edit a task
///
/// Omitted fields are left alone. Moving the date also moves the anchor of
/// an existing rule.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskView>> {
    let house_id = require_parent(&auth)?;
    req.validate()?;

    let task = load_task(&state, id, house_id).await?;
    if task.is_archived {
        return Err(ApiError::Conflict("Archived tasks cannot be changed".to_string()));
    }

    let user_ids = req.user_ids.as_deref().map(unique_ids);
    let animal_ids = req.animal_ids.as_deref().map(unique_ids);
    check_relations(
        &state,
        house_id,
        user_ids.as_deref().unwrap_or_default(),
        animal_ids.as_deref().unwrap_or_default(),
    )
    .await?;

    let title = match req.title {
        Some(title) => Some(state.cipher.seal(&title.trim().to_string())?),
        None => None,
    };
    let description = match req.description.map(|d| d.trim().to_string()) {
        Some(d) if d.is_empty() => Some(None),
        Some(d) => Some(Some(state.cipher.seal(&d)?)),
        None => None,
    };

    let mut tx = state.db.begin().await?;

    let updated = Task::update(
        &mut *tx,
        id,
        UpdateTask {
            title,
            description,
            date: req.date,
        },
    )
    .await?
    .ok_or_else(concurrent_change)?;

    if let Some(user_ids) = &user_ids {
        Task::replace_users(&mut *tx, id, user_ids).await?;
    }
    if let Some(animal_ids) = &animal_ids {
        Task::replace_animals(&mut *tx, id, animal_ids).await?;
    }

    match req.recurrence {
        Some(recurrence_type) => {
            Recurrence::upsert_for_task(&mut *tx, id, recurrence_type, updated.date).await?;
        }
        None if req.date.is_some() => {
            Recurrence::sync_date(&mut *tx, id, updated.date).await?;
        }
        None => {}
    }

    tx.commit().await?;

    Ok(Json(TaskView::open(&state, updated).await?))
}

/// Mark a task as done, pending validation
///
/// Any assignee may check their task; parents may check any task.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is neither assigned nor a parent
/// - `404 Not Found`: Unknown task or picture
/// - `409 Conflict`: Task is archived or not in `todo`
pub async fn check_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<CheckTaskRequest>,
) -> ApiResult<Json<TaskView>> {
    let house_id = require_house(&auth)?;
    let task = load_task(&state, id, house_id).await?;

    if !auth.is_parent() && !Task::is_assigned(&state.db, id, auth.user_id).await? {
        return Err(ApiError::Forbidden("You are not assigned to this task".to_string()));
    }
    ensure_transition(&task, TaskStatus::ToValidate)?;

    if Media::find_by_id(&state.db, req.picture_id).await?.is_none() {
        return Err(ApiError::NotFound("Picture not found".to_string()));
    }

    let mut conn = state.db.acquire().await?;
    let checked = Task::transition(
        &mut conn,
        id,
        TaskTransition {
            from: TaskStatus::Todo,
            to: TaskStatus::ToValidate,
            picture_id: Some(req.picture_id),
            message: None,
        },
    )
    .await?
    .ok_or_else(concurrent_change)?;
    drop(conn);

    tracing::info!(task_id = %id, user_id = %auth.user_id, "Task checked");

    Ok(Json(TaskView::open(&state, checked).await?))
}

/// Accept a checked task
///
/// Every linked animal's mood goes up one step and the proof picture is
/// deleted.
pub async fn validate_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskView>> {
    let house_id = require_parent(&auth)?;
    let task = load_task(&state, id, house_id).await?;
    ensure_transition(&task, TaskStatus::Done)?;

    let mut tx = state.db.begin().await?;

    let validated = Task::transition(
        &mut *tx,
        id,
        TaskTransition {
            from: TaskStatus::ToValidate,
            to: TaskStatus::Done,
            picture_id: None,
            message: None,
        },
    )
    .await?
    .ok_or_else(concurrent_change)?;

    let cheered = Animal::shift_mood_for_task(&mut *tx, id, MoodShift::Upgrade).await?;

    tx.commit().await?;

    if let Some(picture_id) = task.picture_id {
        remove_media(&state, picture_id).await?;
    }

    tracing::info!(task_id = %id, animals_upgraded = cheered, "Task validated");

    Ok(Json(TaskView::open(&state, validated).await?))
}

/// Send a checked task back to `todo` with a reason
pub async fn refuse_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<RefuseTaskRequest>,
) -> ApiResult<Json<TaskView>> {
    let house_id = require_parent(&auth)?;
    req.validate()?;

    let task = load_task(&state, id, house_id).await?;
    ensure_transition(&task, TaskStatus::Todo)?;

    let mut conn = state.db.acquire().await?;
    let refused = Task::transition(
        &mut conn,
        id,
        TaskTransition {
            from: TaskStatus::ToValidate,
            to: TaskStatus::Todo,
            picture_id: None,
            message: Some(state.cipher.seal(&req.message.trim().to_string())?),
        },
    )
    .await?
    .ok_or_else(concurrent_change)?;
    drop(conn);

    if let Some(picture_id) = task.picture_id {
        remove_media(&state, picture_id).await?;
    }

    tracing::info!(task_id = %id, "Task refused");

    Ok(Json(TaskView::open(&state, refused).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let house_id = require_parent(&auth)?;
    load_task(&state, id, house_id).await?;

    Task::delete(&state.db, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: TaskStatus, is_archived: bool) -> Task {
        Task {
            id: Uuid::new_v4(),
            house_id: Uuid::new_v4(),
            title: "string:crypto:AAAA".to_string(),
            description: None,
            status,
            message: None,
            date: Utc::now(),
            is_archived,
            archived_at: None,
            picture_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unique_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = unique_ids(&[a, b, a, b, a]);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
    }

    #[test]
    fn test_ensure_transition() {
        assert!(ensure_transition(&task(TaskStatus::Todo, false), TaskStatus::ToValidate).is_ok());
        assert!(ensure_transition(&task(TaskStatus::ToValidate, false), TaskStatus::Done).is_ok());
        assert!(ensure_transition(&task(TaskStatus::ToValidate, false), TaskStatus::Todo).is_ok());

        assert!(matches!(
            ensure_transition(&task(TaskStatus::Todo, false), TaskStatus::Done),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            ensure_transition(&task(TaskStatus::Todo, true), TaskStatus::ToValidate),
            Err(ApiError::Conflict(_))
        ));
    }

    #[test]
    fn test_task_filter_from_query() {
        let filter: TaskFilter =
            serde_json::from_str(r#"{"period":"week","status":"to_validate"}"#).unwrap();
        assert_eq!(filter.period, Some(TaskPeriod::Week));
        assert_eq!(filter.status, Some(TaskStatus::ToValidate));
    }
}
