/// Back-office endpoints
///
/// Mounted behind the admin guard in [`crate::app`], so every handler here
/// already runs for an administrator.
///
/// # Endpoints
///
/// - `GET /admin/users` - Search users (`search` matches first name and email)
/// - `GET|PATCH|DELETE /admin/users/:id`
/// - `PATCH /admin/users/:id/toggle-admin` - Flip the admin flag of another user
/// - `GET /admin/houses` - Search houses by name
/// - `GET|PATCH|DELETE /admin/houses/:id`
/// - `GET /admin/houses/:id/tasks` - A house's tasks (`archived=true` for the archive)
/// - `GET|DELETE /admin/tasks/:id`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{
        house::{house_update, load_house, UpdateHouseRequest},
        users::profile_update,
        views::{HouseView, TaskView, UserView, UserWithTasks},
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use hearth_shared::{
    auth::middleware::AuthContext,
    models::{
        house::House,
        task::{Task, TaskQuery},
        user::{UpdateUser, User, UserRole},
    },
    search::{Page, SearchParams},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 100, message = "First name must be 1 to 100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,

    pub role: Option<UserRole>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HouseTasksFilter {
    #[serde(default)]
    pub archived: bool,
}

async fn load_user(state: &AppState, id: Uuid) -> ApiResult<User> {
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

async fn load_task(state: &AppState, id: Uuid) -> ApiResult<Task> {
    Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Page<UserView>>> {
    let (users, total) = User::search(&state.db, &params).await?;
    let page = params
        .page_of(users, total)
        .try_map(|u| UserView::open(&state.cipher, u))?;
    Ok(Json(page))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserWithTasks>> {
    let user = load_user(&state, id).await?;
    let task_ids = User::task_ids(&state.db, id).await?;

    Ok(Json(UserWithTasks {
        user: UserView::open(&state.cipher, user)?,
        task_ids,
    }))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUpdateUserRequest>,
) -> ApiResult<Json<UserView>> {
    req.validate()?;
    let current = load_user(&state, id).await?;

    let mut update = profile_update(&state.cipher, req.email, req.first_name, req.last_name)?;
    update.role = req.role;

    let user = if update.is_empty() {
        current
    } else {
        User::update(&state.db, id, update)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?
    };

    Ok(Json(UserView::open(&state.cipher, user)?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !User::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %id, admin_id = %auth.user_id, "User deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}

/// Grant or revoke admin rights of another user
///
/// # Errors
///
/// - `400 Bad Request`: Targeting yourself
pub async fn toggle_admin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserView>> {
    if id == auth.user_id {
        return Err(ApiError::BadRequest(
            "You cannot change your own admin rights".to_string(),
        ));
    }

    let current = load_user(&state, id).await?;
    let user = User::update(
        &state.db,
        id,
        UpdateUser {
            is_admin: Some(!current.is_admin),
            ..Default::default()
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %id, is_admin = user.is_admin, admin_id = %auth.user_id, "Admin rights toggled");

    Ok(Json(UserView::open(&state.cipher, user)?))
}

/// Houses, newest first; `search` matches the decrypted name
pub async fn list_houses(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Page<HouseView>>> {
    let houses = House::list_all(&state.db)
        .await?
        .into_iter()
        .map(|h| HouseView::open(&state.cipher, h))
        .collect::<ApiResult<Vec<_>>>()?;

    let matching = houses
        .into_iter()
        .filter(|h| params.matches(&h.name))
        .collect();

    Ok(Json(params.paginate(matching)))
}

pub async fn get_house(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HouseView>> {
    let house = load_house(&state, id).await?;
    Ok(Json(HouseView::open(&state.cipher, house)?))
}

pub async fn update_house(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateHouseRequest>,
) -> ApiResult<Json<HouseView>> {
    req.validate()?;

    let update = house_update(&state, req).await?;
    let house = House::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("House not found".to_string()))?;

    Ok(Json(HouseView::open(&state.cipher, house)?))
}

/// Deletes a house with its members, animals, tasks and join codes
pub async fn delete_house(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !House::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("House not found".to_string()));
    }

    tracing::warn!(house_id = %id, admin_id = %auth.user_id, "House deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_house_tasks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(filter): Query<HouseTasksFilter>,
) -> ApiResult<Json<Vec<TaskView>>> {
    load_house(&state, id).await?;

    let query = TaskQuery {
        archived: filter.archived,
        ..Default::default()
    };
    let tasks = Task::list_by_house(&state.db, id, &query, "date DESC").await?;

    Ok(Json(TaskView::open_all(&state, tasks).await?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskView>> {
    let task = load_task(&state, id).await?;
    Ok(Json(TaskView::open(&state, task).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Task::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
