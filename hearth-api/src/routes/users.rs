/// User endpoints
///
/// # Endpoints
///
/// - `GET /users/me` - Current user with their task ids
/// - `GET /users/me/tasks` - Current user's open tasks
/// - `PATCH /users/me` - Update own profile
/// - `DELETE /users/me` - Delete own account
/// - `PATCH /users/:id` - Update a house member (parent)
/// - `DELETE /users/:id` - Remove a house member (parent)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{
        media::remove_media,
        views::{TaskView, UserView, UserWithTasks},
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use hearth_shared::{
    auth::{
        authorization::{require_parent, require_same_house},
        middleware::AuthContext,
    },
    crypto::FieldCipher,
    models::{
        media::Media,
        task::{Task, TaskQuery},
        user::{UpdateUser, User, UserRole},
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 100, message = "First name must be 1 to 100 characters"))]
    pub first_name: Option<String>,

    /// An empty string clears the last name
    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,

    /// Media id of the new profile picture
    pub profile_picture: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 100, message = "First name must be 1 to 100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,

    pub role: Option<UserRole>,
}

/// Profile fields shared by self-service and member updates
pub(crate) fn profile_update(
    cipher: &FieldCipher,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
) -> ApiResult<UpdateUser> {
    let last_name = match last_name.map(|n| n.trim().to_string()) {
        Some(n) if n.is_empty() => Some(None),
        Some(n) => Some(Some(cipher.seal(&n)?)),
        None => None,
    };

    Ok(UpdateUser {
        email: email.map(|e| Some(e.trim().to_lowercase())),
        first_name: first_name.map(|n| n.trim().to_string()),
        last_name,
        ..Default::default()
    })
}

async fn load_user(state: &AppState, id: Uuid) -> ApiResult<User> {
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Loads a user only if they live in the caller's house
async fn load_member(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<User> {
    let user = load_user(state, id).await?;
    let house_id = user
        .house_id
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    require_same_house(auth, house_id)?;
    Ok(user)
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserWithTasks>> {
    let user = load_user(&state, auth.user_id).await?;
    let task_ids = User::task_ids(&state.db, user.id).await?;

    Ok(Json(UserWithTasks {
        user: UserView::open(&state.cipher, user)?,
        task_ids,
    }))
}

/// Open tasks assigned to the caller, soonest first
pub async fn get_my_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let Some(house_id) = auth.house_id else {
        return Ok(Json(Vec::new()));
    };

    let query = TaskQuery {
        user_id: Some(auth.user_id),
        ..Default::default()
    };
    let tasks = Task::list_by_house(&state.db, house_id, &query, "date ASC").await?;

    Ok(Json(TaskView::open_all(&state, tasks).await?))
}

/// Update own profile
///
/// Setting a new profile picture deletes the previous one.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserView>> {
    req.validate()?;

    let current = load_user(&state, auth.user_id).await?;
    let mut update = profile_update(&state.cipher, req.email, req.first_name, req.last_name)?;

    let mut replaced_picture = None;
    if let Some(picture_id) = req.profile_picture {
        if Media::find_by_id(&state.db, picture_id).await?.is_none() {
            return Err(ApiError::NotFound("Media not found".to_string()));
        }
        if current.profile_picture_id != Some(picture_id) {
            replaced_picture = current.profile_picture_id;
            update.profile_picture_id = Some(Some(picture_id));
        }
    }

    let user = if update.is_empty() {
        current
    } else {
        User::update(&state.db, auth.user_id, update)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?
    };

    if let Some(old) = replaced_picture {
        remove_media(&state, old).await?;
    }

    Ok(Json(UserView::open(&state.cipher, user)?))
}

pub async fn delete_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    if !User::delete(&state.db, auth.user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %auth.user_id, "User deleted own account");
    Ok(StatusCode::NO_CONTENT)
}

/// Update a member of the caller's house; parents may also change roles
pub async fn update_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMemberRequest>,
) -> ApiResult<Json<UserView>> {
    require_parent(&auth)?;
    req.validate()?;

    let member = load_member(&state, &auth, id).await?;

    let mut update = profile_update(&state.cipher, req.email, req.first_name, req.last_name)?;
    update.role = req.role;

    let user = if update.is_empty() {
        member
    } else {
        User::update(&state.db, id, update)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?
    };

    Ok(Json(UserView::open(&state.cipher, user)?))
}

pub async fn delete_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_parent(&auth)?;
    load_member(&state, &auth, id).await?;

    User::delete(&state.db, id).await?;

    tracing::info!(user_id = %id, removed_by = %auth.user_id, "Member removed from house");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::new("users-route-test-secret-0123456789").unwrap()
    }

    #[test]
    fn test_profile_update_seals_last_name() {
        let cipher = cipher();
        let update = profile_update(&cipher, None, None, Some("Lovelace".to_string())).unwrap();

        let sealed = update.last_name.flatten().unwrap();
        assert!(FieldCipher::is_sealed(&sealed));
        assert_eq!(cipher.open::<String>(&sealed).unwrap(), "Lovelace");
    }

    #[test]
    fn test_profile_update_blank_last_name_clears() {
        let update = profile_update(&cipher(), None, None, Some("  ".to_string())).unwrap();
        assert_eq!(update.last_name, Some(None));
    }

    #[test]
    fn test_profile_update_normalizes_email() {
        let update =
            profile_update(&cipher(), Some(" Ada@Example.COM ".to_string()), None, None).unwrap();
        assert_eq!(update.email, Some(Some("ada@example.com".to_string())));
        assert!(update.first_name.is_none());
    }
}
