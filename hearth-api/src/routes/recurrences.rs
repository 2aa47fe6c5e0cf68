/// Recurrence rule endpoints
///
/// Rules are created and replaced through the task endpoints; these only
/// read one and stop it. Deleting a rule keeps its current task.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use hearth_shared::{
    auth::{
        authorization::{require_house, require_parent},
        middleware::AuthContext,
    },
    models::recurrence::Recurrence,
};
use uuid::Uuid;

async fn load_rule(state: &AppState, id: Uuid, house_id: Uuid) -> ApiResult<Recurrence> {
    Recurrence::find_in_house(&state.db, id, house_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Recurrence not found".to_string()))
}

pub async fn get_recurrence(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Recurrence>> {
    Ok(Json(load_rule(&state, id, require_house(&auth)?).await?))
}

pub async fn delete_recurrence(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let rule = load_rule(&state, id, require_parent(&auth)?).await?;

    Recurrence::delete(&state.db, rule.id).await?;

    tracing::info!(recurrence_id = %id, task_id = %rule.task_id, "Recurrence stopped");
    Ok(StatusCode::NO_CONTENT)
}
