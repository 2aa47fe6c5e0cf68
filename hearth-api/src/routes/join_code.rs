/// Join code endpoints
///
/// A house holds at most one live code per type. Issuing a code replaces
/// the previous one of that type, so an old code stops working the moment a
/// parent asks for a new one.
///
/// # Endpoints
///
/// - `POST /join-code/parent` - Issue the parent code (parent)
/// - `POST /join-code/child` - Issue the child code (parent)
/// - `GET /join-code/:code` - Describe a live code (API key only)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::house::load_house,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use hearth_shared::{
    auth::{authorization::require_parent, middleware::AuthContext},
    models::join_code::{generate_code, is_valid_code_format, join_code_ttl, JoinCode, JoinCodeType},
};
use serde::Serialize;
use uuid::Uuid;

/// Fresh codes to try before giving up on clashes with other houses
const MAX_ISSUE_ATTEMPTS: usize = 5;

/// Public description of a join code
#[derive(Debug, Serialize)]
pub struct JoinCodeInfo {
    pub code: String,
    pub code_type: JoinCodeType,
    pub expires_at: DateTime<Utc>,
    pub house_id: Uuid,
    pub house_name: String,
}

async fn issue_code(
    state: &AppState,
    auth: &AuthContext,
    code_type: JoinCodeType,
) -> ApiResult<(StatusCode, Json<JoinCode>)> {
    let house_id = require_parent(auth)?;

    for attempt in 1..=MAX_ISSUE_ATTEMPTS {
        let code = generate_code();
        let expires_at = Utc::now() + join_code_ttl();

        match JoinCode::issue(&state.db, house_id, code_type, &code, expires_at).await {
            Ok(join_code) => {
                tracing::info!(%house_id, code_type = ?code_type, "Join code issued");
                return Ok((StatusCode::CREATED, Json(join_code)));
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::debug!(attempt, "Join code clashed, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::ServiceUnavailable(
        "Could not allocate a join code, try again".to_string(),
    ))
}

pub async fn create_parent_code(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<(StatusCode, Json<JoinCode>)> {
    issue_code(&state, &auth, JoinCodeType::Parent).await
}

pub async fn create_child_code(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<(StatusCode, Json<JoinCode>)> {
    issue_code(&state, &auth, JoinCodeType::Child).await
}

/// Describe a live code so a client can show which house it joins
///
/// # Errors
///
/// - `404 Not Found`: Unknown, malformed or expired code
pub async fn get_join_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<JoinCodeInfo>> {
    let not_found = || ApiError::NotFound("Join code not found or expired".to_string());

    if !is_valid_code_format(&code) {
        return Err(not_found());
    }

    let join_code = JoinCode::find_active(&state.db, &code, Utc::now())
        .await?
        .ok_or_else(not_found)?;

    let house = load_house(&state, join_code.house_id).await?;

    Ok(Json(JoinCodeInfo {
        code: join_code.code,
        code_type: join_code.code_type,
        expires_at: join_code.expires_at,
        house_id: house.id,
        house_name: state.cipher.open(&house.name)?,
    }))
}
