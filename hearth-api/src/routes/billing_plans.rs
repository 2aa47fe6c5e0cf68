/// Billing plan endpoints
///
/// Plans are addressed by type (`free`, `monthly`, `for_life`). Anyone
/// signed in can read them; only administrators change them.

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
    auth::{authorization::require_admin, middleware::AuthContext},
    models::billing_plan::{BillingPlan, BillingPlanType, CreateBillingPlan, UpdateBillingPlan},
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: String,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_cents: i64,

    pub plan_type: BillingPlanType,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePlanRequest {
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_cents: Option<i64>,
}

fn parse_plan_type(raw: &str) -> ApiResult<BillingPlanType> {
    raw.parse().map_err(ApiError::BadRequest)
}

fn plan_not_found() -> ApiError {
    ApiError::NotFound("Billing plan not found".to_string())
}

pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<BillingPlan>>> {
    Ok(Json(BillingPlan::list_all(&state.db).await?))
}

pub async fn get_plan(
    State(state): State<AppState>,
    Path(plan_type): Path<String>,
) -> ApiResult<Json<BillingPlan>> {
    let plan_type = parse_plan_type(&plan_type)?;
    let plan = BillingPlan::find_by_type(&state.db, plan_type)
        .await?
        .ok_or_else(plan_not_found)?;
    Ok(Json(plan))
}

/// # Errors
///
/// - `409 Conflict`: A plan of that type already exists
pub async fn create_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreatePlanRequest>,
) -> ApiResult<(StatusCode, Json<BillingPlan>)> {
    require_admin(&auth)?;
    req.validate()?;

    let plan = BillingPlan::create(
        &state.db,
        CreateBillingPlan {
            title: req.title,
            description: req.description,
            price_cents: req.price_cents,
            plan_type: req.plan_type,
        },
    )
    .await?;

    tracing::info!(plan_type = plan.plan_type.as_str(), "Billing plan created");
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn update_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(plan_type): Path<String>,
    Json(req): Json<UpdatePlanRequest>,
) -> ApiResult<Json<BillingPlan>> {
    require_admin(&auth)?;
    req.validate()?;
    let plan_type = parse_plan_type(&plan_type)?;

    let plan = BillingPlan::update(
        &state.db,
        plan_type,
        UpdateBillingPlan {
            title: req.title,
            description: req.description,
            price_cents: req.price_cents,
        },
    )
    .await?
    .ok_or_else(plan_not_found)?;

    Ok(Json(plan))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(plan_type): Path<String>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;
    let plan_type = parse_plan_type(&plan_type)?;

    if !BillingPlan::delete(&state.db, plan_type).await? {
        return Err(plan_not_found());
    }

    tracing::info!(plan_type = plan_type.as_str(), "Billing plan deleted");
    Ok(StatusCode::NO_CONTENT)
}
