/// House endpoints
///
/// Every route works on the caller's own house; there is no way to address
/// another house outside the admin routes.
///
/// # Endpoints
///
/// - `POST /house` - Create a house and join it as a parent
/// - `GET /house` - Current house
/// - `PATCH /house` - Rename or change billing plan (parent)
/// - `GET /house/users` - Members
/// - `GET /house/join-code` - Active join codes (parent)
/// - `GET /house/animals` - Animals
/// - `GET /house/affiliates` - Affiliate offers for the house's animals

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::views::{AnimalView, HouseView, UserView},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::Utc;
use hearth_shared::{
    auth::{
        authorization::{require_house, require_parent},
        middleware::AuthContext,
    },
    models::{
        affiliate::Affiliate,
        animal::Animal,
        billing_plan::{BillingPlan, BillingPlanType},
        house::{House, UpdateHouse},
        join_code::JoinCode,
        user::User,
    },
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateHouseRequest {
    #[validate(length(min = 1, max = 100, message = "House name must be 1 to 100 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateHouseRequest {
    #[validate(length(min = 1, max = 100, message = "House name must be 1 to 100 characters"))]
    pub name: Option<String>,

    /// Plan to switch to, by type
    pub billing_plan: Option<BillingPlanType>,
}

pub(crate) async fn load_house(state: &AppState, id: uuid::Uuid) -> ApiResult<House> {
    House::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("House not found".to_string()))
}

/// Turns a house update request into sealed column values
pub(crate) async fn house_update(
    state: &AppState,
    req: UpdateHouseRequest,
) -> ApiResult<UpdateHouse> {
    let name = match req.name {
        Some(name) => Some(state.cipher.seal(&name.trim().to_string())?),
        None => None,
    };

    let billing_plan_id = match req.billing_plan {
        Some(plan_type) => Some(
            BillingPlan::find_by_type(&state.db, plan_type)
                .await?
                .ok_or_else(|| ApiError::NotFound("Billing plan not found".to_string()))?
                .id,
        ),
        None => None,
    };

    Ok(UpdateHouse {
        name,
        billing_plan_id,
    })
}

/// Create a house
///
/// The caller becomes its first parent and the house starts on the free
/// plan.
///
/// # Errors
///
/// - `409 Conflict`: Caller already belongs to a house
pub async fn create_house(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateHouseRequest>,
) -> ApiResult<(StatusCode, Json<HouseView>)> {
    req.validate()?;

    if auth.house_id.is_some() {
        return Err(ApiError::Conflict("You already belong to a house".to_string()));
    }

    let free_plan = BillingPlan::find_by_type(&state.db, BillingPlanType::Free)
        .await?
        .ok_or_else(|| ApiError::InternalError("Free billing plan is not seeded".to_string()))?;

    let sealed_name = state.cipher.seal(&req.name.trim().to_string())?;
    let house =
        House::create_with_owner(&state.db, sealed_name, Some(free_plan.id), auth.user_id).await?;

    tracing::info!(house_id = %house.id, owner_id = %auth.user_id, "House created");

    Ok((StatusCode::CREATED, Json(HouseView::open(&state.cipher, house)?)))
}

pub async fn get_house(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<HouseView>> {
    let house = load_house(&state, require_house(&auth)?).await?;
    Ok(Json(HouseView::open(&state.cipher, house)?))
}

pub async fn update_house(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateHouseRequest>,
) -> ApiResult<Json<HouseView>> {
    let house_id = require_parent(&auth)?;
    req.validate()?;

    let update = house_update(&state, req).await?;
    let house = House::update(&state.db, house_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("House not found".to_string()))?;

    Ok(Json(HouseView::open(&state.cipher, house)?))
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<UserView>>> {
    let house_id = require_house(&auth)?;

    let members = User::list_by_house(&state.db, house_id)
        .await?
        .into_iter()
        .map(|u| UserView::open(&state.cipher, u))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(members))
}

pub async fn list_join_codes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<JoinCode>>> {
    let house_id = require_parent(&auth)?;
    let codes = JoinCode::list_active_by_house(&state.db, house_id, Utc::now()).await?;
    Ok(Json(codes))
}

pub async fn list_animals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<AnimalView>>> {
    let house_id = require_house(&auth)?;
    let animals = Animal::list_by_house(&state.db, house_id).await?;
    Ok(Json(AnimalView::open_all(&state, animals).await?))
}

/// Offers targeting any animal type present in the house, each listed once
pub async fn list_affiliates(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Affiliate>>> {
    let house_id = require_house(&auth)?;
    let types = Animal::types_in_house(&state.db, house_id).await?;
    Ok(Json(Affiliate::list_for_types(&state.db, &types).await?))
}
