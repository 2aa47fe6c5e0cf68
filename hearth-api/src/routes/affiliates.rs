/// Affiliate offer endpoints
///
/// Offers target one or more animal types and are shown to houses keeping
/// those animals. Prices are integer cents.

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
    models::{
        affiliate::{Affiliate, CreateAffiliate, UpdateAffiliate},
        animal::AnimalType,
        media::Media,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAffiliateRequest {
    #[validate(url(message = "Invalid URL"))]
    pub url: String,

    #[validate(length(min = 1, message = "At least one animal type is required"))]
    pub animals: Vec<AnimalType>,

    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Brand must be 1 to 100 characters"))]
    pub brand: String,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub base_price_cents: i64,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub discount_price_cents: i64,

    pub image_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAffiliateRequest {
    #[validate(url(message = "Invalid URL"))]
    pub url: Option<String>,

    #[validate(length(min = 1, message = "At least one animal type is required"))]
    pub animals: Option<Vec<AnimalType>>,

    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Brand must be 1 to 100 characters"))]
    pub brand: Option<String>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub base_price_cents: Option<i64>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub discount_price_cents: Option<i64>,

    pub image_id: Option<Uuid>,
}

/// A discount must not cost more than the base price
fn check_prices(base: i64, discount: i64) -> ApiResult<()> {
    if discount > base {
        return Err(ApiError::invalid_field(
            "discount_price_cents",
            "Discount price cannot exceed the base price",
        ));
    }
    Ok(())
}

async fn check_image(state: &AppState, image_id: Option<Uuid>) -> ApiResult<()> {
    if let Some(id) = image_id {
        if Media::find_by_id(&state.db, id).await?.is_none() {
            return Err(ApiError::NotFound("Image not found".to_string()));
        }
    }
    Ok(())
}

/// Dedupes while keeping the first occurrence order
fn dedupe_types(types: Vec<AnimalType>) -> Vec<AnimalType> {
    let mut seen = Vec::with_capacity(types.len());
    for t in types {
        if !seen.contains(&t) {
            seen.push(t);
        }
    }
    seen
}

pub async fn list_affiliates(State(state): State<AppState>) -> ApiResult<Json<Vec<Affiliate>>> {
    Ok(Json(Affiliate::list_all(&state.db).await?))
}

pub async fn list_affiliates_for_type(
    State(state): State<AppState>,
    Path(animal_type): Path<String>,
) -> ApiResult<Json<Vec<Affiliate>>> {
    let animal_type: AnimalType = animal_type.parse().map_err(ApiError::BadRequest)?;
    Ok(Json(Affiliate::list_for_types(&state.db, &[animal_type]).await?))
}

pub async fn create_affiliate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateAffiliateRequest>,
) -> ApiResult<(StatusCode, Json<Affiliate>)> {
    require_admin(&auth)?;
    req.validate()?;
    check_prices(req.base_price_cents, req.discount_price_cents)?;
    check_image(&state, req.image_id).await?;

    let affiliate = Affiliate::create(
        &state.db,
        CreateAffiliate {
            url: req.url,
            animals: dedupe_types(req.animals),
            title: req.title,
            description: req.description,
            brand: req.brand,
            base_price_cents: req.base_price_cents,
            discount_price_cents: req.discount_price_cents,
            image_id: req.image_id,
        },
    )
    .await?;

    tracing::info!(affiliate_id = %affiliate.id, "Affiliate created");
    Ok((StatusCode::CREATED, Json(affiliate)))
}

pub async fn update_affiliate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAffiliateRequest>,
) -> ApiResult<Json<Affiliate>> {
    require_admin(&auth)?;
    req.validate()?;

    let current = Affiliate::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Affiliate not found".to_string()))?;

    check_prices(
        req.base_price_cents.unwrap_or(current.base_price_cents),
        req.discount_price_cents.unwrap_or(current.discount_price_cents),
    )?;
    check_image(&state, req.image_id).await?;

    let affiliate = Affiliate::update(
        &state.db,
        id,
        UpdateAffiliate {
            url: req.url,
            animals: req.animals.map(dedupe_types),
            title: req.title,
            description: req.description,
            brand: req.brand,
            base_price_cents: req.base_price_cents,
            discount_price_cents: req.discount_price_cents,
            image_id: req.image_id,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Affiliate not found".to_string()))?;

    Ok(Json(affiliate))
}

pub async fn delete_affiliate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    if !Affiliate::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Affiliate not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
