/// Animal endpoints, scoped to the caller's house
///
/// - `POST /animals` - Add an animal (mood starts at normal)
/// - `GET /animals` - List with task ids
/// - `GET /animals/:id`
/// - `PATCH /animals/:id`
/// - `DELETE /animals/:id`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::views::AnimalView,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use hearth_shared::{
    auth::{authorization::require_house, middleware::AuthContext},
    models::animal::{Animal, AnimalGender, AnimalStatus, AnimalType, CreateAnimal, UpdateAnimal},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAnimalRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    pub born_date: DateTime<Utc>,

    pub gender: AnimalGender,

    pub animal_type: AnimalType,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAnimalRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: Option<String>,

    pub born_date: Option<DateTime<Utc>>,

    pub gender: Option<AnimalGender>,

    pub animal_type: Option<AnimalType>,

    pub status: Option<AnimalStatus>,
}

fn check_born_date(born_date: DateTime<Utc>) -> ApiResult<()> {
    if born_date > Utc::now() {
        return Err(ApiError::invalid_field(
            "born_date",
            "Birth date cannot be in the future",
        ));
    }
    Ok(())
}

async fn load_animal(state: &AppState, id: Uuid, house_id: Uuid) -> ApiResult<Animal> {
    Animal::find_in_house(&state.db, id, house_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Animal not found".to_string()))
}

pub async fn create_animal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateAnimalRequest>,
) -> ApiResult<(StatusCode, Json<AnimalView>)> {
    let house_id = require_house(&auth)?;
    req.validate()?;
    check_born_date(req.born_date)?;

    let animal = Animal::create(
        &state.db,
        CreateAnimal {
            house_id,
            name: state.cipher.seal(&req.name.trim().to_string())?,
            born_date: req.born_date,
            gender: req.gender,
            animal_type: req.animal_type,
        },
    )
    .await?;

    tracing::info!(animal_id = %animal.id, %house_id, "Animal added");

    Ok((
        StatusCode::CREATED,
        Json(AnimalView::open(&state.cipher, animal, Vec::new())?),
    ))
}

pub async fn list_animals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<AnimalView>>> {
    let house_id = require_house(&auth)?;
    let animals = Animal::list_by_house(&state.db, house_id).await?;
    Ok(Json(AnimalView::open_all(&state, animals).await?))
}

pub async fn get_animal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AnimalView>> {
    let animal = load_animal(&state, id, require_house(&auth)?).await?;
    let task_ids = Animal::task_ids(&state.db, id).await?;
    Ok(Json(AnimalView::open(&state.cipher, animal, task_ids)?))
}

pub async fn update_animal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAnimalRequest>,
) -> ApiResult<Json<AnimalView>> {
    let house_id = require_house(&auth)?;
    req.validate()?;
    if let Some(born_date) = req.born_date {
        check_born_date(born_date)?;
    }

    let name = match req.name {
        Some(name) => Some(state.cipher.seal(&name.trim().to_string())?),
        None => None,
    };

    let animal = Animal::update(
        &state.db,
        id,
        house_id,
        UpdateAnimal {
            name,
            born_date: req.born_date,
            gender: req.gender,
            animal_type: req.animal_type,
            status: req.status,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Animal not found".to_string()))?;

    let task_ids = Animal::task_ids(&state.db, id).await?;
    Ok(Json(AnimalView::open(&state.cipher, animal, task_ids)?))
}

pub async fn delete_animal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let house_id = require_house(&auth)?;

    if !Animal::delete(&state.db, id, house_id).await? {
        return Err(ApiError::NotFound("Animal not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
