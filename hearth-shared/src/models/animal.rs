/// Animal model, mood resolver and database operations
///
/// An animal's mood follows the chores done for it: validating a task lifts
/// the mood of every linked animal one step, and a task that expires without
/// validation lowers it one step. Both ends saturate.
///
/// ```text
/// upgrade:   sad → normal → happy → happy
/// downgrade: happy → normal → sad → sad
/// ```
///
/// # Schema
///
/// ```sql
/// CREATE TYPE animal_type AS ENUM ('cat', 'dog', 'rabbit', 'bird', 'fish', 'rodent', 'reptile', 'horse', 'other');
/// CREATE TYPE animal_gender AS ENUM ('masculine', 'feminine');
/// CREATE TYPE animal_status AS ENUM ('happy', 'normal', 'sad');
///
/// CREATE TABLE animals (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     house_id UUID NOT NULL REFERENCES houses(id) ON DELETE CASCADE,
///     name TEXT NOT NULL, -- sealed
///     born_date TIMESTAMPTZ NOT NULL,
///     gender animal_gender NOT NULL,
///     animal_type animal_type NOT NULL,
///     status animal_status NOT NULL DEFAULT 'normal',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```
/// use hearth_shared::models::animal::{AnimalStatus, MoodShift};
///
/// assert_eq!(AnimalStatus::Sad.shifted(MoodShift::Upgrade), AnimalStatus::Normal);
/// assert_eq!(AnimalStatus::Sad.shifted(MoodShift::Downgrade), AnimalStatus::Sad);
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgHasArrayType, PgTypeInfo};
use sqlx::{FromRow, PgConnection, PgPool};
use std::str::FromStr;
use uuid::Uuid;

const ANIMAL_COLUMNS: &str =
    "id, house_id, name, born_date, gender, animal_type, status, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "animal_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AnimalType {
    Cat,
    Dog,
    Rabbit,
    Bird,
    Fish,
    Rodent,
    Reptile,
    Horse,
    Other,
}

impl AnimalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimalType::Cat => "cat",
            AnimalType::Dog => "dog",
            AnimalType::Rabbit => "rabbit",
            AnimalType::Bird => "bird",
            AnimalType::Fish => "fish",
            AnimalType::Rodent => "rodent",
            AnimalType::Reptile => "reptile",
            AnimalType::Horse => "horse",
            AnimalType::Other => "other",
        }
    }
}

impl FromStr for AnimalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cat" => Ok(AnimalType::Cat),
            "dog" => Ok(AnimalType::Dog),
            "rabbit" => Ok(AnimalType::Rabbit),
            "bird" => Ok(AnimalType::Bird),
            "fish" => Ok(AnimalType::Fish),
            "rodent" => Ok(AnimalType::Rodent),
            "reptile" => Ok(AnimalType::Reptile),
            "horse" => Ok(AnimalType::Horse),
            "other" => Ok(AnimalType::Other),
            other => Err(format!("Unknown animal type: {}", other)),
        }
    }
}

impl PgHasArrayType for AnimalType {
    fn array_type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("_animal_type")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "animal_gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AnimalGender {
    Masculine,
    Feminine,
}

/// Mood of an animal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "animal_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AnimalStatus {
    Happy,
    #[default]
    Normal,
    Sad,
}

/// Direction of a one-step mood change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoodShift {
    /// A linked task was validated
    Upgrade,
    /// A linked task expired unvalidated
    Downgrade,
}

impl AnimalStatus {
    pub fn upgraded(self) -> Self {
        match self {
            AnimalStatus::Sad => AnimalStatus::Normal,
            AnimalStatus::Normal | AnimalStatus::Happy => AnimalStatus::Happy,
        }
    }

    pub fn downgraded(self) -> Self {
        match self {
            AnimalStatus::Happy => AnimalStatus::Normal,
            AnimalStatus::Normal | AnimalStatus::Sad => AnimalStatus::Sad,
        }
    }

    pub fn shifted(self, shift: MoodShift) -> Self {
        match shift {
            MoodShift::Upgrade => self.upgraded(),
            MoodShift::Downgrade => self.downgraded(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Animal {
    pub id: Uuid,
    pub house_id: Uuid,
    /// Sealed
    pub name: String,
    pub born_date: DateTime<Utc>,
    pub gender: AnimalGender,
    pub animal_type: AnimalType,
    pub status: AnimalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAnimal {
    pub house_id: Uuid,
    /// Already sealed
    pub name: String,
    pub born_date: DateTime<Utc>,
    pub gender: AnimalGender,
    pub animal_type: AnimalType,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAnimal {
    /// Already sealed
    pub name: Option<String>,
    pub born_date: Option<DateTime<Utc>>,
    pub gender: Option<AnimalGender>,
    pub animal_type: Option<AnimalType>,
    pub status: Option<AnimalStatus>,
}

impl Animal {
    pub async fn create(pool: &PgPool, data: CreateAnimal) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Animal>(&format!(
            r#"
            INSERT INTO animals (house_id, name, born_date, gender, animal_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ANIMAL_COLUMNS}
            "#
        ))
        .bind(data.house_id)
        .bind(data.name)
        .bind(data.born_date)
        .bind(data.gender)
        .bind(data.animal_type)
        .fetch_one(pool)
        .await
    }

    /// Looks up an animal only if it belongs to `house_id`
    pub async fn find_in_house(
        pool: &PgPool,
        id: Uuid,
        house_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Animal>(&format!(
            "SELECT {ANIMAL_COLUMNS} FROM animals WHERE id = $1 AND house_id = $2"
        ))
        .bind(id)
        .bind(house_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_house(pool: &PgPool, house_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Animal>(&format!(
            "SELECT {ANIMAL_COLUMNS} FROM animals WHERE house_id = $1 ORDER BY created_at ASC"
        ))
        .bind(house_id)
        .fetch_all(pool)
        .await
    }

    /// How many of `ids` belong to `house_id`
    pub async fn count_in_house(
        pool: &PgPool,
        house_id: Uuid,
        ids: &[Uuid],
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM animals WHERE house_id = $1 AND id = ANY($2)")
                .bind(house_id)
                .bind(ids)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }

    /// Distinct animal types present in a house
    pub async fn types_in_house(
        pool: &PgPool,
        house_id: Uuid,
    ) -> Result<Vec<AnimalType>, sqlx::Error> {
        let rows: Vec<(AnimalType,)> =
            sqlx::query_as("SELECT DISTINCT animal_type FROM animals WHERE house_id = $1")
                .bind(house_id)
                .fetch_all(pool)
                .await?;

        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        house_id: Uuid,
        data: UpdateAnimal,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Animal>(&format!(
            r#"
            UPDATE animals
            SET name = COALESCE($3, name),
                born_date = COALESCE($4, born_date),
                gender = COALESCE($5, gender),
                animal_type = COALESCE($6, animal_type),
                status = COALESCE($7, status),
                updated_at = NOW()
            WHERE id = $1 AND house_id = $2
            RETURNING {ANIMAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(house_id)
        .bind(data.name)
        .bind(data.born_date)
        .bind(data.gender)
        .bind(data.animal_type)
        .bind(data.status)
        .fetch_optional(pool)
        .await
    }

    /// Ids of the non-archived tasks linked to this animal
    pub async fn task_ids(pool: &PgPool, id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT ta.task_id FROM task_animals ta
            JOIN tasks t ON t.id = ta.task_id
            WHERE ta.animal_id = $1 AND t.is_archived = FALSE
            ORDER BY t.date ASC
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Shifts the mood of every animal linked to `task_id` by one step
    ///
    /// Rows are locked for the rest of the caller's transaction. Returns the
    /// number of animals whose mood actually changed.
    pub async fn shift_mood_for_task(
        conn: &mut PgConnection,
        task_id: Uuid,
        shift: MoodShift,
    ) -> Result<u64, sqlx::Error> {
        let animals: Vec<(Uuid, AnimalStatus)> = sqlx::query_as(
            r#"
            SELECT a.id, a.status FROM animals a
            JOIN task_animals ta ON ta.animal_id = a.id
            WHERE ta.task_id = $1
            FOR UPDATE OF a
            "#,
        )
        .bind(task_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut changed = 0;
        for (id, status) in animals {
            let next = status.shifted(shift);
            if next == status {
                continue;
            }

            sqlx::query("UPDATE animals SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(next)
                .execute(&mut *conn)
                .await?;
            changed += 1;
        }

        Ok(changed)
    }

    pub async fn delete(pool: &PgPool, id: Uuid, house_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM animals WHERE id = $1 AND house_id = $2")
            .bind(id)
            .bind(house_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
