/// Affiliate offers targeted at animal types
///
/// # Schema
///
/// ```sql
/// CREATE TABLE affiliates (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     url TEXT NOT NULL,
///     animals animal_type[] NOT NULL DEFAULT '{}',
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     brand VARCHAR(255) NOT NULL,
///     base_price_cents BIGINT NOT NULL,
///     discount_price_cents BIGINT NOT NULL,
///     image_id UUID REFERENCES media(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::animal::AnimalType;

const AFFILIATE_COLUMNS: &str = "id, url, animals, title, description, brand, base_price_cents, \
                                 discount_price_cents, image_id, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Affiliate {
    pub id: Uuid,
    pub url: String,
    /// Animal types this offer is relevant for
    pub animals: Vec<AnimalType>,
    pub title: String,
    pub description: Option<String>,
    pub brand: String,
    pub base_price_cents: i64,
    pub discount_price_cents: i64,
    pub image_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAffiliate {
    pub url: String,
    pub animals: Vec<AnimalType>,
    pub title: String,
    pub description: Option<String>,
    pub brand: String,
    pub base_price_cents: i64,
    pub discount_price_cents: i64,
    pub image_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAffiliate {
    pub url: Option<String>,
    pub animals: Option<Vec<AnimalType>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub base_price_cents: Option<i64>,
    pub discount_price_cents: Option<i64>,
    pub image_id: Option<Uuid>,
}

impl Affiliate {
    pub async fn create(pool: &PgPool, data: CreateAffiliate) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Affiliate>(&format!(
            r#"
            INSERT INTO affiliates (url, animals, title, description, brand,
                                    base_price_cents, discount_price_cents, image_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {AFFILIATE_COLUMNS}
            "#
        ))
        .bind(data.url)
        .bind(data.animals)
        .bind(data.title)
        .bind(data.description)
        .bind(data.brand)
        .bind(data.base_price_cents)
        .bind(data.discount_price_cents)
        .bind(data.image_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Affiliate>(&format!(
            "SELECT {AFFILIATE_COLUMNS} FROM affiliates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Affiliate>(&format!(
            "SELECT {AFFILIATE_COLUMNS} FROM affiliates ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    /// Offers targeting any of `types`, each offer at most once
    pub async fn list_for_types(
        pool: &PgPool,
        types: &[AnimalType],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if types.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, Affiliate>(&format!(
            "SELECT {AFFILIATE_COLUMNS} FROM affiliates WHERE animals && $1 ORDER BY created_at DESC"
        ))
        .bind(types)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateAffiliate,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Affiliate>(&format!(
            r#"
            UPDATE affiliates
            SET url = COALESCE($2, url),
                animals = COALESCE($3, animals),
                title = COALESCE($4, title),
                description = COALESCE($5, description),
                brand = COALESCE($6, brand),
                base_price_cents = COALESCE($7, base_price_cents),
                discount_price_cents = COALESCE($8, discount_price_cents),
                image_id = COALESCE($9, image_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {AFFILIATE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.url)
        .bind(data.animals)
        .bind(data.title)
        .bind(data.description)
        .bind(data.brand)
        .bind(data.base_price_cents)
        .bind(data.discount_price_cents)
        .bind(data.image_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM affiliates WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
