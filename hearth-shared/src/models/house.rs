/// House model and database operations
///
/// A house groups users, animals, tasks and join codes. Deleting a house
/// cascades to all of them.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE houses (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL, -- sealed
///     billing_plan_id UUID REFERENCES billing_plans(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::user::UserRole;

const HOUSE_COLUMNS: &str = "id, name, billing_plan_id, created_at, updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct House {
    pub id: Uuid,

    /// Sealed
    pub name: String,

    pub billing_plan_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Partial update
#[derive(Debug, Clone, Default)]
pub struct UpdateHouse {
    /// Already sealed
    pub name: Option<String>,
    pub billing_plan_id: Option<Uuid>,
}

impl House {
    /// Creates a house and makes `owner_id` a parent member of it
    ///
    /// Both writes share one transaction, so a failed membership update leaves
    /// no orphan house behind.
    pub async fn create_with_owner(
        pool: &PgPool,
        sealed_name: String,
        billing_plan_id: Option<Uuid>,
        owner_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let house = sqlx::query_as::<_, House>(&format!(
            "INSERT INTO houses (name, billing_plan_id) VALUES ($1, $2) RETURNING {HOUSE_COLUMNS}"
        ))
        .bind(sealed_name)
        .bind(billing_plan_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET house_id = $1, role = $2, updated_at = NOW() WHERE id = $3")
            .bind(house.id)
            .bind(UserRole::Parent)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(house)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, House>(&format!("SELECT {HOUSE_COLUMNS} FROM houses WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Every house, newest first. Names are sealed, so filtering by name
    /// happens after decryption.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, House>(&format!(
            "SELECT {HOUSE_COLUMNS} FROM houses ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateHouse,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, House>(&format!(
            r#"
            UPDATE houses
            SET name = COALESCE($2, name),
                billing_plan_id = COALESCE($3, billing_plan_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {HOUSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.name)
        .bind(data.billing_plan_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM houses WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
