/// Billing plans
///
/// Plans are addressed by their type, which is unique. The `free` plan is
/// seeded by the migrations and attached to every new house.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE billing_plan_type AS ENUM ('free', 'monthly', 'for_life');
///
/// CREATE TABLE billing_plans (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL,
///     price_cents BIGINT NOT NULL CHECK (price_cents >= 0),
///     plan_type billing_plan_type NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use uuid::Uuid;

const PLAN_COLUMNS: &str = "id, title, description, price_cents, plan_type, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "billing_plan_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingPlanType {
    Free,
    Monthly,
    ForLife,
}

impl BillingPlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPlanType::Free => "free",
            BillingPlanType::Monthly => "monthly",
            BillingPlanType::ForLife => "for_life",
        }
    }
}

impl FromStr for BillingPlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "free" => Ok(BillingPlanType::Free),
            "monthly" => Ok(BillingPlanType::Monthly),
            "for_life" => Ok(BillingPlanType::ForLife),
            other => Err(format!("Unknown billing plan type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BillingPlan {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub plan_type: BillingPlanType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateBillingPlan {
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub plan_type: BillingPlanType,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateBillingPlan {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
}

impl BillingPlan {
    pub async fn create(pool: &PgPool, data: CreateBillingPlan) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, BillingPlan>(&format!(
            r#"
            INSERT INTO billing_plans (title, description, price_cents, plan_type)
            VALUES ($1, $2, $3, $4)
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(data.title)
        .bind(data.description)
        .bind(data.price_cents)
        .bind(data.plan_type)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BillingPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM billing_plans WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_type(
        pool: &PgPool,
        plan_type: BillingPlanType,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BillingPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM billing_plans WHERE plan_type = $1"
        ))
        .bind(plan_type)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BillingPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM billing_plans ORDER BY price_cents ASC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        plan_type: BillingPlanType,
        data: UpdateBillingPlan,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BillingPlan>(&format!(
            r#"
            UPDATE billing_plans
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                price_cents = COALESCE($4, price_cents),
                updated_at = NOW()
            WHERE plan_type = $1
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(plan_type)
        .bind(data.title)
        .bind(data.description)
        .bind(data.price_cents)
        .fetch_optional(pool)
        .await
    }

    /// Houses on a deleted plan fall back to no plan
    pub async fn delete(pool: &PgPool, plan_type: BillingPlanType) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM billing_plans WHERE plan_type = $1")
            .bind(plan_type)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_type_parsing() {
        assert_eq!("FREE".parse::<BillingPlanType>(), Ok(BillingPlanType::Free));
        assert_eq!("for-life".parse::<BillingPlanType>(), Ok(BillingPlanType::ForLife));
        assert_eq!("for_life".parse::<BillingPlanType>(), Ok(BillingPlanType::ForLife));
        assert!("yearly".parse::<BillingPlanType>().is_err());
    }

    #[test]
    fn test_plan_type_json() {
        assert_eq!(serde_json::to_string(&BillingPlanType::ForLife).unwrap(), "\"for_life\"");
    }
}
