/// Join codes: short-lived invites into a house
///
/// A house holds at most one code per type. Issuing a new code replaces the
/// previous one in place. Expired codes are ignored by lookups and purged by
/// the worker.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE join_code_type AS ENUM ('parent', 'child');
///
/// CREATE TABLE join_codes (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     house_id UUID NOT NULL REFERENCES houses(id) ON DELETE CASCADE,
///     code CHAR(6) NOT NULL UNIQUE,
///     code_type join_code_type NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (house_id, code_type)
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::user::UserRole;

const JOIN_CODE_COLUMNS: &str = "id, house_id, code, code_type, expires_at, created_at, updated_at";

/// Number of digits in a code
pub const JOIN_CODE_LENGTH: usize = 6;

/// How long a freshly issued code stays valid
pub fn join_code_ttl() -> Duration {
    Duration::minutes(15)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "join_code_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JoinCodeType {
    Parent,
    Child,
}

impl JoinCodeType {
    /// Role granted to a user who joins with this code
    pub fn role(&self) -> UserRole {
        match self {
            JoinCodeType::Parent => UserRole::Parent,
            JoinCodeType::Child => UserRole::Child,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JoinCode {
    pub id: Uuid,
    pub house_id: Uuid,
    pub code: String,
    pub code_type: JoinCodeType,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Random zero-padded numeric code
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:0width$}", n, width = JOIN_CODE_LENGTH)
}

/// Whether `code` has the shape of a join code
pub fn is_valid_code_format(code: &str) -> bool {
    code.len() == JOIN_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

impl JoinCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Issues `code` for the house, replacing its current code of that type
    ///
    /// Fails with a unique violation when `code` is already held by another
    /// house; callers retry with a fresh code.
    pub async fn issue(
        pool: &PgPool,
        house_id: Uuid,
        code_type: JoinCodeType,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, JoinCode>(&format!(
            r#"
            INSERT INTO join_codes (house_id, code, code_type, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (house_id, code_type) DO UPDATE
            SET code = EXCLUDED.code,
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            RETURNING {JOIN_CODE_COLUMNS}
            "#
        ))
        .bind(house_id)
        .bind(code)
        .bind(code_type)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// Looks up a code that has not expired yet
    pub async fn find_active(
        pool: &PgPool,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, JoinCode>(&format!(
            "SELECT {JOIN_CODE_COLUMNS} FROM join_codes WHERE code = $1 AND expires_at > $2"
        ))
        .bind(code)
        .bind(now)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_active_by_house(
        pool: &PgPool,
        house_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, JoinCode>(&format!(
            r#"
            SELECT {JOIN_CODE_COLUMNS} FROM join_codes
            WHERE house_id = $1 AND expires_at > $2
            ORDER BY code_type ASC
            "#
        ))
        .bind(house_id)
        .bind(now)
        .fetch_all(pool)
        .await
    }

    /// Deletes every code that expired at or before `now`
    pub async fn delete_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM join_codes WHERE expires_at <= $1")
            .bind(now)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
