/// User model and database operations
///
/// Users are either parents or children of one house. A freshly registered
/// parent has no house until they create one; children only ever arrive
/// through a join code and may have neither email nor password.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('parent', 'child');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     first_name VARCHAR(100) NOT NULL,
///     last_name TEXT,                -- sealed
///     email VARCHAR(255) UNIQUE,
///     password_hash TEXT,
///     role user_role NOT NULL DEFAULT 'child',
///     is_admin BOOLEAN NOT NULL DEFAULT FALSE,
///     house_id UUID REFERENCES houses(id) ON DELETE CASCADE,
///     profile_picture_id UUID REFERENCES media(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE UNIQUE INDEX idx_users_house_first_name ON users(house_id, first_name)
///     WHERE house_id IS NOT NULL;
/// ```
///
/// # Example
///
/// ```no_run
/// use hearth_shared::models::user::{CreateUser, User, UserRole};
/// use hearth_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     first_name: "Ada".to_string(),
///     last_name: None,
///     email: Some("ada@example.com".to_string()),
///     password_hash: Some("$argon2id$...".to_string()),
///     role: UserRole::Parent,
///     is_admin: false,
///     house_id: None,
/// }).await?;
/// # Ok(())
/// # }
/// ```

use crate::search::SearchParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, role, is_admin, \
                            house_id, profile_picture_id, created_at, updated_at";

/// Columns the admin user list may be ordered by
pub const USER_ORDER_COLUMNS: &[&str] = &["created_at", "updated_at", "first_name", "email"];

/// Role of a user within their house
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Manages the house, validates chores, issues join codes
    Parent,

    /// Completes chores
    Child,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Parent => "parent",
            UserRole::Child => "child",
        }
    }
}

/// User row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    /// Unique within the house, used to re-join with a code
    pub first_name: String,

    /// Sealed
    pub last_name: Option<String>,

    pub email: Option<String>,

    /// Argon2id PHC string, never serialized
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    pub role: UserRole,

    pub is_admin: bool,

    pub house_id: Option<Uuid>,

    pub profile_picture_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub first_name: String,
    /// Already sealed
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub is_admin: bool,
    pub house_id: Option<Uuid>,
}

/// Partial update; `Some(None)` clears a nullable column
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
    pub is_admin: Option<bool>,
    pub house_id: Option<Option<Uuid>>,
    pub profile_picture_id: Option<Option<Uuid>>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
            && self.is_admin.is_none()
            && self.house_id.is_none()
            && self.profile_picture_id.is_none()
    }
}

impl User {
    pub fn is_parent(&self) -> bool {
        self.role == UserRole::Parent
    }

    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (first_name, last_name, email, password_hash, role, is_admin, house_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.role)
        .bind(data.is_admin)
        .bind(data.house_id)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Email lookup is case-insensitive
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_first_name_in_house(
        pool: &PgPool,
        house_id: Uuid,
        first_name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE house_id = $1 AND first_name = $2"
        ))
        .bind(house_id)
        .bind(first_name)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_house(pool: &PgPool, house_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE house_id = $1 ORDER BY created_at ASC"
        ))
        .bind(house_id)
        .fetch_all(pool)
        .await
    }

    /// How many of `ids` are members of `house_id`
    pub async fn count_in_house(
        pool: &PgPool,
        house_id: Uuid,
        ids: &[Uuid],
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE house_id = $1 AND id = ANY($2)")
                .bind(house_id)
                .bind(ids)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }

    /// Admin listing, searching first name and email
    pub async fn search(
        pool: &PgPool,
        params: &SearchParams,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let pattern = params.like_pattern();

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users WHERE $1::TEXT IS NULL OR first_name ILIKE $1 OR email ILIKE $1",
        )
        .bind(&pattern)
        .fetch_one(pool)
        .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE $1::TEXT IS NULL OR first_name ILIKE $1 OR email ILIKE $1
            ORDER BY {}
            LIMIT $2 OFFSET $3
            "#,
            params.order_clause(USER_ORDER_COLUMNS)
        ))
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

        Ok((users, total))
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE users SET updated_at = NOW()");

        if let Some(first_name) = data.first_name {
            query.push(", first_name = ").push_bind(first_name);
        }
        if let Some(last_name) = data.last_name {
            query.push(", last_name = ").push_bind(last_name);
        }
        if let Some(email) = data.email {
            query.push(", email = ").push_bind(email);
        }
        if let Some(password_hash) = data.password_hash {
            query.push(", password_hash = ").push_bind(password_hash);
        }
        if let Some(role) = data.role {
            query.push(", role = ").push_bind(role);
        }
        if let Some(is_admin) = data.is_admin {
            query.push(", is_admin = ").push_bind(is_admin);
        }
        if let Some(house_id) = data.house_id {
            query.push(", house_id = ").push_bind(house_id);
        }
        if let Some(picture) = data.profile_picture_id {
            query.push(", profile_picture_id = ").push_bind(picture);
        }

        query.push(" WHERE id = ").push_bind(id);
        query.push(format!(" RETURNING {USER_COLUMNS}"));

        query.build_query_as::<User>().fetch_optional(pool).await
    }

    /// Ids of the non-archived tasks assigned to this user
    pub async fn task_ids(pool: &PgPool, id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT tu.task_id FROM task_users tu
            JOIN tasks t ON t.id = tu.task_id
            WHERE tu.user_id = $1 AND t.is_archived = FALSE
            ORDER BY t.date ASC
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Deletes the user; their task assignments go with them
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_user_default_is_empty() {
        assert!(UpdateUser::default().is_empty());

        let update = UpdateUser {
            profile_picture_id: Some(None),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&UserRole::Parent).unwrap(), "\"parent\"");
        assert_eq!(UserRole::Child.as_str(), "child");
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: None,
            email: None,
            password_hash: Some("$argon2id$secret".to_string()),
            role: UserRole::Parent,
            is_admin: false,
            house_id: None,
            profile_picture_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(user.is_parent());
    }
}
