/// Uploaded media
///
/// Files live on local disk under the configured files directory and are
/// served back at `<API_URL>/files/<filename>`. This table only tracks them;
/// writing and unlinking the file is the uploader's job.
///
/// Media has no house. Reading a record is open to any signed-in user, but
/// only the uploader or an admin may delete it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE media_type AS ENUM ('image', 'file');
///
/// CREATE TABLE media (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     url TEXT NOT NULL,
///     local_path TEXT NOT NULL,
///     filename VARCHAR(255) NOT NULL,
///     media_type media_type NOT NULL,
///     size_bytes BIGINT NOT NULL,
///     uploaded_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const MEDIA_COLUMNS: &str =
    "id, url, local_path, filename, media_type, size_bytes, uploaded_by, created_at, updated_at";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic", "svg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "media_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    File,
}

impl MediaType {
    /// Classifies an upload by file extension
    pub fn from_extension(ext: &str) -> Self {
        if IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            MediaType::Image
        } else {
            MediaType::File
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Media {
    pub id: Uuid,
    /// Public URL
    pub url: String,
    /// Path on the API host's disk
    #[serde(skip_serializing)]
    pub local_path: String,
    /// Stored file name, `<uuid>.<ext>`
    pub filename: String,
    pub media_type: MediaType,
    pub size_bytes: i64,
    /// `None` once the uploader's account is gone
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateMedia {
    pub url: String,
    pub local_path: String,
    pub filename: String,
    pub media_type: MediaType,
    pub size_bytes: i64,
    pub uploaded_by: Option<Uuid>,
}

impl Media {
    /// Whether `user_id` uploaded this file
    pub fn is_uploaded_by(&self, user_id: Uuid) -> bool {
        self.uploaded_by == Some(user_id)
    }

    pub async fn create(pool: &PgPool, data: CreateMedia) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Media>(&format!(
            r#"
            INSERT INTO media (url, local_path, filename, media_type, size_bytes, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MEDIA_COLUMNS}
            "#
        ))
        .bind(data.url)
        .bind(data.local_path)
        .bind(data.filename)
        .bind(data.media_type)
        .bind(data.size_bytes)
        .bind(data.uploaded_by)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Media>(&format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Deletes the row and returns it so the caller can unlink the file
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Media>(&format!(
            "DELETE FROM media WHERE id = $1 RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_extension() {
        assert_eq!(MediaType::from_extension("JPG"), MediaType::Image);
        assert_eq!(MediaType::from_extension("webp"), MediaType::Image);
        assert_eq!(MediaType::from_extension("pdf"), MediaType::File);
        assert_eq!(MediaType::from_extension(""), MediaType::File);
    }
}
