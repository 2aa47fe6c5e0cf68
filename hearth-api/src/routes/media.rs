/// Media endpoints
///
/// Uploads are written to `FILES_PATH` as `<uuid>.<ext>` and served back
/// from `/files/`. The database row keeps both the public URL and the path
/// on disk so deletion can unlink the file.
///
/// # Endpoints
///
/// - `POST /media` - Upload (multipart field `file`)
/// - `GET /media/:id` - Media record
/// - `DELETE /media/:id` - Delete record and file (uploader or admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use hearth_shared::{
    auth::middleware::AuthContext,
    models::media::{CreateMedia, Media, MediaType},
};
use uuid::Uuid;

/// Multipart field carrying the upload
pub const UPLOAD_FIELD: &str = "file";

const MAX_EXTENSION_LENGTH: usize = 10;

/// Lowercased extension of an uploaded file name, if it looks sane
pub fn file_extension(file_name: &str) -> Option<String> {
    let ext = std::path::Path::new(file_name).extension()?.to_str()?;
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LENGTH
        && ext.bytes().all(|b| b.is_ascii_alphanumeric());

    valid.then(|| ext.to_ascii_lowercase())
}

/// Name the upload is stored under
pub fn stored_file_name(id: Uuid, extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}

/// Only the uploader or an admin may delete a file
fn ensure_can_delete(auth: &AuthContext, media: &Media) -> ApiResult<()> {
    if auth.is_admin || media.is_uploaded_by(auth.user_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Only the uploader can delete this media".to_string()))
    }
}

/// Deletes a media row and unlinks its file
///
/// A file that cannot be removed is logged and left behind; the row is gone
/// either way.
pub(crate) async fn remove_media(state: &AppState, id: Uuid) -> ApiResult<bool> {
    let Some(media) = Media::delete(&state.db, id).await? else {
        return Ok(false);
    };

    if let Err(e) = tokio::fs::remove_file(&media.local_path).await {
        tracing::warn!(media_id = %id, path = %media.local_path, error = %e, "Failed to remove media file");
    }

    Ok(true)
}

pub async fn upload_media(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Media>)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let extension = field.file_name().and_then(file_extension);
        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
        }

        let filename = stored_file_name(Uuid::new_v4(), extension.as_deref());
        let storage = &state.config.storage;
        tokio::fs::create_dir_all(&storage.files_path).await?;
        let local_path = storage.files_path.join(&filename);
        tokio::fs::write(&local_path, &data).await?;

        let created = Media::create(
            &state.db,
            CreateMedia {
                url: format!("{}/files/{}", state.config.api.public_url, filename),
                local_path: local_path.to_string_lossy().into_owned(),
                filename: filename.clone(),
                media_type: extension
                    .as_deref()
                    .map(MediaType::from_extension)
                    .unwrap_or(MediaType::File),
                size_bytes: data.len() as i64,
                uploaded_by: Some(auth.user_id),
            },
        )
        .await;

        let media = match created {
            Ok(media) => media,
            Err(e) => {
                let _ = tokio::fs::remove_file(&local_path).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            media_id = %media.id,
            user_id = %auth.user_id,
            size = media.size_bytes,
            "Media uploaded"
        );
        return Ok((StatusCode::CREATED, Json(media)));
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

pub async fn get_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Media>> {
    let media = Media::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Media not found".to_string()))?;

    Ok(Json(media))
}

pub async fn delete_media(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let media = Media::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Media not found".to_string()))?;
    ensure_can_delete(&auth, &media)?;

    if !remove_media(&state, id).await? {
        return Err(ApiError::NotFound("Media not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hearth_shared::models::user::UserRole;

    fn media(uploaded_by: Option<Uuid>) -> Media {
        Media {
            id: Uuid::new_v4(),
            url: "http://localhost:3000/files/a.png".to_string(),
            local_path: "/tmp/a.png".to_string(),
            filename: "a.png".to_string(),
            media_type: MediaType::Image,
            size_bytes: 3,
            uploaded_by,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn auth(user_id: Uuid, is_admin: bool) -> AuthContext {
        AuthContext {
            user_id,
            house_id: Some(Uuid::new_v4()),
            role: UserRole::Parent,
            is_admin,
        }
    }

    #[test]
    fn test_only_uploader_or_admin_can_delete() {
        let uploader = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        assert!(ensure_can_delete(&auth(uploader, false), &media(Some(uploader))).is_ok());
        assert!(matches!(
            ensure_can_delete(&auth(stranger, false), &media(Some(uploader))),
            Err(ApiError::Forbidden(_))
        ));
        assert!(ensure_can_delete(&auth(stranger, true), &media(Some(uploader))).is_ok());

        // Orphaned files are left to admins
        assert!(ensure_can_delete(&auth(uploader, false), &media(None)).is_err());
        assert!(ensure_can_delete(&auth(stranger, true), &media(None)).is_ok());
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("cat.JPG"), Some("jpg".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension("weird.p/ng"), None);
        assert_eq!(file_extension("x.abcdefghijklmnop"), None);
    }

    #[test]
    fn test_stored_file_name() {
        let id = Uuid::nil();
        assert_eq!(
            stored_file_name(id, Some("png")),
            "00000000-0000-0000-0000-000000000000.png"
        );
        assert_eq!(stored_file_name(id, None), "00000000-0000-0000-0000-000000000000");
    }
}
