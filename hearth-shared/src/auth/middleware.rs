/// Request authentication for Axum
///
/// Two independent checks guard the API:
///
/// - **API key**: every route except health and static files requires the
///   deployment's static key in `x-api-key`. See [`api_key_middleware`].
/// - **Bearer token**: user routes additionally require a JWT access token.
///   The API crate resolves the token to a [`User`] row and stores an
///   [`AuthContext`] in the request extensions.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use hearth_shared::auth::middleware::{create_api_key_middleware, AuthContext};
///
/// async fn whoami(Extension(auth): Extension<AuthContext>) -> String {
///     format!("user {} in {:?}", auth.user_id, auth.house_id)
/// }
///
/// let app: Router = Router::new()
///     .route("/whoami", get(whoami))
///     .layer(middleware::from_fn(create_api_key_middleware("client-key")));
/// ```

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::api_key::{verify_api_key, API_KEY_HEADER};
use crate::models::user::{User, UserRole};

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    /// `None` until the user creates or joins a house
    pub house_id: Option<Uuid>,

    pub role: UserRole,

    pub is_admin: bool,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            house_id: user.house_id,
            role: user.role,
            is_admin: user.is_admin,
        }
    }

    pub fn is_parent(&self) -> bool {
        self.role == UserRole::Parent
    }
}

/// Error type for authentication middleware
#[derive(Debug)]
pub enum AuthError {
    MissingApiKey,
    InvalidApiKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingApiKey => "Missing API key",
            AuthError::InvalidApiKey => "Invalid API key",
        };

        let body = serde_json::json!({
            "error": "unauthorized",
            "message": message,
        });

        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Rejects requests whose `x-api-key` does not match `expected`
pub async fn api_key_middleware(
    expected: Arc<str>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingApiKey)?;

    if !verify_api_key(provided, &expected) {
        tracing::debug!("Rejected request with invalid API key");
        return Err(AuthError::InvalidApiKey);
    }

    Ok(next.run(req).await)
}

/// Captures the expected key for use with `axum::middleware::from_fn`
pub fn create_api_key_middleware(
    expected: impl Into<String>,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>> + Clone {
    let expected: Arc<str> = Arc::from(expected.into());
    move |req, next| {
        let expected = Arc::clone(&expected);
        Box::pin(api_key_middleware(expected, req, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_auth_context_from_user() {
        let house_id = Uuid::new_v4();
        let user = User {
            id: Uuid::new_v4(),
            first_name: "Lou".to_string(),
            last_name: None,
            email: None,
            password_hash: None,
            role: UserRole::Child,
            is_admin: false,
            house_id: Some(house_id),
            profile_picture_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let context = AuthContext::from_user(&user);

        assert_eq!(context.user_id, user.id);
        assert_eq!(context.house_id, Some(house_id));
        assert!(!context.is_parent());
        assert!(!context.is_admin);
    }

    #[test]
    fn test_auth_error_status() {
        let response = AuthError::InvalidApiKey.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
