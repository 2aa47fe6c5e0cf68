/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /auth/register` - Register a parent account
/// - `POST /auth/login` - Login and get tokens
/// - `POST /auth/login/admin` - Login restricted to administrators
/// - `POST /auth/join/:code` - Join a house with a join code
/// - `POST /auth/refresh` - Refresh access token
/// - `PATCH /auth/password` - Change password (bearer token)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::views::UserView,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use hearth_shared::{
    auth::{
        jwt::{self, TokenPair, TokenType},
        middleware::AuthContext,
        password,
    },
    models::{
        join_code::{is_valid_code_format, JoinCode, JoinCodeType},
        user::{CreateUser, UpdateUser, User, UserRole},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked against the password policy
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "First name must be 1 to 100 characters"))]
    pub first_name: String,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct JoinRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1 to 100 characters"))]
    pub first_name: String,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: String,
}

/// Returned by every endpoint that signs a user in
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserView,

    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

fn sign_in(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;
    Ok(AuthResponse {
        user: UserView::open(&state.cipher, user)?,
        tokens,
    })
}

/// Checks `password` against the user's hash
///
/// Users without a password cannot sign in with one.
fn check_password(user: &User, password: &str) -> ApiResult<()> {
    let valid = match &user.password_hash {
        Some(hash) => password::verify_password(password, hash)?,
        None => false,
    };

    if !valid {
        return Err(ApiError::Unauthorized("Invalid email or password".to_string()));
    }
    Ok(())
}

fn empty_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Register a new parent
///
/// The account has no house yet; `POST /house` creates one.
///
/// # Errors
///
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation or password policy failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    password::validate_password_strength(&req.password)?;

    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::Conflict("Email already exists".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;
    let last_name = state.cipher.seal_opt(empty_to_none(req.last_name).as_ref())?;

    let user = User::create(
        &state.db,
        CreateUser {
            first_name: req.first_name.trim().to_string(),
            last_name,
            email: Some(req.email.trim().to_lowercase()),
            password_hash: Some(password_hash),
            role: UserRole::Parent,
            is_admin: false,
            house_id: None,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(sign_in(&state, user)?)))
}

/// Login with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    check_password(&user, &req.password)?;

    tracing::debug!(user_id = %user.id, "User logged in");

    Ok(Json(sign_in(&state, user)?))
}

/// Login for the back office; the account must be an administrator
pub async fn login_admin(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    check_password(&user, &req.password)?;

    if !user.is_admin {
        return Err(ApiError::Forbidden("Administrator access required".to_string()));
    }

    Ok(Json(sign_in(&state, user)?))
}

/// Join a house with a join code
///
/// A member already known by `first_name` in the code's house signs back in
/// (with their password, if they have one). Anyone else becomes a new member
/// with the role the code grants. Parent codes require an email and a
/// password; child codes only need a first name.
///
/// # Errors
///
/// - `401 Unauthorized`: Existing member, wrong password
/// - `404 Not Found`: Unknown or expired code
/// - `422 Unprocessable Entity`: Missing fields for a parent code
pub async fn join(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;

    let not_found = || ApiError::NotFound("Join code not found or expired".to_string());
    if !is_valid_code_format(&code) {
        return Err(not_found());
    }
    let join_code = JoinCode::find_active(&state.db, &code, Utc::now())
        .await?
        .ok_or_else(not_found)?;

    let first_name = req.first_name.trim().to_string();

    if let Some(existing) =
        User::find_by_first_name_in_house(&state.db, join_code.house_id, &first_name).await?
    {
        if existing.password_hash.is_some() {
            let provided = req.password.as_deref().unwrap_or_default();
            check_password(&existing, provided)?;
        }

        tracing::debug!(user_id = %existing.id, house_id = %join_code.house_id, "Member re-joined");
        return Ok((StatusCode::OK, Json(sign_in(&state, existing)?)));
    }

    let email = empty_to_none(req.email).map(|e| e.to_lowercase());
    let password = req.password.filter(|p| !p.is_empty());

    if join_code.code_type == JoinCodeType::Parent {
        if email.is_none() {
            return Err(ApiError::invalid_field("email", "Parents must provide an email"));
        }
        if password.is_none() {
            return Err(ApiError::invalid_field("password", "Parents must provide a password"));
        }
    }

    if let Some(email) = &email {
        if User::find_by_email(&state.db, email).await?.is_some() {
            return Err(ApiError::Conflict("Email already exists".to_string()));
        }
    }

    let password_hash = match &password {
        Some(p) => {
            password::validate_password_strength(p)?;
            Some(password::hash_password(p)?)
        }
        None => None,
    };

    let user = User::create(
        &state.db,
        CreateUser {
            first_name,
            last_name: state.cipher.seal_opt(empty_to_none(req.last_name).as_ref())?,
            email,
            password_hash,
            role: join_code.code_type.role(),
            is_admin: false,
            house_id: Some(join_code.house_id),
        },
    )
    .await?;

    tracing::info!(
        user_id = %user.id,
        house_id = %join_code.house_id,
        role = user.role.as_str(),
        "New member joined house"
    );

    Ok((StatusCode::CREATED, Json(sign_in(&state, user)?)))
}

/// Exchange a refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    if User::find_by_id(&state.db, claims.sub).await?.is_none() {
        return Err(ApiError::Unauthorized("User no longer exists".to_string()));
    }

    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: TokenType::Access.default_expiration().num_seconds(),
    }))
}

/// Change the caller's password
///
/// `current_password` is required whenever the account already has one.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if user.password_hash.is_some() {
        let current = req.current_password.as_deref().unwrap_or_default();
        check_password(&user, current)
            .map_err(|_| ApiError::Unauthorized("Current password is incorrect".to_string()))?;
    }

    password::validate_password_strength(&req.new_password)?;
    let password_hash = password::hash_password(&req.new_password)?;

    User::update(
        &state.db,
        user.id,
        UpdateUser {
            password_hash: Some(password_hash),
            ..Default::default()
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "Password changed");

    Ok(StatusCode::NO_CONTENT)
}
