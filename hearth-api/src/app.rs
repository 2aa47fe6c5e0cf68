/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use hearth_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config)?;
/// let app = hearth_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::timing::RequestTimingLayer};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use hearth_shared::{
    auth::{
        api_key::API_KEY_HEADER,
        authorization::require_admin,
        jwt,
        middleware::{create_api_key_middleware, AuthContext},
    },
    crypto::{CryptoError, FieldCipher},
    models::user::User,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,

    pub config: Arc<Config>,

    /// Seals and opens personal fields
    pub cipher: Arc<FieldCipher>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Result<Self, CryptoError> {
        let cipher = FieldCipher::new(&config.security.crypto_secret)?;

        Ok(Self {
            db,
            config: Arc::new(config),
            cipher: Arc::new(cipher),
        })
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                 public
/// ├── GET /files/*                public, static uploads
/// └── everything else             x-api-key
///     ├── /auth/...               login, register, join, refresh
///     ├── GET /join-code/:code
///     └── bearer token required
///         ├── PATCH /auth/password
///         ├── /users, /house, /join-code/{parent,child}
///         ├── /animals, /tasks, /recurrences
///         ├── /billing-plans, /affiliates, /media
///         └── /admin              is_admin
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/login/admin", post(routes::auth::login_admin))
        .route("/auth/join/:code", post(routes::auth::join))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/join-code/:code", get(routes::join_code::get_join_code));

    let user_routes = Router::new()
        .route(
            "/me",
            get(routes::users::get_me)
                .patch(routes::users::update_me)
                .delete(routes::users::delete_me),
        )
        .route("/me/tasks", get(routes::users::get_my_tasks))
        .route(
            "/:id",
            patch(routes::users::update_member).delete(routes::users::delete_member),
        );

    let house_routes = Router::new()
        .route(
            "/",
            post(routes::house::create_house)
                .get(routes::house::get_house)
                .patch(routes::house::update_house),
        )
        .route("/users", get(routes::house::list_members))
        .route("/join-code", get(routes::house::list_join_codes))
        .route("/animals", get(routes::house::list_animals))
        .route("/affiliates", get(routes::house::list_affiliates));

    let join_code_routes = Router::new()
        .route("/parent", post(routes::join_code::create_parent_code))
        .route("/child", post(routes::join_code::create_child_code));

    let animal_routes = Router::new()
        .route(
            "/",
            get(routes::animals::list_animals).post(routes::animals::create_animal),
        )
        .route(
            "/:id",
            get(routes::animals::get_animal)
                .patch(routes::animals::update_animal)
                .delete(routes::animals::delete_animal),
        );

    let task_routes = Router::new()
        .route("/", get(routes::tasks::list_tasks).post(routes::tasks::create_task))
        .route("/status/:status", get(routes::tasks::list_tasks_by_status))
        .route("/archive", get(routes::tasks::list_archived_tasks))
        .route("/animal/:id", get(routes::tasks::list_animal_tasks))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:id/check", patch(routes::tasks::check_task))
        .route("/:id/validate", patch(routes::tasks::validate_task))
        .route("/:id/refuse", patch(routes::tasks::refuse_task));

    let recurrence_routes = Router::new().route(
        "/:id",
        get(routes::recurrences::get_recurrence).delete(routes::recurrences::delete_recurrence),
    );

    let billing_plan_routes = Router::new()
        .route(
            "/",
            get(routes::billing_plans::list_plans).post(routes::billing_plans::create_plan),
        )
        .route(
            "/:plan_type",
            get(routes::billing_plans::get_plan)
                .patch(routes::billing_plans::update_plan)
                .delete(routes::billing_plans::delete_plan),
        );

    // `/:key` is an animal type on GET and an affiliate id otherwise
    let affiliate_routes = Router::new()
        .route(
            "/",
            get(routes::affiliates::list_affiliates).post(routes::affiliates::create_affiliate),
        )
        .route(
            "/:key",
            get(routes::affiliates::list_affiliates_for_type)
                .patch(routes::affiliates::update_affiliate)
                .delete(routes::affiliates::delete_affiliate),
        );

    let media_routes = Router::new()
        .route("/", post(routes::media::upload_media))
        .route(
            "/:id",
            get(routes::media::get_media).delete(routes::media::delete_media),
        );

    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route(
            "/users/:id",
            get(routes::admin::get_user)
                .patch(routes::admin::update_user)
                .delete(routes::admin::delete_user),
        )
        .route("/users/:id/toggle-admin", patch(routes::admin::toggle_admin))
        .route("/houses", get(routes::admin::list_houses))
        .route(
            "/houses/:id",
            get(routes::admin::get_house)
                .patch(routes::admin::update_house)
                .delete(routes::admin::delete_house),
        )
        .route("/houses/:id/tasks", get(routes::admin::list_house_tasks))
        .route(
            "/tasks/:id",
            get(routes::admin::get_task).delete(routes::admin::delete_task),
        )
        .layer(axum::middleware::from_fn(admin_guard));

    let protected_routes = Router::new()
        .route("/auth/password", patch(routes::auth::change_password))
        .nest("/users", user_routes)
        .nest("/house", house_routes)
        .nest("/join-code", join_code_routes)
        .nest("/animals", animal_routes)
        .nest("/tasks", task_routes)
        .nest("/recurrences", recurrence_routes)
        .nest("/billing-plans", billing_plan_routes)
        .nest("/affiliates", affiliate_routes)
        .nest("/media", media_routes)
        .nest("/admin", admin_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let keyed_routes = public_routes
        .merge(protected_routes)
        .layer(axum::middleware::from_fn(create_api_key_middleware(
            state.config.security.api_key.clone(),
        )));

    let cors = if state.config.allows_any_origin() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                HeaderName::from_static(API_KEY_HEADER),
            ])
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest_service("/files", ServeDir::new(&state.config.storage.files_path))
        .merge(keyed_routes)
        .layer(DefaultBodyLimit::max(state.config.storage.max_upload_bytes))
        .layer(RequestTimingLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Bearer authentication
///
/// Validates the access token, loads the user it names and injects an
/// [`AuthContext`]. Tokens of deleted users are rejected.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_access_token(token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    req.extensions_mut().insert(AuthContext::from_user(&user));

    Ok(next.run(req).await)
}

/// Restricts a route group to administrators. Runs inside [`jwt_auth_layer`].
async fn admin_guard(req: Request, next: Next) -> Result<Response, ApiError> {
    let auth = req
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::Unauthorized("Missing authentication".to_string()))?;

    require_admin(auth)?;

    Ok(next.run(req).await)
}
