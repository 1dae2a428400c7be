//! Authentication route handlers.
//!
//! Registration is two-step: request a confirmation code for an email, then
//! register with it. Logging in folds the visitor's anonymous cart into the
//! user's cart.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{adopt_anonymous_cart, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::{AuthService, Registration};
use crate::services::cart::CartService;
use crate::state::AppState;

/// Confirmation code request body.
#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub email: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Issue a confirmation code for an unregistered email.
#[instrument(skip(state, request))]
pub async fn request_code(
    State(state): State<AppState>,
    Json(request): Json<CodeRequest>,
) -> Result<impl IntoResponse> {
    AuthService::new(state.pool())
        .request_code(&request.email)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "confirmation code sent" })),
    ))
}

/// Create an account with a confirmation code.
#[instrument(skip(state, registration), fields(username = %registration.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.pool())
        .register(&registration)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in and take over the session's anonymous cart.
#[instrument(skip(state, session, request), fields(username = %request.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .login(&request.username, &request.password)
        .await?;

    let current = CurrentUser {
        id: user.id,
        username: user.username.clone(),
        is_staff: user.is_staff,
    };
    set_current_user(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    let pool = state.pool();
    let user_id = user.id;
    adopt_anonymous_cart(&session, |token| async move {
        CartService::new(pool).merge_anonymous(token, user_id).await
    })
    .await?;

    set_sentry_user(&user.id, Some(user.username.as_str()));
    add_breadcrumb("auth", "Logged in", None);

    Ok(Json(user))
}

/// Log out. Idempotent.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}
