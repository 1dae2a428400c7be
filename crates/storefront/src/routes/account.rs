//! Account route handlers (require login).

use axum::{Json, extract::State};
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{ProfileUpdate, User};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// The logged-in user's profile.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Result<Json<User>> {
    let profile = AuthService::new(state.pool()).profile(user.id).await?;
    Ok(Json(profile))
}

/// Update contact fields. Omitted fields stay as they are.
#[instrument(skip(state, user, update), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    let profile = AuthService::new(state.pool())
        .update_profile(user.id, update)
        .await?;
    Ok(Json(profile))
}
