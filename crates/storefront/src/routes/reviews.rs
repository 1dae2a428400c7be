//! Review route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use shop_online_core::{ProductId, ReviewId};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::Review;
use crate::services::reviews::{NewReview, ReviewEdit, ReviewService};
use crate::state::AppState;

/// Review listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    /// Only reviews with exactly this rating.
    pub rating: Option<i16>,
}

/// A product's reviews, newest first.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Path(product): Path<ProductId>,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<Vec<Review>>> {
    let reviews = ReviewService::new(state.pool())
        .list(product, query.rating)
        .await?;
    Ok(Json(reviews))
}

/// Review a product.
#[instrument(skip(state, user, review), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product): Path<ProductId>,
    Json(review): Json<NewReview>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = ReviewService::new(state.pool())
        .create(&user, product, review)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Edit a review (author or staff).
#[instrument(skip(state, user, edit), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ReviewId>,
    Json(edit): Json<ReviewEdit>,
) -> Result<Json<Review>> {
    let review = ReviewService::new(state.pool())
        .update(&user, id, edit)
        .await?;
    Ok(Json(review))
}

/// Delete a review (author or staff).
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode> {
    ReviewService::new(state.pool()).delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
