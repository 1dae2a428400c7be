//! Catalog reference data: categories, manufacturers, pickup shops.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::db::CatalogRepository;
use crate::error::Result;
use crate::models::{Category, Manufacturer, Shop};
use crate::state::AppState;

/// Active categories.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(CatalogRepository::new(state.pool()).list_categories().await?))
}

/// Active manufacturers.
#[instrument(skip(state))]
pub async fn manufacturers(State(state): State<AppState>) -> Result<Json<Vec<Manufacturer>>> {
    Ok(Json(CatalogRepository::new(state.pool()).list_manufacturers().await?))
}

/// Shops that offer pickup. The warehouse is never listed.
#[instrument(skip(state))]
pub async fn shops(State(state): State<AppState>) -> Result<Json<Vec<Shop>>> {
    Ok(Json(CatalogRepository::new(state.pool()).list_pickup_shops().await?))
}
