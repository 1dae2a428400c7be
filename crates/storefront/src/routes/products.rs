//! Product route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use shop_online_core::ProductId;

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::models::{ProductDetail, ProductFilter, ProductOrdering, ProductSummary};
use crate::state::AppState;

/// Product listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub q: Option<String>,
    /// `name`, `actual_price` or `rating`, `-` prefixed for descending.
    pub ordering: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TryFrom<ProductQuery> for ProductFilter {
    type Error = AppError;

    fn try_from(query: ProductQuery) -> Result<Self> {
        let ordering = query
            .ordering
            .as_deref()
            .map(str::parse::<ProductOrdering>)
            .transpose()
            .map_err(AppError::BadRequest)?
            .unwrap_or_default();

        if let (Some(min), Some(max)) = (query.min_price, query.max_price)
            && min > max
        {
            return Err(AppError::BadRequest(
                "min_price must not exceed max_price".to_owned(),
            ));
        }

        Ok(Self {
            category: non_empty(query.category),
            manufacturer: non_empty(query.manufacturer),
            min_price: query.min_price,
            max_price: query.max_price,
            search: non_empty(query.q),
            ordering,
            limit: query
                .limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            offset: query.offset.unwrap_or(0).max(0),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Active, in-stock products.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductSummary>>> {
    let filter = ProductFilter::try_from(query)?;
    let products = CatalogRepository::new(state.pool())
        .list_products(&filter)
        .await?;
    Ok(Json(products))
}

/// Product detail with its stock breakdown.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    CatalogRepository::new(state.pool())
        .get_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Product {id}")))
}
