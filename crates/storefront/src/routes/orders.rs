//! Order route handlers (require login).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use shop_online_core::OrderId;

use crate::db::{OrderRepository, PgCheckoutStore};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{OrderDetail, OrderSummary};
use crate::services::checkout::{CheckoutService, OrderRequest};
use crate::state::AppState;

/// The user's orders, newest first.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<OrderSummary>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// One of the user's orders with its lines.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let order = OrderRepository::new(state.pool())
        .get_for_user(user.id, id)
        .await?;
    Ok(Json(order))
}

/// Place an order for everything in the cart.
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<OrderRequest>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    let order = CheckoutService::new(PgCheckoutStore::new(state.pool()))
        .place_order(user.id, request)
        .await?;

    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_id", &order.order.id.to_string())]),
    );
    Ok((StatusCode::CREATED, Json(order)))
}
