//! Cart route handlers.
//!
//! Every handler answers with the whole cart so clients can redraw totals
//! without a second request.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use shop_online_core::{CartLineId, ColorVariantId};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::CartSession;
use crate::models::Cart;
use crate::services::cart::{CartError, CartService, Step};
use crate::state::AppState;

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub color_variant_id: ColorVariantId,
    #[serde(default = "one")]
    pub quantity: i32,
}

const fn one() -> i32 {
    1
}

/// Set-quantity request body.
#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    pub quantity: i32,
}

/// The visitor's cart. Empty for visitors who never added anything.
#[instrument(skip_all)]
pub async fn show(State(state): State<AppState>, cart: CartSession) -> Result<Json<Cart>> {
    let cart = match cart.reader().await? {
        Some(owner) => CartService::new(state.pool()).get(owner).await?,
        None => Cart::from_lines(Vec::new()),
    };
    Ok(Json(cart))
}

/// Add units of a color variant.
#[instrument(skip(state, cart))]
pub async fn add(
    State(state): State<AppState>,
    cart: CartSession,
    Json(request): Json<AddToCart>,
) -> Result<Json<Cart>> {
    let owner = cart.writer().await?;
    let cart = CartService::new(state.pool())
        .add(owner, request.color_variant_id, request.quantity)
        .await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("color_variant_id", &request.color_variant_id.to_string())]),
    );
    Ok(Json(cart))
}

/// Add one unit of a variant already in the cart.
#[instrument(skip(state, cart))]
pub async fn increment(
    State(state): State<AppState>,
    cart: CartSession,
    Path(variant): Path<ColorVariantId>,
) -> Result<Json<Cart>> {
    change(&state, &cart, variant, Step::Increment).await
}

/// Remove one unit of a variant; the line goes away at zero.
#[instrument(skip(state, cart))]
pub async fn decrement(
    State(state): State<AppState>,
    cart: CartSession,
    Path(variant): Path<ColorVariantId>,
) -> Result<Json<Cart>> {
    change(&state, &cart, variant, Step::Decrement).await
}

async fn change(
    state: &AppState,
    cart: &CartSession,
    variant: ColorVariantId,
    step: Step,
) -> Result<Json<Cart>> {
    let owner = cart.reader().await?.ok_or(CartError::LineNotFound)?;
    let cart = CartService::new(state.pool())
        .change(owner, variant, step)
        .await?;
    Ok(Json(cart))
}

/// Set a line's quantity.
#[instrument(skip(state, cart, request))]
pub async fn set_quantity(
    State(state): State<AppState>,
    cart: CartSession,
    Path(line): Path<CartLineId>,
    Json(request): Json<SetQuantity>,
) -> Result<Json<Cart>> {
    let owner = cart.reader().await?.ok_or(CartError::LineNotFound)?;
    let cart = CartService::new(state.pool())
        .set_quantity(owner, line, request.quantity)
        .await?;
    Ok(Json(cart))
}

/// Remove a line.
#[instrument(skip(state, cart))]
pub async fn remove(
    State(state): State<AppState>,
    cart: CartSession,
    Path(line): Path<CartLineId>,
) -> Result<Json<Cart>> {
    let owner = cart.reader().await?.ok_or(CartError::LineNotFound)?;
    let cart = CartService::new(state.pool()).remove(owner, line).await?;
    Ok(Json(cart))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_defaults_to_one_unit() {
        let request: AddToCart = serde_json::from_str(r#"{"color_variant_id": 7}"#).unwrap();
        assert_eq!(request.color_variant_id, ColorVariantId::new(7));
        assert_eq!(request.quantity, 1);
    }
}
