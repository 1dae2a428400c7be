//! Checkout error types.

use serde::Serialize;
use thiserror::Error;

use shop_online_core::{ColorVariantId, ProductId, ShopId};

use crate::db::RepositoryError;

/// The cart line that could not be reserved, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub product_id: ProductId,
    pub product: String,
    pub color_variant_id: ColorVariantId,
    pub color: String,
    pub shop_id: ShopId,
    pub shop: String,
    pub requested: i32,
    /// Units on hand; `0` when the shop does not stock the variant at all.
    pub available: i32,
}

/// Errors that can occur while placing an order.
///
/// Variants fall into four groups: input validation, availability,
/// configuration, and concurrency conflicts. Every one of them is raised
/// before the reservation transaction commits, so none leaves partial state.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A contact or delivery field is missing or malformed.
    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    /// The customer's cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// The pickup shop does not exist or is the warehouse.
    #[error("shop {0} is not available for pickup")]
    UnknownShop(ShopId),

    /// The fulfilling shop has no stock row for a cart line's variant.
    #[error("{} ({}) is not stocked at {}", .0.product, .0.color, .0.shop)]
    MissingStock(Shortfall),

    /// The fulfilling shop has fewer units than a cart line requests.
    #[error(
        "only {} of {} ({}) left at {}, {} requested",
        .0.available, .0.product, .0.color, .0.shop, .0.requested
    )]
    InsufficientStock(Shortfall),

    /// Delivery was requested but no shop is flagged as the warehouse.
    #[error("no warehouse shop is configured")]
    WarehouseNotConfigured,

    /// Stock changed between validation and decrement.
    #[error("stock changed during checkout, please retry")]
    StockConflict,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

impl CheckoutError {
    /// The deficient cart line, for availability errors.
    #[must_use]
    pub const fn shortfall(&self) -> Option<&Shortfall> {
        match self {
            Self::MissingStock(s) | Self::InsufficientStock(s) => Some(s),
            _ => None,
        }
    }
}
