//! Order domain types.
//!
//! Orders are created only by the checkout engine and are immutable
//! afterwards, except for `status` and `is_paid` which external fulfilment
//! and payment processes update.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shop_online_core::{
    ColorVariantId, OrderId, OrderLineId, OrderStatus, PaymentMode, Price, ProductId, ShopId,
    UserId,
};

/// An order header.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub requires_delivery: bool,
    pub delivery_city: Option<String>,
    pub delivery_address: Option<String>,
    /// Fulfilling shop: the warehouse for deliveries, the pickup shop otherwise.
    pub shop_id: ShopId,
    pub payment_mode: PaymentMode,
    pub is_paid: bool,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// A line of a placed order. `price` is the unit price at order time.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub color_variant_id: ColorVariantId,
    pub color: String,
    pub price: Price,
    pub quantity: i32,
    pub total: Price,
}

/// An order in the history list.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub total_price: Price,
    pub total_quantity: i64,
}

/// An order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub shop_name: String,
    pub lines: Vec<OrderLine>,
    pub total_price: Price,
    pub total_quantity: i64,
}

impl OrderDetail {
    /// Assemble an order with totals computed from its lines.
    #[must_use]
    pub fn new(order: Order, shop_name: String, lines: Vec<OrderLine>) -> Self {
        let total_price = lines.iter().map(|line| line.total).sum();
        let total_quantity = lines.iter().map(|line| i64::from(line.quantity)).sum();
        Self {
            order,
            shop_name,
            lines,
            total_price,
            total_quantity,
        }
    }
}
