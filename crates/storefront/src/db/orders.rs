//! Order history reads.
//!
//! Orders are written only by [`PgCheckoutStore`](super::PgCheckoutStore);
//! this repository serves a customer's own orders back to them.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shop_online_core::{
    ColorVariantId, OrderId, OrderLineId, OrderStatus, PaymentMode, Price, ProductId, ShopId,
    UserId,
};

use super::RepositoryError;
use crate::models::{Order, OrderDetail, OrderLine, OrderSummary};

/// Columns of `customer_order`, in [`OrderRow`] order.
pub(super) const ORDER_COLUMNS: &str = "id, user_id, first_name, last_name, phone, \
    requires_delivery, delivery_city, delivery_address, shop_id, payment_mode, is_paid, \
    status, created_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(super) struct OrderRow {
    id: i32,
    user_id: i32,
    first_name: String,
    last_name: String,
    phone: String,
    requires_delivery: bool,
    delivery_city: Option<String>,
    delivery_address: Option<String>,
    shop_id: i32,
    payment_mode: PaymentMode,
    is_paid: bool,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            requires_delivery: row.requires_delivery,
            delivery_city: row.delivery_city,
            delivery_address: row.delivery_address,
            shop_id: ShopId::new(row.shop_id),
            payment_mode: row.payment_mode,
            is_paid: row.is_paid,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    #[sqlx(flatten)]
    order: OrderRow,
    total_price: Price,
    total_quantity: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderDetailRow {
    #[sqlx(flatten)]
    order: OrderRow,
    shop_name: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct OrderLineRow {
    id: i32,
    product_id: i32,
    product_name: String,
    color_variant_id: i32,
    color: String,
    price: Price,
    quantity: i32,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            id: OrderLineId::new(row.id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            color_variant_id: ColorVariantId::new(row.color_variant_id),
            color: row.color,
            price: row.price,
            quantity: row.quantity,
            total: row.price.line_total(row.quantity.unsigned_abs()),
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for reading placed orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's orders, newest first, with totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(
            r"
            SELECT o.id, o.user_id, o.first_name, o.last_name, o.phone,
                   o.requires_delivery, o.delivery_city, o.delivery_address, o.shop_id,
                   o.payment_mode, o.is_paid, o.status, o.created_at,
                   COALESCE(t.total_price, 0) AS total_price,
                   COALESCE(t.total_quantity, 0) AS total_quantity
            FROM storefront.customer_order o
            LEFT JOIN LATERAL (
                SELECT SUM(ol.price * ol.quantity) AS total_price,
                       SUM(ol.quantity)::int8 AS total_quantity
                FROM storefront.order_line ol
                WHERE ol.order_id = o.id
            ) t ON TRUE
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            ",
        )
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| OrderSummary {
                order: row.order.into(),
                total_price: row.total_price,
                total_quantity: row.total_quantity,
            })
            .collect())
    }

    /// Get one of the user's orders with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist or
    /// belongs to another user.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_user(
        &self,
        user: UserId,
        id: OrderId,
    ) -> Result<OrderDetail, RepositoryError> {
        let row = sqlx::query_as::<_, OrderDetailRow>(
            r"
            SELECT o.id, o.user_id, o.first_name, o.last_name, o.phone,
                   o.requires_delivery, o.delivery_city, o.delivery_address, o.shop_id,
                   o.payment_mode, o.is_paid, o.status, o.created_at,
                   s.name AS shop_name
            FROM storefront.customer_order o
            JOIN storefront.shop s ON s.id = o.shop_id
            WHERE o.id = $1 AND o.user_id = $2
            ",
        )
        .bind(id)
        .bind(user)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let lines = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT ol.id, ol.product_id, p.name AS product_name, ol.color_variant_id,
                   col.name AS color, ol.price, ol.quantity
            FROM storefront.order_line ol
            JOIN storefront.product p ON p.id = ol.product_id
            JOIN storefront.color_variant cv ON cv.id = ol.color_variant_id
            JOIN storefront.color col ON col.id = cv.color_id
            WHERE ol.order_id = $1
            ORDER BY ol.id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(OrderDetail::new(
            row.order.into(),
            row.shop_name,
            lines.into_iter().map(Into::into).collect(),
        ))
    }
}
