//! `PostgreSQL` checkout store.
//!
//! [`PgCheckoutStore::reserve`] is the only writer of orders and the only
//! code that takes stock. It runs as one transaction:
//!
//! 1. Backfill empty profile fields from the order's contact details.
//! 2. Lock the user's cart lines, then the shop's stock rows for those
//!    variants, in ID order.
//! 3. Validate with [`plan::reserve`].
//! 4. Insert the order and its lines, decrement stock with a guarded batch
//!    update, and empty the cart.
//!
//! Returning early drops the transaction, which rolls everything back.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};

use shop_online_core::{CartLineId, ColorVariantId, Price, ProductId, ShopId, StockId};

use super::catalog::ShopRow;
use super::orders::{ORDER_COLUMNS, OrderLineRow, OrderRow};
use crate::models::{Order, OrderDetail, OrderLine, Shop};
use crate::services::checkout::plan::{self, ReservationLine, StockLevel};
use crate::services::checkout::{CheckoutError, CheckoutStore, Reservation};

#[derive(Debug, sqlx::FromRow)]
struct ReservationLineRow {
    cart_line_id: i32,
    product_id: i32,
    product_name: String,
    color_variant_id: i32,
    color: String,
    unit_price: Price,
    quantity: i32,
}

impl From<ReservationLineRow> for ReservationLine {
    fn from(row: ReservationLineRow) -> Self {
        Self {
            cart_line_id: CartLineId::new(row.cart_line_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            color_variant_id: ColorVariantId::new(row.color_variant_id),
            color: row.color,
            unit_price: row.unit_price,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockLevelRow {
    id: i32,
    color_variant_id: i32,
    quantity: i32,
}

/// Checkout store backed by the storefront database.
pub struct PgCheckoutStore<'a> {
    pool: &'a PgPool,
}

impl<'a> PgCheckoutStore<'a> {
    /// Create a new checkout store.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckoutStore for PgCheckoutStore<'_> {
    async fn warehouse(&self) -> Result<Option<Shop>, CheckoutError> {
        let row = sqlx::query_as::<_, ShopRow>(
            "SELECT id, name, address, is_warehouse FROM storefront.shop WHERE is_warehouse",
        )
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn shop(&self, id: ShopId) -> Result<Option<Shop>, CheckoutError> {
        let row = sqlx::query_as::<_, ShopRow>(
            "SELECT id, name, address, is_warehouse FROM storefront.shop WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, reservation), fields(user_id = %reservation.user_id, shop_id = %reservation.shop.id))]
    async fn reserve(&self, reservation: &Reservation) -> Result<OrderDetail, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let user_id = reservation.user_id;
        let contact = &reservation.contact;
        let shop = &reservation.shop;

        // Only fill fields the customer has never set
        sqlx::query(
            r"
            UPDATE storefront.user
            SET first_name = CASE WHEN first_name = '' THEN $2 ELSE first_name END,
                last_name = CASE WHEN last_name = '' THEN $3 ELSE last_name END,
                phone = CASE WHEN phone = '' THEN $4 ELSE phone END
            WHERE id = $1 AND (first_name = '' OR last_name = '' OR phone = '')
            ",
        )
        .bind(user_id)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(contact.phone.as_str())
        .execute(&mut *tx)
        .await?;

        let lines: Vec<ReservationLine> = sqlx::query_as::<_, ReservationLineRow>(
            r"
            SELECT cl.id AS cart_line_id, p.id AS product_id, p.name AS product_name,
                   cl.color_variant_id, col.name AS color, p.actual_price AS unit_price,
                   cl.quantity
            FROM storefront.cart_line cl
            JOIN storefront.color_variant cv ON cv.id = cl.color_variant_id
            JOIN storefront.product p ON p.id = cv.product_id
            JOIN storefront.color col ON col.id = cv.color_id
            WHERE cl.user_id = $1
            ORDER BY cl.created_at, cl.id
            FOR UPDATE OF cl
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let variant_ids: Vec<i32> = lines.iter().map(|l| l.color_variant_id.as_i32()).collect();
        let stock: Vec<StockLevel> = sqlx::query_as::<_, StockLevelRow>(
            r"
            SELECT id, color_variant_id, quantity
            FROM storefront.shop_stock
            WHERE shop_id = $1 AND color_variant_id = ANY($2)
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(shop.id)
        .bind(&variant_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| StockLevel {
            stock_id: StockId::new(row.id),
            color_variant_id: ColorVariantId::new(row.color_variant_id),
            quantity: row.quantity,
        })
        .collect();

        let plan = plan::reserve(lines, &stock, shop)?;
        debug!(
            lines = plan.lines.len(),
            stock_rows = plan.decrements.len(),
            "cart validated against stock"
        );

        let order: Order = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO storefront.customer_order
                (user_id, first_name, last_name, phone, requires_delivery,
                 delivery_city, delivery_address, shop_id, payment_mode)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(contact.phone.as_str())
        .bind(reservation.delivery.is_some())
        .bind(reservation.delivery.as_ref().map(|d| d.city.as_str()))
        .bind(reservation.delivery.as_ref().map(|d| d.address.as_str()))
        .bind(shop.id)
        .bind(reservation.payment_mode)
        .fetch_one(&mut *tx)
        .await?
        .into();

        let mut product_ids = Vec::with_capacity(plan.lines.len());
        let mut line_variants = Vec::with_capacity(plan.lines.len());
        let mut prices: Vec<Decimal> = Vec::with_capacity(plan.lines.len());
        let mut quantities = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            product_ids.push(line.product_id.as_i32());
            line_variants.push(line.color_variant_id.as_i32());
            prices.push(line.unit_price.amount());
            quantities.push(line.quantity);
        }

        // Insert and read back in one statement so names and colors come along
        let order_lines: Vec<OrderLine> = sqlx::query_as::<_, OrderLineRow>(
            r"
            WITH inserted AS (
                INSERT INTO storefront.order_line
                    (order_id, product_id, color_variant_id, price, quantity)
                SELECT $1, l.product_id, l.color_variant_id, l.price, l.quantity
                FROM UNNEST($2::int4[], $3::int4[], $4::numeric[], $5::int4[])
                    WITH ORDINALITY AS l(product_id, color_variant_id, price, quantity, position)
                ORDER BY l.position
                RETURNING id, product_id, color_variant_id, price, quantity
            )
            SELECT i.id, i.product_id, p.name AS product_name, i.color_variant_id,
                   col.name AS color, i.price, i.quantity
            FROM inserted i
            JOIN storefront.product p ON p.id = i.product_id
            JOIN storefront.color_variant cv ON cv.id = i.color_variant_id
            JOIN storefront.color col ON col.id = cv.color_id
            ORDER BY i.id
            ",
        )
        .bind(order.id)
        .bind(&product_ids)
        .bind(&line_variants)
        .bind(&prices)
        .bind(&quantities)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let (stock_ids, amounts): (Vec<i32>, Vec<i32>) = plan
            .decrements
            .iter()
            .map(|d| (d.stock_id.as_i32(), d.quantity))
            .unzip();
        let updated = sqlx::query(
            r"
            UPDATE storefront.shop_stock s
            SET quantity = s.quantity - d.quantity
            FROM UNNEST($1::int4[], $2::int4[]) AS d(id, quantity)
            WHERE s.id = d.id AND s.quantity >= d.quantity
            ",
        )
        .bind(&stock_ids)
        .bind(&amounts)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if usize::try_from(updated).ok() != Some(plan.decrements.len()) {
            return Err(CheckoutError::StockConflict);
        }

        sqlx::query("DELETE FROM storefront.cart_line WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(OrderDetail::new(order, shop.name.clone(), order_lines))
    }
}
