//! Cart repository.
//!
//! Every statement filters on the owner with
//! `(user_id = $1 OR session_token = $2)`. Exactly one of the two binds is
//! non-null, so lines of other owners are never visible.

use sqlx::PgPool;
use uuid::Uuid;

use shop_online_core::{CartLineId, ColorVariantId, Price, ProductId, UserId};

use super::RepositoryError;
use crate::models::{
    CartLine, CartOwner, MAX_LINE_QUANTITY, MergeLine, MergePlan, plan_merge,
};

/// Outcome of a ±1 quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAdjustment {
    /// The line now holds this many units.
    Quantity(i32),
    /// The quantity reached zero and the line was deleted.
    Removed,
    /// The change would exceed [`MAX_LINE_QUANTITY`].
    OutOfRange,
    /// The owner has no line for the variant.
    Missing,
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: i32,
    color_variant_id: i32,
    product_id: i32,
    product_name: String,
    color: String,
    unit_price: Price,
    quantity: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            id: CartLineId::new(row.id),
            color_variant_id: ColorVariantId::new(row.color_variant_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            color: row.color,
            unit_price: row.unit_price,
            quantity: row.quantity,
            subtotal: row.unit_price.line_total(row.quantity.unsigned_abs()),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MergeLineRow {
    id: i32,
    color_variant_id: i32,
    quantity: i32,
}

impl From<MergeLineRow> for MergeLine {
    fn from(row: MergeLineRow) -> Self {
        Self {
            id: CartLineId::new(row.id),
            color_variant_id: ColorVariantId::new(row.color_variant_id),
            quantity: row.quantity,
        }
    }
}

fn owner_binds(owner: CartOwner) -> (Option<UserId>, Option<Uuid>) {
    (owner.user_id(), owner.session_token())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for cart lines.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the owner's lines in insertion order, priced at the current
    /// actual price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, owner: CartOwner) -> Result<Vec<CartLine>, RepositoryError> {
        let (user_id, token) = owner_binds(owner);
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT cl.id, cl.color_variant_id, p.id AS product_id, p.name AS product_name,
                   col.name AS color, p.actual_price AS unit_price, cl.quantity
            FROM storefront.cart_line cl
            JOIN storefront.color_variant cv ON cv.id = cl.color_variant_id
            JOIN storefront.product p ON p.id = cv.product_id
            JOIN storefront.color col ON col.id = cv.color_id
            WHERE (cl.user_id = $1 OR cl.session_token = $2)
            ORDER BY cl.created_at, cl.id
            ",
        )
        .bind(user_id)
        .bind(token)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add units of a variant, creating the line or growing it.
    ///
    /// Returns the line's new quantity, or `None` if it would exceed
    /// [`MAX_LINE_QUANTITY`] (the line is left unchanged).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add(
        &self,
        owner: CartOwner,
        variant: ColorVariantId,
        quantity: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        // The conflict target must name the partial unique index of the owner kind
        let conflict_target = match owner {
            CartOwner::User(_) => "(user_id, color_variant_id) WHERE user_id IS NOT NULL",
            CartOwner::Anonymous(_) => {
                "(session_token, color_variant_id) WHERE session_token IS NOT NULL"
            }
        };
        let (user_id, token) = owner_binds(owner);

        let row: Option<(i32,)> = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.cart_line (user_id, session_token, color_variant_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT {conflict_target}
            DO UPDATE SET quantity = cart_line.quantity + EXCLUDED.quantity
            WHERE cart_line.quantity + EXCLUDED.quantity <= $5
            RETURNING quantity
            "
        ))
        .bind(user_id)
        .bind(token)
        .bind(variant)
        .bind(quantity)
        .bind(MAX_LINE_QUANTITY)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(quantity,)| quantity))
    }

    /// Change the owner's line for `variant` by `delta` units, deleting it
    /// when the quantity would drop to zero or below.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn adjust(
        &self,
        owner: CartOwner,
        variant: ColorVariantId,
        delta: i32,
    ) -> Result<LineAdjustment, RepositoryError> {
        let (user_id, token) = owner_binds(owner);
        let mut tx = self.pool.begin().await?;

        let current: Option<(i32, i32)> = sqlx::query_as(
            r"
            SELECT id, quantity FROM storefront.cart_line
            WHERE (user_id = $1 OR session_token = $2) AND color_variant_id = $3
            FOR UPDATE
            ",
        )
        .bind(user_id)
        .bind(token)
        .bind(variant)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id, quantity)) = current else {
            return Ok(LineAdjustment::Missing);
        };

        let target = quantity.saturating_add(delta);
        let adjustment = if target <= 0 {
            sqlx::query("DELETE FROM storefront.cart_line WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            LineAdjustment::Removed
        } else if target > MAX_LINE_QUANTITY {
            return Ok(LineAdjustment::OutOfRange);
        } else {
            sqlx::query("UPDATE storefront.cart_line SET quantity = $2 WHERE id = $1")
                .bind(id)
                .bind(target)
                .execute(&mut *tx)
                .await?;
            LineAdjustment::Quantity(target)
        };

        tx.commit().await?;
        Ok(adjustment)
    }

    /// Set a line's quantity. Returns `false` if the owner has no such line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        owner: CartOwner,
        line: CartLineId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let (user_id, token) = owner_binds(owner);
        let result = sqlx::query(
            r"
            UPDATE storefront.cart_line SET quantity = $4
            WHERE id = $3 AND (user_id = $1 OR session_token = $2)
            ",
        )
        .bind(user_id)
        .bind(token)
        .bind(line)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a line. Returns `false` if the owner has no such line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, owner: CartOwner, line: CartLineId) -> Result<bool, RepositoryError> {
        let (user_id, token) = owner_binds(owner);
        let result = sqlx::query(
            "DELETE FROM storefront.cart_line WHERE id = $3 AND (user_id = $1 OR session_token = $2)",
        )
        .bind(user_id)
        .bind(token)
        .bind(line)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Fold the anonymous cart `token` into `user`'s cart in one transaction.
    ///
    /// Returns the number of anonymous lines that were merged or handed over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// applied in that case.
    pub async fn merge_anonymous(&self, token: Uuid, user: UserId) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let anonymous: Vec<MergeLine> = sqlx::query_as::<_, MergeLineRow>(
            r"
            SELECT id, color_variant_id, quantity FROM storefront.cart_line
            WHERE session_token = $1
            ORDER BY created_at, id
            FOR UPDATE
            ",
        )
        .bind(token)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        if anonymous.is_empty() {
            return Ok(0);
        }

        let owned: Vec<MergeLine> = sqlx::query_as::<_, MergeLineRow>(
            r"
            SELECT id, color_variant_id, quantity FROM storefront.cart_line
            WHERE user_id = $1
            FOR UPDATE
            ",
        )
        .bind(user)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

        let MergePlan { updates, reassign } = plan_merge(&anonymous, &owned);

        if !updates.is_empty() {
            let (ids, quantities): (Vec<i32>, Vec<i32>) = updates
                .iter()
                .map(|(id, quantity)| (id.as_i32(), *quantity))
                .unzip();
            sqlx::query(
                r"
                UPDATE storefront.cart_line c SET quantity = u.quantity
                FROM UNNEST($1::int4[], $2::int4[]) AS u(id, quantity)
                WHERE c.id = u.id
                ",
            )
            .bind(&ids)
            .bind(&quantities)
            .execute(&mut *tx)
            .await?;
        }

        if !reassign.is_empty() {
            let ids: Vec<i32> = reassign.iter().map(CartLineId::as_i32).collect();
            sqlx::query(
                r"
                UPDATE storefront.cart_line SET user_id = $1, session_token = NULL
                WHERE id = ANY($2)
                ",
            )
            .bind(user)
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM storefront.cart_line WHERE session_token = $1")
            .bind(token)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(anonymous.len())
    }
}
