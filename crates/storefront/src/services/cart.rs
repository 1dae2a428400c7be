//! Cart service.
//!
//! Thin rules over [`CartRepository`]: quantity bounds, variant existence,
//! and owner scoping.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shop_online_core::{CartLineId, ColorVariantId, UserId};

use crate::db::cart::LineAdjustment;
use crate::db::{CartRepository, CatalogRepository, RepositoryError};
use crate::models::{Cart, CartOwner, MAX_LINE_QUANTITY};

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The variant doesn't exist or its product is inactive.
    #[error("color variant {0} not found")]
    VariantNotFound(ColorVariantId),

    /// The owner has no such line.
    #[error("cart line not found")]
    LineNotFound,

    /// The resulting quantity would fall outside 1..=32767.
    #[error("quantity must be between 1 and {max}", max = MAX_LINE_QUANTITY)]
    QuantityOutOfRange,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Direction of a single-unit change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Increment,
    Decrement,
}

impl Step {
    const fn delta(self) -> i32 {
        match self {
            Self::Increment => 1,
            Self::Decrement => -1,
        }
    }
}

/// Cart service.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
    catalog: CatalogRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            carts: CartRepository::new(pool),
            catalog: CatalogRepository::new(pool),
        }
    }

    /// The owner's cart with totals.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn get(&self, owner: CartOwner) -> Result<Cart, CartError> {
        Ok(Cart::from_lines(self.carts.lines(owner).await?))
    }

    /// Add units of a variant, summing with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::VariantNotFound` for unknown or inactive variants.
    /// Returns `CartError::QuantityOutOfRange` if the line would exceed the limit.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        owner: CartOwner,
        variant: ColorVariantId,
        quantity: i32,
    ) -> Result<Cart, CartError> {
        check_quantity(quantity)?;

        if self.catalog.get_variant(variant).await?.is_none() {
            return Err(CartError::VariantNotFound(variant));
        }

        let total = self
            .carts
            .add(owner, variant, quantity)
            .await?
            .ok_or(CartError::QuantityOutOfRange)?;
        debug!(quantity = total, "cart line updated");

        self.get(owner).await
    }

    /// Change the line for a variant by one unit. Decrementing the last unit
    /// removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the owner has no line for the variant.
    /// Returns `CartError::QuantityOutOfRange` if incrementing would exceed the limit.
    #[instrument(skip(self))]
    pub async fn change(
        &self,
        owner: CartOwner,
        variant: ColorVariantId,
        step: Step,
    ) -> Result<Cart, CartError> {
        match self.carts.adjust(owner, variant, step.delta()).await? {
            LineAdjustment::Quantity(_) | LineAdjustment::Removed => self.get(owner).await,
            LineAdjustment::OutOfRange => Err(CartError::QuantityOutOfRange),
            LineAdjustment::Missing => Err(CartError::LineNotFound),
        }
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::QuantityOutOfRange` for quantities outside 1..=32767.
    /// Returns `CartError::LineNotFound` if the owner has no such line.
    pub async fn set_quantity(
        &self,
        owner: CartOwner,
        line: CartLineId,
        quantity: i32,
    ) -> Result<Cart, CartError> {
        check_quantity(quantity)?;

        if !self.carts.set_quantity(owner, line, quantity).await? {
            return Err(CartError::LineNotFound);
        }
        self.get(owner).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the owner has no such line.
    pub async fn remove(&self, owner: CartOwner, line: CartLineId) -> Result<Cart, CartError> {
        if !self.carts.remove(owner, line).await? {
            return Err(CartError::LineNotFound);
        }
        self.get(owner).await
    }

    /// Fold an anonymous cart into the user's cart after login.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the merge fails; nothing is changed then.
    #[instrument(skip(self))]
    pub async fn merge_anonymous(&self, token: Uuid, user: UserId) -> Result<(), CartError> {
        let merged = self.carts.merge_anonymous(token, user).await?;
        if merged > 0 {
            info!(lines = merged, "anonymous cart merged");
        }
        Ok(())
    }
}

fn check_quantity(quantity: i32) -> Result<(), CartError> {
    if (1..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(CartError::QuantityOutOfRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_bounds() {
        assert!(check_quantity(1).is_ok());
        assert!(check_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(matches!(check_quantity(0), Err(CartError::QuantityOutOfRange)));
        assert!(matches!(
            check_quantity(MAX_LINE_QUANTITY + 1),
            Err(CartError::QuantityOutOfRange)
        ));
    }

    #[test]
    fn test_step_delta() {
        assert_eq!(Step::Increment.delta(), 1);
        assert_eq!(Step::Decrement.delta(), -1);
    }
}
