//! Pure reservation planning.
//!
//! Given the customer's cart lines (in insertion order) and the locked stock
//! rows of the fulfilling shop, decide whether every line can be served and
//! which stock rows to decrement. Nothing here touches storage, so the same
//! rules apply to every [`CheckoutStore`](super::CheckoutStore).

use std::collections::HashMap;

use shop_online_core::{CartLineId, ColorVariantId, Price, ProductId, StockId};

use super::error::{CheckoutError, Shortfall};
use crate::models::Shop;

/// A cart line as seen by the reservation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationLine {
    pub cart_line_id: CartLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub color_variant_id: ColorVariantId,
    pub color: String,
    /// The product's actual price at reservation time.
    pub unit_price: Price,
    pub quantity: i32,
}

/// A locked stock row of the fulfilling shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    pub stock_id: StockId,
    pub color_variant_id: ColorVariantId,
    pub quantity: i32,
}

/// A guarded decrement: subtract `quantity` from `stock_id` only if at least
/// that many units remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDecrement {
    pub stock_id: StockId,
    pub quantity: i32,
}

/// The validated outcome: lines to snapshot and stock to take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationPlan {
    pub lines: Vec<ReservationLine>,
    /// One entry per touched stock row, ordered by stock ID.
    pub decrements: Vec<StockDecrement>,
}

/// Validate every cart line against the shop's stock before any mutation.
///
/// Lines are checked in the order given; the first failing line is reported.
/// A line may take the last unit, leaving the row at zero.
///
/// # Errors
///
/// - [`CheckoutError::EmptyCart`] if there are no lines.
/// - [`CheckoutError::MissingStock`] if the shop has no row for a line's variant.
/// - [`CheckoutError::InsufficientStock`] if a row holds fewer units than requested.
pub fn reserve(
    lines: Vec<ReservationLine>,
    stock: &[StockLevel],
    shop: &Shop,
) -> Result<ReservationPlan, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    // Running remainder per variant, so repeated variants share one row
    let mut remaining: HashMap<ColorVariantId, (StockId, i32)> = stock
        .iter()
        .map(|level| (level.color_variant_id, (level.stock_id, level.quantity)))
        .collect();
    let mut taken: HashMap<StockId, i32> = HashMap::new();

    for line in &lines {
        let shortfall = |available| Shortfall {
            product_id: line.product_id,
            product: line.product_name.clone(),
            color_variant_id: line.color_variant_id,
            color: line.color.clone(),
            shop_id: shop.id,
            shop: shop.name.clone(),
            requested: line.quantity,
            available,
        };

        let Some((stock_id, available)) = remaining.get_mut(&line.color_variant_id) else {
            return Err(CheckoutError::MissingStock(shortfall(0)));
        };

        if *available < line.quantity {
            return Err(CheckoutError::InsufficientStock(shortfall(*available)));
        }

        *available -= line.quantity;
        *taken.entry(*stock_id).or_insert(0) += line.quantity;
    }

    let mut decrements: Vec<StockDecrement> = taken
        .into_iter()
        .map(|(stock_id, quantity)| StockDecrement { stock_id, quantity })
        .collect();
    decrements.sort_by_key(|d| d.stock_id);

    Ok(ReservationPlan { lines, decrements })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use shop_online_core::ShopId;

    fn shop() -> Shop {
        Shop {
            id: ShopId::new(3),
            name: "Arbat".to_owned(),
            address: "Arbat 1".to_owned(),
            is_warehouse: false,
        }
    }

    fn line(id: i32, variant: i32, quantity: i32) -> ReservationLine {
        ReservationLine {
            cart_line_id: CartLineId::new(id),
            product_id: ProductId::new(variant * 10),
            product_name: format!("Lamp {variant}"),
            color_variant_id: ColorVariantId::new(variant),
            color: "white".to_owned(),
            unit_price: Price::new("90.00".parse().unwrap()).unwrap(),
            quantity,
        }
    }

    fn level(stock: i32, variant: i32, quantity: i32) -> StockLevel {
        StockLevel {
            stock_id: StockId::new(stock),
            color_variant_id: ColorVariantId::new(variant),
            quantity,
        }
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let result = reserve(Vec::new(), &[level(1, 1, 5)], &shop());
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[test]
    fn test_covered_cart_plans_decrements() {
        let plan = reserve(
            vec![line(1, 2, 3), line(2, 1, 1)],
            &[level(7, 1, 1), level(4, 2, 10)],
            &shop(),
        )
        .unwrap();

        assert_eq!(plan.lines.len(), 2);
        assert_eq!(
            plan.decrements,
            vec![
                StockDecrement {
                    stock_id: StockId::new(4),
                    quantity: 3
                },
                StockDecrement {
                    stock_id: StockId::new(7),
                    quantity: 1
                },
            ]
        );
    }

    #[test]
    fn test_stock_may_reach_zero() {
        let plan = reserve(vec![line(1, 1, 5)], &[level(1, 1, 5)], &shop()).unwrap();
        assert_eq!(plan.decrements[0].quantity, 5);
    }

    #[test]
    fn test_missing_stock_row_names_line_and_shop() {
        let err = reserve(vec![line(1, 1, 1), line(2, 9, 2)], &[level(1, 1, 5)], &shop())
            .unwrap_err();

        let CheckoutError::MissingStock(shortfall) = err else {
            panic!("expected MissingStock, got {err:?}");
        };
        assert_eq!(shortfall.color_variant_id, ColorVariantId::new(9));
        assert_eq!(shortfall.shop_id, ShopId::new(3));
        assert_eq!(shortfall.requested, 2);
        assert_eq!(shortfall.available, 0);
    }

    #[test]
    fn test_insufficient_stock_reports_available() {
        let err = reserve(vec![line(1, 1, 4)], &[level(1, 1, 3)], &shop()).unwrap_err();
        assert_eq!(err.to_string(), "only 3 of Lamp 1 (white) left at Arbat, 4 requested");
        let shortfall = err.shortfall().unwrap();
        assert_eq!((shortfall.requested, shortfall.available), (4, 3));
    }

    #[test]
    fn test_first_failing_line_wins() {
        let err = reserve(
            vec![line(1, 1, 1), line(2, 2, 9), line(3, 3, 1)],
            &[level(1, 1, 5), level(2, 2, 1)],
            &shop(),
        )
        .unwrap_err();

        // Line 2 is short and line 3 has no stock row at all; line 2 is reported
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock(ref s) if s.color_variant_id == ColorVariantId::new(2)
        ));
    }

    #[test]
    fn test_repeated_variant_shares_remaining_stock() {
        let err = reserve(vec![line(1, 1, 2), line(2, 1, 2)], &[level(1, 1, 3)], &shop())
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock(ref s) if s.available == 1
        ));

        let plan = reserve(vec![line(1, 1, 2), line(2, 1, 1)], &[level(1, 1, 3)], &shop())
            .unwrap();
        assert_eq!(
            plan.decrements,
            vec![StockDecrement {
                stock_id: StockId::new(1),
                quantity: 3
            }]
        );
    }
}
