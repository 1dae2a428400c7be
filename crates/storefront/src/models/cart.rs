//! Cart domain types.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use shop_online_core::{CartLineId, ColorVariantId, Price, ProductId, UserId};

/// Who a cart belongs to.
///
/// Anonymous visitors are identified by a random token kept in their
/// session; on login their lines are merged into the user's cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartOwner {
    User(UserId),
    Anonymous(Uuid),
}

impl CartOwner {
    /// The owning user ID, if authenticated.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Anonymous(_) => None,
        }
    }

    /// The anonymous session token, if any.
    #[must_use]
    pub const fn session_token(&self) -> Option<Uuid> {
        match self {
            Self::User(_) => None,
            Self::Anonymous(token) => Some(*token),
        }
    }
}

/// One cart line with its current price.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub color_variant_id: ColorVariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub color: String,
    /// The product's actual price right now.
    pub unit_price: Price,
    pub quantity: i32,
    /// `quantity * unit_price`.
    pub subtotal: Price,
}

/// A cart with derived totals.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    pub total_price: Price,
    pub total_quantity: i64,
}

impl Cart {
    /// Build a cart from its lines, computing totals.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let total_price = lines.iter().map(|line| line.subtotal).sum();
        let total_quantity = lines.iter().map(|line| i64::from(line.quantity)).sum();
        Self {
            lines,
            total_price,
            total_quantity,
        }
    }

    /// Returns `true` if the cart has no lines.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 32_767;

/// A cart line reduced to what merging needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeLine {
    pub id: CartLineId,
    pub color_variant_id: ColorVariantId,
    pub quantity: i32,
}

/// How to fold an anonymous cart into a user's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// User lines whose quantity grows: `(line, new quantity)`.
    pub updates: Vec<(CartLineId, i32)>,
    /// Anonymous lines handed over to the user as they are.
    pub reassign: Vec<CartLineId>,
}

/// Plan the login merge.
///
/// Lines for a variant the user already has are summed into the user's line
/// (capped at [`MAX_LINE_QUANTITY`]); the rest change owner. Anonymous lines
/// not reassigned are deleted by the caller.
#[must_use]
pub fn plan_merge(anonymous: &[MergeLine], user: &[MergeLine]) -> MergePlan {
    let mut existing: HashMap<ColorVariantId, (CartLineId, i32)> = user
        .iter()
        .map(|line| (line.color_variant_id, (line.id, line.quantity)))
        .collect();
    let mut touched: Vec<CartLineId> = Vec::new();
    let mut plan = MergePlan::default();

    for line in anonymous {
        match existing.get_mut(&line.color_variant_id) {
            Some((id, quantity)) => {
                *quantity = quantity.saturating_add(line.quantity).min(MAX_LINE_QUANTITY);
                if !touched.contains(id) {
                    touched.push(*id);
                }
            }
            None => {
                plan.reassign.push(line.id);
                existing.insert(line.color_variant_id, (line.id, line.quantity));
            }
        }
    }

    plan.updates = touched
        .into_iter()
        .filter_map(|id| {
            existing
                .values()
                .find(|(line_id, _)| *line_id == id)
                .map(|(line_id, quantity)| (*line_id, *quantity))
        })
        .collect();
    plan
}
