//! Review domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shop_online_core::{ProductId, ReviewId, UserId};

/// A customer's review of a product.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    /// Author's username.
    pub author: String,
    pub text: String,
    /// Score from 1 to 5.
    pub rating: i16,
    pub created_at: DateTime<Utc>,
}
