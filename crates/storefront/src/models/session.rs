//! Session-related types.
//!
//! Types stored in the session for authentication and cart ownership.

use serde::{Deserialize, Serialize};

use shop_online_core::{UserId, Username};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's login name.
    pub username: Username,
    /// Staff may moderate reviews.
    pub is_staff: bool,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the anonymous cart token (UUID), created on first cart write.
    pub const CART_TOKEN: &str = "cart_token";
}
