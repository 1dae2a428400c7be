//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shop_online_core::{Email, UserId, Username};

/// A storefront customer account.
///
/// Contact fields are empty strings until the customer fills them in, either
/// through the profile endpoint or by placing their first order.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login name.
    pub username: Username,
    /// Email address used for registration.
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
    /// Staff may moderate reviews.
    pub is_staff: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}
