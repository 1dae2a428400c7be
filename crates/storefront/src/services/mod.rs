//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Confirmation codes, registration, login, profile
//! - `cart` - Cart rules for users and anonymous sessions
//! - `checkout` - Order placement and inventory reservation
//! - `reviews` - Product reviews

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod reviews;
