//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (rate limited)
//! POST   /api/auth/code                      - Request a confirmation code
//! POST   /api/auth/register                  - Register with a code
//! POST   /api/auth/login                     - Login (merges the anonymous cart)
//! POST   /api/auth/logout                    - Logout
//!
//! # Account (requires auth)
//! GET    /api/account                        - Profile
//! PATCH  /api/account                        - Update profile
//!
//! # Catalog
//! GET    /api/categories                     - Active categories
//! GET    /api/manufacturers                  - Active manufacturers
//! GET    /api/shops                          - Pickup shops
//! GET    /api/products                       - Product listing (filters, ordering)
//! GET    /api/products/{id}                  - Product detail with stock breakdown
//!
//! # Reviews
//! GET    /api/products/{id}/reviews          - Reviews for a product
//! POST   /api/products/{id}/reviews          - Review a product (auth)
//! PATCH  /api/reviews/{id}                   - Edit a review (author or staff)
//! DELETE /api/reviews/{id}                   - Delete a review (author or staff)
//!
//! # Cart (user or anonymous session)
//! GET    /api/cart                           - Cart with totals
//! POST   /api/cart                           - Add a color variant
//! POST   /api/cart/variants/{id}/increment   - One more unit
//! POST   /api/cart/variants/{id}/decrement   - One less unit
//! PATCH  /api/cart/{line_id}                 - Set quantity
//! DELETE /api/cart/{line_id}                 - Remove line
//!
//! # Orders (requires auth)
//! GET    /api/orders                         - Order history
//! POST   /api/orders                         - Place an order (rate limited)
//! GET    /api/orders/{id}                    - Order detail
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod products;
pub mod reviews;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/code", post(auth::request_code))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter())
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route("/{id}/reviews", get(reviews::index).post(reviews::create))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add))
        .route("/variants/{id}/increment", post(cart::increment))
        .route("/variants/{id}/decrement", post(cart::decrement))
        .route("/{line_id}", patch(cart::set_quantity).delete(cart::remove))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(orders::index).merge(post(orders::create).layer(api_rate_limiter())),
        )
        .route("/{id}", get(orders::show))
}

/// Create all API routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth_routes())
        .route("/api/account", get(account::show).patch(account::update))
        .route("/api/categories", get(catalog::categories))
        .route("/api/manufacturers", get(catalog::manufacturers))
        .route("/api/shops", get(catalog::shops))
        .nest("/api/products", product_routes())
        .route(
            "/api/reviews/{id}",
            patch(reviews::update).delete(reviews::delete),
        )
        .nest("/api/cart", cart_routes())
        .nest("/api/orders", order_routes())
}
