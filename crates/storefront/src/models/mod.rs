//! Domain models for storefront.
//!
//! These types represent validated domain objects separate from database row
//! types. Row structs stay private to the `db` modules and convert into these.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod review;
pub mod session;
pub mod user;

pub use cart::{Cart, CartLine, CartOwner, MAX_LINE_QUANTITY, MergeLine, MergePlan, plan_merge};
pub use catalog::{
    Category, Manufacturer, ProductDetail, ProductFilter, ProductOrdering, ProductSortField,
    ProductSummary, Shop, ShopQuantity, StockEntry, Variant, VariantAvailability, VariantStock,
    stock_breakdown,
};
pub use order::{Order, OrderDetail, OrderLine, OrderSummary};
pub use review::Review;
pub use session::{CurrentUser, keys as session_keys};
pub use user::{ProfileUpdate, User};
