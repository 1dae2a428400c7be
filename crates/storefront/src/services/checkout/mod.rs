//! Order placement: the inventory reservation engine.
//!
//! [`CheckoutService::place_order`] turns a customer's whole cart into an
//! order fulfilled by one shop:
//!
//! 1. Validate contact and delivery details.
//! 2. Resolve the fulfilling shop: the warehouse for delivery, the chosen shop
//!    for pickup.
//! 3. Ask the [`CheckoutStore`] to reserve. In one transaction the store
//!    backfills empty profile fields, loads and locks the cart and stock rows,
//!    runs [`plan::reserve`], writes the order and its lines, decrements stock,
//!    and empties the cart. Any error rolls all of it back.
//! 4. If the store reports a [`CheckoutError::StockConflict`], retry once.

mod error;
#[cfg(test)]
pub mod memory;
pub mod plan;

pub use error::{CheckoutError, Shortfall};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use shop_online_core::{PaymentMode, Phone, ShopId, UserId};

use crate::models::{OrderDetail, Shop};

/// Name fields accept at most this many characters.
const MAX_NAME_LENGTH: usize = 150;
/// Delivery city length bounds, in characters.
const CITY_LENGTH: (usize, usize) = (3, 30);
/// Delivery address length bounds, in characters.
const ADDRESS_LENGTH: (usize, usize) = (3, 150);

// =============================================================================
// Request and Reservation Types
// =============================================================================

/// How the order reaches the customer.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Fulfillment {
    /// Courier delivery from the warehouse.
    Delivery { city: String, address: String },
    /// In-store pickup at a chosen shop.
    Pickup { shop_id: ShopId },
}

/// Checkout form as submitted by the customer.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(flatten)]
    pub fulfillment: Fulfillment,
    #[serde(default)]
    pub payment_mode: PaymentMode,
}

/// Validated contact details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDetails {
    pub first_name: String,
    pub last_name: String,
    pub phone: Phone,
}

/// Validated delivery destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAddress {
    pub city: String,
    pub address: String,
}

/// Everything a store needs to reserve the customer's cart.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub user_id: UserId,
    pub contact: ContactDetails,
    /// The fulfilling shop.
    pub shop: Shop,
    /// Set for delivery orders.
    pub delivery: Option<DeliveryAddress>,
    pub payment_mode: PaymentMode,
}

// =============================================================================
// Store Port
// =============================================================================

/// Persistence port for order placement.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// The shop flagged as the warehouse, if any.
    async fn warehouse(&self) -> Result<Option<Shop>, CheckoutError>;

    /// Look up a shop by ID.
    async fn shop(&self, id: ShopId) -> Result<Option<Shop>, CheckoutError>;

    /// Atomically turn the user's cart into an order at `reservation.shop`.
    ///
    /// Implementations must validate every line with [`plan::reserve`] against
    /// stock that cannot change underneath them, and apply all effects or
    /// none.
    async fn reserve(&self, reservation: &Reservation) -> Result<OrderDetail, CheckoutError>;
}

// =============================================================================
// Service
// =============================================================================

/// Places orders against a [`CheckoutStore`].
pub struct CheckoutService<S> {
    store: S,
}

impl<S: CheckoutStore> CheckoutService<S> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Place an order for everything in the user's cart.
    ///
    /// # Errors
    ///
    /// - Validation: [`CheckoutError::InvalidField`], [`CheckoutError::EmptyCart`],
    ///   [`CheckoutError::UnknownShop`].
    /// - Availability: [`CheckoutError::MissingStock`], [`CheckoutError::InsufficientStock`].
    /// - Configuration: [`CheckoutError::WarehouseNotConfigured`].
    /// - Concurrency: [`CheckoutError::StockConflict`] if stock changed twice in a row.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        request: OrderRequest,
    ) -> Result<OrderDetail, CheckoutError> {
        let contact = validate_contact(&request)?;

        let (shop, delivery) = match request.fulfillment {
            Fulfillment::Delivery { city, address } => {
                let delivery = validate_delivery(&city, &address)?;
                let Some(warehouse) = self.store.warehouse().await? else {
                    tracing::error!("delivery requested but no warehouse shop is configured");
                    return Err(CheckoutError::WarehouseNotConfigured);
                };
                (warehouse, Some(delivery))
            }
            Fulfillment::Pickup { shop_id } => {
                let shop = self
                    .store
                    .shop(shop_id)
                    .await?
                    .filter(|shop| !shop.is_warehouse)
                    .ok_or(CheckoutError::UnknownShop(shop_id))?;
                (shop, None)
            }
        };

        let reservation = Reservation {
            user_id,
            contact,
            shop,
            delivery,
            payment_mode: request.payment_mode,
        };

        let result = match self.store.reserve(&reservation).await {
            Err(CheckoutError::StockConflict) => {
                warn!(shop_id = %reservation.shop.id, "stock changed during checkout, retrying");
                self.store.reserve(&reservation).await
            }
            other => other,
        };

        match &result {
            Ok(order) => info!(
                order_id = %order.order.id,
                shop_id = %order.order.shop_id,
                lines = order.lines.len(),
                "order placed"
            ),
            Err(e) if e.shortfall().is_some() => warn!(error = %e, "order rejected"),
            Err(_) => {}
        }

        result
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_contact(request: &OrderRequest) -> Result<ContactDetails, CheckoutError> {
    let first_name = validate_name("first_name", &request.first_name)?;
    let last_name = validate_name("last_name", &request.last_name)?;
    let phone = Phone::parse(&request.phone).map_err(|e| CheckoutError::InvalidField {
        field: "phone",
        message: e.to_string(),
    })?;

    Ok(ContactDetails {
        first_name,
        last_name,
        phone,
    })
}

fn validate_name(field: &'static str, value: &str) -> Result<String, CheckoutError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CheckoutError::InvalidField {
            field,
            message: "must not be empty".to_owned(),
        });
    }
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(CheckoutError::InvalidField {
            field,
            message: format!("must be at most {MAX_NAME_LENGTH} characters"),
        });
    }
    Ok(value.to_owned())
}

fn validate_delivery(city: &str, address: &str) -> Result<DeliveryAddress, CheckoutError> {
    Ok(DeliveryAddress {
        city: validate_length("delivery_city", city, CITY_LENGTH)?,
        address: validate_length("delivery_address", address, ADDRESS_LENGTH)?,
    })
}

fn validate_length(
    field: &'static str,
    value: &str,
    (min, max): (usize, usize),
) -> Result<String, CheckoutError> {
    let value = value.trim();
    let len = value.chars().count();
    if !(min..=max).contains(&len) {
        return Err(CheckoutError::InvalidField {
            field,
            message: format!("must be between {min} and {max} characters"),
        });
    }
    Ok(value.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use shop_online_core::{ColorVariantId, OrderStatus};

    use super::memory::InMemoryCheckoutStore;
    use super::*;

    const BUYER: UserId = UserId::new(1);
    const WAREHOUSE: ShopId = ShopId::new(1);
    const ARBAT: ShopId = ShopId::new(2);
    const LAMP_WHITE: ColorVariantId = ColorVariantId::new(10);
    const LAMP_BLACK: ColorVariantId = ColorVariantId::new(11);

    fn store() -> InMemoryCheckoutStore {
        let store = InMemoryCheckoutStore::default();
        store.add_shop(WAREHOUSE, "Warehouse", true);
        store.add_shop(ARBAT, "Arbat", false);
        store.add_variant(LAMP_WHITE, "Lamp", "white", "90.00");
        store.add_variant(LAMP_BLACK, "Lamp", "black", "90.00");
        store
    }

    fn pickup(shop_id: ShopId) -> OrderRequest {
        OrderRequest {
            first_name: "Ivan".to_owned(),
            last_name: "Petrov".to_owned(),
            phone: "+7 912 345-67-89".to_owned(),
            fulfillment: Fulfillment::Pickup { shop_id },
            payment_mode: PaymentMode::OnReceipt,
        }
    }

    fn delivery() -> OrderRequest {
        OrderRequest {
            fulfillment: Fulfillment::Delivery {
                city: "Moscow".to_owned(),
                address: "Tverskaya 7".to_owned(),
            },
            ..pickup(ARBAT)
        }
    }

    #[tokio::test]
    async fn test_order_consumes_cart_and_stock() {
        let store = store();
        store.set_stock(ARBAT, LAMP_WHITE, 5);
        store.set_stock(ARBAT, LAMP_BLACK, 1);
        store.add_to_cart(BUYER, LAMP_WHITE, 2);
        store.add_to_cart(BUYER, LAMP_BLACK, 1);
        let service = CheckoutService::new(store);

        let order = service.place_order(BUYER, pickup(ARBAT)).await.unwrap();

        assert_eq!(order.order.status, OrderStatus::Processing);
        assert_eq!(order.order.shop_id, ARBAT);
        assert!(!order.order.requires_delivery);
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[0].color_variant_id, LAMP_WHITE);
        assert_eq!(order.lines[0].quantity, 2);
        assert_eq!(order.lines[0].price.to_string(), "90.00");
        assert_eq!(order.total_price.to_string(), "270.00");

        let store = &service.store;
        assert_eq!(store.stock(ARBAT, LAMP_WHITE), Some(3));
        assert_eq!(store.stock(ARBAT, LAMP_BLACK), Some(0));
        assert!(store.cart(BUYER).is_empty());
    }

    #[tokio::test]
    async fn test_delivery_is_fulfilled_by_warehouse() {
        let store = store();
        store.set_stock(WAREHOUSE, LAMP_WHITE, 1);
        store.add_to_cart(BUYER, LAMP_WHITE, 1);
        let service = CheckoutService::new(store);

        let order = service.place_order(BUYER, delivery()).await.unwrap();

        assert_eq!(order.order.shop_id, WAREHOUSE);
        assert!(order.order.requires_delivery);
        assert_eq!(order.order.delivery_city.as_deref(), Some("Moscow"));
        assert_eq!(service.store.stock(WAREHOUSE, LAMP_WHITE), Some(0));
    }

    #[tokio::test]
    async fn test_delivery_without_warehouse_is_configuration_error() {
        let store = InMemoryCheckoutStore::default();
        store.add_shop(ARBAT, "Arbat", false);
        store.add_variant(LAMP_WHITE, "Lamp", "white", "90.00");
        store.add_to_cart(BUYER, LAMP_WHITE, 1);
        let service = CheckoutService::new(store);

        let err = service.place_order(BUYER, delivery()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::WarehouseNotConfigured));
        assert_eq!(service.store.cart(BUYER).len(), 1);
    }

    #[tokio::test]
    async fn test_warehouse_is_not_a_pickup_shop() {
        let store = store();
        store.set_stock(WAREHOUSE, LAMP_WHITE, 5);
        store.add_to_cart(BUYER, LAMP_WHITE, 1);
        let service = CheckoutService::new(store);

        let err = service.place_order(BUYER, pickup(WAREHOUSE)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::UnknownShop(id) if id == WAREHOUSE));

        let err = service
            .place_order(BUYER, pickup(ShopId::new(99)))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::UnknownShop(_)));
    }

    #[tokio::test]
    async fn test_over_quantity_rolls_back_everything() {
        let store = store();
        store.set_stock(ARBAT, LAMP_WHITE, 5);
        store.set_stock(ARBAT, LAMP_BLACK, 1);
        store.add_to_cart(BUYER, LAMP_WHITE, 2);
        store.add_to_cart(BUYER, LAMP_BLACK, 3);
        let service = CheckoutService::new(store);
        let before = service.store.snapshot();

        let err = service.place_order(BUYER, pickup(ARBAT)).await.unwrap_err();

        let shortfall = err.shortfall().unwrap();
        assert_eq!(shortfall.color_variant_id, LAMP_BLACK);
        assert_eq!(shortfall.shop_id, ARBAT);
        assert_eq!((shortfall.requested, shortfall.available), (3, 1));
        assert_eq!(service.store.snapshot(), before);

        // Failing again changes nothing either
        let again = service.place_order(BUYER, pickup(ARBAT)).await.unwrap_err();
        assert!(matches!(again, CheckoutError::InsufficientStock(_)));
        assert_eq!(service.store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_missing_stock_row_is_availability_error() {
        let store = store();
        store.set_stock(ARBAT, LAMP_WHITE, 5);
        store.add_to_cart(BUYER, LAMP_BLACK, 1);
        let service = CheckoutService::new(store);

        let err = service.place_order(BUYER, pickup(ARBAT)).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::MissingStock(ref s) if s.color_variant_id == LAMP_BLACK && s.available == 0
        ));
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let service = CheckoutService::new(store());
        let err = service.place_order(BUYER, pickup(ARBAT)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_invalid_contact_fields() {
        let service = CheckoutService::new(store());

        let mut request = pickup(ARBAT);
        request.first_name = "   ".to_owned();
        let err = service.place_order(BUYER, request).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidField { field: "first_name", .. }));

        let mut request = pickup(ARBAT);
        request.phone = "call me".to_owned();
        let err = service.place_order(BUYER, request).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidField { field: "phone", .. }));

        let mut request = delivery();
        request.fulfillment = Fulfillment::Delivery {
            city: "NY".to_owned(),
            address: "Broadway 1".to_owned(),
        };
        let err = service.place_order(BUYER, request).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidField { field: "delivery_city", .. }));
    }

    #[tokio::test]
    async fn test_profile_backfill_keeps_existing_fields() {
        let store = store();
        store.set_stock(ARBAT, LAMP_WHITE, 5);
        store.add_to_cart(BUYER, LAMP_WHITE, 1);
        store.set_profile(BUYER, "Ivan", "", "");
        let service = CheckoutService::new(store);

        let mut request = pickup(ARBAT);
        request.first_name = "Vanya".to_owned();
        service.place_order(BUYER, request).await.unwrap();

        let profile = service.store.profile(BUYER);
        assert_eq!(profile.first_name, "Ivan");
        assert_eq!(profile.last_name, "Petrov");
        assert_eq!(profile.phone, "+79123456789");
    }

    #[tokio::test]
    async fn test_failed_order_does_not_backfill_profile() {
        let store = store();
        store.add_to_cart(BUYER, LAMP_WHITE, 1);
        let service = CheckoutService::new(store);

        service.place_order(BUYER, pickup(ARBAT)).await.unwrap_err();
        assert_eq!(service.store.profile(BUYER).first_name, "");
    }

    #[tokio::test]
    async fn test_stock_conflict_is_retried_once() {
        let store = store();
        store.set_stock(ARBAT, LAMP_WHITE, 5);
        store.add_to_cart(BUYER, LAMP_WHITE, 1);
        store.inject_conflicts(1);
        let service = CheckoutService::new(store);

        assert!(service.place_order(BUYER, pickup(ARBAT)).await.is_ok());
    }

    #[tokio::test]
    async fn test_repeated_stock_conflict_is_surfaced() {
        let store = store();
        store.set_stock(ARBAT, LAMP_WHITE, 5);
        store.add_to_cart(BUYER, LAMP_WHITE, 1);
        store.inject_conflicts(2);
        let service = CheckoutService::new(store);

        let err = service.place_order(BUYER, pickup(ARBAT)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::StockConflict));
        assert_eq!(service.store.stock(ARBAT, LAMP_WHITE), Some(5));
        assert_eq!(service.store.cart(BUYER).len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_for_last_unit() {
        let second_buyer = UserId::new(2);
        let store = store();
        store.set_stock(ARBAT, LAMP_WHITE, 1);
        store.add_to_cart(BUYER, LAMP_WHITE, 1);
        store.add_to_cart(second_buyer, LAMP_WHITE, 1);
        let service = Arc::new(CheckoutService::new(store));

        let first = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.place_order(BUYER, pickup(ARBAT)).await }
        });
        let second = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.place_order(second_buyer, pickup(ARBAT)).await }
        });
        let results = [first.await.unwrap(), second.await.unwrap()];

        let placed = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(CheckoutError::InsufficientStock(_))))
            .count();
        assert_eq!((placed, rejected), (1, 1));
        assert_eq!(service.store.stock(ARBAT, LAMP_WHITE), Some(0));
        assert_eq!(service.store.order_count(), 1);
    }
}
