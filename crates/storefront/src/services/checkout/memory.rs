//! In-memory [`CheckoutStore`] for service tests.
//!
//! One mutex guards the whole state, so a reservation sees and mutates it
//! atomically the way a database transaction with row locks would.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use shop_online_core::{
    CartLineId, ColorVariantId, OrderId, OrderLineId, OrderStatus, Price, ProductId, ShopId,
    StockId, UserId,
};

use super::plan::{self, ReservationLine, StockLevel};
use super::{CheckoutError, CheckoutStore, Reservation};
use crate::models::{Order, OrderDetail, OrderLine, Shop};

#[derive(Debug, Clone)]
struct VariantInfo {
    product_name: String,
    color: String,
    price: Price,
}

/// Contact fields kept on the user's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// Everything a failed checkout must leave untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    stock: BTreeMap<(ShopId, ColorVariantId), (StockId, i32)>,
    carts: BTreeMap<UserId, Vec<(ColorVariantId, i32)>>,
    profiles: BTreeMap<UserId, Profile>,
    orders: usize,
}

#[derive(Debug, Default)]
struct State {
    shops: BTreeMap<ShopId, Shop>,
    variants: BTreeMap<ColorVariantId, VariantInfo>,
    stock: BTreeMap<(ShopId, ColorVariantId), (StockId, i32)>,
    carts: BTreeMap<UserId, Vec<(CartLineId, ColorVariantId, i32)>>,
    profiles: BTreeMap<UserId, Profile>,
    orders: Vec<OrderDetail>,
    next_id: i32,
    pending_conflicts: u32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Checkout state held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCheckoutStore {
    state: Mutex<State>,
}

impl InMemoryCheckoutStore {
    pub fn add_shop(&self, id: ShopId, name: &str, is_warehouse: bool) {
        let shop = Shop {
            id,
            name: name.to_owned(),
            address: format!("{name} 1"),
            is_warehouse,
        };
        self.state.lock().unwrap().shops.insert(id, shop);
    }

    pub fn add_variant(&self, id: ColorVariantId, product: &str, color: &str, price: &str) {
        let info = VariantInfo {
            product_name: product.to_owned(),
            color: color.to_owned(),
            price: Price::new(price.parse().unwrap()).unwrap(),
        };
        self.state.lock().unwrap().variants.insert(id, info);
    }

    pub fn set_stock(&self, shop: ShopId, variant: ColorVariantId, quantity: i32) {
        let mut state = self.state.lock().unwrap();
        let stock_id = StockId::new(state.next_id());
        state.stock.insert((shop, variant), (stock_id, quantity));
    }

    pub fn add_to_cart(&self, user: UserId, variant: ColorVariantId, quantity: i32) {
        let mut state = self.state.lock().unwrap();
        let line_id = CartLineId::new(state.next_id());
        state
            .carts
            .entry(user)
            .or_default()
            .push((line_id, variant, quantity));
    }

    pub fn set_profile(&self, user: UserId, first_name: &str, last_name: &str, phone: &str) {
        let profile = Profile {
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            phone: phone.to_owned(),
        };
        self.state.lock().unwrap().profiles.insert(user, profile);
    }

    /// Make the next `count` reservations fail with [`CheckoutError::StockConflict`].
    pub fn inject_conflicts(&self, count: u32) {
        self.state.lock().unwrap().pending_conflicts = count;
    }

    pub fn stock(&self, shop: ShopId, variant: ColorVariantId) -> Option<i32> {
        let state = self.state.lock().unwrap();
        state.stock.get(&(shop, variant)).map(|(_, quantity)| *quantity)
    }

    pub fn cart(&self, user: UserId) -> Vec<(ColorVariantId, i32)> {
        let state = self.state.lock().unwrap();
        state
            .carts
            .get(&user)
            .map(|lines| lines.iter().map(|(_, v, q)| (*v, *q)).collect())
            .unwrap_or_default()
    }

    pub fn profile(&self, user: UserId) -> Profile {
        let state = self.state.lock().unwrap();
        state.profiles.get(&user).cloned().unwrap_or_default()
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().unwrap().orders.len()
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().unwrap();
        Snapshot {
            stock: state.stock.clone(),
            carts: state
                .carts
                .iter()
                .map(|(user, lines)| (*user, lines.iter().map(|(_, v, q)| (*v, *q)).collect()))
                .collect(),
            profiles: state.profiles.clone(),
            orders: state.orders.len(),
        }
    }
}

#[async_trait]
impl CheckoutStore for InMemoryCheckoutStore {
    async fn warehouse(&self) -> Result<Option<Shop>, CheckoutError> {
        let state = self.state.lock().unwrap();
        Ok(state.shops.values().find(|shop| shop.is_warehouse).cloned())
    }

    async fn shop(&self, id: ShopId) -> Result<Option<Shop>, CheckoutError> {
        Ok(self.state.lock().unwrap().shops.get(&id).cloned())
    }

    async fn reserve(&self, reservation: &Reservation) -> Result<OrderDetail, CheckoutError> {
        let mut state = self.state.lock().unwrap();

        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            return Err(CheckoutError::StockConflict);
        }

        let shop = &reservation.shop;
        let lines: Vec<ReservationLine> = state
            .carts
            .get(&reservation.user_id)
            .into_iter()
            .flatten()
            .map(|(line_id, variant, quantity)| {
                let info = &state.variants[variant];
                ReservationLine {
                    cart_line_id: *line_id,
                    product_id: ProductId::new(variant.as_i32() * 100),
                    product_name: info.product_name.clone(),
                    color_variant_id: *variant,
                    color: info.color.clone(),
                    unit_price: info.price,
                    quantity: *quantity,
                }
            })
            .collect();
        let levels: Vec<StockLevel> = state
            .stock
            .iter()
            .filter(|((shop_id, _), _)| *shop_id == shop.id)
            .map(|((_, variant), (stock_id, quantity))| StockLevel {
                stock_id: *stock_id,
                color_variant_id: *variant,
                quantity: *quantity,
            })
            .collect();

        let plan = plan::reserve(lines, &levels, shop)?;

        // Validation passed; everything below applies together
        for decrement in &plan.decrements {
            if let Some((_, quantity)) = state
                .stock
                .values_mut()
                .find(|(stock_id, _)| *stock_id == decrement.stock_id)
            {
                *quantity -= decrement.quantity;
            }
        }

        let contact = &reservation.contact;
        let profile = state.profiles.entry(reservation.user_id).or_default();
        for (field, value) in [
            (&mut profile.first_name, &contact.first_name),
            (&mut profile.last_name, &contact.last_name),
            (&mut profile.phone, &contact.phone.to_string()),
        ] {
            if field.is_empty() {
                value.clone_into(field);
            }
        }

        let order = Order {
            id: OrderId::new(state.next_id()),
            user_id: reservation.user_id,
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            phone: contact.phone.to_string(),
            requires_delivery: reservation.delivery.is_some(),
            delivery_city: reservation.delivery.as_ref().map(|d| d.city.clone()),
            delivery_address: reservation.delivery.as_ref().map(|d| d.address.clone()),
            shop_id: shop.id,
            payment_mode: reservation.payment_mode,
            is_paid: false,
            status: OrderStatus::Processing,
            created_at: Utc::now(),
        };
        let mut order_lines = Vec::with_capacity(plan.lines.len());
        for line in plan.lines {
            order_lines.push(OrderLine {
                id: OrderLineId::new(state.next_id()),
                product_id: line.product_id,
                product_name: line.product_name,
                color_variant_id: line.color_variant_id,
                color: line.color,
                price: line.unit_price,
                quantity: line.quantity,
                total: line.unit_price.line_total(line.quantity.unsigned_abs()),
            });
        }

        state.carts.remove(&reservation.user_id);

        let detail = OrderDetail::new(order, shop.name.clone(), order_lines);
        state.orders.push(detail.clone());
        Ok(detail)
    }
}
