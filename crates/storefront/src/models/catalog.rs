//! Catalog domain types: categories, manufacturers, shops, products.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use shop_online_core::{CategoryId, ColorVariantId, ManufacturerId, Price, ProductId, ShopId};

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub slug: String,
}

/// A product manufacturer.
#[derive(Debug, Clone, Serialize)]
pub struct Manufacturer {
    pub id: ManufacturerId,
    pub name: String,
    pub slug: String,
    /// Country of origin.
    pub country: String,
}

/// A physical shop. Exactly one shop may be the warehouse, which fulfils
/// delivery orders and is never offered for pickup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    pub address: String,
    pub is_warehouse: bool,
}

/// A product as shown in listings.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    /// Discount percentage, if any.
    pub sale: Option<i32>,
    pub actual_price: Price,
    pub category: String,
    pub manufacturer: String,
    /// Number of distinct shops holding stock.
    pub num_shops: i64,
    /// Total units in stock across all shops.
    pub num_products: i64,
    /// Mean review score, `None` when unreviewed.
    pub rating: Option<Decimal>,
}

/// Full product page data.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub description: String,
    pub category_slug: String,
    pub manufacturer_slug: String,
    pub manufacturer_country: String,
    pub reviews_count: i64,
    /// Pickup availability, grouped by color variant.
    pub offline_shops: Vec<VariantStock>,
    /// Warehouse (online order) availability per color variant.
    pub online: Vec<VariantAvailability>,
}

/// A purchasable color variant with its product's current price.
#[derive(Debug, Clone, Serialize)]
pub struct Variant {
    pub id: ColorVariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub color: String,
    pub actual_price: Price,
}

/// Units of one color variant held by one shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShopQuantity {
    pub shop_id: ShopId,
    pub shop_name: String,
    pub address: String,
    pub quantity: i32,
}

/// Pickup stock of one color variant across non-warehouse shops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantStock {
    pub color_variant_id: ColorVariantId,
    pub color: String,
    pub shops: Vec<ShopQuantity>,
}

/// Warehouse stock of one color variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantAvailability {
    pub color_variant_id: ColorVariantId,
    pub color: String,
    pub quantity: i32,
}

/// One stock row of a product, as loaded for the breakdown.
#[derive(Debug, Clone)]
pub struct StockEntry {
    pub color_variant_id: ColorVariantId,
    pub color: String,
    pub shop: Shop,
    pub quantity: i32,
}

/// Split a product's stock rows into pickup (grouped by variant) and
/// warehouse availability. Rows with no units are dropped.
///
/// Variants are ordered by color name, shops by name.
#[must_use]
pub fn stock_breakdown(entries: Vec<StockEntry>) -> (Vec<VariantStock>, Vec<VariantAvailability>) {
    let mut offline: BTreeMap<(String, ColorVariantId), Vec<ShopQuantity>> = BTreeMap::new();
    let mut online = Vec::new();

    for entry in entries.into_iter().filter(|e| e.quantity > 0) {
        if entry.shop.is_warehouse {
            online.push(VariantAvailability {
                color_variant_id: entry.color_variant_id,
                color: entry.color,
                quantity: entry.quantity,
            });
        } else {
            offline
                .entry((entry.color, entry.color_variant_id))
                .or_default()
                .push(ShopQuantity {
                    shop_id: entry.shop.id,
                    shop_name: entry.shop.name,
                    address: entry.shop.address,
                    quantity: entry.quantity,
                });
        }
    }

    let offline = offline
        .into_iter()
        .map(|((color, color_variant_id), mut shops)| {
            shops.sort_by(|a, b| a.shop_name.cmp(&b.shop_name));
            VariantStock {
                color_variant_id,
                color,
                shops,
            }
        })
        .collect();
    online.sort_by(|a: &VariantAvailability, b| a.color.cmp(&b.color));

    (offline, online)
}

// =============================================================================
// Listing filters
// =============================================================================

/// Column a product listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSortField {
    Name,
    ActualPrice,
    Rating,
}

/// Listing order, e.g. `-rating` or `actual_price`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductOrdering {
    pub field: ProductSortField,
    pub descending: bool,
}

impl Default for ProductOrdering {
    fn default() -> Self {
        Self {
            field: ProductSortField::Rating,
            descending: true,
        }
    }
}

impl ProductOrdering {
    /// SQL `ORDER BY` fragment. Only ever built from the enum, never from input.
    #[must_use]
    pub const fn sql(&self) -> &'static str {
        match (self.field, self.descending) {
            (ProductSortField::Name, false) => "p.name ASC",
            (ProductSortField::Name, true) => "p.name DESC",
            (ProductSortField::ActualPrice, false) => "p.actual_price ASC, p.id ASC",
            (ProductSortField::ActualPrice, true) => "p.actual_price DESC, p.id ASC",
            (ProductSortField::Rating, false) => "rating ASC NULLS LAST, p.id ASC",
            (ProductSortField::Rating, true) => "rating DESC NULLS LAST, p.id ASC",
        }
    }
}

impl FromStr for ProductOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (descending, name) = s
            .strip_prefix('-')
            .map_or((false, s), |rest| (true, rest));
        let field = match name {
            "name" => ProductSortField::Name,
            "actual_price" => ProductSortField::ActualPrice,
            "rating" => ProductSortField::Rating,
            _ => return Err(format!("cannot order products by {s:?}")),
        };
        Ok(Self { field, descending })
    }
}

/// Product listing filter.
#[derive(Debug, Clone)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    /// Manufacturer slug.
    pub manufacturer: Option<String>,
    /// Inclusive lower bound on actual price.
    pub min_price: Option<Decimal>,
    /// Inclusive upper bound on actual price.
    pub max_price: Option<Decimal>,
    /// Full-text search over name and description.
    pub search: Option<String>,
    pub ordering: ProductOrdering,
    pub limit: i64,
    pub offset: i64,
}

impl ProductFilter {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            category: None,
            manufacturer: None,
            min_price: None,
            max_price: None,
            search: None,
            ordering: ProductOrdering::default(),
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shop(id: i32, name: &str, is_warehouse: bool) -> Shop {
        Shop {
            id: ShopId::new(id),
            name: name.to_owned(),
            address: format!("{name} street"),
            is_warehouse,
        }
    }

    fn entry(variant: i32, color: &str, shop: &Shop, quantity: i32) -> StockEntry {
        StockEntry {
            color_variant_id: ColorVariantId::new(variant),
            color: color.to_owned(),
            shop: shop.clone(),
            quantity,
        }
    }

    #[test]
    fn test_stock_breakdown_separates_warehouse() {
        let warehouse = shop(1, "Warehouse", true);
        let arbat = shop(2, "Arbat", false);
        let tverskaya = shop(3, "Tverskaya", false);

        let (offline, online) = stock_breakdown(vec![
            entry(10, "white", &tverskaya, 2),
            entry(10, "white", &arbat, 1),
            entry(10, "white", &warehouse, 7),
            entry(11, "black", &arbat, 0),
            entry(11, "black", &warehouse, 3),
        ]);

        assert_eq!(offline.len(), 1);
        let white = &offline[0];
        assert_eq!(white.color_variant_id, ColorVariantId::new(10));
        let names: Vec<_> = white.shops.iter().map(|s| s.shop_name.as_str()).collect();
        assert_eq!(names, ["Arbat", "Tverskaya"]);

        assert_eq!(
            online,
            vec![
                VariantAvailability {
                    color_variant_id: ColorVariantId::new(11),
                    color: "black".to_owned(),
                    quantity: 3,
                },
                VariantAvailability {
                    color_variant_id: ColorVariantId::new(10),
                    color: "white".to_owned(),
                    quantity: 7,
                },
            ]
        );
    }

    #[test]
    fn test_stock_breakdown_empty() {
        let (offline, online) = stock_breakdown(Vec::new());
        assert!(offline.is_empty());
        assert!(online.is_empty());
    }

    #[test]
    fn test_parse_ordering() {
        let ordering: ProductOrdering = "-actual_price".parse().unwrap();
        assert_eq!(ordering.field, ProductSortField::ActualPrice);
        assert!(ordering.descending);
        assert_eq!(ordering.sql(), "p.actual_price DESC, p.id ASC");

        let ordering: ProductOrdering = "name".parse().unwrap();
        assert!(!ordering.descending);

        assert!("price; DROP TABLE".parse::<ProductOrdering>().is_err());
    }

    #[test]
    fn test_default_ordering_is_best_rated_first() {
        assert_eq!(
            ProductOrdering::default().sql(),
            "rating DESC NULLS LAST, p.id ASC"
        );
    }
}
