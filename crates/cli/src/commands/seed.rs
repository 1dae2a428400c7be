//! Seed the storefront database with a catalog from a YAML file.
//!
//! The file lists categories, manufacturers, shops, and products with their
//! color variants and per-shop stock. Countries and colors are created from
//! the names they are referenced by. Everything is imported in one
//! transaction, and re-running the import updates rows in place (keyed by
//! slug or name) instead of duplicating them.
//!
//! ```yaml
//! categories:
//!   - { name: Lamps, slug: lamps, description: Desk and floor lamps }
//! manufacturers:
//!   - { name: Lumen, slug: lumen, country: Finland }
//! shops:
//!   - { name: Warehouse, address: 1 Dock Road, warehouse: true }
//!   - { name: Arbat, address: 12 Arbat Street }
//! products:
//!   - name: Desk Lamp
//!     price: "49.90"
//!     sale: 10
//!     category: lamps
//!     manufacturer: lumen
//!     variants:
//!       - color: white
//!         stock: { Warehouse: 20, Arbat: 3 }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{error, info};

use shop_online_core::{Discount, Price, PriceError};
use shop_online_storefront::db;

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Missing environment variable: STOREFRONT_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// File format
// =============================================================================

/// A catalog file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub manufacturers: Vec<ManufacturerSeed>,
    #[serde(default)]
    pub shops: Vec<ShopSeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategorySeed {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManufacturerSeed {
    pub name: String,
    pub slug: String,
    pub country: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShopSeed {
    pub name: String,
    pub address: String,
    /// The warehouse fulfils deliveries and is never offered for pickup.
    #[serde(default)]
    pub warehouse: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductSeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    /// Discount percentage (0-99).
    #[serde(default)]
    pub sale: Option<i32>,
    /// Category slug.
    pub category: String,
    /// Manufacturer slug.
    pub manufacturer: String,
    #[serde(default)]
    pub variants: Vec<VariantSeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantSeed {
    pub color: String,
    /// Units per shop name.
    #[serde(default)]
    pub stock: BTreeMap<String, i32>,
}

/// Price a product sells at after its discount.
///
/// # Errors
///
/// Returns an error for invalid prices or discounts.
pub fn actual_price(price: Decimal, sale: Option<i32>) -> Result<Price, PriceError> {
    Ok(Price::new(price)?.with_discount(Discount::from_sale(sale)?))
}

/// Check references and values before touching the database.
///
/// Returns one message per problem; an empty list means the file is valid.
#[must_use]
pub fn validate(catalog: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();

    let categories: BTreeSet<&str> = catalog.categories.iter().map(|c| c.slug.as_str()).collect();
    let manufacturers: BTreeSet<&str> = catalog
        .manufacturers
        .iter()
        .map(|m| m.slug.as_str())
        .collect();
    let shops: BTreeSet<&str> = catalog.shops.iter().map(|s| s.name.as_str()).collect();

    let warehouses = catalog.shops.iter().filter(|s| s.warehouse).count();
    if warehouses > 1 {
        errors.push(format!("{warehouses} shops are marked as warehouse, at most one allowed"));
    }

    for product in &catalog.products {
        let name = &product.name;
        if !categories.contains(product.category.as_str()) {
            errors.push(format!("{name}: unknown category {:?}", product.category));
        }
        if !manufacturers.contains(product.manufacturer.as_str()) {
            errors.push(format!("{name}: unknown manufacturer {:?}", product.manufacturer));
        }
        match actual_price(product.price, product.sale) {
            Ok(actual) if actual < Price::MIN_ACTUAL => {
                errors.push(format!("{name}: actual price {actual} is below {}", Price::MIN_ACTUAL));
            }
            Ok(_) => {}
            Err(e) => errors.push(format!("{name}: invalid price: {e}")),
        }

        let mut colors = BTreeSet::new();
        for variant in &product.variants {
            if !colors.insert(variant.color.as_str()) {
                errors.push(format!("{name}: color {:?} listed twice", variant.color));
            }
            for (shop, quantity) in &variant.stock {
                if !shops.contains(shop.as_str()) {
                    errors.push(format!("{name} ({}): unknown shop {shop:?}", variant.color));
                }
                if *quantity < 0 {
                    errors.push(format!("{name} ({}): negative stock at {shop}", variant.color));
                }
            }
        }
    }

    errors
}

// =============================================================================
// Import
// =============================================================================

/// Rows written by an import.
#[derive(Debug, Default)]
pub struct SeedSummary {
    pub categories: usize,
    pub manufacturers: usize,
    pub shops: usize,
    pub products: usize,
    pub variants: usize,
    pub stock_rows: usize,
}

/// Import a catalog file.
///
/// # Errors
///
/// Returns an error if the file is missing or invalid, or the import fails.
/// A failed import leaves the database unchanged.
pub async fn catalog(file_path: &str) -> Result<(), SeedError> {
    let database_url = super::database_url().ok_or(SeedError::MissingDatabaseUrl)?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate before connecting to the database
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: CatalogFile = serde_yaml::from_str(&content)?;

    let errors = validate(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()));
    }

    let pool = db::create_pool(&database_url, 2).await?;
    info!("Connected to database");

    let summary = import(&pool, &catalog).await?;

    info!("Seeding complete!");
    info!("  Categories: {}", summary.categories);
    info!("  Manufacturers: {}", summary.manufacturers);
    info!("  Shops: {}", summary.shops);
    info!("  Products: {}", summary.products);
    info!("  Color variants: {}", summary.variants);
    info!("  Stock rows: {}", summary.stock_rows);

    Ok(())
}

async fn import(pool: &PgPool, catalog: &CatalogFile) -> Result<SeedSummary, SeedError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    let mut category_ids = BTreeMap::new();
    for category in &catalog.categories {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO storefront.category (name, slug, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO UPDATE
                SET name = EXCLUDED.name, description = EXCLUDED.description
            RETURNING id
            ",
        )
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .fetch_one(&mut *tx)
        .await?;
        category_ids.insert(category.slug.as_str(), id);
        summary.categories += 1;
    }

    let mut manufacturer_ids = BTreeMap::new();
    for manufacturer in &catalog.manufacturers {
        let country_id = upsert_name(&mut tx, "country", &manufacturer.country).await?;
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO storefront.manufacturer (name, slug, country_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO UPDATE
                SET name = EXCLUDED.name, country_id = EXCLUDED.country_id
            RETURNING id
            ",
        )
        .bind(&manufacturer.name)
        .bind(&manufacturer.slug)
        .bind(country_id)
        .fetch_one(&mut *tx)
        .await?;
        manufacturer_ids.insert(manufacturer.slug.as_str(), id);
        summary.manufacturers += 1;
    }

    // A warehouse in the file replaces any other warehouse
    if let Some(warehouse) = catalog.shops.iter().find(|s| s.warehouse) {
        sqlx::query(
            "UPDATE storefront.shop SET is_warehouse = FALSE WHERE is_warehouse AND name <> $1",
        )
        .bind(&warehouse.name)
        .execute(&mut *tx)
        .await?;
    }

    let mut shop_ids = BTreeMap::new();
    for shop in &catalog.shops {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO storefront.shop (name, address, is_warehouse)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
                SET address = EXCLUDED.address, is_warehouse = EXCLUDED.is_warehouse
            RETURNING id
            ",
        )
        .bind(&shop.name)
        .bind(&shop.address)
        .bind(shop.warehouse)
        .fetch_one(&mut *tx)
        .await?;
        shop_ids.insert(shop.name.as_str(), id);
        summary.shops += 1;
    }

    for product in &catalog.products {
        // Validated above, so every lookup succeeds
        let (Some(category_id), Some(manufacturer_id), Ok(actual)) = (
            category_ids.get(product.category.as_str()),
            manufacturer_ids.get(product.manufacturer.as_str()),
            actual_price(product.price, product.sale),
        ) else {
            continue;
        };

        let product_id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO storefront.product
                (name, description, price, sale, actual_price, category_id, manufacturer_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (name) DO UPDATE
                SET description = EXCLUDED.description,
                    price = EXCLUDED.price,
                    sale = EXCLUDED.sale,
                    actual_price = EXCLUDED.actual_price,
                    category_id = EXCLUDED.category_id,
                    manufacturer_id = EXCLUDED.manufacturer_id
            RETURNING id
            ",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.sale)
        .bind(actual.amount())
        .bind(category_id)
        .bind(manufacturer_id)
        .fetch_one(&mut *tx)
        .await?;
        summary.products += 1;

        for variant in &product.variants {
            let color_id = upsert_name(&mut tx, "color", &variant.color).await?;
            let variant_id: i32 = sqlx::query_scalar(
                r"
                INSERT INTO storefront.color_variant (product_id, color_id)
                VALUES ($1, $2)
                ON CONFLICT (product_id, color_id) DO UPDATE SET color_id = EXCLUDED.color_id
                RETURNING id
                ",
            )
            .bind(product_id)
            .bind(color_id)
            .fetch_one(&mut *tx)
            .await?;
            summary.variants += 1;

            for (shop, quantity) in &variant.stock {
                let Some(shop_id) = shop_ids.get(shop.as_str()) else {
                    continue;
                };
                sqlx::query(
                    r"
                    INSERT INTO storefront.shop_stock (color_variant_id, shop_id, quantity)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (color_variant_id, shop_id) DO UPDATE
                        SET quantity = EXCLUDED.quantity
                    ",
                )
                .bind(variant_id)
                .bind(shop_id)
                .bind(quantity)
                .execute(&mut *tx)
                .await?;
                summary.stock_rows += 1;
            }
        }
    }

    tx.commit().await?;
    Ok(summary)
}

/// Insert-or-get a row of a `(id, name UNIQUE)` reference table.
///
/// `table` is always a literal from this module.
async fn upsert_name(conn: &mut PgConnection, table: &str, name: &str) -> Result<i32, sqlx::Error> {
    let sql = format!(
        "INSERT INTO storefront.{table} (name) VALUES ($1) \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id"
    );
    sqlx::query_scalar(&sql).bind(name).fetch_one(conn).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
categories:
  - { name: Lamps, slug: lamps }
manufacturers:
  - { name: Lumen, slug: lumen, country: Finland }
shops:
  - { name: Warehouse, address: 1 Dock Road, warehouse: true }
  - { name: Arbat, address: 12 Arbat Street }
products:
  - name: Desk Lamp
    price: "99.99"
    sale: 33
    category: lamps
    manufacturer: lumen
    variants:
      - color: white
        stock: { Warehouse: 20, Arbat: 3 }
"#;

    #[test]
    fn test_parse_and_validate() {
        let catalog: CatalogFile = serde_yaml::from_str(CATALOG).unwrap();
        assert_eq!(catalog.products.len(), 1);
        assert_eq!(catalog.products[0].variants[0].stock["Arbat"], 3);
        assert!(validate(&catalog).is_empty());
    }

    #[test]
    fn test_actual_price_rounds_up() {
        let price = actual_price(Decimal::new(9999, 2), Some(33)).unwrap();
        assert_eq!(price.amount(), Decimal::new(6700, 2));

        let price = actual_price(Decimal::new(10000, 2), Some(10)).unwrap();
        assert_eq!(price.amount(), Decimal::new(9000, 2));

        let price = actual_price(Decimal::new(1250, 2), None).unwrap();
        assert_eq!(price.amount(), Decimal::new(1250, 2));
    }

    #[test]
    fn test_actual_price_rejects_bad_input() {
        assert!(actual_price(Decimal::new(1000, 2), Some(100)).is_err());
        assert!(actual_price(Decimal::new(1001, 3), None).is_err());
    }

    #[test]
    fn test_validate_rejects_free_products() {
        let mut catalog: CatalogFile = serde_yaml::from_str(CATALOG).unwrap();
        catalog.products[0].price = Decimal::ZERO;
        catalog.products[0].sale = None;

        let errors = validate(&catalog);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("below 0.01"));
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let mut catalog: CatalogFile = serde_yaml::from_str(CATALOG).unwrap();
        catalog.shops[1].warehouse = true;
        catalog.products[0].category = "chairs".to_owned();
        catalog.products[0].variants[0]
            .stock
            .insert("Nowhere".to_owned(), -1);

        let errors = validate(&catalog);
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("warehouse")));
        assert!(errors.iter().any(|e| e.contains("unknown category")));
        assert!(errors.iter().any(|e| e.contains("unknown shop")));
        assert!(errors.iter().any(|e| e.contains("negative stock")));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = serde_yaml::from_str::<CatalogFile>("shops:\n  - { name: A, address: B, pickup: true }\n");
        assert!(result.is_err());
    }
}
