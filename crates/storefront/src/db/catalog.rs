//! Catalog repository: products, reference data, shops, and stock breakdowns.
//!
//! Listing filters are assembled with [`QueryBuilder`] so every user-supplied
//! value is bound, and the `ORDER BY` clause only ever comes from
//! [`ProductOrdering::sql`].

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use shop_online_core::{
    CategoryId, ColorVariantId, ManufacturerId, Price, ProductId, ShopId,
};

use super::RepositoryError;
use crate::models::{
    Category, Manufacturer, ProductDetail, ProductFilter, ProductSummary, Shop, StockEntry,
    Variant, stock_breakdown,
};

/// Shared `FROM` clause for product summaries. Stock figures count only rows
/// with units on hand.
const PRODUCT_FROM: &str = r"
    FROM storefront.product p
    JOIN storefront.category c ON c.id = p.category_id
    JOIN storefront.manufacturer m ON m.id = p.manufacturer_id
    JOIN LATERAL (
        SELECT COUNT(DISTINCT ss.shop_id) AS num_shops,
               COALESCE(SUM(ss.quantity), 0)::int8 AS num_products
        FROM storefront.color_variant cv
        JOIN storefront.shop_stock ss ON ss.color_variant_id = cv.id
        WHERE cv.product_id = p.id AND ss.quantity > 0
    ) stock ON TRUE
    LEFT JOIN LATERAL (
        SELECT ROUND(AVG(rv.rating)::numeric, 2) AS rating,
               COUNT(*) AS reviews_count
        FROM storefront.review rv
        WHERE rv.product_id = p.id
    ) reviews ON TRUE
";

const PRODUCT_COLUMNS: &str = r"
    SELECT p.id, p.name, p.price, p.sale, p.actual_price,
           c.name AS category, m.name AS manufacturer,
           stock.num_shops, stock.num_products, reviews.rating
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    price: Price,
    sale: Option<i32>,
    actual_price: Price,
    category: String,
    manufacturer: String,
    num_shops: i64,
    num_products: i64,
    rating: Option<Decimal>,
}

impl From<ProductRow> for ProductSummary {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: row.price,
            sale: row.sale,
            actual_price: row.actual_price,
            category: row.category,
            manufacturer: row.manufacturer,
            num_shops: row.num_shops,
            num_products: row.num_products,
            rating: row.rating,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductDetailRow {
    #[sqlx(flatten)]
    summary: ProductRow,
    description: String,
    category_slug: String,
    manufacturer_slug: String,
    manufacturer_country: String,
    reviews_count: i64,
}

/// A shop row, shared with the checkout store.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct ShopRow {
    id: i32,
    name: String,
    address: String,
    is_warehouse: bool,
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Self {
            id: ShopId::new(row.id),
            name: row.name,
            address: row.address,
            is_warehouse: row.is_warehouse,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockEntryRow {
    color_variant_id: i32,
    color: String,
    #[sqlx(flatten)]
    shop: ShopRow,
    quantity: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    description: String,
    slug: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ManufacturerRow {
    id: i32,
    name: String,
    slug: String,
    country: String,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: i32,
    product_id: i32,
    product_name: String,
    color: String,
    actual_price: Price,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active, in-stock products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductSummary>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(PRODUCT_COLUMNS);
        query.push(PRODUCT_FROM);
        query.push(" WHERE p.is_active AND stock.num_products > 0");

        if let Some(category) = &filter.category {
            query.push(" AND c.slug = ").push_bind(category);
        }
        if let Some(manufacturer) = &filter.manufacturer {
            query.push(" AND m.slug = ").push_bind(manufacturer);
        }
        if let Some(min_price) = filter.min_price {
            query.push(" AND p.actual_price >= ").push_bind(min_price);
        }
        if let Some(max_price) = filter.max_price {
            query.push(" AND p.actual_price <= ").push_bind(max_price);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query
                .push(" AND p.search_vector @@ plainto_tsquery('simple', ")
                .push_bind(search)
                .push(")");
        }

        query.push(" ORDER BY ").push(filter.ordering.sql());
        query
            .push(" LIMIT ")
            .push_bind(filter.limit.clamp(1, ProductFilter::MAX_LIMIT));
        query.push(" OFFSET ").push_bind(filter.offset.max(0));

        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an active product with its stock breakdown.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<ProductDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductDetailRow>(&format!(
            r"
            {PRODUCT_COLUMNS},
                   p.description, c.slug AS category_slug, m.slug AS manufacturer_slug,
                   co.name AS manufacturer_country, reviews.reviews_count
            {PRODUCT_FROM}
            JOIN storefront.country co ON co.id = m.country_id
            WHERE p.id = $1 AND p.is_active
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let entries = sqlx::query_as::<_, StockEntryRow>(
            r"
            SELECT cv.id AS color_variant_id, col.name AS color,
                   sh.id, sh.name, sh.address, sh.is_warehouse,
                   ss.quantity
            FROM storefront.shop_stock ss
            JOIN storefront.color_variant cv ON cv.id = ss.color_variant_id
            JOIN storefront.color col ON col.id = cv.color_id
            JOIN storefront.shop sh ON sh.id = ss.shop_id
            WHERE cv.product_id = $1 AND ss.quantity > 0
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|row| StockEntry {
            color_variant_id: ColorVariantId::new(row.color_variant_id),
            color: row.color,
            shop: row.shop.into(),
            quantity: row.quantity,
        })
        .collect();

        let (offline_shops, online) = stock_breakdown(entries);

        Ok(Some(ProductDetail {
            summary: row.summary.into(),
            description: row.description,
            category_slug: row.category_slug,
            manufacturer_slug: row.manufacturer_slug,
            manufacturer_country: row.manufacturer_country,
            reviews_count: row.reviews_count,
            offline_shops,
            online,
        }))
    }

    /// Returns `true` if the product exists and is active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_is_active(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let (active,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM storefront.product WHERE id = $1 AND is_active)",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(active)
    }

    /// Get a color variant of an active product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_variant(&self, id: ColorVariantId) -> Result<Option<Variant>, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT cv.id, p.id AS product_id, p.name AS product_name,
                   col.name AS color, p.actual_price
            FROM storefront.color_variant cv
            JOIN storefront.product p ON p.id = cv.product_id
            JOIN storefront.color col ON col.id = cv.color_id
            WHERE cv.id = $1 AND p.is_active
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|row| Variant {
            id: ColorVariantId::new(row.id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            color: row.color,
            actual_price: row.actual_price,
        }))
    }

    /// List active categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, slug FROM storefront.category \
             WHERE is_active ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Category {
                id: CategoryId::new(row.id),
                name: row.name,
                description: row.description,
                slug: row.slug,
            })
            .collect())
    }

    /// List active manufacturers by name, with their country.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_manufacturers(&self) -> Result<Vec<Manufacturer>, RepositoryError> {
        let rows = sqlx::query_as::<_, ManufacturerRow>(
            r"
            SELECT m.id, m.name, m.slug, co.name AS country
            FROM storefront.manufacturer m
            JOIN storefront.country co ON co.id = m.country_id
            WHERE m.is_active
            ORDER BY m.name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Manufacturer {
                id: ManufacturerId::new(row.id),
                name: row.name,
                slug: row.slug,
                country: row.country,
            })
            .collect())
    }

    /// List shops offered for pickup (everything but the warehouse).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_pickup_shops(&self) -> Result<Vec<Shop>, RepositoryError> {
        let rows = sqlx::query_as::<_, ShopRow>(
            "SELECT id, name, address, is_warehouse FROM storefront.shop \
             WHERE NOT is_warehouse ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
