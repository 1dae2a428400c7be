//! Product review repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shop_online_core::{ProductId, ReviewId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Review;

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    product_id: i32,
    user_id: i32,
    author: String,
    text: String,
    rating: i16,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: ReviewId::new(row.id),
            product_id: ProductId::new(row.product_id),
            user_id: UserId::new(row.user_id),
            author: row.author,
            text: row.text,
            rating: row.rating,
            created_at: row.created_at,
        }
    }
}

/// Selects review columns plus the author's username from a CTE or table
/// aliased `r`.
const REVIEW_SELECT: &str = r"
    SELECT r.id, r.product_id, r.user_id, u.username AS author, r.text, r.rating, r.created_at
";

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a product's reviews, newest first, optionally only those with
    /// the given rating.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product: ProductId,
        rating: Option<i16>,
    ) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            {REVIEW_SELECT}
            FROM storefront.review r
            JOIN storefront.user u ON u.id = r.user_id
            WHERE r.product_id = $1 AND ($2::int2 IS NULL OR r.rating = $2)
            ORDER BY r.created_at DESC, r.id DESC
            "
        ))
        .bind(product)
        .bind(rating)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a review by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            {REVIEW_SELECT}
            FROM storefront.review r
            JOIN storefront.user u ON u.id = r.user_id
            WHERE r.id = $1
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        product: ProductId,
        user: UserId,
        text: &str,
        rating: i16,
    ) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            WITH r AS (
                INSERT INTO storefront.review (product_id, user_id, text, rating)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            {REVIEW_SELECT}
            FROM r
            JOIN storefront.user u ON u.id = r.user_id
            "
        ))
        .bind(product)
        .bind(user)
        .bind(text)
        .bind(rating)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "review for this product"))?;

        Ok(row.into())
    }

    /// Update a review's text and/or rating. `None` leaves a field unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: ReviewId,
        text: Option<&str>,
        rating: Option<i16>,
    ) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r"
            WITH r AS (
                UPDATE storefront.review
                SET text = COALESCE($2, text), rating = COALESCE($3, rating)
                WHERE id = $1
                RETURNING *
            )
            {REVIEW_SELECT}
            FROM r
            JOIN storefront.user u ON u.id = r.user_id
            "
        ))
        .bind(id)
        .bind(text)
        .bind(rating)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.review WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
