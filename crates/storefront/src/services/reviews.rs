//! Review service: one review per customer per product, editable by its
//! author or by staff.

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use shop_online_core::{ProductId, ReviewId};

use crate::db::{CatalogRepository, RepositoryError, ReviewRepository};
use crate::models::{CurrentUser, Review};

const MAX_TEXT_LENGTH: usize = 1000;
const RATING_RANGE: std::ops::RangeInclusive<i16> = 1..=5;

/// Errors that can occur during review operations.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// The product doesn't exist or is inactive.
    #[error("product not found")]
    ProductNotFound,

    /// The review doesn't exist.
    #[error("review not found")]
    NotFound,

    /// The user already reviewed this product.
    #[error("you have already reviewed this product")]
    AlreadyReviewed,

    /// Only the author or staff may change a review.
    #[error("only the author can change this review")]
    Forbidden,

    /// Text or rating out of bounds.
    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A new review.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub text: String,
    pub rating: i16,
}

/// A partial review edit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewEdit {
    pub text: Option<String>,
    pub rating: Option<i16>,
}

/// Review service.
pub struct ReviewService<'a> {
    reviews: ReviewRepository<'a>,
    catalog: CatalogRepository<'a>,
}

impl<'a> ReviewService<'a> {
    /// Create a new review service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            reviews: ReviewRepository::new(pool),
            catalog: CatalogRepository::new(pool),
        }
    }

    /// List a product's reviews, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidField` for a rating filter outside 1..=5.
    pub async fn list(
        &self,
        product: ProductId,
        rating: Option<i16>,
    ) -> Result<Vec<Review>, ReviewError> {
        if let Some(rating) = rating {
            check_rating(rating)?;
        }
        Ok(self.reviews.list_for_product(product, rating).await?)
    }

    /// Review a product.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::ProductNotFound` for unknown or inactive products.
    /// Returns `ReviewError::AlreadyReviewed` on a second review by the same user.
    pub async fn create(
        &self,
        user: &CurrentUser,
        product: ProductId,
        review: NewReview,
    ) -> Result<Review, ReviewError> {
        let text = check_text(&review.text)?;
        check_rating(review.rating)?;

        if !self.catalog.product_is_active(product).await? {
            return Err(ReviewError::ProductNotFound);
        }

        let review = self
            .reviews
            .create(product, user.id, &text, review.rating)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ReviewError::AlreadyReviewed,
                other => ReviewError::Repository(other),
            })?;

        info!(review_id = %review.id, product_id = %product, "review created");
        Ok(review)
    }

    /// Edit a review.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Forbidden` unless the user wrote the review or is staff.
    pub async fn update(
        &self,
        user: &CurrentUser,
        id: ReviewId,
        edit: ReviewEdit,
    ) -> Result<Review, ReviewError> {
        let text = edit.text.as_deref().map(check_text).transpose()?;
        if let Some(rating) = edit.rating {
            check_rating(rating)?;
        }

        self.authorize(user, id).await?;

        self.reviews
            .update(id, text.as_deref(), edit.rating)
            .await
            .map_err(not_found)
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Forbidden` unless the user wrote the review or is staff.
    pub async fn delete(&self, user: &CurrentUser, id: ReviewId) -> Result<(), ReviewError> {
        self.authorize(user, id).await?;
        self.reviews.delete(id).await.map_err(not_found)?;
        info!(review_id = %id, "review deleted");
        Ok(())
    }

    async fn authorize(&self, user: &CurrentUser, id: ReviewId) -> Result<(), ReviewError> {
        let review = self.reviews.get(id).await?.ok_or(ReviewError::NotFound)?;
        if can_modify(user, &review) {
            Ok(())
        } else {
            Err(ReviewError::Forbidden)
        }
    }
}

fn not_found(e: RepositoryError) -> ReviewError {
    match e {
        RepositoryError::NotFound => ReviewError::NotFound,
        other => ReviewError::Repository(other),
    }
}

fn can_modify(user: &CurrentUser, review: &Review) -> bool {
    user.is_staff || review.user_id == user.id
}

fn check_text(text: &str) -> Result<String, ReviewError> {
    let text = text.trim();
    let len = text.chars().count();
    if len == 0 || len > MAX_TEXT_LENGTH {
        return Err(ReviewError::InvalidField {
            field: "text",
            message: format!("must be between 1 and {MAX_TEXT_LENGTH} characters"),
        });
    }
    Ok(text.to_owned())
}

fn check_rating(rating: i16) -> Result<(), ReviewError> {
    if RATING_RANGE.contains(&rating) {
        Ok(())
    } else {
        Err(ReviewError::InvalidField {
            field: "rating",
            message: "must be between 1 and 5".to_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use shop_online_core::{UserId, Username};

    use super::*;

    fn user(id: i32, is_staff: bool) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            username: Username::parse(&format!("user{id}")).unwrap(),
            is_staff,
        }
    }

    fn review_by(author: i32) -> Review {
        Review {
            id: ReviewId::new(1),
            product_id: ProductId::new(1),
            user_id: UserId::new(author),
            author: format!("user{author}"),
            text: "Bright and sturdy".to_owned(),
            rating: 5,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_author_and_staff_may_modify() {
        let review = review_by(1);
        assert!(can_modify(&user(1, false), &review));
        assert!(can_modify(&user(2, true), &review));
        assert!(!can_modify(&user(2, false), &review));
    }

    #[test]
    fn test_text_bounds() {
        assert_eq!(check_text("  fine  ").unwrap(), "fine");
        assert!(check_text("   ").is_err());
        assert!(check_text(&"x".repeat(1000)).is_ok());
        assert!(check_text(&"x".repeat(1001)).is_err());
    }

    #[test]
    fn test_rating_bounds() {
        assert!(check_rating(1).is_ok());
        assert!(check_rating(5).is_ok());
        assert!(matches!(
            check_rating(0),
            Err(ReviewError::InvalidField { field: "rating", .. })
        ));
        assert!(check_rating(6).is_err());
    }
}
