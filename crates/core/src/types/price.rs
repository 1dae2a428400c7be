//! Decimal prices and percentage discounts.
//!
//! Prices are stored with two decimal places. A product's *actual* price is
//! derived from its list price and optional discount, rounding up (away from
//! zero) to the cent:
//!
//! ```
//! use rust_decimal::Decimal;
//! use shop_online_core::{Discount, Price};
//!
//! let list = Price::new(Decimal::new(9999, 2)).unwrap();
//! let discount = Discount::from_sale(Some(33)).unwrap();
//! assert_eq!(list.with_discount(discount).to_string(), "67.00");
//! ```

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`] or [`Discount`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is negative.
    #[error("price cannot be negative")]
    Negative,
    /// The amount has more than two decimal places.
    #[error("price must have at most 2 decimal places, got {scale}")]
    TooPrecise {
        /// Scale of the rejected amount.
        scale: u32,
    },
    /// The discount percentage is outside 0..=99.
    #[error("discount must be between 0 and {max} percent, got {value}")]
    InvalidDiscount {
        /// The rejected percentage.
        value: i64,
        /// Largest accepted percentage.
        max: u8,
    },
}

/// A non-negative monetary amount with exactly two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero, the total of an empty cart.
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, 2));

    /// Smallest price a product may be sold at.
    pub const MIN_ACTUAL: Self = Self(Decimal::from_parts(1, 0, 0, false, 2));

    const SCALE: u32 = 2;

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is negative or has more than two
    /// decimal places.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }

        let scale = amount.normalize().scale();
        if scale > Self::SCALE {
            return Err(PriceError::TooPrecise { scale });
        }

        Ok(Self::rescaled(amount))
    }

    fn rescaled(mut amount: Decimal) -> Self {
        amount.rescale(Self::SCALE);
        Self(amount)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Apply an optional discount, rounding up to the cent.
    ///
    /// `None` (no discount) returns the list price unchanged.
    #[must_use]
    pub fn with_discount(self, discount: Option<Discount>) -> Self {
        let Some(discount) = discount else {
            return self;
        };

        let keep = Decimal::ONE_HUNDRED - Decimal::from(discount.percent());
        let discounted = (self.0 * keep / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(Self::SCALE, RoundingStrategy::AwayFromZero);

        Self::rescaled(discounted)
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn line_total(self, quantity: u32) -> Self {
        Self::rescaled(self.0 * Decimal::from(quantity))
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::rescaled(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

/// A percentage discount between 1 and 99.
///
/// A stored sale of `0` (or no sale at all) means "not discounted" and is
/// represented as `None` rather than a zero discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Discount(u8);

impl Discount {
    /// Largest accepted discount percentage.
    pub const MAX_PERCENT: u8 = 99;

    /// Interpret a stored sale percentage.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::InvalidDiscount`] for values outside 0..=99.
    pub fn from_sale(sale: Option<i32>) -> Result<Option<Self>, PriceError> {
        match sale {
            None | Some(0) => Ok(None),
            Some(value) => u8::try_from(value)
                .ok()
                .filter(|percent| *percent <= Self::MAX_PERCENT)
                .map(|percent| Some(Self(percent)))
                .ok_or(PriceError::InvalidDiscount {
                    value: i64::from(value),
                    max: Self::MAX_PERCENT,
                }),
        }
    }

    /// The discount in whole percent.
    #[must_use]
    pub const fn percent(&self) -> u8 {
        self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // NUMERIC(10, 2) columns with CHECK constraints
        Ok(Self::rescaled(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn price(s: &str) -> Price {
        Price::new(s.parse().unwrap()).unwrap()
    }

    fn discount(percent: i32) -> Option<Discount> {
        Discount::from_sale(Some(percent)).unwrap()
    }

    #[test]
    fn test_ten_percent_off_one_hundred() {
        assert_eq!(price("100.00").with_discount(discount(10)), price("90.00"));
    }

    #[test]
    fn test_discount_rounds_up_to_the_cent() {
        // 99.99 * 0.67 = 66.9933
        assert_eq!(price("99.99").with_discount(discount(33)), price("67.00"));
        // 10.01 * 0.5 = 5.005
        assert_eq!(price("10.01").with_discount(discount(50)), price("5.01"));
    }

    #[test]
    fn test_no_discount_keeps_list_price() {
        let list = price("49.95");
        assert_eq!(list.with_discount(None), list);
        assert_eq!(list.with_discount(Discount::from_sale(Some(0)).unwrap()), list);
        assert_eq!(list.with_discount(Discount::from_sale(None).unwrap()), list);
    }

    #[test]
    fn test_max_discount_never_reaches_zero() {
        assert_eq!(
            Price::MIN_ACTUAL.with_discount(discount(99)),
            Price::MIN_ACTUAL
        );
    }

    #[test]
    fn test_discount_out_of_range() {
        assert!(matches!(
            Discount::from_sale(Some(100)),
            Err(PriceError::InvalidDiscount { value: 100, .. })
        ));
        assert!(matches!(
            Discount::from_sale(Some(-5)),
            Err(PriceError::InvalidDiscount { value: -5, .. })
        ));
    }

    #[test]
    fn test_rejects_negative_and_sub_cent_amounts() {
        assert_eq!(
            Price::new("-1.00".parse().unwrap()),
            Err(PriceError::Negative)
        );
        assert_eq!(
            Price::new("1.005".parse().unwrap()),
            Err(PriceError::TooPrecise { scale: 3 })
        );
        // Trailing zeros beyond the cent are fine
        assert_eq!(Price::new("1.5000".parse().unwrap()).unwrap(), price("1.50"));
    }

    #[test]
    fn test_line_total_and_sum() {
        let lines = [price("67.00").line_total(3), price("0.99").line_total(2)];
        assert_eq!(lines.iter().copied().sum::<Price>(), price("202.98"));
        assert_eq!(core::iter::empty::<Price>().sum::<Price>(), Price::ZERO);
    }

    #[test]
    fn test_serializes_as_string_with_two_decimals() {
        let json = serde_json::to_string(&price("90")).unwrap();
        assert_eq!(json, "\"90.00\"");
    }
}
