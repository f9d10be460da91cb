//! Non-negative monetary amounts.
//!
//! Prices are kept as [`Decimal`] in the store's currency (euros, not cents).
//! Stripe wants integer minor units, so conversion happens once at the edge
//! through [`Price::to_minor_units`].
//!
//! Amounts are bounded by their columns: catalog prices are `NUMERIC(10, 2)`
//! and order totals `NUMERIC(12, 2)`.

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is negative.
    #[error("price cannot be negative")]
    Negative,
    /// The amount has more than two decimal places.
    #[error("price cannot have more than two decimal places")]
    TooPrecise,
    /// The amount exceeds what can be stored.
    #[error("price is too large")]
    Overflow,
}

/// A non-negative amount with at most two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// A zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest amount of any kind, an order total: 9 999 999 999.99.
    pub const MAX: Self = Self(Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2));

    /// Largest catalog price: 99 999 999.99.
    pub const MAX_UNIT: Self = Self(Decimal::from_parts(0x540B_E3FF, 0x2, 0, false, 2));

    /// Create a price, validating sign, scale and magnitude.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` for negative amounts,
    /// `PriceError::TooPrecise` for more than two decimal places and
    /// `PriceError::Overflow` above [`Price::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        let normalized = amount.normalize();
        if normalized.scale() > 2 {
            return Err(PriceError::TooPrecise);
        }
        if normalized > Self::MAX.0 {
            return Err(PriceError::Overflow);
        }
        Ok(Self(normalized))
    }

    /// Check that the amount fits a catalog price.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` above [`Price::MAX_UNIT`].
    pub fn unit(self) -> Result<Self, PriceError> {
        if self > Self::MAX_UNIT {
            return Err(PriceError::Overflow);
        }
        Ok(self)
    }

    /// Build a price from integer cents.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `cents` is negative.
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Amount in minor units (cents), as Stripe expects.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if the amount does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, PriceError> {
        (self.0 * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or(PriceError::Overflow)
    }

    /// Multiply by a quantity.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` above [`Price::MAX`].
    pub fn times(&self, quantity: u32) -> Result<Self, PriceError> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .ok_or(PriceError::Overflow)
            .and_then(Self::new)
    }

    /// Add two prices.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` above [`Price::MAX`].
    pub fn checked_add(&self, other: Self) -> Result<Self, PriceError> {
        self.0
            .checked_add(other.0)
            .ok_or(PriceError::Overflow)
            .and_then(Self::new)
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

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
        Ok(Self::new(amount)?)
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

    #[test]
    fn test_rejects_negative_and_fractional_cents() {
        assert_eq!(Price::new(Decimal::new(-1, 0)), Err(PriceError::Negative));
        assert_eq!(Price::new(Decimal::new(1999, 3)), Err(PriceError::TooPrecise));
        // Trailing zeros are not extra precision
        assert!(Price::new(Decimal::new(19_900, 3)).is_ok());
    }

    #[test]
    fn test_amounts_bounded_by_columns() {
        assert_eq!(Price::MAX.to_string(), "9999999999.99");
        assert_eq!(Price::MAX_UNIT.to_string(), "99999999.99");

        assert_eq!(
            Price::new(Decimal::new(1_000_000_000_000, 2)),
            Err(PriceError::Overflow)
        );
        assert!(serde_json::from_str::<Price>("\"100000000000\"").is_err());

        let unit = Price::new(Decimal::new(10_000_000_000, 2)).unwrap();
        assert_eq!(unit.unit(), Err(PriceError::Overflow));
        assert_eq!(Price::MAX_UNIT.unit(), Ok(Price::MAX_UNIT));

        assert_eq!(Price::MAX_UNIT.times(1000), Err(PriceError::Overflow));
        assert_eq!(
            Price::MAX.checked_add(Price::from_cents(1).unwrap()),
            Err(PriceError::Overflow)
        );
    }

    #[test]
    fn test_minor_units() {
        let price = Price::new(Decimal::new(2999, 2)).unwrap();
        assert_eq!(price.to_minor_units().unwrap(), 2999);
        assert_eq!(Price::ZERO.to_minor_units().unwrap(), 0);
    }

    #[test]
    fn test_times_and_display() {
        let price = Price::from_cents(1250).unwrap();
        assert_eq!(price.times(3).unwrap().to_string(), "37.50");
        assert_eq!(price.times(0).unwrap(), Price::ZERO);
    }

    #[test]
    fn test_serde_uses_decimal_strings() {
        let price = Price::from_cents(4990).unwrap();
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"49.9\"");
        let back: Price = serde_json::from_str("\"49.90\"").unwrap();
        assert_eq!(back, price);
        assert!(serde_json::from_str::<Price>("\"-3\"").is_err());
    }
}
