//! Order total computation.
//!
//! An order total is `Σ(unit price × quantity)` over its lines, computed once
//! when the order is created and stored; it is never recomputed afterwards.

use crate::types::{Price, PriceError, VariantId};

/// Errors that can occur while pricing an order.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// The order has no lines.
    #[error("an order needs at least one item")]
    Empty,
    /// A line has quantity zero.
    #[error("quantity for variant {0} must be at least 1")]
    ZeroQuantity(VariantId),
    /// The same variant appears twice.
    #[error("variant {0} appears more than once")]
    DuplicateVariant(VariantId),
    /// The total exceeds what an order can hold.
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// One priced order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    /// Variant being bought.
    pub variant_id: VariantId,
    /// Unit price captured when the order is created.
    pub unit_price: Price,
    /// Number of units.
    pub quantity: u32,
}

impl LineAmount {
    /// `unit_price × quantity`.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` on decimal overflow.
    pub fn total(&self) -> Result<Price, PriceError> {
        self.unit_price.times(self.quantity)
    }
}

/// Compute the total of an order.
///
/// # Errors
///
/// Returns `PricingError::Empty` for an empty order,
/// `PricingError::ZeroQuantity` for a zero-quantity line,
/// `PricingError::DuplicateVariant` when a variant is listed twice and
/// `PricingError::Price` when the total can't be stored.
pub fn order_total(lines: &[LineAmount]) -> Result<Price, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::Empty);
    }

    let mut seen = std::collections::HashSet::with_capacity(lines.len());
    let mut total = Price::ZERO;
    for line in lines {
        if line.quantity == 0 {
            return Err(PricingError::ZeroQuantity(line.variant_id));
        }
        if !seen.insert(line.variant_id) {
            return Err(PricingError::DuplicateVariant(line.variant_id));
        }
        total = total.checked_add(line.total()?)?;
    }

    Ok(total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(variant: i32, cents: i64, quantity: u32) -> LineAmount {
        LineAmount {
            variant_id: VariantId::new(variant),
            unit_price: Price::from_cents(cents).unwrap(),
            quantity,
        }
    }

    #[test]
    fn test_total_sums_lines() {
        let total = order_total(&[line(1, 1999, 2), line(2, 500, 3)]).unwrap();
        assert_eq!(total, Price::from_cents(5498).unwrap());
    }

    #[test]
    fn test_empty_order_rejected() {
        assert_eq!(order_total(&[]), Err(PricingError::Empty));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert_eq!(
            order_total(&[line(4, 100, 0)]),
            Err(PricingError::ZeroQuantity(VariantId::new(4)))
        );
    }

    #[test]
    fn test_total_beyond_storable_amount_rejected() {
        let line = LineAmount {
            variant_id: VariantId::new(1),
            unit_price: Price::MAX_UNIT,
            quantity: 101,
        };
        assert_eq!(
            order_total(&[line]),
            Err(PricingError::Price(PriceError::Overflow))
        );
    }

    #[test]
    fn test_duplicate_variant_rejected() {
        assert_eq!(
            order_total(&[line(4, 100, 1), line(4, 100, 2)]),
            Err(PricingError::DuplicateVariant(VariantId::new(4)))
        );
    }
}
