//! Monetary amounts using decimal arithmetic.
//!
//! Order totals are always derived from item lines, so the only arithmetic the
//! system needs is `price × quantity` and summation. Keeping it in one type
//! avoids float rounding drift between the stored total and the item lines.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount of money in the store's single currency.
///
/// The currency itself is a deployment setting, not part of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build an amount from minor units (e.g. `5000` → `50.00`).
    #[must_use]
    pub fn from_minor(minor: i64) -> Self {
        Self(Decimal::new(minor, 2))
    }

    /// The underlying decimal.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Total for one order line: `price × quantity`.
    ///
    /// Non-positive quantities contribute nothing.
    #[must_use]
    pub fn line_total(price: Self, quantity: i32) -> Self {
        if quantity <= 0 {
            return Self::ZERO;
        }
        Self(price.0 * Decimal::from(quantity))
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
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
    fn test_line_total_multiplies_price_by_quantity() {
        let price = Money::from_minor(5000);
        assert_eq!(Money::line_total(price, 2), Money::from_minor(10_000));
    }

    #[test]
    fn test_line_total_ignores_removed_lines() {
        let price = Money::from_minor(3000);
        assert_eq!(Money::line_total(price, 0), Money::ZERO);
        assert_eq!(Money::line_total(price, -3), Money::ZERO);
    }

    #[test]
    fn test_sum_of_lines() {
        let total: Money = [
            Money::line_total(Money::from_minor(5000), 2),
            Money::line_total(Money::from_minor(3000), 1),
        ]
        .into_iter()
        .sum();
        assert_eq!(total, Money::from_minor(13_000));
        assert_eq!(total.to_string(), "130.00");
    }

    #[test]
    fn test_decimal_precision_survives_addition() {
        let total = Money::from_minor(10) + Money::from_minor(20);
        assert_eq!(total, Money::from_minor(30));
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::from_minor(1250)).unwrap();
        assert_eq!(json, "\"12.50\"");
    }
}
