//! Validated value types, compared by value.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A stock count that can never be negative.
///
/// Stored as `i64` so it binds directly to a `BIGINT` column; the constructor is
/// the only way in, which keeps the non-negative invariant for every instance.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    pub fn new(value: i64) -> DomainResult<Self> {
        if value < 0 {
            return Err(DomainError::validation(format!(
                "quantity must be non-negative, got {value}"
            )));
        }
        Ok(Self(value))
    }

    /// Like [`Quantity::new`], but names the offending field in the error.
    pub fn for_field(field: &str, value: i64) -> DomainResult<Self> {
        Self::new(value).map_err(|_| {
            DomainError::validation(format!("{field} must be a non-negative integer, got {value}"))
        })
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtract `other`, returning `None` if the result would go negative.
    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        let left = self.0.checked_sub(other.0)?;
        (left >= 0).then_some(Quantity(left))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_negative_values() {
        assert!(Quantity::new(-1).is_err());
        assert_eq!(Quantity::new(0).unwrap(), Quantity::ZERO);
        let err = Quantity::for_field("restock_level", -3).unwrap_err();
        assert!(err.to_string().contains("restock_level"));
    }

    #[test]
    fn checked_sub_stops_at_zero() {
        let ten = Quantity::new(10).unwrap();
        assert_eq!(ten.checked_sub(ten), Some(Quantity::ZERO));
        assert_eq!(ten.checked_sub(Quantity::new(11).unwrap()), None);
    }

    proptest! {
        /// Property: every constructed quantity is non-negative and subtraction never
        /// produces a negative one.
        #[test]
        fn never_negative(a in 0i64..1_000_000, b in 0i64..1_000_000) {
            let qa = Quantity::new(a).unwrap();
            let qb = Quantity::new(b).unwrap();
            match qa.checked_sub(qb) {
                Some(left) => {
                    prop_assert!(left.get() >= 0);
                    prop_assert_eq!(left.get(), a - b);
                }
                None => prop_assert!(b > a),
            }
        }
    }
}
