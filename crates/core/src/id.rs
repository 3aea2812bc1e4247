//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a catalogue product.
///
/// Product ids are assigned by the catalogue, not by this service, so this is a
/// plain integer newtype rather than a generated id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for ProductId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<ProductId> for i64 {
    fn from(value: ProductId) -> Self {
        value.0
    }
}

impl FromStr for ProductId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| DomainError::invalid_id(format!("product id must be an integer, got '{s}'")))
    }
}
