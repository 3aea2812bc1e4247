//! List filters: parsing raw query parameters into a typed conjunction of predicates.

use core::str::FromStr;

use serde::Deserialize;

use stockroom_core::{DomainError, DomainResult, Quantity};

use crate::condition::Condition;
use crate::record::InventoryRecord;

/// Comparison applied to a record's quantity.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum QuantityOperator {
    #[default]
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl QuantityOperator {
    /// SQL comparison operator.
    pub fn as_sql(self) -> &'static str {
        match self {
            QuantityOperator::Eq => "=",
            QuantityOperator::Ne => "<>",
            QuantityOperator::Gt => ">",
            QuantityOperator::Ge => ">=",
            QuantityOperator::Lt => "<",
            QuantityOperator::Le => "<=",
        }
    }

    pub fn compare(self, actual: Quantity, expected: Quantity) -> bool {
        match self {
            QuantityOperator::Eq => actual == expected,
            QuantityOperator::Ne => actual != expected,
            QuantityOperator::Gt => actual > expected,
            QuantityOperator::Ge => actual >= expected,
            QuantityOperator::Lt => actual < expected,
            QuantityOperator::Le => actual <= expected,
        }
    }
}

impl FromStr for QuantityOperator {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "=" | "==" => Ok(QuantityOperator::Eq),
            "ne" | "!=" | "<>" => Ok(QuantityOperator::Ne),
            "gt" | ">" => Ok(QuantityOperator::Gt),
            "ge" | "gte" | ">=" => Ok(QuantityOperator::Ge),
            "lt" | "<" => Ok(QuantityOperator::Lt),
            "le" | "lte" | "<=" => Ok(QuantityOperator::Le),
            _ => Err(DomainError::validation(format!(
                "operator must be one of: eq, ne, gt, ge, lt, le (got '{s}')"
            ))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QuantityFilter {
    pub operator: QuantityOperator,
    pub value: Quantity,
}

/// Conjunction of optional predicates over inventory records.
///
/// An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Case-insensitive substring of the record name.
    pub name: Option<String>,
    pub condition: Option<Condition>,
    pub quantity: Option<QuantityFilter>,
    pub active: Option<bool>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.condition.is_none() && self.quantity.is_none() && self.active.is_none()
    }

    pub fn matches(&self, record: &InventoryRecord) -> bool {
        if let Some(needle) = &self.name {
            let needle = needle.to_lowercase();
            match &record.name {
                Some(name) if name.to_lowercase().contains(&needle) => {}
                _ => return false,
            }
        }
        if let Some(condition) = self.condition {
            if record.key.condition != condition {
                return false;
            }
        }
        if let Some(q) = self.quantity {
            if !q.operator.compare(record.quantity, q.value) {
                return false;
            }
        }
        if let Some(active) = self.active {
            if record.active != active {
                return false;
            }
        }
        true
    }

    /// `ILIKE` pattern for the name predicate, with `%`, `_` and `\` escaped.
    pub fn name_like_pattern(&self) -> Option<String> {
        self.name.as_ref().map(|needle| {
            let mut pattern = String::with_capacity(needle.len() + 2);
            pattern.push('%');
            for ch in needle.chars() {
                if matches!(ch, '%' | '_' | '\\') {
                    pattern.push('\\');
                }
                pattern.push(ch);
            }
            pattern.push('%');
            pattern
        })
    }
}

/// Raw list query parameters, as they arrive in the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub active: Option<String>,
}

impl FilterParams {
    pub fn into_filter(self) -> DomainResult<RecordFilter> {
        let name = self.name.filter(|n| !n.trim().is_empty());

        let condition = self
            .condition
            .as_deref()
            .map(Condition::from_str)
            .transpose()?;

        let quantity = match (self.quantity.as_deref(), self.operator.as_deref()) {
            (None, None) => None,
            (None, Some(_)) => {
                return Err(DomainError::validation("operator requires a quantity filter"));
            }
            (Some(raw), op) => {
                let value: i64 = raw.trim().parse().map_err(|_| {
                    DomainError::validation(format!("quantity must be an integer, got '{raw}'"))
                })?;
                let operator = op.map(QuantityOperator::from_str).transpose()?.unwrap_or_default();
                Some(QuantityFilter {
                    operator,
                    value: Quantity::for_field("quantity", value)?,
                })
            }
        };

        let active = self.active.as_deref().map(parse_bool).transpose()?;

        Ok(RecordFilter {
            name,
            condition,
            quantity,
            active,
        })
    }
}

fn parse_bool(raw: &str) -> DomainResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(DomainError::validation(format!("active must be true or false, got '{raw}'"))),
    }
}
