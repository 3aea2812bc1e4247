use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, ProductId, Quantity};

use crate::condition::Condition;

/// Identity pair of an inventory record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub product_id: ProductId,
    pub condition: Condition,
}

impl RecordKey {
    pub fn new(product_id: ProductId, condition: Condition) -> Self {
        Self {
            product_id,
            condition,
        }
    }
}

impl core::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "product {} ({})", self.product_id, self.condition)
    }
}

/// Stock held for one (product, condition) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    pub key: RecordKey,
    pub name: Option<String>,
    pub quantity: Quantity,
    pub reorder_quantity: Quantity,
    pub restock_level: Quantity,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Entity for InventoryRecord {
    type Id = RecordKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl InventoryRecord {
    /// Apply a validated patch, returning the new state.
    ///
    /// `self` is untouched, so a caller that fails to persist the result has nothing
    /// to roll back.
    pub fn patched(&self, patch: &RecordPatch, now: DateTime<Utc>) -> InventoryRecord {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = Some(name.clone());
        }
        if let Some(q) = patch.quantity {
            next.quantity = q;
        }
        if let Some(q) = patch.reorder_quantity {
            next.reorder_quantity = q;
        }
        if let Some(q) = patch.restock_level {
            next.restock_level = q;
        }
        if let Some(active) = patch.active {
            next.active = active;
        }
        next.updated_at = now;
        next
    }

    /// Decrement stock for a fulfilled order.
    ///
    /// Ordering more than is on hand is a business-rule rejection, not a validation
    /// failure. Draining the stock exactly deactivates the record.
    pub fn checked_out(
        &self,
        ordered: OrderedQuantity,
        now: DateTime<Utc>,
    ) -> DomainResult<InventoryRecord> {
        let remaining = self.quantity.checked_sub(ordered.0).ok_or_else(|| {
            DomainError::not_allowed(format!(
                "cannot check out {} of {}: only {} in stock",
                ordered.0, self.key, self.quantity
            ))
        })?;

        let mut next = self.clone();
        next.quantity = remaining;
        if remaining.is_zero() {
            next.active = false;
        }
        next.updated_at = now;
        Ok(next)
    }
}

/// Raw create payload, after JSON decoding but before domain validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecordDraft {
    pub product_id: i64,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub reorder_quantity: Option<i64>,
    #[serde(default)]
    pub restock_level: Option<i64>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// A validated record that does not exist in the store yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub key: RecordKey,
    pub name: Option<String>,
    pub quantity: Quantity,
    pub reorder_quantity: Quantity,
    pub restock_level: Quantity,
    pub active: bool,
}

impl RecordDraft {
    /// Validate the draft; a missing or null condition means [`Condition::New`].
    pub fn validate(self) -> DomainResult<NewRecord> {
        let condition = match self.condition.as_deref() {
            Some(label) => label.parse()?,
            None => Condition::default(),
        };

        Ok(NewRecord {
            key: RecordKey::new(ProductId::new(self.product_id), condition),
            name: self.name,
            quantity: optional_quantity("quantity", self.quantity)?.unwrap_or_default(),
            reorder_quantity: optional_quantity("reorder_quantity", self.reorder_quantity)?
                .unwrap_or_default(),
            restock_level: optional_quantity("restock_level", self.restock_level)?
                .unwrap_or_default(),
            active: self.active.unwrap_or(true),
        })
    }
}

impl NewRecord {
    /// Materialize the first stored version of this record.
    pub fn into_record(self, now: DateTime<Utc>) -> InventoryRecord {
        InventoryRecord {
            key: self.key,
            name: self.name,
            quantity: self.quantity,
            reorder_quantity: self.reorder_quantity,
            restock_level: self.restock_level,
            active: self.active,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }
}

/// Raw update payload. Absent and `null` fields both mean "keep the stored value".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateFields {
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub reorder_quantity: Option<i64>,
    #[serde(default)]
    pub restock_level: Option<i64>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Validated partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub quantity: Option<Quantity>,
    pub reorder_quantity: Option<Quantity>,
    pub restock_level: Option<Quantity>,
    pub active: Option<bool>,
}

impl UpdateFields {
    /// Validate every field up front so an invalid one rejects the whole update.
    ///
    /// Identity fields may be echoed back in the payload but must match `key`.
    pub fn validate(self, key: &RecordKey) -> DomainResult<RecordPatch> {
        if let Some(product_id) = self.product_id {
            if ProductId::new(product_id) != key.product_id {
                return Err(DomainError::validation(format!(
                    "product_id {product_id} does not match the addressed record {}",
                    key.product_id
                )));
            }
        }
        if let Some(label) = self.condition.as_deref() {
            let condition: Condition = label.parse()?;
            if condition != key.condition {
                return Err(DomainError::validation(format!(
                    "condition '{condition}' does not match the addressed record '{}'",
                    key.condition
                )));
            }
        }

        Ok(RecordPatch {
            name: self.name,
            quantity: optional_quantity("quantity", self.quantity)?,
            reorder_quantity: optional_quantity("reorder_quantity", self.reorder_quantity)?,
            restock_level: optional_quantity("restock_level", self.restock_level)?,
            active: self.active,
        })
    }
}

/// Quantity requested by a checkout; always at least one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OrderedQuantity(Quantity);

impl OrderedQuantity {
    pub fn new(value: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::validation(format!(
                "ordered_quantity must be a positive integer, got {value}"
            )));
        }
        Ok(Self(Quantity::new(value)?))
    }

    pub fn get(self) -> i64 {
        self.0.get()
    }
}

fn optional_quantity(field: &str, value: Option<i64>) -> DomainResult<Option<Quantity>> {
    value.map(|v| Quantity::for_field(field, v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn t1() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    }

    fn monitor() -> InventoryRecord {
        RecordDraft {
            product_id: 1,
            condition: Some("new".into()),
            name: Some("monitor".into()),
            quantity: Some(10),
            reorder_quantity: Some(20),
            restock_level: Some(2),
            active: None,
        }
        .validate()
        .unwrap()
        .into_record(t0())
    }

    fn q(v: i64) -> Quantity {
        Quantity::new(v).unwrap()
    }

    #[test]
    fn draft_defaults() {
        let rec = RecordDraft {
            product_id: 5,
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(rec.key.condition, Condition::New);
        assert_eq!(rec.quantity, Quantity::ZERO);
        assert!(rec.active);
        assert_eq!(rec.name, None);
    }

    #[test]
    fn draft_rejects_unknown_condition_and_negative_quantities() {
        let bad_condition = RecordDraft {
            product_id: 5,
            condition: Some("mint".into()),
            ..Default::default()
        };
        assert!(matches!(bad_condition.validate(), Err(DomainError::Validation(_))));

        let negative = RecordDraft {
            product_id: 5,
            restock_level: Some(-1),
            ..Default::default()
        };
        let err = negative.validate().unwrap_err();
        assert!(err.to_string().contains("restock_level"));
    }

    #[test]
    fn new_record_starts_at_version_one() {
        let rec = monitor();
        assert_eq!(rec.version(), 1);
        assert_eq!(rec.created_at, rec.updated_at);
        assert_eq!(rec.id(), &RecordKey::new(ProductId::new(1), Condition::New));
    }

    #[test]
    fn patch_keeps_omitted_fields() {
        let rec = monitor();
        let patch = UpdateFields {
            quantity: Some(15),
            ..Default::default()
        }
        .validate(&rec.key)
        .unwrap();

        let next = rec.patched(&patch, t1());
        assert_eq!(next.quantity, q(15));
        assert_eq!(next.name.as_deref(), Some("monitor"));
        assert_eq!(next.reorder_quantity, q(20));
        assert_eq!(next.restock_level, q(2));
        assert!(next.active);
        assert_eq!(next.updated_at, t1());
        assert_eq!(next.created_at, t0());
    }

    #[test]
    fn one_invalid_field_rejects_the_whole_patch() {
        let rec = monitor();
        let fields = UpdateFields {
            name: Some("renamed".into()),
            quantity: Some(3),
            restock_level: Some(-4),
            ..Default::default()
        };
        assert!(matches!(fields.validate(&rec.key), Err(DomainError::Validation(_))));
    }

    #[test]
    fn patch_cannot_move_identity() {
        let rec = monitor();
        let other_id = UpdateFields {
            product_id: Some(2),
            ..Default::default()
        };
        assert!(other_id.validate(&rec.key).is_err());

        let other_condition = UpdateFields {
            condition: Some("used".into()),
            ..Default::default()
        };
        assert!(other_condition.validate(&rec.key).is_err());

        let echoed = UpdateFields {
            product_id: Some(1),
            condition: Some("NEW".into()),
            ..Default::default()
        };
        assert_eq!(echoed.validate(&rec.key).unwrap(), RecordPatch::default());
    }

    #[test]
    fn checkout_exact_stock_deactivates() {
        let rec = monitor();
        let next = rec.checked_out(OrderedQuantity::new(10).unwrap(), t1()).unwrap();
        assert_eq!(next.quantity, Quantity::ZERO);
        assert!(!next.active);
        assert_eq!(next.updated_at, t1());
    }

    #[test]
    fn checkout_partial_keeps_active() {
        let rec = monitor();
        let next = rec.checked_out(OrderedQuantity::new(4).unwrap(), t1()).unwrap();
        assert_eq!(next.quantity, q(6));
        assert!(next.active);
    }

    #[test]
    fn checkout_over_stock_is_not_allowed() {
        let rec = monitor();
        let err = rec
            .checked_out(OrderedQuantity::new(11).unwrap(), t1())
            .unwrap_err();
        assert!(matches!(err, DomainError::NotAllowed(_)));
    }

    #[test]
    fn ordered_quantity_must_be_positive() {
        assert!(OrderedQuantity::new(0).is_err());
        assert!(OrderedQuantity::new(-2).is_err());
        assert_eq!(OrderedQuantity::new(3).unwrap().get(), 3);
    }

    #[test]
    fn draft_decodes_from_json_with_nulls() {
        let draft: RecordDraft =
            serde_json::from_str(r#"{"product_id": 7, "condition": null, "quantity": 3}"#).unwrap();
        let rec = draft.validate().unwrap();
        assert_eq!(rec.key.condition, Condition::New);
        assert_eq!(rec.quantity, q(3));
    }

    #[test]
    fn update_fields_reject_wrong_types_at_decode() {
        assert!(serde_json::from_str::<UpdateFields>(r#"{"quantity": "100"}"#).is_err());
        assert!(serde_json::from_str::<UpdateFields>(r#"{"name": 12}"#).is_err());
        assert!(serde_json::from_str::<UpdateFields>(r#"{"quantity": 1.5}"#).is_err());
        let ok: UpdateFields =
            serde_json::from_str(r#"{"quantity": null, "updated_at": "whatever"}"#).unwrap();
        assert_eq!(ok, UpdateFields::default());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: checkout never leaves negative stock, is rejected exactly when the
            /// order exceeds stock, and deactivates exactly when stock hits zero.
            #[test]
            fn checkout_respects_stock(stock in 0i64..500, ordered in 1i64..600) {
                let mut rec = monitor();
                rec.quantity = q(stock);

                match rec.checked_out(OrderedQuantity::new(ordered).unwrap(), t1()) {
                    Ok(next) => {
                        prop_assert!(ordered <= stock);
                        prop_assert_eq!(next.quantity.get(), stock - ordered);
                        prop_assert_eq!(next.active, stock != ordered);
                    }
                    Err(e) => {
                        prop_assert!(ordered > stock);
                        prop_assert!(matches!(e, DomainError::NotAllowed(_)));
                    }
                }
            }

            /// Property: a patch containing any negative quantity is rejected as a whole.
            #[test]
            fn negative_field_rejects_patch(
                quantity in -50i64..50,
                reorder in -50i64..50,
                restock in -50i64..50
            ) {
                let rec = monitor();
                let result = UpdateFields {
                    quantity: Some(quantity),
                    reorder_quantity: Some(reorder),
                    restock_level: Some(restock),
                    ..Default::default()
                }
                .validate(&rec.key);

                let any_negative = quantity < 0 || reorder < 0 || restock < 0;
                prop_assert_eq!(result.is_err(), any_negative);
            }
        }
    }
}
