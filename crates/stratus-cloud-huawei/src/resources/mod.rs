//! Mutation builders for resource update routines
//!
//! An update routine compares the prior and desired attributes of a resource,
//! then hands the resulting `MutationRequest`s to
//! [`Orchestrator::apply_all`](stratus_cloud::Orchestrator::apply_all).

pub mod evs;
pub mod gaussdb_mysql;
pub mod geminidb;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Billing mode; prepaid changes are placed as orders and paid automatically
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChargingMode {
    #[default]
    PostPaid,
    PrePaid,
}

impl ChargingMode {
    pub fn is_prepaid(self) -> bool {
        self == ChargingMode::PrePaid
    }
}

/// One attribute whose prior and desired values differ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange<T> {
    pub field: &'static str,
    pub old: T,
    pub new: T,
}

impl<T: PartialEq + Clone> FieldChange<T> {
    /// `Some` only when the value actually changed
    pub fn detect(field: &'static str, old: &T, new: &T) -> Option<Self> {
        (old != new).then(|| Self {
            field,
            old: old.clone(),
            new: new.clone(),
        })
    }
}

/// Merge the auto-pay flag into `body` when the resource is prepaid.
///
/// `key` is the service's name for the flag (`is_auto_pay`, `isAutoPay`).
pub(crate) fn with_auto_pay(mut body: Value, charging: ChargingMode, key: &str) -> Value {
    if charging.is_prepaid() {
        if let Value::Object(map) = &mut body {
            map.insert(key.to_string(), Value::String("true".to_string()));
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_change_detects_differences_only() {
        assert!(FieldChange::detect("flavor", &"a".to_string(), &"a".to_string()).is_none());

        let change = FieldChange::detect("volume_size", &40, &100).unwrap();
        assert_eq!(change.field, "volume_size");
        assert_eq!((change.old, change.new), (40, 100));
    }

    #[test]
    fn test_auto_pay_only_for_prepaid() {
        let body = json!({"size": 100});
        assert_eq!(
            with_auto_pay(body.clone(), ChargingMode::PrePaid, "is_auto_pay"),
            json!({"size": 100, "is_auto_pay": "true"})
        );
        assert_eq!(with_auto_pay(body.clone(), ChargingMode::PostPaid, "is_auto_pay"), body);
    }

    #[test]
    fn test_charging_mode_serde() {
        let mode: ChargingMode = serde_json::from_str(r#""prePaid""#).unwrap();
        assert!(mode.is_prepaid());
        assert_eq!(ChargingMode::default(), ChargingMode::PostPaid);
    }
}
