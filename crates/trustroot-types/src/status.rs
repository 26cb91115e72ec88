//! Status conditions reported on a declaration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason set when conversion or validation of the trust material failed
pub const REASON_KEYS_INVALID: &str = "KeysInvalid";

/// Reason set when writing the shared store failed
pub const REASON_STORE_UPDATE_FAILED: &str = "StoreUpdateFailed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ConditionType {
    /// Summary condition, true when every sub-condition is true
    Ready,
    /// The trust material parsed into a trusted root
    KeysParsed,
    /// The trusted root is present in the shared store
    StoreUpdated,
}

impl ConditionType {
    const DEPENDENTS: [ConditionType; 2] = [ConditionType::KeysParsed, ConditionType::StoreUpdated];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    fn same_state(&self, other: &Condition) -> bool {
        self.status == other.status && self.reason == other.reason && self.message == other.message
    }
}

/// Observed state of a declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustRootStatus {
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl TrustRootStatus {
    /// Set every condition that is not yet present to `Unknown`
    pub fn initialize_conditions(&mut self) {
        for type_ in [
            ConditionType::Ready,
            ConditionType::KeysParsed,
            ConditionType::StoreUpdated,
        ] {
            if self.condition(type_).is_none() {
                self.set(type_, ConditionStatus::Unknown, None, None);
            }
        }
    }

    pub fn condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    pub fn is_ready(&self) -> bool {
        self.condition(ConditionType::Ready)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    pub fn mark_keys_parsed(&mut self) {
        self.set(ConditionType::KeysParsed, ConditionStatus::True, None, None);
    }

    pub fn mark_keys_invalid(&mut self, message: impl Into<String>) {
        self.set(
            ConditionType::KeysParsed,
            ConditionStatus::False,
            Some(REASON_KEYS_INVALID.to_string()),
            Some(message.into()),
        );
    }

    pub fn mark_store_updated(&mut self) {
        self.set(ConditionType::StoreUpdated, ConditionStatus::True, None, None);
    }

    pub fn mark_store_update_failed(&mut self, message: impl Into<String>) {
        self.set(
            ConditionType::StoreUpdated,
            ConditionStatus::False,
            Some(REASON_STORE_UPDATE_FAILED.to_string()),
            Some(message.into()),
        );
    }

    /// Compare conditions without their transition times
    pub fn same_conditions(&self, other: &TrustRootStatus) -> bool {
        self.observed_generation == other.observed_generation
            && self.conditions.len() == other.conditions.len()
            && self.conditions.iter().all(|c| {
                other
                    .condition(c.type_)
                    .is_some_and(|o| o.same_state(c))
            })
    }

    fn set(
        &mut self,
        type_: ConditionType,
        status: ConditionStatus,
        reason: Option<String>,
        message: Option<String>,
    ) {
        let mut next = Condition {
            type_,
            status,
            reason,
            message,
            last_transition_time: Utc::now(),
        };
        match self.conditions.iter_mut().find(|c| c.type_ == type_) {
            Some(existing) => {
                if existing.status == next.status {
                    next.last_transition_time = existing.last_transition_time;
                }
                *existing = next;
            }
            None => self.conditions.push(next),
        }
        if type_ != ConditionType::Ready {
            self.recompute_ready();
        }
    }

    fn recompute_ready(&mut self) {
        let dependents: Vec<Condition> = ConditionType::DEPENDENTS
            .iter()
            .filter_map(|t| self.condition(*t).cloned())
            .collect();

        if let Some(failed) = dependents
            .iter()
            .find(|c| c.status == ConditionStatus::False)
        {
            self.set(
                ConditionType::Ready,
                ConditionStatus::False,
                failed.reason.clone(),
                failed.message.clone(),
            );
        } else if dependents.len() == ConditionType::DEPENDENTS.len()
            && dependents.iter().all(|c| c.status == ConditionStatus::True)
        {
            self.set(ConditionType::Ready, ConditionStatus::True, None, None);
        } else {
            self.set(ConditionType::Ready, ConditionStatus::Unknown, None, None);
        }
    }
}
