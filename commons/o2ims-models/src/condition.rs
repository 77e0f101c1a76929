use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved condition type: the endpoint behind the object was reached.
pub const TYPE_AVAILABLE: &str = "Available";
/// Reserved condition type: the object cannot converge without a spec change.
pub const TYPE_DEGRADED: &str = "Degraded";

pub const REASON_RECONCILING: &str = "Reconciling";
pub const REASON_ACTION_SUCCEEDED: &str = "ActionSucceeded";
pub const REASON_ACTION_FAILED: &str = "ActionFailed";
pub const REASON_PERMANENT_FAILURE: &str = "PermanentFailure";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "crd", derive(schemars::JsonSchema))]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "crd", derive(schemars::JsonSchema))]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// Ordered list of conditions, unique by type.
///
/// Merging follows the usual Kubernetes rules: an existing condition keeps
/// its position and only moves its `lastTransitionTime` when the status
/// value flips; unseen types are appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Condition>", into = "Vec<Condition>")]
pub struct ConditionSet(Vec<Condition>);

impl ConditionSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Upsert by type. Returns true when anything observable changed.
    pub fn set_condition(&mut self, cond: Condition) -> bool {
        let Some(existing) =
            self.0.iter_mut().find(|c| c.type_ == cond.type_)
        else {
            self.0.push(cond);
            return true;
        };

        let mut changed = false;
        if existing.status != cond.status {
            existing.status = cond.status;
            existing.last_transition_time = cond.last_transition_time;
            changed = true;
        }
        if existing.reason != cond.reason {
            existing.reason = cond.reason;
            changed = true;
        }
        if existing.message != cond.message {
            existing.message = cond.message;
            changed = true;
        }
        changed
    }

    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    pub fn is_status(&self, type_: &str, status: ConditionStatus) -> bool {
        self.get(type_).map(|c| c.status == status).unwrap_or(false)
    }

    pub fn remove(&mut self, type_: &str) -> Option<Condition> {
        let idx = self.0.iter().position(|c| c.type_ == type_)?;
        Some(self.0.remove(idx))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Condition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Condition] {
        &self.0
    }
}

impl From<Vec<Condition>> for ConditionSet {
    fn from(list: Vec<Condition>) -> Self {
        let mut set = ConditionSet::new();
        for c in list {
            set.set_condition(c);
        }
        set
    }
}

impl From<ConditionSet> for Vec<Condition> {
    fn from(set: ConditionSet) -> Self {
        set.0
    }
}

impl<'a> IntoIterator for &'a ConditionSet {
    type Item = &'a Condition;
    type IntoIter = std::slice::Iter<'a, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
