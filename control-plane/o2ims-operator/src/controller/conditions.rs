use o2ims_models::{
    Condition, ConditionSet, ConditionStatus, REASON_ACTION_FAILED,
    REASON_ACTION_SUCCEEDED, REASON_PERMANENT_FAILURE, REASON_RECONCILING,
    TYPE_AVAILABLE, TYPE_DEGRADED,
};

use crate::action::ActionOutcome;

/// Condition recorded the first time the controller sees an object.
pub fn reconciling() -> Condition {
    Condition::new(
        TYPE_AVAILABLE,
        ConditionStatus::Unknown,
        REASON_RECONCILING,
        "Starting reconciliation",
    )
}

/// Fold one action outcome into `conds`. Returns true if anything changed.
pub fn apply_outcome(conds: &mut ConditionSet, outcome: &ActionOutcome) -> bool {
    let mut changed = false;
    match outcome {
        ActionOutcome::Success(summary) => {
            changed |= conds.set_condition(Condition::new(
                TYPE_AVAILABLE,
                ConditionStatus::True,
                REASON_ACTION_SUCCEEDED,
                summary.as_str(),
            ));
            // Clear an earlier permanent failure, but never introduce
            // Degraded on a healthy object.
            if conds.get(TYPE_DEGRADED).is_some() {
                changed |= conds.set_condition(Condition::new(
                    TYPE_DEGRADED,
                    ConditionStatus::False,
                    REASON_ACTION_SUCCEEDED,
                    summary.as_str(),
                ));
            }
        }
        ActionOutcome::TransientFailure(detail) => {
            changed |= conds.set_condition(Condition::new(
                TYPE_AVAILABLE,
                ConditionStatus::False,
                REASON_ACTION_FAILED,
                detail.as_str(),
            ));
        }
        ActionOutcome::PermanentFailure(detail) => {
            changed |= conds.set_condition(Condition::new(
                TYPE_AVAILABLE,
                ConditionStatus::False,
                REASON_PERMANENT_FAILURE,
                detail.as_str(),
            ));
            changed |= conds.set_condition(Condition::new(
                TYPE_DEGRADED,
                ConditionStatus::True,
                REASON_PERMANENT_FAILURE,
                detail.as_str(),
            ));
        }
    }
    changed
}
