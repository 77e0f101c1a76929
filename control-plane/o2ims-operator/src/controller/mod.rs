use std::sync::Arc;

use o2ims_store::{ResourceStore, StoreError};

use crate::action::ActionExecutor;
use crate::config::ControllerConfig;

pub mod backoff;
pub mod conditions;
pub mod dispatcher;
pub mod queue;
mod reconcile;

pub use backoff::ExponentialBackoff;
pub use dispatcher::{Controller, run_controller};
pub use queue::WorkQueue;
pub use reconcile::reconcile;

/// Failures that end an attempt and call for a retry with backoff.
#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    #[error("failed to load object: {0}")]
    Load(#[source] StoreError),
    #[error("failed to persist status: {0}")]
    Persistence(#[source] StoreError),
    #[error("action failed: {0}")]
    ActionFailed(String),
}

/// How an attempt ended when nothing needs retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileStatus {
    /// The object disappeared from the store.
    Gone,
    /// Deletion was requested; the action was skipped.
    Deleting,
    /// The action succeeded.
    Available,
    /// The action failed permanently; only a spec change re-triggers it.
    Degraded(String),
}

#[derive(Clone)]
pub struct ControllerContext {
    pub store: Arc<dyn ResourceStore>,
    pub action: Arc<dyn ActionExecutor>,
    pub cfg: ControllerConfig,
}

impl ControllerContext {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        action: Arc<dyn ActionExecutor>,
        cfg: ControllerConfig,
    ) -> Self {
        Self { store, action, cfg }
    }
}
