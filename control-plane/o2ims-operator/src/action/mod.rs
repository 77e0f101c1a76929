use std::fmt;

use async_trait::async_trait;
use o2ims_models::O2imsSpec;
use tokio::time::Instant;

mod http;

pub use http::HttpActionExecutor;

/// Classified result of one action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Success(String),
    /// Worth retrying later: network trouble, timeouts, 5xx.
    TransientFailure(String),
    /// Will keep failing until the spec changes.
    PermanentFailure(String),
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Success(s) => write!(f, "success: {s}"),
            ActionOutcome::TransientFailure(s) => {
                write!(f, "transient failure: {s}")
            }
            ActionOutcome::PermanentFailure(s) => {
                write!(f, "permanent failure: {s}")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Side effect run once per reconciliation attempt.
///
/// Implementations must be idempotent, must give up by `deadline` and must
/// not retry on their own; retries belong to the controller.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, spec: &O2imsSpec, deadline: Instant)
    -> ActionOutcome;
}
