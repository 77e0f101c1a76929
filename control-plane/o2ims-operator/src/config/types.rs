use std::str::FromStr;
use std::time::Duration;

use envconfig::Envconfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Kube,
    Memory,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown store backend '{0}' (expected 'kube' or 'memory')")]
pub struct UnknownStoreBackend(pub String);

impl FromStr for StoreBackend {
    type Err = UnknownStoreBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kube" | "k8s" | "kubernetes" => Ok(StoreBackend::Kube),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            _ => Err(UnknownStoreBackend(s.to_string())),
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Kube => write!(f, "kube"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct OperatorConfig {
    /// Where O2ims objects live: `kube` or `memory`.
    /// Env: O2IMS_STORE
    #[envconfig(from = "O2IMS_STORE", default = "kube")]
    pub store: StoreBackend,

    /// Restrict the watch to one namespace; all namespaces when unset.
    /// Env: O2IMS_K8S_NAMESPACE
    #[envconfig(from = "O2IMS_K8S_NAMESPACE")]
    pub k8s_namespace: Option<String>,

    /// Grace period for in-flight reconciliations on shutdown.
    /// Env: O2IMS_SHUTDOWN_GRACE_SECS
    #[envconfig(from = "O2IMS_SHUTDOWN_GRACE_SECS", default = "15")]
    pub shutdown_grace_secs: u64,

    #[envconfig(nested)]
    pub controller: ControllerConfig,
}

impl OperatorConfig {
    pub fn store_backend(&self) -> StoreBackend {
        self.store
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Knobs of the reconcile loop itself.
#[derive(Envconfig, Clone, Debug)]
pub struct ControllerConfig {
    #[envconfig(from = "O2IMS_WORKERS", default = "2")]
    pub workers: usize,

    /// Hard cap on one action invocation.
    #[envconfig(from = "O2IMS_ACTION_TIMEOUT_MS", default = "10000")]
    pub action_timeout_ms: u64,

    #[envconfig(from = "O2IMS_BACKOFF_BASE_MS", default = "1000")]
    pub backoff_base_ms: u64,

    #[envconfig(from = "O2IMS_BACKOFF_MAX_MS", default = "300000")]
    pub backoff_max_ms: u64,

    /// Response bodies are logged up to this many bytes.
    #[envconfig(from = "O2IMS_RESPONSE_LOG_LIMIT", default = "1024")]
    pub response_log_limit: usize,
}

impl ControllerConfig {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Never below the base delay.
    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms.max(self.backoff_base_ms))
    }

    /// At least one worker.
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            action_timeout_ms: 10_000,
            backoff_base_ms: 1_000,
            backoff_max_ms: 300_000,
            response_log_limit: 1024,
        }
    }
}
