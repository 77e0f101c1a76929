use std::hash::Hash;
use std::time::Duration;

/// Per-key exponential backoff: `base * 2^failures`, capped at `max`.
pub struct ExponentialBackoff<K> {
    base: Duration,
    max: Duration,
    failures: scc::HashMap<K, u32>,
}

impl<K: Eq + Hash + Clone> ExponentialBackoff<K> {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: scc::HashMap::new(),
        }
    }

    /// Delay for the `failures`-th consecutive failure (0-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Record one more failure for `key` and return how long to wait.
    pub async fn next_delay(&self, key: &K) -> Duration {
        let entry = self
            .failures
            .entry_async(key.clone())
            .await
            .and_modify(|n| *n = n.saturating_add(1))
            .or_insert(1);
        let failures = *entry.get();
        drop(entry);
        self.delay_for(failures - 1)
    }

    /// Reset after a success or a fresh desired-state change.
    pub async fn forget(&self, key: &K) {
        self.failures.remove_async(key).await;
    }

    pub async fn retries(&self, key: &K) -> u32 {
        self.failures.read_async(key, |_, n| *n).await.unwrap_or(0)
    }
}
