#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use o2ims_models::{ConditionStatus, O2imsObject, O2imsSpec, ResourceIdentity};
use o2ims_operator::action::{ActionExecutor, ActionOutcome};
use o2ims_operator::config::ControllerConfig;
use o2ims_operator::controller::{ControllerContext, run_controller};
use o2ims_store::ResourceStore;
use o2ims_store::memory::MemoryResourceStore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// Env guard utilities
pub struct EnvGuard {
    key: &'static str,
    old: Option<String>,
}
impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe {
            if let Some(ref v) = self.old {
                std::env::set_var(self.key, v);
            } else {
                std::env::remove_var(self.key);
            }
        }
    }
}
pub fn set_env(key: &'static str, val: &str) -> EnvGuard {
    let old = std::env::var(key).ok();
    unsafe {
        std::env::set_var(key, val);
    }
    EnvGuard { key, old }
}

pub fn test_id(name: &str) -> ResourceIdentity {
    ResourceIdentity::new("default", name)
}

pub fn fast_config(base_ms: u64, max_ms: u64) -> ControllerConfig {
    ControllerConfig {
        workers: 2,
        action_timeout_ms: 2_000,
        backoff_base_ms: base_ms,
        backoff_max_ms: max_ms,
        response_log_limit: 256,
    }
}

/// Replays queued outcomes, then repeats the fallback. Records when each
/// call started.
pub struct ScriptedAction {
    script: Mutex<VecDeque<ActionOutcome>>,
    fallback: Mutex<ActionOutcome>,
    calls: Mutex<Vec<(Instant, String)>>,
}

impl ScriptedAction {
    pub fn new(script: Vec<ActionOutcome>, fallback: ActionOutcome) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback: Mutex::new(fallback),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_fallback(&self, outcome: ActionOutcome) {
        *self.fallback.lock().unwrap() = outcome;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, u)| u.clone()).collect()
    }
}

#[async_trait]
impl ActionExecutor for ScriptedAction {
    async fn execute(&self, spec: &O2imsSpec, _deadline: Instant) -> ActionOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), spec.url.clone()));
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }
}

/// A controller running in the background over a memory store.
pub struct ControllerGuard {
    pub shutdown: CancellationToken,
    pub handle: Option<JoinHandle<anyhow::Result<()>>>,
}

impl ControllerGuard {
    pub fn start(
        store: &MemoryResourceStore,
        action: Arc<dyn ActionExecutor>,
        cfg: ControllerConfig,
    ) -> Self {
        let ctx = ControllerContext::new(Arc::new(store.clone()), action, cfg);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_controller(ctx, shutdown.clone()));
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    pub async fn stop(mut self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        match self.handle.take() {
            Some(h) => h.await?,
            None => Ok(()),
        }
    }
}

impl Drop for ControllerGuard {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Poll the store until `pred` holds for the object, or panic.
pub async fn wait_for_object<F>(
    store: &MemoryResourceStore,
    id: &ResourceIdentity,
    within: Duration,
    pred: F,
) -> O2imsObject
where
    F: Fn(&O2imsObject) -> bool,
{
    let deadline = Instant::now() + within;
    loop {
        if let Some(obj) = store.get(id).await.unwrap() {
            if pred(&obj) {
                return obj;
            }
        }
        if Instant::now() >= deadline {
            let last = store.get(id).await.unwrap();
            panic!("{id} did not reach the expected state: {last:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_calls(action: &ScriptedAction, n: usize, within: Duration) {
    let deadline = Instant::now() + within;
    while action.call_count() < n {
        if Instant::now() >= deadline {
            panic!("expected {n} calls, saw {}", action.call_count());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn is_available(obj: &O2imsObject) -> bool {
    obj.conditions
        .is_status(o2ims_models::TYPE_AVAILABLE, ConditionStatus::True)
}

pub fn is_degraded(obj: &O2imsObject) -> bool {
    obj.conditions
        .is_status(o2ims_models::TYPE_DEGRADED, ConditionStatus::True)
}
