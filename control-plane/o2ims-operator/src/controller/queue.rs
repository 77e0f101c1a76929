use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::{Instant, sleep_until};

struct QueueState<K> {
    /// Ready for dispatch, in arrival order.
    ready: VecDeque<K>,
    /// Mirror of `ready` for O(1) membership checks.
    queued: HashSet<K>,
    /// Not-before times of delayed items.
    waiting: HashMap<K, Instant>,
    /// Currently owned by a worker.
    processing: HashSet<K>,
    /// Re-added while processing; made ready again on `done`.
    dirty: HashSet<K>,
    shutting_down: bool,
}

impl<K: Clone + Eq + Hash> QueueState<K> {
    fn push_ready(&mut self, key: K) {
        if self.queued.insert(key.clone()) {
            self.ready.push_back(key);
        }
    }

    /// Move every delayed item whose time has come; returns the next
    /// deadline still pending.
    fn promote_due(&mut self, now: Instant) -> Option<Instant> {
        let due: Vec<K> = self
            .waiting
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in due {
            self.waiting.remove(&key);
            if self.processing.contains(&key) {
                self.dirty.insert(key);
            } else {
                self.push_ready(key);
            }
        }
        self.waiting.values().min().copied()
    }
}

/// Deduplicating, delay-capable work queue.
///
/// Holds at most one pending entry per key and hands a key to at most one
/// worker at a time. A key added while a worker owns it is redelivered
/// once after [`WorkQueue::done`].
pub struct WorkQueue<K> {
    state: Mutex<QueueState<K>>,
    notify: Notify,
}

impl<K: Clone + Eq + Hash> WorkQueue<K> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                ready: VecDeque::new(),
                queued: HashSet::new(),
                waiting: HashMap::new(),
                processing: HashSet::new(),
                dirty: HashSet::new(),
                shutting_down: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Schedule `key` for immediate processing. Supersedes a pending delay.
    pub async fn add(&self, key: K) {
        let mut st = self.state.lock().await;
        if st.shutting_down {
            return;
        }
        st.waiting.remove(&key);
        if st.processing.contains(&key) {
            st.dirty.insert(key);
            return;
        }
        st.push_ready(key);
        drop(st);
        self.notify.notify_waiters();
    }

    /// Schedule `key` no earlier than `delay` from now.
    ///
    /// Ignored if the key is already ready. When a delay is already pending
    /// the later of the two deadlines wins.
    pub async fn add_after(&self, key: K, delay: Duration) {
        if delay.is_zero() {
            return self.add(key).await;
        }
        let at = Instant::now() + delay;
        let mut st = self.state.lock().await;
        if st.shutting_down || st.queued.contains(&key) {
            return;
        }
        let entry = st.waiting.entry(key).or_insert(at);
        if *entry < at {
            *entry = at;
        }
        drop(st);
        self.notify.notify_waiters();
    }

    /// Wait for the next due key and mark it as processing.
    ///
    /// Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);

            let next_deadline = {
                let mut st = self.state.lock().await;
                if st.shutting_down {
                    return None;
                }
                let next = st.promote_due(Instant::now());
                if let Some(key) = st.ready.pop_front() {
                    st.queued.remove(&key);
                    st.processing.insert(key.clone());
                    return Some(key);
                }
                // Register before releasing the lock so a concurrent add
                // cannot slip between the check and the wait.
                notified.as_mut().enable();
                next
            };

            match next_deadline {
                Some(at) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = sleep_until(at) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Release `key` after processing.
    pub async fn done(&self, key: &K) {
        let mut st = self.state.lock().await;
        st.processing.remove(key);
        if st.dirty.remove(key) {
            st.waiting.remove(key);
            st.push_ready(key.clone());
            drop(st);
            self.notify.notify_waiters();
        }
    }

    /// Wake every waiting worker; further `get` calls return `None` and
    /// queued keys are abandoned.
    pub async fn shut_down(&self) {
        self.state.lock().await.shutting_down = true;
        self.notify.notify_waiters();
    }

    pub async fn is_shutting_down(&self) -> bool {
        self.state.lock().await.shutting_down
    }

    /// Distinct keys that are ready or delayed.
    pub async fn len(&self) -> usize {
        let st = self.state.lock().await;
        st.queued.len()
            + st.waiting.keys().filter(|k| !st.queued.contains(*k)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Keys currently owned by a worker.
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.processing.len()
    }
}

impl<K: Clone + Eq + Hash> Default for WorkQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
