use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

use o2ims_models::{O2imsObject, O2imsSpec, ResourceIdentity};

use crate::error::StoreError;
use crate::traits::*;

#[derive(Default)]
struct Inner {
    objects: HashMap<ResourceIdentity, O2imsObject>,
    last_version: u64,
    subscribers: Vec<flume::Sender<StoreEvent>>,
}

impl Inner {
    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }

    fn notify(&mut self, event: StoreEvent) {
        trace!(id = %event.identity, kind = ?event.kind, "memory store: notify");
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// In-process store with Kubernetes-like status semantics.
///
/// Every write bumps the resource version; spec changes and deletion
/// requests also bump the generation and notify subscribers, status writes
/// do not.
#[derive(Clone, Default)]
pub struct MemoryResourceStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(
        &self,
        id: ResourceIdentity,
        spec: O2imsSpec,
    ) -> StoreResult<O2imsObject> {
        self.insert(O2imsObject::new(id, spec)).await
    }

    /// Insert a fully formed object, e.g. one that already carries
    /// conditions from an earlier run.
    pub async fn insert(&self, mut obj: O2imsObject) -> StoreResult<O2imsObject> {
        let mut inner = self.inner.write().await;
        if inner.objects.contains_key(&obj.identity) {
            return Err(StoreError::AlreadyExists(obj.identity.to_string()));
        }
        obj.resource_version = inner.next_version();
        if obj.generation == 0 {
            obj.generation = 1;
        }
        inner.objects.insert(obj.identity.clone(), obj.clone());
        inner.notify(StoreEvent::new(obj.identity.clone(), EventKind::Created));
        Ok(obj)
    }

    pub async fn update_spec(
        &self,
        id: &ResourceIdentity,
        spec: O2imsSpec,
    ) -> StoreResult<O2imsObject> {
        self.mutate_desired(id, |obj| obj.spec = spec).await
    }

    pub async fn request_deletion(
        &self,
        id: &ResourceIdentity,
    ) -> StoreResult<O2imsObject> {
        self.mutate_desired(id, |obj| obj.deletion_requested = true)
            .await
    }

    pub async fn remove(&self, id: &ResourceIdentity) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.objects.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        inner.notify(StoreEvent::new(id.clone(), EventKind::Deleted));
        Ok(())
    }

    async fn mutate_desired<F>(
        &self,
        id: &ResourceIdentity,
        f: F,
    ) -> StoreResult<O2imsObject>
    where
        F: FnOnce(&mut O2imsObject),
    {
        let mut inner = self.inner.write().await;
        let version = inner.next_version();
        let obj = inner
            .objects
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        f(obj);
        obj.generation += 1;
        obj.resource_version = version;
        let updated = obj.clone();
        inner.notify(StoreEvent::new(id.clone(), EventKind::Updated));
        Ok(updated)
    }
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn get(
        &self,
        id: &ResourceIdentity,
    ) -> StoreResult<Option<O2imsObject>> {
        let inner = self.inner.read().await;
        Ok(inner.objects.get(id).cloned())
    }

    async fn update_status(
        &self,
        obj: &O2imsObject,
    ) -> StoreResult<O2imsObject> {
        let mut inner = self.inner.write().await;
        let version = inner.next_version();
        let stored = inner
            .objects
            .get_mut(&obj.identity)
            .ok_or_else(|| StoreError::NotFound(obj.identity.to_string()))?;
        if stored.resource_version != obj.resource_version {
            return Err(StoreError::Conflict(format!(
                "{}: have version {}, stored {}",
                obj.identity, obj.resource_version, stored.resource_version
            )));
        }
        stored.conditions = obj.conditions.clone();
        stored.resource_version = version;
        Ok(stored.clone())
    }

    async fn list(&self) -> StoreResult<Vec<ResourceIdentity>> {
        let inner = self.inner.read().await;
        let mut ids: Vec<_> = inner.objects.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn subscribe(&self) -> StoreResult<flume::Receiver<StoreEvent>> {
        let (tx, rx) = flume::unbounded();
        self.inner.write().await.subscribers.push(tx);
        Ok(rx)
    }
}
