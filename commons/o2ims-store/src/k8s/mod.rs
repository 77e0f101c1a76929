use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures_util::{StreamExt, pin_mut};
use kube::{
    Client, Resource,
    api::{Api, ListParams, Patch, PatchParams},
    runtime::{
        WatchStreamExt,
        watcher::{self, Event},
    },
};
use serde_json::json;
use tracing::{debug, info, trace, warn};

use o2ims_models::crd::{O2ims, O2imsStatus};
use o2ims_models::{O2imsObject, ResourceIdentity};

use crate::error::StoreError;
use crate::traits::*;

/// O2ims custom resources in a Kubernetes cluster.
///
/// Watches all namespaces unless one is given.
#[derive(Clone)]
pub struct KubeResourceStore {
    client: Client,
    namespace: Option<String>,
}

impl KubeResourceStore {
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self { client, namespace }
    }

    fn api_in(&self, ns: &str) -> Api<O2ims> {
        Api::namespaced(self.client.clone(), ns)
    }

    fn scoped_api(&self) -> Api<O2ims> {
        match self.namespace.as_deref() {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

fn into_store_err(id: &ResourceIdentity, e: kube::Error) -> StoreError {
    match e {
        kube::Error::Api(ae) if ae.code == 404 => {
            StoreError::NotFound(id.to_string())
        }
        kube::Error::Api(ae) if ae.code == 409 => {
            StoreError::Conflict(format!("{}: {}", id, ae.message))
        }
        other => StoreError::Backend(other.to_string()),
    }
}

/// What we compare to decide whether a watch event is a desired-state
/// change: status writes leave all three untouched. The uid tells a
/// recreated object apart from the one it replaced.
type DesiredMark = (String, i64, bool);

fn desired_mark(obj: &O2ims) -> DesiredMark {
    (
        obj.meta().uid.clone().unwrap_or_default(),
        obj.meta().generation.unwrap_or_default(),
        obj.meta().deletion_timestamp.is_some(),
    )
}

/// Folds raw watcher events into store notifications.
#[derive(Default)]
struct WatchState {
    seen: HashMap<ResourceIdentity, DesiredMark>,
    /// Identities returned by the relist in progress.
    relisted: HashSet<ResourceIdentity>,
}

impl WatchState {
    fn fold(&mut self, event: Event<O2ims>) -> Vec<StoreEvent> {
        match event {
            Event::Init => {
                self.relisted.clear();
                Vec::new()
            }
            Event::InitApply(obj) => {
                self.relisted.insert(obj.identity());
                self.apply(&obj)
            }
            Event::Apply(obj) => self.apply(&obj),
            Event::InitDone => {
                // Anything we knew about that is absent from the fresh
                // listing was deleted while the watch was down.
                let gone: Vec<_> = self
                    .seen
                    .keys()
                    .filter(|id| !self.relisted.contains(*id))
                    .cloned()
                    .collect();
                self.relisted.clear();
                gone.into_iter()
                    .map(|id| {
                        self.seen.remove(&id);
                        StoreEvent::new(id, EventKind::Deleted)
                    })
                    .collect()
            }
            Event::Delete(obj) => {
                let id = obj.identity();
                self.seen.remove(&id);
                vec![StoreEvent::new(id, EventKind::Deleted)]
            }
        }
    }

    fn apply(&mut self, obj: &O2ims) -> Vec<StoreEvent> {
        let id = obj.identity();
        let mark = desired_mark(obj);
        match self.seen.insert(id.clone(), mark.clone()) {
            None => vec![StoreEvent::new(id, EventKind::Created)],
            Some(prev) if prev.0 != mark.0 => {
                debug!(%id, "kube store: object was recreated");
                vec![StoreEvent::new(id, EventKind::Created)]
            }
            Some(prev) if prev != mark => {
                vec![StoreEvent::new(id, EventKind::Updated)]
            }
            Some(_) => {
                trace!(%id, "kube store: status-only change ignored");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn get(
        &self,
        id: &ResourceIdentity,
    ) -> StoreResult<Option<O2imsObject>> {
        let res = self
            .api_in(&id.namespace)
            .get_opt(&id.name)
            .await
            .map_err(|e| into_store_err(id, e))?;
        Ok(res.map(|r| r.to_object()))
    }

    async fn update_status(
        &self,
        obj: &O2imsObject,
    ) -> StoreResult<O2imsObject> {
        let id = &obj.identity;
        // resourceVersion inside a merge patch acts as a precondition.
        let status = O2imsStatus {
            conditions: obj.conditions.clone().into(),
        };
        let patch = json!({
            "metadata": { "resourceVersion": obj.resource_version },
            "status": status,
        });
        let updated = self
            .api_in(&id.namespace)
            .patch_status(&id.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| into_store_err(id, e))?;
        trace!(%id, rv = ?updated.meta().resource_version, "kube store: status patched");
        Ok(updated.to_object())
    }

    async fn list(&self) -> StoreResult<Vec<ResourceIdentity>> {
        let list = self
            .scoped_api()
            .list(&ListParams::default())
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(list.items.iter().map(O2ims::identity).collect())
    }

    async fn subscribe(&self) -> StoreResult<flume::Receiver<StoreEvent>> {
        let (tx, rx) = flume::unbounded();
        let api = self.scoped_api();
        info!(namespace = ?self.namespace, "kube store: starting o2ims watch");
        tokio::spawn(async move {
            let stream =
                watcher::watcher(api, watcher::Config::default())
                    .default_backoff();
            pin_mut!(stream);
            let mut state = WatchState::default();
            while let Some(next) = stream.next().await {
                let events = match next {
                    Ok(event) => state.fold(event),
                    Err(e) => {
                        warn!(error = %e, "kube store: watch error");
                        Vec::new()
                    }
                };
                for ev in events {
                    debug!(id = %ev.identity, kind = ?ev.kind, "kube store: change observed");
                    if tx.send(ev).is_err() {
                        debug!("kube store: subscriber gone; stopping watch");
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }
}
