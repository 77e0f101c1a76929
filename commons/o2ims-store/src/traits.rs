use async_trait::async_trait;
use o2ims_models::{O2imsObject, ResourceIdentity};

use crate::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub identity: ResourceIdentity,
    pub kind: EventKind,
}

impl StoreEvent {
    pub fn new(identity: ResourceIdentity, kind: EventKind) -> Self {
        Self { identity, kind }
    }
}

/// Backing store of O2ims objects as seen by the controller.
///
/// Implementations must be safe to call from many workers at once.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(
        &self,
        id: &ResourceIdentity,
    ) -> StoreResult<Option<O2imsObject>>;

    /// Persist `obj.conditions` and return the object at its new version.
    ///
    /// Fails with [`StoreError::Conflict`] when `obj.resource_version` no
    /// longer matches the stored one and with [`StoreError::NotFound`] when
    /// the object is gone. Status writes never produce notifications.
    async fn update_status(&self, obj: &O2imsObject)
    -> StoreResult<O2imsObject>;

    async fn list(&self) -> StoreResult<Vec<ResourceIdentity>>;

    /// Desired-state change feed: creation, spec or deletion-request
    /// updates, and removal.
    async fn subscribe(&self) -> StoreResult<flume::Receiver<StoreEvent>>;
}
