use std::collections::BTreeMap;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    fanout::{EndpointSource, NotificationSource},
    models::{
        endpoint::{EndpointRecord, OwnerRef},
        notification::Notification,
    },
};

/// Process-local endpoint registry and notification lookup.
#[derive(Default)]
pub struct InMemoryStore {
    endpoints: RwLock<BTreeMap<i64, EndpointRecord>>,
    notifications: RwLock<BTreeMap<i64, Notification>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoints(endpoints: impl IntoIterator<Item = EndpointRecord>) -> Self {
        let store = Self::new();
        for endpoint in endpoints {
            store.insert_endpoint(endpoint);
        }
        store
    }

    pub fn insert_endpoint(&self, endpoint: EndpointRecord) {
        self.endpoints.write().insert(endpoint.id, endpoint);
    }

    pub fn insert_notification(&self, notification: Notification) {
        self.notifications
            .write()
            .insert(notification.id, notification);
    }

    pub fn endpoint(&self, id: i64) -> Option<EndpointRecord> {
        self.endpoints.read().get(&id).cloned()
    }

    pub fn endpoints(&self) -> Vec<EndpointRecord> {
        self.endpoints.read().values().cloned().collect()
    }

    fn set_active(&self, endpoint_id: i64, active: bool) -> Result<(), Error> {
        let mut endpoints = self.endpoints.write();
        let endpoint = endpoints
            .get_mut(&endpoint_id)
            .ok_or_else(|| anyhow!("Endpoint {} not found", endpoint_id))?;
        endpoint.active = active;
        Ok(())
    }
}

#[async_trait]
impl EndpointSource for InMemoryStore {
    async fn active_endpoints(
        &self,
        owner: Option<&OwnerRef>,
    ) -> Result<Vec<EndpointRecord>, Error> {
        Ok(self
            .endpoints
            .read()
            .values()
            .filter(|e| e.active && owner.is_none_or(|owner| &e.owner_ref == owner))
            .cloned()
            .collect())
    }

    async fn deactivate(&self, endpoint_id: i64) -> Result<(), Error> {
        self.set_active(endpoint_id, false)
    }

    async fn reactivate(&self, endpoint_id: i64) -> Result<(), Error> {
        self.set_active(endpoint_id, true)
    }
}

#[async_trait]
impl NotificationSource for InMemoryStore {
    async fn notification(&self, id: i64) -> Result<Option<Notification>, Error> {
        Ok(self.notifications.read().get(&id).cloned())
    }
}
