#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use push_fanout::{
    clients::memory::InMemoryStore,
    fanout::{DeliveryTransport, EndpointSource, FanoutEngine, FanoutOptions, NotificationSource},
    models::{
        endpoint::{EndpointRecord, OwnerRef},
        notification::Notification,
        payload::Payload,
        status::DeliveryStatus,
    },
    reporting::LatestReport,
};

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Deliver,
    Retryable,
    Permanent,
    Error,
    Panic,
    Hang,
}

/// Transport whose answer is scripted per endpoint id. Unscripted endpoints
/// are delivered.
#[derive(Default)]
pub struct ScriptedTransport {
    behaviors: HashMap<i64, Behavior>,
    calls: Mutex<Vec<i64>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, endpoint_id: i64, behavior: Behavior) -> Self {
        self.behaviors.insert(endpoint_id, behavior);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<i64> {
        let mut calls = self.calls.lock().clone();
        calls.sort();
        calls
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryTransport for ScriptedTransport {
    async fn send(
        &self,
        endpoint: &EndpointRecord,
        _payload: &Payload,
    ) -> Result<DeliveryStatus, Error> {
        self.calls.lock().push(endpoint.id);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.behaviors.get(&endpoint.id).copied().unwrap_or(Behavior::Deliver) {
            Behavior::Deliver => Ok(DeliveryStatus::Delivered),
            Behavior::Retryable => Ok(DeliveryStatus::RetryableFailure("busy".to_string())),
            Behavior::Permanent => Ok(DeliveryStatus::PermanentFailure("gone".to_string())),
            Behavior::Error => Err(anyhow!("connection reset")),
            Behavior::Panic => panic!("transport blew up for endpoint {}", endpoint.id),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(DeliveryStatus::Delivered)
            }
        }
    }
}

/// Endpoint source that cannot be reached.
pub struct UnreachableSource;

#[async_trait]
impl EndpointSource for UnreachableSource {
    async fn active_endpoints(
        &self,
        _owner: Option<&OwnerRef>,
    ) -> Result<Vec<EndpointRecord>, Error> {
        Err(anyhow!("connection refused"))
    }

    async fn deactivate(&self, _endpoint_id: i64) -> Result<(), Error> {
        Err(anyhow!("connection refused"))
    }

    async fn reactivate(&self, _endpoint_id: i64) -> Result<(), Error> {
        Err(anyhow!("connection refused"))
    }
}

#[async_trait]
impl NotificationSource for UnreachableSource {
    async fn notification(&self, _id: i64) -> Result<Option<Notification>, Error> {
        Err(anyhow!("connection refused"))
    }
}

/// Reads from an in-memory store but refuses every state change.
pub struct ReadOnlySource {
    pub store: Arc<InMemoryStore>,
}

#[async_trait]
impl EndpointSource for ReadOnlySource {
    async fn active_endpoints(
        &self,
        owner: Option<&OwnerRef>,
    ) -> Result<Vec<EndpointRecord>, Error> {
        self.store.active_endpoints(owner).await
    }

    async fn deactivate(&self, endpoint_id: i64) -> Result<(), Error> {
        Err(anyhow!("write rejected for endpoint {}", endpoint_id))
    }

    async fn reactivate(&self, endpoint_id: i64) -> Result<(), Error> {
        Err(anyhow!("write rejected for endpoint {}", endpoint_id))
    }
}

pub fn owner(name: &str) -> OwnerRef {
    OwnerRef::new(name)
}

pub fn endpoint(id: i64, owner_name: &str) -> EndpointRecord {
    EndpointRecord::new(
        id,
        owner(owner_name),
        format!("https://push.example.com/send/{}-{}", owner_name, id),
    )
    .with_keys(format!("p256dh-{}", id), format!("auth-{}", id))
}

pub fn broadcast(id: i64) -> Notification {
    Notification::broadcast(id, "Water outage", "Water will be off from 9:00 to 12:00.")
        .with_author(owner("admin"))
}

pub fn targeted(id: i64, owner_name: &str) -> Notification {
    Notification::targeted(
        id,
        owner(owner_name),
        "Fee reminder",
        "Your maintenance fee is due on Friday.",
    )
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub transport: Arc<ScriptedTransport>,
    pub latest: LatestReport,
    pub engine: FanoutEngine,
}

pub fn harness(endpoints: Vec<EndpointRecord>, transport: ScriptedTransport) -> Harness {
    harness_with_options(endpoints, transport, FanoutOptions::default())
}

pub fn harness_with_options(
    endpoints: Vec<EndpointRecord>,
    transport: ScriptedTransport,
    options: FanoutOptions,
) -> Harness {
    let store = Arc::new(InMemoryStore::with_endpoints(endpoints));
    let transport = Arc::new(transport);
    let latest = LatestReport::new();

    let engine = FanoutEngine::new(store.clone(), store.clone(), transport.clone())
        .with_reporter(Arc::new(latest.clone()))
        .with_options(options);

    Harness {
        store,
        transport,
        latest,
        engine,
    }
}
