use std::sync::Arc;

use anyhow::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::{
    fanout::DeliveryTransport,
    models::{
        endpoint::{EndpointKind, EndpointRecord},
        payload::Payload,
        status::DeliveryStatus,
    },
};

/// Dispatches each endpoint to the transport for its kind: push-service URLs
/// to Web Push, bare registration tokens to FCM.
#[derive(Default, Clone)]
pub struct TransportRouter {
    web_push: Option<Arc<dyn DeliveryTransport>>,
    fcm: Option<Arc<dyn DeliveryTransport>>,
}

impl TransportRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_web_push(mut self, transport: Arc<dyn DeliveryTransport>) -> Self {
        self.web_push = Some(transport);
        self
    }

    pub fn with_fcm(mut self, transport: Arc<dyn DeliveryTransport>) -> Self {
        self.fcm = Some(transport);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.web_push.is_none() && self.fcm.is_none()
    }

    fn transport_for(&self, kind: EndpointKind) -> Option<&Arc<dyn DeliveryTransport>> {
        match kind {
            EndpointKind::WebPush => self.web_push.as_ref(),
            EndpointKind::FcmToken => self.fcm.as_ref(),
        }
    }
}

#[async_trait]
impl DeliveryTransport for TransportRouter {
    async fn send(
        &self,
        endpoint: &EndpointRecord,
        payload: &Payload,
    ) -> Result<DeliveryStatus, Error> {
        let kind = endpoint.kind();

        match self.transport_for(kind) {
            Some(transport) => transport.send(endpoint, payload).await,
            None => {
                debug!(endpoint_id = endpoint.id, kind = %kind, "No transport for endpoint kind");
                Ok(DeliveryStatus::RetryableFailure(format!(
                    "No {} transport configured",
                    kind
                )))
            }
        }
    }
}
