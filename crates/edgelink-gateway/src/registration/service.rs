//! Device registration service.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edgelink_core::{ConnectivityService, Message, MessageListener, Protocol, Result};
use parking_lot::Mutex;

use super::model::{
    PendingRequest, PlatformResult, RequestKind, SubdeviceRegistrationRequest,
    SubdeviceUpdateRequest,
};
use crate::protocol::RegistrationProtocol;

/// Callback receiving `(device_key, result)` for a platform response.
pub type ResponseHandler = Arc<dyn Fn(&str, &PlatformResult) + Send + Sync>;

/// Publishes registration/update requests and routes the platform's answers
/// to the matching handler.
pub struct DeviceRegistrationService {
    protocol: Arc<dyn RegistrationProtocol>,
    connectivity: Arc<dyn ConnectivityService>,
    registration_handler: ResponseHandler,
    update_handler: ResponseHandler,
    pending: Mutex<HashMap<(String, RequestKind), DateTime<Utc>>>,
}

impl DeviceRegistrationService {
    pub fn new<R, U>(
        protocol: Arc<dyn RegistrationProtocol>,
        connectivity: Arc<dyn ConnectivityService>,
        registration_handler: R,
        update_handler: U,
    ) -> Self
    where
        R: Fn(&str, &PlatformResult) + Send + Sync + 'static,
        U: Fn(&str, &PlatformResult) + Send + Sync + 'static,
    {
        Self {
            protocol,
            connectivity,
            registration_handler: Arc::new(registration_handler),
            update_handler: Arc::new(update_handler),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Publish a registration request for a sub-device.
    pub async fn publish_registration_request(
        &self,
        request: &SubdeviceRegistrationRequest,
    ) -> Result<()> {
        let message = self.protocol.make_registration_request_message(request);
        self.publish_request(&request.device_key, RequestKind::Registration, message)
            .await
    }

    /// Publish an update request for a registered sub-device.
    pub async fn publish_update_request(&self, request: &SubdeviceUpdateRequest) -> Result<()> {
        let message = self.protocol.make_update_request_message(request);
        self.publish_request(&request.device_key, RequestKind::Update, message)
            .await
    }

    /// Requests published but not answered yet, oldest first.
    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        let mut requests: Vec<PendingRequest> = self
            .pending
            .lock()
            .iter()
            .map(|((device_key, kind), requested_at)| PendingRequest {
                device_key: device_key.clone(),
                kind: *kind,
                requested_at: *requested_at,
            })
            .collect();
        requests.sort_by(|a, b| {
            a.requested_at
                .cmp(&b.requested_at)
                .then_with(|| a.device_key.cmp(&b.device_key))
        });
        requests
    }

    async fn publish_request(
        &self,
        device_key: &str,
        kind: RequestKind,
        message: Result<Message>,
    ) -> Result<()> {
        let result = match message {
            Ok(message) => self.connectivity.publish(message).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::debug!("Published {} request for device {}", kind, device_key);
                self.pending
                    .lock()
                    .insert((device_key.to_string(), kind), Utc::now());
                Ok(())
            }
            Err(e) => {
                tracing::info!(
                    "{} request not published for device {}: {}",
                    kind,
                    device_key,
                    e
                );
                Err(e)
            }
        }
    }
}

#[async_trait]
impl MessageListener for DeviceRegistrationService {
    fn protocol(&self) -> &dyn Protocol {
        self.protocol.as_protocol()
    }

    async fn message_received(&self, message: Message) -> Result<()> {
        let Some(device_key) = self.protocol.extract_device_key(message.channel()) else {
            tracing::warn!(
                "Unable to extract device key from channel: {}",
                message.channel()
            );
            return Ok(());
        };

        let (kind, handler) = if self.protocol.is_registration_response(&message) {
            (RequestKind::Registration, &self.registration_handler)
        } else if self.protocol.is_update_response(&message) {
            (RequestKind::Update, &self.update_handler)
        } else {
            tracing::warn!("Unable to parse message channel: {}", message.channel());
            return Ok(());
        };

        let response = match self.protocol.make_registration_response(&message) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Device {} response could not be deserialized: {}", kind, e);
                return Ok(());
            }
        };

        let requested_at = self.pending.lock().remove(&(device_key.clone(), kind));
        if requested_at.is_none() {
            tracing::debug!("Unsolicited {} response for device {}", kind, device_key);
        }

        tracing::info!(
            "{} response for device '{}' received: {:?}",
            kind,
            device_key,
            response.result.code
        );
        handler(&device_key, &response.result);
        Ok(())
    }
}
