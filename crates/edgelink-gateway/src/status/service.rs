//! Device status service.

use std::sync::Arc;

use async_trait::async_trait;
use edgelink_core::{ConnectivityService, Message, MessageListener, Protocol, Result};

use super::model::{DeviceStatus, DeviceStatusReport};
use crate::protocol::StatusProtocol;

/// Callback for an inbound status request. `None` asks for every device.
pub type StatusRequestHandler = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// Listener for status requests and publisher of device statuses.
pub struct DeviceStatusService {
    protocol: Arc<dyn StatusProtocol>,
    connectivity: Arc<dyn ConnectivityService>,
    request_handler: StatusRequestHandler,
}

impl DeviceStatusService {
    pub fn new<H>(
        protocol: Arc<dyn StatusProtocol>,
        connectivity: Arc<dyn ConnectivityService>,
        request_handler: H,
    ) -> Self
    where
        H: Fn(Option<&str>) + Send + Sync + 'static,
    {
        Self {
            protocol,
            connectivity,
            request_handler: Arc::new(request_handler),
        }
    }

    /// Answer a status request for `device_key`.
    pub async fn publish_status_response(
        &self,
        device_key: &str,
        status: DeviceStatus,
    ) -> Result<()> {
        let message = self
            .protocol
            .make_status_response_message(&DeviceStatusReport::new(device_key, status));
        self.publish(device_key, message).await
    }

    /// Report a status change of `device_key`.
    pub async fn publish_status_update(&self, device_key: &str, status: DeviceStatus) -> Result<()> {
        let message = self
            .protocol
            .make_status_update_message(&DeviceStatusReport::new(device_key, status));
        self.publish(device_key, message).await
    }

    /// Point the transport's last will at the current device set.
    pub async fn devices_updated(&self, device_keys: &[String]) -> Result<()> {
        let message = self.protocol.make_last_will_message(device_keys).map_err(|e| {
            tracing::warn!("Unable to make last will message: {}", e);
            e
        })?;

        self.connectivity.set_last_will(message).await?;
        tracing::debug!("Last will covers {} device(s)", device_keys.len());
        Ok(())
    }

    async fn publish(&self, device_key: &str, message: Result<Message>) -> Result<()> {
        let result = match message {
            Ok(message) => self.connectivity.publish(message).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            tracing::info!("Status not published for device {}: {}", device_key, e);
        }
        result
    }
}

#[async_trait]
impl MessageListener for DeviceStatusService {
    fn protocol(&self) -> &dyn Protocol {
        self.protocol.as_protocol()
    }

    async fn message_received(&self, message: Message) -> Result<()> {
        if !self.protocol.is_status_request_message(&message) {
            tracing::warn!("Unable to parse message channel: {}", message.channel());
            return Ok(());
        }

        let device_key = self.protocol.extract_device_key(message.channel());
        tracing::debug!(
            "Status request for {}",
            device_key.as_deref().unwrap_or("all devices")
        );
        (self.request_handler)(device_key.as_deref());
        Ok(())
    }
}
