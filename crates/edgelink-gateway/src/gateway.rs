//! Gateway facade.
//!
//! Wires the command buffer, the inbound router and the services together.
//! The transport calls [`Gateway::message_received`] for every inbound
//! message and subscribes to [`Gateway::channels`].

use std::sync::{Arc, Weak};

use edgelink_core::{
    CommandBuffer, CommandBufferStats, ConnectivityService, Error, GatewayConfig,
    InboundMessageHandler, Result,
};

use crate::firmware::{
    FileDownloader, FirmwareInstaller, FirmwareSessionState, FirmwareUpdateService,
    FirmwareVersionProvider,
};
use crate::protocol::{FirmwareUpdateProtocol, RegistrationProtocol, StatusProtocol};
use crate::registration::{
    DeviceRegistrationService, PendingRequest, PlatformResult, ResponseHandler,
    SubdeviceRegistrationRequest, SubdeviceUpdateRequest,
};
use crate::status::{DeviceStatus, DeviceStatusProvider, DeviceStatusService};

struct FirmwareParts {
    protocol: Arc<dyn FirmwareUpdateProtocol>,
    downloader: Arc<dyn FileDownloader>,
    installer: Arc<dyn FirmwareInstaller>,
    version_provider: Arc<dyn FirmwareVersionProvider>,
}

struct RegistrationParts {
    protocol: Arc<dyn RegistrationProtocol>,
    registration_handler: ResponseHandler,
    update_handler: ResponseHandler,
}

struct StatusParts {
    protocol: Arc<dyn StatusProtocol>,
    provider: Arc<dyn DeviceStatusProvider>,
}

struct StatusReporting {
    service: Arc<DeviceStatusService>,
    provider: Arc<dyn DeviceStatusProvider>,
}

/// Builder for [`Gateway`].
#[derive(Default)]
pub struct GatewayBuilder {
    config: GatewayConfig,
    connectivity: Option<Arc<dyn ConnectivityService>>,
    firmware: Option<FirmwareParts>,
    registration: Option<RegistrationParts>,
    status: Option<StatusParts>,
    devices: Vec<SubdeviceRegistrationRequest>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Transport used for publishing and subscribing. Required.
    pub fn connectivity(mut self, connectivity: Arc<dyn ConnectivityService>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Enable firmware updates.
    pub fn firmware_update(
        mut self,
        protocol: Arc<dyn FirmwareUpdateProtocol>,
        downloader: Arc<dyn FileDownloader>,
        installer: Arc<dyn FirmwareInstaller>,
        version_provider: Arc<dyn FirmwareVersionProvider>,
    ) -> Self {
        self.firmware = Some(FirmwareParts {
            protocol,
            downloader,
            installer,
            version_provider,
        });
        self
    }

    /// Enable sub-device registration with the given response handlers.
    pub fn registration<R, U>(
        mut self,
        protocol: Arc<dyn RegistrationProtocol>,
        registration_handler: R,
        update_handler: U,
    ) -> Self
    where
        R: Fn(&str, &PlatformResult) + Send + Sync + 'static,
        U: Fn(&str, &PlatformResult) + Send + Sync + 'static,
    {
        self.registration = Some(RegistrationParts {
            protocol,
            registration_handler: Arc::new(registration_handler),
            update_handler: Arc::new(update_handler),
        });
        self
    }

    /// Enable device status reporting. Platform requests are answered from
    /// `provider`.
    pub fn status(
        mut self,
        protocol: Arc<dyn StatusProtocol>,
        provider: Arc<dyn DeviceStatusProvider>,
    ) -> Self {
        self.status = Some(StatusParts { protocol, provider });
        self
    }

    /// Known sub-device, registered on [`Gateway::start`].
    pub fn device(mut self, device: SubdeviceRegistrationRequest) -> Self {
        self.devices.push(device);
        self
    }

    /// Build the gateway. Must be called from within a tokio runtime.
    pub fn build(self) -> Result<Gateway> {
        let connectivity = self
            .connectivity
            .ok_or_else(|| Error::Configuration("Connectivity service is required".to_string()))?;

        let command_buffer = CommandBuffer::new();
        let router = InboundMessageHandler::new(command_buffer.clone());

        let firmware = self.firmware.map(|parts| {
            let service = FirmwareUpdateService::new(
                parts.protocol,
                connectivity.clone(),
                parts.downloader,
                parts.installer,
                parts.version_provider,
                command_buffer.clone(),
                &self.config.firmware,
            );
            router.add_listener(&service);
            service
        });

        let registration = self.registration.map(|parts| {
            let service = Arc::new(DeviceRegistrationService::new(
                parts.protocol,
                connectivity.clone(),
                with_version_report(parts.registration_handler, firmware.clone()),
                with_version_report(parts.update_handler, firmware.clone()),
            ));
            router.add_listener(&service);
            service
        });

        let known_keys = device_keys(&self.devices);
        let status = self.status.map(|parts| {
            let service = Arc::new_cyclic(|this: &Weak<DeviceStatusService>| {
                DeviceStatusService::new(
                    parts.protocol,
                    connectivity.clone(),
                    answer_status_requests(
                        this.clone(),
                        command_buffer.clone(),
                        parts.provider.clone(),
                        known_keys,
                    ),
                )
            });
            router.add_listener(&service);
            StatusReporting {
                service,
                provider: parts.provider,
            }
        });

        tracing::info!(
            "Gateway built (firmware update: {}, registration: {}, status: {}, known devices: {})",
            firmware.is_some(),
            registration.is_some(),
            status.is_some(),
            self.devices.len()
        );

        Ok(Gateway {
            config: self.config,
            command_buffer,
            router,
            connectivity,
            firmware,
            registration,
            status,
            devices: self.devices,
        })
    }
}

fn device_keys(devices: &[SubdeviceRegistrationRequest]) -> Vec<String> {
    devices.iter().map(|d| d.device_key.clone()).collect()
}

/// Answer a request for one device with a status response, and a request for
/// every device with status updates for the known devices.
fn answer_status_requests(
    service: Weak<DeviceStatusService>,
    buffer: CommandBuffer,
    provider: Arc<dyn DeviceStatusProvider>,
    device_keys: Vec<String>,
) -> impl Fn(Option<&str>) + Send + Sync + 'static {
    move |device_key: Option<&str>| {
        let (keys, as_response) = match device_key {
            Some(key) => (vec![key.to_string()], true),
            None => (device_keys.clone(), false),
        };

        if let Err(e) = queue_statuses(&buffer, service.clone(), provider.clone(), keys, as_response)
        {
            tracing::warn!("Failed to queue device statuses: {}", e);
        }
    }
}

/// Queue one status message per device. Failures are logged by the service
/// and do not stop the remaining devices.
fn queue_statuses(
    buffer: &CommandBuffer,
    service: Weak<DeviceStatusService>,
    provider: Arc<dyn DeviceStatusProvider>,
    device_keys: Vec<String>,
    as_response: bool,
) -> Result<()> {
    buffer.push(async move {
        let Some(service) = service.upgrade() else {
            return Ok(());
        };

        let mut outcome = Ok(());
        for device_key in device_keys {
            let status = provider.device_status(&device_key);
            let published = if as_response {
                service.publish_status_response(&device_key, status).await
            } else {
                service.publish_status_update(&device_key, status).await
            };
            if let Err(e) = published {
                outcome = Err(e);
            }
        }
        outcome
    })?;
    Ok(())
}

/// Report the firmware version of a device once the platform accepted it.
fn with_version_report(
    handler: ResponseHandler,
    firmware: Option<Arc<FirmwareUpdateService>>,
) -> impl Fn(&str, &PlatformResult) + Send + Sync + 'static {
    move |device_key: &str, result: &PlatformResult| {
        handler(device_key, result);

        if !result.code.is_ok() {
            return;
        }
        if let Some(firmware) = &firmware {
            if let Err(e) = firmware.publish_firmware_version(device_key) {
                tracing::warn!(
                    "Failed to queue firmware version for device {}: {}",
                    device_key,
                    e
                );
            }
        }
    }
}

/// A running gateway instance.
pub struct Gateway {
    config: GatewayConfig,
    command_buffer: CommandBuffer,
    router: InboundMessageHandler,
    connectivity: Arc<dyn ConnectivityService>,
    firmware: Option<Arc<FirmwareUpdateService>>,
    registration: Option<Arc<DeviceRegistrationService>>,
    status: Option<StatusReporting>,
    devices: Vec<SubdeviceRegistrationRequest>,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Transport callback for inbound messages. Never blocks on listener work.
    pub fn message_received(&self, channel: &str, content: &str) -> Result<()> {
        self.router.message_received(channel, content)
    }

    /// Channels the transport must subscribe to.
    pub fn channels(&self) -> Vec<String> {
        self.router.channels()
    }

    /// Set the last will, subscribe the transport, then register known
    /// devices and report their firmware versions and statuses.
    pub async fn start(&self) -> Result<()> {
        if let Some(status) = &self.status {
            status.service.devices_updated(&device_keys(&self.devices)).await?;
        }

        let channels = self.channels();
        self.connectivity.subscribe(&channels).await?;
        tracing::info!("Subscribed to {} channel(s)", channels.len());

        if self.registration.is_some() && self.config.registration.register_on_start {
            for device in &self.devices {
                self.register_device(device.clone())?;
            }
        }

        if let Some(firmware) = &self.firmware {
            for device in &self.devices {
                firmware.publish_firmware_version(&device.device_key)?;
            }
        }

        if let Some(status) = &self.status {
            queue_statuses(
                &self.command_buffer,
                Arc::downgrade(&status.service),
                status.provider.clone(),
                device_keys(&self.devices),
                false,
            )?;
        }

        Ok(())
    }

    /// Queue a registration request for a sub-device.
    pub fn register_device(&self, request: SubdeviceRegistrationRequest) -> Result<()> {
        let service = self.registration_service()?;
        self.command_buffer.push(async move {
            service.publish_registration_request(&request).await
        })?;
        Ok(())
    }

    /// Queue an update request for a registered sub-device.
    pub fn update_device(&self, request: SubdeviceUpdateRequest) -> Result<()> {
        let service = self.registration_service()?;
        self.command_buffer
            .push(async move { service.publish_update_request(&request).await })?;
        Ok(())
    }

    /// Queue a firmware version report for a device.
    pub fn publish_firmware_version(&self, device_key: &str) -> Result<()> {
        match &self.firmware {
            Some(firmware) => firmware.publish_firmware_version(device_key),
            None => Err(Error::Configuration(
                "Firmware update is not enabled".to_string(),
            )),
        }
    }

    /// Queue a status update for a device.
    pub fn publish_device_status(&self, device_key: &str, status: DeviceStatus) -> Result<()> {
        let service = match &self.status {
            Some(reporting) => reporting.service.clone(),
            None => {
                return Err(Error::Configuration(
                    "Device status reporting is not enabled".to_string(),
                ))
            }
        };

        let device_key = device_key.to_string();
        self.command_buffer.push(async move {
            service.publish_status_update(&device_key, status).await
        })?;
        Ok(())
    }

    /// Firmware update phase of a device, `None` when idle or when firmware
    /// update is disabled.
    pub fn firmware_session_state(&self, device_key: &str) -> Option<FirmwareSessionState> {
        self.firmware
            .as_ref()
            .and_then(|firmware| firmware.session_state(device_key))
    }

    /// Registration/update requests still waiting for a platform response.
    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        self.registration
            .as_ref()
            .map(|registration| registration.pending_requests())
            .unwrap_or_default()
    }

    pub fn command_buffer_stats(&self) -> CommandBufferStats {
        self.command_buffer.stats()
    }

    /// Run every queued command and stop the worker.
    pub async fn shutdown(&self) {
        self.command_buffer.shutdown().await;
        tracing::info!("Gateway stopped");
    }

    fn registration_service(&self) -> Result<Arc<DeviceRegistrationService>> {
        self.registration.clone().ok_or_else(|| {
            Error::Configuration("Sub-device registration is not enabled".to_string())
        })
    }
}
