//! Firmware update service.
//!
//! All session state is mutated from command buffer commands only. Downloads
//! and installations run in spawned tasks whose results come back as new
//! commands tagged with the session id they belong to; results for a session
//! that has since been aborted or replaced are dropped.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use edgelink_core::command_buffer::panic_message;
use edgelink_core::{
    CommandBuffer, ConnectivityService, FirmwareConfig, Message, MessageListener, Protocol, Result,
};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::model::{
    FirmwareSessionState, FirmwareUpdateCommand, FirmwareUpdateCommandType,
    FirmwareUpdateErrorCode, FirmwareUpdateResponse, FirmwareUpdateStatus, FirmwareVersion,
};
use super::{FileDownloader, FirmwareInstaller, FirmwareVersionProvider};
use crate::error::{DownloadError, InstallError};
use crate::protocol::FirmwareUpdateProtocol;

struct Session {
    id: u64,
    state: FirmwareSessionState,
    auto_install: bool,
    file_path: Option<PathBuf>,
    download: Option<JoinHandle<()>>,
}

impl Session {
    fn is(&self, id: u64, state: FirmwareSessionState) -> bool {
        self.id == id && self.state == state
    }
}

/// Listener driving firmware updates for the gateway and its sub-devices.
pub struct FirmwareUpdateService {
    protocol: Arc<dyn FirmwareUpdateProtocol>,
    connectivity: Arc<dyn ConnectivityService>,
    downloader: Arc<dyn FileDownloader>,
    installer: Arc<dyn FirmwareInstaller>,
    version_provider: Arc<dyn FirmwareVersionProvider>,
    command_buffer: CommandBuffer,
    publish_version_on_completion: bool,
    /// Active sessions by device key
    sessions: Mutex<HashMap<String, Session>>,
    next_session_id: AtomicU64,
    this: Weak<Self>,
}

impl FirmwareUpdateService {
    pub fn new(
        protocol: Arc<dyn FirmwareUpdateProtocol>,
        connectivity: Arc<dyn ConnectivityService>,
        downloader: Arc<dyn FileDownloader>,
        installer: Arc<dyn FirmwareInstaller>,
        version_provider: Arc<dyn FirmwareVersionProvider>,
        command_buffer: CommandBuffer,
        config: &FirmwareConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            protocol,
            connectivity,
            downloader,
            installer,
            version_provider,
            command_buffer,
            publish_version_on_completion: config.publish_version_on_completion,
            sessions: Mutex::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
            this: this.clone(),
        })
    }

    /// Queue a firmware version report for `device_key`.
    pub fn publish_firmware_version(&self, device_key: &str) -> Result<()> {
        let device_key = device_key.to_string();
        schedule(&self.command_buffer, self.this.clone(), move |service| async move {
            service.send_firmware_version(&device_key).await;
            Ok(())
        })
    }

    /// Phase of the update running for `device_key`, `None` when idle.
    pub fn session_state(&self, device_key: &str) -> Option<FirmwareSessionState> {
        self.sessions.lock().get(device_key).map(|s| s.state)
    }

    async fn handle_command(&self, device_key: String, command: FirmwareUpdateCommand) -> Result<()> {
        match command.command {
            FirmwareUpdateCommandType::FileUpload => {
                tracing::warn!(
                    "File upload is not supported, ignoring command for device {}",
                    device_key
                );
            }
            FirmwareUpdateCommandType::UrlDownload => {
                let auto_install = command.auto_install();
                self.start_download(device_key, command.url, auto_install)
                    .await;
            }
            FirmwareUpdateCommandType::Install => self.start_install(&device_key).await,
            FirmwareUpdateCommandType::Abort => self.abort(&device_key).await,
        }
        Ok(())
    }

    async fn start_download(&self, device_key: String, url: Option<String>, auto_install: bool) {
        let Some(url) = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) else {
            tracing::warn!("Missing firmware URL in download command for device {}", device_key);
            self.send_error(&device_key, FirmwareUpdateErrorCode::UnspecifiedError)
                .await;
            return;
        };

        let busy = self.session_state(&device_key);
        if let Some(state) = busy {
            tracing::warn!(
                "Firmware update already in progress for device {} ({:?}), rejecting download",
                device_key,
                state
            );
            self.send_error(&device_key, FirmwareUpdateErrorCode::UnspecifiedError)
                .await;
            return;
        }

        tracing::info!("Downloading firmware for device {} from {}", device_key, url);

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let download = self.spawn_download(device_key.clone(), id, url);
        self.sessions.lock().insert(
            device_key,
            Session {
                id,
                state: FirmwareSessionState::Downloading,
                auto_install,
                file_path: None,
                download: Some(download),
            },
        );
    }

    fn spawn_download(&self, device_key: String, session_id: u64, url: String) -> JoinHandle<()> {
        let downloader = self.downloader.clone();
        let buffer = self.command_buffer.clone();
        let service = self.this.clone();

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(downloader.download(&url))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(DownloadError::Unspecified(format!(
                        "Downloader panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                });
            let scheduled = schedule(&buffer, service, move |service| async move {
                service
                    .download_finished(device_key, session_id, outcome)
                    .await;
                Ok(())
            });
            if scheduled.is_err() {
                tracing::debug!("Command buffer closed, dropping result of download {}", url);
            }
        })
    }

    async fn download_finished(
        &self,
        device_key: String,
        session_id: u64,
        outcome: std::result::Result<PathBuf, DownloadError>,
    ) {
        match outcome {
            Ok(path) => {
                let auto_install = self.with_session(
                    &device_key,
                    session_id,
                    FirmwareSessionState::Downloading,
                    |session| {
                        session.state = FirmwareSessionState::FileReady;
                        session.file_path = Some(path.clone());
                        session.download = None;
                        session.auto_install
                    },
                );
                let Some(auto_install) = auto_install else {
                    tracing::debug!("Ignoring stale download result for device {}", device_key);
                    return;
                };

                tracing::info!(
                    "Firmware file for device {} ready: {}",
                    device_key,
                    path.display()
                );
                self.send_status(&device_key, FirmwareUpdateStatus::FileReady)
                    .await;

                if auto_install {
                    self.start_install(&device_key).await;
                }
            }
            Err(e) => {
                if self
                    .take_session(&device_key, session_id, FirmwareSessionState::Downloading)
                    .is_none()
                {
                    tracing::debug!("Ignoring stale download failure for device {}", device_key);
                    return;
                }

                tracing::warn!("Firmware download for device {} failed: {}", device_key, e);
                self.send_error(&device_key, e.error_code()).await;
            }
        }
    }

    async fn start_install(&self, device_key: &str) {
        let ready = {
            let mut sessions = self.sessions.lock();
            match sessions.get_mut(device_key) {
                Some(session) => match (session.state, session.file_path.clone()) {
                    (FirmwareSessionState::FileReady, Some(path)) => {
                        session.state = FirmwareSessionState::Installing;
                        Ok((session.id, path))
                    }
                    (FirmwareSessionState::Installing, _) => {
                        Err(FirmwareUpdateErrorCode::UnspecifiedError)
                    }
                    _ => Err(FirmwareUpdateErrorCode::FileSystemError),
                },
                None => Err(FirmwareUpdateErrorCode::FileSystemError),
            }
        };

        let (session_id, path) = match ready {
            Ok(ready) => ready,
            Err(code) => {
                tracing::warn!(
                    "Firmware install rejected for device {}: {:?}",
                    device_key,
                    code
                );
                self.send_error(device_key, code).await;
                return;
            }
        };

        tracing::info!(
            "Installing firmware on device {} from {}",
            device_key,
            path.display()
        );
        self.send_status(device_key, FirmwareUpdateStatus::Installation)
            .await;
        self.spawn_install(device_key.to_string(), session_id, path);
    }

    fn spawn_install(&self, device_key: String, session_id: u64, path: PathBuf) {
        let installer = self.installer.clone();
        let buffer = self.command_buffer.clone();
        let service = self.this.clone();

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(installer.install(&device_key, &path))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(InstallError::Failed(format!(
                        "Installer panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                });
            let scheduled = schedule(&buffer, service, move |service| async move {
                service
                    .install_finished(device_key, session_id, outcome)
                    .await;
                Ok(())
            });
            if scheduled.is_err() {
                tracing::debug!(
                    "Command buffer closed, dropping install result for {}",
                    path.display()
                );
            }
        });
    }

    async fn install_finished(
        &self,
        device_key: String,
        session_id: u64,
        outcome: std::result::Result<(), InstallError>,
    ) {
        if self
            .take_session(&device_key, session_id, FirmwareSessionState::Installing)
            .is_none()
        {
            tracing::debug!("Ignoring stale install result for device {}", device_key);
            return;
        }

        match outcome {
            Ok(()) => {
                tracing::info!("Firmware installed on device {}", device_key);
                self.send_status(&device_key, FirmwareUpdateStatus::Completed)
                    .await;
                if self.publish_version_on_completion {
                    self.send_firmware_version(&device_key).await;
                }
            }
            Err(e) => {
                tracing::warn!("Firmware install on device {} failed: {}", device_key, e);
                self.send_error(&device_key, FirmwareUpdateErrorCode::InstallationFailed)
                    .await;
            }
        }
    }

    async fn abort(&self, device_key: &str) {
        let state = self.session_state(device_key);
        match state {
            None => {
                tracing::info!("No firmware update in progress for device {}", device_key);
                return;
            }
            Some(FirmwareSessionState::Installing) => {
                if !self.installer.abort(device_key) {
                    tracing::info!(
                        "Firmware installation cannot be aborted for device {}",
                        device_key
                    );
                    return;
                }
            }
            Some(_) => {}
        }

        let session = self.sessions.lock().remove(device_key);
        if let Some(download) = session.and_then(|s| s.download) {
            download.abort();
        }

        tracing::info!("Firmware update aborted for device {}", device_key);
        self.send_status(device_key, FirmwareUpdateStatus::Aborted)
            .await;
    }

    fn with_session<T>(
        &self,
        device_key: &str,
        session_id: u64,
        state: FirmwareSessionState,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Option<T> {
        let mut sessions = self.sessions.lock();
        sessions
            .get_mut(device_key)
            .filter(|s| s.is(session_id, state))
            .map(f)
    }

    fn take_session(
        &self,
        device_key: &str,
        session_id: u64,
        state: FirmwareSessionState,
    ) -> Option<Session> {
        let mut sessions = self.sessions.lock();
        let current = sessions
            .get(device_key)
            .is_some_and(|s| s.is(session_id, state));
        if current {
            sessions.remove(device_key)
        } else {
            None
        }
    }

    async fn send_status(&self, device_key: &str, status: FirmwareUpdateStatus) {
        self.send_response(device_key, FirmwareUpdateResponse::status(status))
            .await;
    }

    async fn send_error(&self, device_key: &str, code: FirmwareUpdateErrorCode) {
        self.send_response(device_key, FirmwareUpdateResponse::error(code))
            .await;
    }

    async fn send_response(&self, device_key: &str, response: FirmwareUpdateResponse) {
        let message = match self.protocol.make_response_message(device_key, &response) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Failed to create firmware update response: {}", e);
                return;
            }
        };

        if let Err(e) = self.connectivity.publish(message).await {
            tracing::warn!(
                "Firmware update response not published for device {}: {}",
                device_key,
                e
            );
        }
    }

    async fn send_firmware_version(&self, device_key: &str) {
        let version = self.version_provider.firmware_version(device_key);
        if version.is_empty() {
            tracing::warn!("Failed to get firmware version for device {}", device_key);
            return;
        }

        let message = match self
            .protocol
            .make_firmware_version_message(&FirmwareVersion::new(device_key, version))
        {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Failed to create firmware version message: {}", e);
                return;
            }
        };

        if let Err(e) = self.connectivity.publish(message).await {
            tracing::warn!(
                "Firmware version not published for device {}: {}",
                device_key,
                e
            );
        }
    }
}

#[async_trait]
impl MessageListener for FirmwareUpdateService {
    fn protocol(&self) -> &dyn Protocol {
        self.protocol.as_protocol()
    }

    async fn message_received(&self, message: Message) -> Result<()> {
        if !self.protocol.is_firmware_update_message(&message) {
            tracing::warn!(
                "Not a firmware update message; channel: {}",
                message.channel()
            );
            return Ok(());
        }

        let Some(device_key) = self.protocol.extract_device_key(message.channel()) else {
            tracing::warn!(
                "Unable to extract device key from channel: {}",
                message.channel()
            );
            return Ok(());
        };

        let command = match self.protocol.make_firmware_update_command(&message) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("Unable to parse firmware update command: {}", e);
                return Ok(());
            }
        };

        tracing::debug!(
            "Firmware update command {:?} for device {}",
            command.command,
            device_key
        );
        schedule(&self.command_buffer, self.this.clone(), move |service| async move {
            service.handle_command(device_key, command).await
        })
    }
}

/// Push work for the service onto the buffer. The work is skipped if the
/// service is gone by the time it runs.
fn schedule<F, Fut>(
    buffer: &CommandBuffer,
    service: Weak<FirmwareUpdateService>,
    f: F,
) -> Result<()>
where
    F: FnOnce(Arc<FirmwareUpdateService>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    buffer.push(async move {
        match service.upgrade() {
            Some(service) => f(service).await,
            None => Ok(()),
        }
    })?;
    Ok(())
}
