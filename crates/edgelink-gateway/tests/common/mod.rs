//! Common test utilities for gateway tests.
//!
//! Mock collaborators record what they were asked to do into a shared
//! [`EventLog`], so tests can assert on relative ordering.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edgelink_core::{CommandBuffer, ConnectivityService, Error, Message, Result};
use edgelink_gateway::error::{DownloadError, InstallError};
use edgelink_gateway::firmware::{FileDownloader, FirmwareInstaller, FirmwareVersionProvider};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// Ordered record of collaborator calls.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == event)
    }
}

/// Connectivity mock recording publishes and subscriptions.
#[derive(Default)]
pub struct RecordingConnectivity {
    published: Mutex<Vec<Message>>,
    subscriptions: Mutex<Vec<Vec<String>>>,
    last_wills: Mutex<Vec<Message>>,
    fail_publish: AtomicBool,
    log: EventLog,
}

impl RecordingConnectivity {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn published(&self) -> Vec<Message> {
        self.published.lock().clone()
    }

    pub fn published_on(&self, channel: &str) -> Vec<Message> {
        self.published
            .lock()
            .iter()
            .filter(|m| m.channel() == channel)
            .cloned()
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<Vec<String>> {
        self.subscriptions.lock().clone()
    }

    pub fn last_wills(&self) -> Vec<Message> {
        self.last_wills.lock().clone()
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityService for RecordingConnectivity {
    async fn publish(&self, message: Message) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(Error::publish(message.channel(), "transport offline"));
        }

        self.log.push(format!("publish {}", message.content()));
        self.published.lock().push(message);
        Ok(())
    }

    async fn subscribe(&self, channels: &[String]) -> Result<()> {
        self.subscriptions.lock().push(channels.to_vec());
        Ok(())
    }

    async fn set_last_will(&self, message: Message) -> Result<()> {
        self.last_wills.lock().push(message);
        Ok(())
    }
}

/// Downloader mock. Gated instances hold every download until released.
pub struct MockDownloader {
    outcome: Mutex<std::result::Result<PathBuf, DownloadError>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
    panic_next: AtomicBool,
    log: EventLog,
}

impl MockDownloader {
    pub fn new(log: EventLog, outcome: std::result::Result<PathBuf, DownloadError>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            calls: Mutex::new(Vec::new()),
            gate: None,
            panic_next: AtomicBool::new(false),
            log,
        }
    }

    /// Panic inside the next download instead of returning.
    pub fn panic_on_next(self) -> Self {
        self.panic_next.store(true, Ordering::SeqCst);
        self
    }

    pub fn gated(log: EventLog, outcome: std::result::Result<PathBuf, DownloadError>) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(log, outcome)
        }
    }

    /// Let one held download finish.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl FileDownloader for MockDownloader {
    async fn download(&self, url: &str) -> std::result::Result<PathBuf, DownloadError> {
        self.calls.lock().push(url.to_string());
        self.log.push(format!("download {}", url));

        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("connection reset while downloading {}", url);
        }

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| DownloadError::Unspecified(e.to_string()))?
                .forget();
        }

        self.outcome.lock().clone()
    }
}

/// Installer mock with configurable outcome and abortability.
pub struct MockInstaller {
    outcome: Mutex<std::result::Result<(), InstallError>>,
    abortable: AtomicBool,
    installs: Mutex<Vec<(String, PathBuf)>>,
    aborts: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
    panic_next: AtomicBool,
    log: EventLog,
}

impl MockInstaller {
    pub fn new(log: EventLog) -> Self {
        Self {
            outcome: Mutex::new(Ok(())),
            abortable: AtomicBool::new(false),
            installs: Mutex::new(Vec::new()),
            aborts: Mutex::new(Vec::new()),
            gate: None,
            panic_next: AtomicBool::new(false),
            log,
        }
    }

    pub fn gated(log: EventLog) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(log)
        }
    }

    pub fn failing(self) -> Self {
        *self.outcome.lock() = Err(InstallError::Failed("flash write error".to_string()));
        self
    }

    /// Panic inside the next installation instead of returning.
    pub fn panic_on_next(self) -> Self {
        self.panic_next.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_abortable(&self, abortable: bool) {
        self.abortable.store(abortable, Ordering::SeqCst);
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn installs(&self) -> Vec<(String, PathBuf)> {
        self.installs.lock().clone()
    }

    pub fn aborts(&self) -> Vec<String> {
        self.aborts.lock().clone()
    }
}

#[async_trait]
impl FirmwareInstaller for MockInstaller {
    async fn install(
        &self,
        device_key: &str,
        file_path: &Path,
    ) -> std::result::Result<(), InstallError> {
        self.installs
            .lock()
            .push((device_key.to_string(), file_path.to_path_buf()));
        self.log.push(format!("install {}", device_key));

        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("flash controller fault on {}", device_key);
        }

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| InstallError::Failed(e.to_string()))?
                .forget();
        }

        self.outcome.lock().clone()
    }

    fn abort(&self, device_key: &str) -> bool {
        self.aborts.lock().push(device_key.to_string());
        self.abortable.load(Ordering::SeqCst)
    }
}

/// Version provider returning the same version for every device.
pub struct StaticVersion(pub String);

impl FirmwareVersionProvider for StaticVersion {
    fn firmware_version(&self, _device_key: &str) -> String {
        self.0.clone()
    }
}

/// Poll `condition` until it holds. Panics after two seconds.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not met within timeout");
}

/// Let queued commands, and the commands they queue, run.
pub async fn settle(buffer: &CommandBuffer) {
    for _ in 0..5 {
        let (tx, rx) = tokio::sync::oneshot::channel();
        buffer
            .push(async move {
                let _ = tx.send(());
                Ok(())
            })
            .unwrap();
        rx.await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
