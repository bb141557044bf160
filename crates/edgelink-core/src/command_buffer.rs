//! Ordered command buffer.
//!
//! Decouples producers (transport callbacks, timers, download completions)
//! from execution. Every command pushed is run by a single worker task, one
//! at a time, in submission order.
//!
//! The queue is unbounded: commands are short-lived and capture only the
//! data they need, so no backpressure is applied to producers.
//!
//! ## Shutdown
//!
//! [`CommandBuffer::shutdown`] enqueues a stop marker. Commands accepted
//! before the marker run to completion; later pushes are rejected with
//! [`CommandBufferError::Closed`]. Commands that race the marker into the
//! queue are discarded and logged.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{CommandBufferError, Result};

/// A deferred unit of work.
pub type Command = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

enum Job {
    Run(Command),
    Stop,
}

/// Command buffer statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBufferStats {
    /// Commands waiting for the worker
    pub pending: usize,
    /// Commands executed (successful or not)
    pub processed: u64,
    /// Commands that returned an error or panicked
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    pending: AtomicUsize,
    processed: AtomicU64,
    failed: AtomicU64,
}

/// FIFO command buffer drained by one worker task.
///
/// Cloning is cheap; all clones feed the same worker.
#[derive(Clone)]
pub struct CommandBuffer {
    tx: mpsc::UnboundedSender<Job>,
    counters: Arc<Counters>,
    closed: Arc<AtomicBool>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl CommandBuffer {
    /// Create a command buffer and spawn its worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());

        let handle = tokio::spawn(run_worker(rx, counters.clone()));

        Self {
            tx,
            counters,
            closed: Arc::new(AtomicBool::new(false)),
            worker: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Enqueue a command.
    ///
    /// Never blocks; safe to call from any thread.
    pub fn push<F>(&self, command: F) -> std::result::Result<(), CommandBufferError>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(CommandBufferError::Closed);
        }

        self.counters.pending.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(Job::Run(Box::pin(command))).is_err() {
            self.counters.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(CommandBufferError::Closed);
        }

        Ok(())
    }

    /// Enqueue a synchronous closure.
    pub fn push_fn<F>(&self, command: F) -> std::result::Result<(), CommandBufferError>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.push(async move { command() })
    }

    /// Current statistics.
    pub fn stats(&self) -> CommandBufferStats {
        CommandBufferStats {
            pending: self.counters.pending.load(Ordering::Acquire),
            processed: self.counters.processed.load(Ordering::Acquire),
            failed: self.counters.failed.load(Ordering::Acquire),
        }
    }

    /// Whether the buffer stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting commands, run everything already queued, and wait for
    /// the worker to exit.
    ///
    /// Must not be awaited from inside a command: the worker would wait on
    /// itself.
    pub async fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // The worker owns the receiver, so this only fails if it already exited.
            let _ = self.tx.send(Job::Stop);
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Command buffer worker terminated abnormally: {}", e);
            }
        }
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Job>, counters: Arc<Counters>) {
    tracing::debug!("Command buffer worker started");

    while let Some(job) = rx.recv().await {
        let command = match job {
            Job::Run(command) => command,
            Job::Stop => break,
        };

        counters.pending.fetch_sub(1, Ordering::AcqRel);

        let outcome = AssertUnwindSafe(command).catch_unwind().await;
        counters.processed.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                counters.failed.fetch_add(1, Ordering::AcqRel);
                tracing::warn!("Command failed: {}", e);
            }
            Err(panic) => {
                counters.failed.fetch_add(1, Ordering::AcqRel);
                tracing::error!("Command panicked: {}", panic_message(panic.as_ref()));
            }
        }
    }

    rx.close();
    let mut discarded = 0usize;
    while let Ok(job) = rx.try_recv() {
        if let Job::Run(_) = job {
            counters.pending.fetch_sub(1, Ordering::AcqRel);
            discarded += 1;
        }
    }
    if discarded > 0 {
        tracing::warn!("Discarded {} command(s) enqueued during shutdown", discarded);
    }

    tracing::debug!("Command buffer worker stopped");
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
