//! Batch completion listener
//!
//! A long-lived subscriber on the batch-completion channel, running on its
//! own dedicated connection, never shared with ingestion work. The wait is
//! bounded so the loop can check for shutdown even when no batches arrive;
//! on each wake every pending notification is drained, in whatever order
//! the channel delivers them, and handed to the orchestrator one at a
//! time. An orchestration error is logged per event and never terminates
//! the loop.
//!
//! The subscription persists for the listener's whole life; shutdown is an
//! explicit cooperative signal through the returned [`ListenerHandle`],
//! not a connection torn down under the blocking wait.

use crate::orchestrator::RefreshOrchestrator;
use crate::Result;
use freightline_core::BatchId;
use freightline_storage::BATCH_COMPLETE_CHANNEL;
use sqlx::postgres::{PgListener, PgNotification};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Default bounded wait between liveness checks
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait for further pending notifications after one arrives
const DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Subscribes to batch completions and drives the orchestrator
pub struct CompletionListener {
    database_url: String,
    orchestrator: RefreshOrchestrator,
    wait_timeout: Duration,
}

impl CompletionListener {
    pub fn new(database_url: impl Into<String>, orchestrator: RefreshOrchestrator) -> Self {
        Self {
            database_url: database_url.into(),
            orchestrator,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Override the bounded wait used between liveness checks
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Subscribe and start the listen loop as a background task
    ///
    /// The connection is dedicated and operates outside any transaction,
    /// so notification delivery is never held behind ingestion work.
    pub async fn start(self) -> Result<ListenerHandle> {
        let mut listener = PgListener::connect(&self.database_url).await?;
        listener.listen(BATCH_COMPLETE_CHANNEL).await?;
        info!(channel = BATCH_COMPLETE_CHANNEL, "Listening for batch completions");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run_loop(listener, shutdown_rx));

        Ok(ListenerHandle {
            shutdown: shutdown_tx,
            task,
        })
    }

    async fn run_loop(self, mut listener: PgListener, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender also means the owner is gone
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                delivery = timeout(self.wait_timeout, listener.recv()) => match delivery {
                    Err(_) => {
                        debug!("No batch completions, listener alive");
                    }
                    Ok(Ok(notification)) => {
                        self.handle(notification).await;
                        self.drain(&mut listener).await;
                    }
                    Ok(Err(e)) => {
                        // recv re-establishes the connection on the next call
                        warn!(error = %e, "Notification wait failed, reconnecting");
                    }
                },
            }
        }
        info!("Completion listener stopped");
    }

    /// Drain every notification already pending after a delivery
    async fn drain(&self, listener: &mut PgListener) {
        loop {
            match timeout(DRAIN_TIMEOUT, listener.recv()).await {
                Ok(Ok(notification)) => self.handle(notification).await,
                _ => break,
            }
        }
    }

    /// Hand one completion to the orchestrator, isolating its errors
    async fn handle(&self, notification: PgNotification) {
        let batch_id = BatchId::new(notification.payload());
        info!(batch_id = %batch_id, "Received batch completion");

        if let Err(e) = self.orchestrator.process_completed_batch(&batch_id).await {
            error!(
                batch_id = %batch_id,
                error = %e,
                "Batch processing failed, listener continues"
            );
        }
    }
}

/// Lifecycle handle for a running listener
///
/// Owned by the process that started the listener; dropping the handle
/// without calling [`stop`](Self::stop) also shuts the loop down, since
/// the shutdown sender goes with it.
pub struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Signal the loop to stop
    ///
    /// Idempotent: signaling an already-stopped listener is a no-op.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Whether the loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Listener task ended abnormally");
        }
    }
}
