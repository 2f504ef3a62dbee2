//! Sync/poll engine
//!
//! Drives the long-poll loop: one sync call at a time, each outcome fed into
//! the store. Failures are retried until `max_sync_retries` consecutive syncs
//! have failed; after that the loop halts until the client is started again.
//!
//! ```text
//! cancelled? ──yes──► Stopped
//!     │no
//!     ▼
//! OnPollStarted ─► sync ─► cancelled? ──yes──► Stopped (result discarded)
//!                    │
//!           ok ◄─────┴─────► err
//!           │                 │
//!    OnSyncSuccess       OnSyncFailure
//!           │                 │
//!    sleep(interval)    retries < max? ──no──► Halted
//!           │                 │yes
//!           └──── loop ◄──────┘ sleep(retry delay)
//! ```

use crate::api::SyncParams;
use crate::config::RelayConfig;
use crate::event::SyncBatch;
use crate::service::RelayBackend;
use crate::store::{RelayStore, StoreIntent};
use crate::{RelayError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Time source and sleeper for the poll loop
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn sleep(&self, duration: Duration);

    /// Wall clock, milliseconds since the epoch
    fn now_millis(&self) -> i64;
}

/// [`Scheduler`] backed by the tokio timer and the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Observable state of the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollStatus {
    /// Never started
    #[default]
    Idle,
    Polling,
    /// Stopped after too many consecutive failures
    Halted,
    /// Stopped by the client
    Stopped,
}

/// Why the loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    Cancelled,
    MaxRetriesExceeded,
}

/// Result of the first sync, reported to whoever started the loop
pub type FirstSync = oneshot::Sender<Result<()>>;

/// Long-poll loop over a [`RelayBackend`]
pub struct PollEngine {
    backend: Arc<dyn RelayBackend>,
    store: Arc<RelayStore>,
    scheduler: Arc<dyn Scheduler>,
    status: Arc<watch::Sender<PollStatus>>,
    max_sync_retries: u32,
    polling_timeout: Duration,
    poll_interval: Duration,
    retry_delay: Duration,
}

impl PollEngine {
    pub fn new(
        config: &RelayConfig,
        backend: Arc<dyn RelayBackend>,
        store: Arc<RelayStore>,
        scheduler: Arc<dyn Scheduler>,
        status: Arc<watch::Sender<PollStatus>>,
    ) -> Self {
        Self {
            backend,
            store,
            scheduler,
            status,
            max_sync_retries: config.max_sync_retries,
            polling_timeout: Duration::from_millis(config.polling_timeout_ms),
            poll_interval: config.poll_interval(),
            retry_delay: config.retry_delay(),
        }
    }

    /// Poll until cancelled or halted.
    ///
    /// `first_sync`, if given, receives the outcome of the first sync call.
    pub async fn run(&self, cancel: CancellationToken, mut first_sync: Option<FirstSync>) -> PollExit {
        self.status.send_replace(PollStatus::Polling);
        info!(max_sync_retries = self.max_sync_retries, "Polling started");

        let exit = loop {
            if cancel.is_cancelled() {
                break PollExit::Cancelled;
            }

            self.store.intent(StoreIntent::OnPollStarted).await;
            let result = self.sync().await;

            if cancel.is_cancelled() {
                debug!("Discarding sync result after stop");
                break PollExit::Cancelled;
            }

            match result {
                Ok(batch) => {
                    self.store
                        .intent(StoreIntent::OnSyncSuccess {
                            batch,
                            polling_timeout: self.polling_timeout,
                        })
                        .await;
                    report(&mut first_sync, Ok(()));

                    if self.pause(&cancel, self.poll_interval).await {
                        break PollExit::Cancelled;
                    }
                }
                Err(err) => {
                    let retries = self.store.record_sync_failure().await;
                    warn!(error = %err, retries, "Sync failed");
                    report(&mut first_sync, Err(err));

                    if retries >= self.max_sync_retries {
                        break PollExit::MaxRetriesExceeded;
                    }
                    if self.pause(&cancel, self.retry_delay).await {
                        break PollExit::Cancelled;
                    }
                }
            }
        };

        match exit {
            PollExit::Cancelled => {
                self.status.send_replace(PollStatus::Stopped);
                info!("Polling stopped");
            }
            PollExit::MaxRetriesExceeded => {
                self.status.send_replace(PollStatus::Halted);
                error!(
                    max_sync_retries = self.max_sync_retries,
                    "Polling halted after too many failed syncs"
                );
            }
        }

        report(
            &mut first_sync,
            Err(match exit {
                PollExit::Cancelled => RelayError::Stopped,
                PollExit::MaxRetriesExceeded => RelayError::MaxRetriesExceeded(self.max_sync_retries),
            }),
        );
        exit
    }

    async fn sync(&self) -> Result<SyncBatch> {
        let state = self.store.state().await;
        let access_token = state
            .access_token
            .ok_or_else(|| RelayError::RequiresAuthorization("sync".to_string()))?;
        let params = SyncParams {
            since: state.sync_token,
            timeout: state
                .polling_timeout
                .map(|timeout| u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)),
        };

        let response = self.backend.sync(&access_token, &params).await?;
        Ok(SyncBatch::from(response))
    }

    /// Sleep unless cancelled first; returns true when cancelled
    async fn pause(&self, cancel: &CancellationToken, duration: Duration) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => true,
            _ = self.scheduler.sleep(duration) => false,
        }
    }
}

impl std::fmt::Debug for PollEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollEngine")
            .field("max_sync_retries", &self.max_sync_retries)
            .field("polling_timeout", &self.polling_timeout)
            .finish_non_exhaustive()
    }
}

fn report(first_sync: &mut Option<FirstSync>, result: Result<()>) {
    if let Some(sender) = first_sync.take() {
        let _ = sender.send(result);
    }
}
