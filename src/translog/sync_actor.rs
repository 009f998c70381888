//! Sync Actor - Periodic Translog Sync and Roll
//!
//! Under `Durability::Async` writes are acknowledged before they are durable;
//! this actor bounds the window by syncing on a timer. In either durability
//! mode it also rolls the generation once it outgrows the size threshold.
//!
//! ```text
//! interval ──► SyncTick ──┐
//! caller ───► SyncNow ────┤──► SyncActor ──► manager.sync_translog()
//! caller ───► MaybeRoll ──┘                └► manager.roll_translog_generation()
//! ```
//!
//! Manager calls block on fsync, so they run on tokio's blocking pool.

use crate::translog::config::{Durability, TranslogConfig};
use crate::translog::error::TranslogError;
use crate::translog::file_store::GenerationStore;
use crate::translog::manager::TranslogManager;
use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Messages for the sync actor
pub enum SyncMessage {
    /// Periodic sync (Async durability)
    SyncTick,
    /// Sync right away and report the outcome
    SyncNow {
        response_tx: oneshot::Sender<Result<(), TranslogError>>,
    },
    /// Roll the generation if it is over the size threshold
    MaybeRoll,
    /// Final sync, then stop
    Shutdown { response_tx: oneshot::Sender<()> },
}

/// Counters reported on shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncActorStats {
    pub ticks: u64,
    pub syncs: u64,
    pub rolls: u64,
    pub failures: u64,
}

pub struct SyncActor<S: GenerationStore> {
    manager: Arc<TranslogManager<S>>,
    durability: Durability,
    sync_interval: Duration,
    rx: mpsc::UnboundedReceiver<SyncMessage>,
    stats: SyncActorStats,
}

impl<S: GenerationStore> SyncActor<S> {
    fn new(
        manager: Arc<TranslogManager<S>>,
        config: &TranslogConfig,
        rx: mpsc::UnboundedReceiver<SyncMessage>,
    ) -> Self {
        SyncActor {
            manager,
            durability: config.durability,
            sync_interval: config.sync_interval,
            rx,
            stats: SyncActorStats::default(),
        }
    }

    /// Run the actor loop. Returns its counters once shut down.
    pub async fn run(mut self) -> SyncActorStats {
        match self.durability {
            Durability::Async => self.run_async_mode().await,
            Durability::Request => self.run_request_mode().await,
        }
        info!(
            "[{}] translog sync actor stopped: {:?}",
            self.manager.shard_id(),
            self.stats
        );
        self.stats
    }

    /// Async mode: sync on every interval tick
    async fn run_async_mode(&mut self) {
        let mut interval = tokio::time::interval(self.sync_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(msg) => {
                        if self.handle_message(msg).await {
                            break;
                        }
                    }
                    None => break,
                },
                _ = interval.tick() => {
                    self.handle_message(SyncMessage::SyncTick).await;
                }
            }
        }
    }

    /// Request mode: callers sync their own writes; only explicit requests
    async fn run_request_mode(&mut self) {
        while let Some(msg) = self.rx.recv().await {
            if self.handle_message(msg).await {
                break;
            }
        }
    }

    /// Handle one message. Returns true on shutdown.
    async fn handle_message(&mut self, msg: SyncMessage) -> bool {
        match msg {
            SyncMessage::SyncTick => {
                self.stats.ticks = self.stats.ticks.saturating_add(1);
                self.sync_if_needed().await;
                self.maybe_roll().await;
                false
            }
            SyncMessage::SyncNow { response_tx } => {
                let result = self.sync().await;
                let _ = response_tx.send(result);
                false
            }
            SyncMessage::MaybeRoll => {
                self.maybe_roll().await;
                false
            }
            SyncMessage::Shutdown { response_tx } => {
                self.sync_if_needed().await;
                let _ = response_tx.send(());
                true
            }
        }
    }

    /// Run a manager call on the blocking pool; fsync and roll block on I/O
    async fn blocking<T, F>(&self, op: F) -> Result<T, TranslogError>
    where
        T: Send + 'static,
        F: FnOnce(&TranslogManager<S>) -> Result<T, TranslogError> + Send + 'static,
    {
        let manager = Arc::clone(&self.manager);
        task::spawn_blocking(move || op(&manager))
            .await
            .map_err(map_join_error)?
    }

    async fn sync_if_needed(&mut self) {
        let needed = self.blocking(|m| m.is_translog_sync_needed()).await;
        match needed {
            Ok(true) => {
                let _ = self.sync().await;
            }
            Ok(false) => {}
            Err(e) => self.record_failure("translog sync check failed", &e),
        }
    }

    async fn sync(&mut self) -> Result<(), TranslogError> {
        let synced = self.blocking(|m| m.sync_translog()).await;
        match synced {
            Ok(()) => {
                self.stats.syncs = self.stats.syncs.saturating_add(1);
                Ok(())
            }
            Err(e) => {
                self.record_failure("periodic translog sync failed", &e);
                Err(e)
            }
        }
    }

    async fn maybe_roll(&mut self) {
        let rolled = self
            .blocking(|m| {
                if !m.should_roll_translog_generation()? {
                    return Ok(false);
                }
                m.roll_translog_generation()?;
                Ok(true)
            })
            .await;
        match rolled {
            Ok(true) => self.stats.rolls = self.stats.rolls.saturating_add(1),
            Ok(false) => {}
            Err(e) => self.record_failure("translog roll failed", &e),
        }
    }

    fn record_failure(&mut self, what: &str, err: &TranslogError) {
        self.stats.failures = self.stats.failures.saturating_add(1);
        error!("[{}] {}: {}", self.manager.shard_id(), what, err);
    }
}

fn map_join_error(err: task::JoinError) -> TranslogError {
    TranslogError::Io(IoError::new(
        ErrorKind::Other,
        format!("blocking translog task failed: {}", err),
    ))
}

// ============================================================================
// SyncActorHandle - public interface for the sync actor
// ============================================================================

#[derive(Clone)]
pub struct SyncActorHandle {
    tx: mpsc::UnboundedSender<SyncMessage>,
    durability: Durability,
}

impl SyncActorHandle {
    /// Sync now and wait for the result
    pub async fn sync_now(&self) -> Result<(), TranslogError> {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .tx
            .send(SyncMessage::SyncNow { response_tx })
            .is_err()
        {
            return Err(TranslogError::Io(IoError::new(
                ErrorKind::BrokenPipe,
                "sync actor unavailable",
            )));
        }
        response_rx.await.unwrap_or_else(|_| {
            Err(TranslogError::Io(IoError::new(
                ErrorKind::BrokenPipe,
                "sync actor dropped response channel",
            )))
        })
    }

    /// Ask for a roll check without waiting
    pub fn maybe_roll(&self) {
        let _ = self.tx.send(SyncMessage::MaybeRoll);
    }

    /// Trigger one periodic-sync pass without waiting for the timer
    pub fn sync_tick(&self) {
        let _ = self.tx.send(SyncMessage::SyncTick);
    }

    /// Graceful shutdown; waits for the final sync
    pub async fn shutdown(&self) {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .tx
            .send(SyncMessage::Shutdown { response_tx })
            .is_ok()
        {
            let _ = response_rx.await;
        }
    }

    pub fn durability(&self) -> Durability {
        self.durability
    }
}

/// Spawn a sync actor for `manager` and return its handle + join handle
pub fn spawn_sync_actor<S: GenerationStore>(
    manager: Arc<TranslogManager<S>>,
    config: &TranslogConfig,
) -> (SyncActorHandle, tokio::task::JoinHandle<SyncActorStats>) {
    debug_assert!(
        !config.sync_interval.is_zero(),
        "Precondition: sync_interval must be positive"
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let actor = SyncActor::new(manager, config, rx);
    let task = tokio::spawn(actor.run());

    let handle = SyncActorHandle {
        tx,
        durability: config.durability,
    };
    (handle, task)
}
