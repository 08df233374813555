//! Background expiry sweeper.
//!
//! Periodically deletes rows whose expiry has passed. At most one sweep task
//! runs per sweeper; starting it again replaces the previous schedule.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sessionstore_core::session::{Clock, Result, SessionTable};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::observer::StoreObserver;

/// Delete every expired row once.
pub(crate) async fn sweep_once(
    table: &dyn SessionTable,
    clock: &dyn Clock,
    observer: &dyn StoreObserver,
) -> Result<u64> {
    observer.on_sweep_start();

    let result: Result<u64> = table
        .delete_expired(clock.now())
        .await
        .map_err(Into::into);

    match &result {
        Ok(0) => tracing::debug!("Expiry sweep: no expired sessions"),
        Ok(deleted) => tracing::info!(deleted, "Expired sessions removed"),
        Err(err) => tracing::warn!(error = %err, "Expiry sweep failed"),
    }

    observer.on_sweep_end(&result);
    result
}

struct Running {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Owns the background sweep task.
///
/// The task is aborted when the sweeper is dropped, so it never outlives the
/// store and never keeps the runtime alive on its own.
pub struct ExpirySweeper {
    table: Arc<dyn SessionTable>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn StoreObserver>,
    running: Mutex<Option<Running>>,
}

impl ExpirySweeper {
    pub fn new(
        table: Arc<dyn SessionTable>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn StoreObserver>,
    ) -> Self {
        Self {
            table,
            clock,
            observer,
            running: Mutex::new(None),
        }
    }

    /// Start sweeping every `period`, cancelling any previous schedule.
    ///
    /// A zero period only stops the current schedule. Must be called from
    /// within a tokio runtime.
    pub fn start(&self, period: Duration) {
        let mut running = self.lock();
        if let Some(previous) = running.take() {
            previous.task.abort();
        }

        if period.is_zero() {
            tracing::debug!("Expiry sweeper disabled");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let table = Arc::clone(&self.table);
        let clock = Arc::clone(&self.clock);
        let observer = Arc::clone(&self.observer);

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // Skip the first immediate tick
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = sweep_once(table.as_ref(), clock.as_ref(), observer.as_ref()).await;
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Expiry sweeper shutting down");
                        break;
                    }
                }
            }
        });

        tracing::debug!(interval_ms = period.as_millis() as u64, "Expiry sweeper started");
        *running = Some(Running { shutdown_tx, task });
    }

    /// Cancel the schedule immediately, interrupting a sweep in flight.
    pub fn stop(&self) {
        if let Some(running) = self.lock().take() {
            running.task.abort();
        }
    }

    /// Stop the schedule, letting a sweep in flight finish first.
    pub async fn shutdown(&self) {
        let running = self.lock().take();
        if let Some(Running { shutdown_tx, task }) = running {
            let _ = shutdown_tx.send(());
            let _ = task.await;
        }
    }

    /// Whether a sweep schedule is active.
    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
