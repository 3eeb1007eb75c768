#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use safesound_contracts::alert::{Alert, AlertId};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::orchestrator::NotificationOrchestrator;

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(20);
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Runs fan-outs in the background, at most `max_concurrent` at a time.
/// Each fan-out runs in its own task so a panic is observed and logged here.
/// Queued and running fan-outs are tracked until they settle so `shutdown`
/// can drain them and name the ones it had to abandon.
#[derive(Clone)]
pub struct NotificationSupervisor {
    orchestrator: Arc<NotificationOrchestrator>,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<BTreeMap<AlertId, usize>>>,
    closed: Arc<AtomicBool>,
}

/// Removes one in-flight entry when the fan-out task ends, however it ends.
struct InFlightGuard {
    in_flight: Arc<Mutex<BTreeMap<AlertId, usize>>>,
    alert_id: AlertId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut map = self.in_flight.lock();
        if let Some(count) = map.get_mut(&self.alert_id) {
            *count -= 1;
            if *count == 0 {
                map.remove(&self.alert_id);
            }
        }
    }
}

impl NotificationSupervisor {
    pub fn new(orchestrator: Arc<NotificationOrchestrator>, max_concurrent: usize) -> Self {
        Self {
            orchestrator,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            in_flight: Arc::new(Mutex::new(BTreeMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn orchestrator(&self) -> &Arc<NotificationOrchestrator> {
        &self.orchestrator
    }

    pub fn in_flight(&self) -> Vec<AlertId> {
        self.in_flight.lock().keys().copied().collect()
    }

    /// Fire-and-forget. The handle is only for callers that want to observe completion.
    /// After `shutdown` the alert is logged as dropped and nothing is sent.
    pub fn spawn(&self, alert: Alert) -> JoinHandle<()> {
        let alert_id = alert.id;
        if self.closed.load(Ordering::SeqCst) {
            tracing::error!(alert_id = %alert_id, "supervisor shut down; notification dropped");
            return tokio::spawn(async {});
        }
        *self.in_flight.lock().entry(alert_id).or_insert(0) += 1;
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            alert_id,
        };
        let orchestrator = Arc::clone(&self.orchestrator);
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _guard = guard;
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    tracing::error!(alert_id = %alert_id, error = %err, "fan-out pool closed; notification dropped");
                    return;
                }
            };
            let run = tokio::spawn(async move { orchestrator.dispatch(&alert).await });
            match run.await {
                Ok(summary) => tracing::debug!(
                    alert_id = %alert_id,
                    settled = summary.settled_attempts(),
                    "fan-out finished"
                ),
                Err(err) => tracing::error!(
                    alert_id = %alert_id,
                    error = %err,
                    "notification fan-out panicked"
                ),
            }
        })
    }

    /// Closes intake, then waits up to `grace` for tracked fan-outs to settle.
    /// Returns the alerts still pending when the grace period ran out.
    pub async fn shutdown(&self, grace: Duration) -> Vec<AlertId> {
        self.closed.store(true, Ordering::SeqCst);
        let pending = self.in_flight().len();
        if pending > 0 {
            tracing::info!(pending, grace_ms = grace.as_millis() as u64, "draining notification fan-outs");
        }
        let drained = tokio::time::timeout(grace, async {
            while !self.in_flight.lock().is_empty() {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        })
        .await;
        if drained.is_ok() {
            return Vec::new();
        }
        let abandoned = self.in_flight();
        for alert_id in &abandoned {
            tracing::error!(alert_id = %alert_id, "shutdown grace elapsed; notification fan-out abandoned");
        }
        abandoned
    }
}
