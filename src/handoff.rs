//! Operator handoff at verification checkpoints

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::VerificationOutcome;

/// Synchronization point between the scripted flow and a human operator
///
/// The script blocks at checkpoints it cannot perform itself (slider
/// CAPTCHA, SMS code); the operator's single "I have completed
/// verification" action releases it. Signals are keyed to the task id; a
/// signal with no registered waiter is a no-op.
#[derive(Debug, Default)]
pub struct VerificationHandoff {
    waiters: DashMap<Uuid, Arc<Notify>>,
}

impl VerificationHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the operator signals, the timeout elapses, or the task
    /// is cancelled
    ///
    /// Cancellation unblocks immediately rather than waiting out the
    /// timeout. The waiter registration is removed on every exit path.
    pub async fn await_operator(
        &self,
        task_id: Uuid,
        timeout: Duration,
        cancel: &Notify,
        cancelled: impl Fn() -> bool,
    ) -> VerificationOutcome {
        // A cancel that raced ahead of this checkpoint must not block
        if cancelled() {
            return VerificationOutcome::Cancelled;
        }

        let signal = self
            .waiters
            .entry(task_id)
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone();

        debug!("Waiting for operator verification (task {})", task_id);
        let outcome = tokio::select! {
            _ = signal.notified() => VerificationOutcome::Resumed,
            _ = cancel.notified() => VerificationOutcome::Cancelled,
            _ = tokio::time::sleep(timeout) => VerificationOutcome::TimedOut,
        };

        self.waiters.remove(&task_id);
        debug!("Verification wait ended: {:?} (task {})", outcome, task_id);
        outcome
    }

    /// Operator action: release the waiter for `task_id` if one exists
    ///
    /// Returns whether a waiter was actually signalled. Idempotent; calling
    /// with no waiter registered does nothing.
    pub fn signal(&self, task_id: Uuid) -> bool {
        match self.waiters.get(&task_id) {
            Some(entry) => {
                info!("Operator verification signal received (task {})", task_id);
                entry.notify_one();
                true
            }
            None => {
                debug!("Verification signal for task {} ignored: no waiter", task_id);
                false
            }
        }
    }

    /// Whether a task is currently blocked on the operator
    pub fn is_waiting(&self, task_id: Uuid) -> bool {
        self.waiters.contains_key(&task_id)
    }
}

#[cfg(test)]
#[path = "handoff_test.rs"]
mod handoff_test;
