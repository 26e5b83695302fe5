//! Admission control for the shared synthesis accelerator.
//!
//! A fixed pool of permits bounds concurrent model calls across every request.
//! Excess demand either waits in a bounded FIFO queue or is rejected outright,
//! depending on [`OverflowPolicy`]. Closing the controller rejects new and
//! queued admissions while permits already granted run to completion.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, info, warn};

use super::error::{PipelineError, PipelineResult};

/// What happens to a request when every slot is busy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Wait in a bounded FIFO queue
    #[default]
    Queue,
    /// Fail immediately with [`PipelineError::Overloaded`]
    Reject,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(OverflowPolicy::Queue),
            "reject" => Ok(OverflowPolicy::Reject),
            other => Err(format!(
                "unknown admission policy '{other}', expected 'queue' or 'reject'"
            )),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Queue => f.write_str("queue"),
            OverflowPolicy::Reject => f.write_str("reject"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionConfig {
    pub pool_size: usize,
    pub policy: OverflowPolicy,
    /// Maximum number of waiting requests under [`OverflowPolicy::Queue`]
    pub queue_depth: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            policy: OverflowPolicy::Queue,
            queue_depth: 32,
        }
    }
}

/// Snapshot of admission state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionStats {
    pub pool_size: usize,
    pub in_flight: usize,
    pub queued: usize,
    pub queue_depth: usize,
    pub policy: OverflowPolicy,
    pub closed: bool,
}

pub struct AdmissionController {
    config: AdmissionConfig,
    permits: Arc<Semaphore>,
    queued: AtomicUsize,
    closed: AtomicBool,
    drained: Notify,
}

/// A granted slot; releases on drop
pub struct AdmissionPermit {
    controller: Arc<AdmissionController>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        // Return the slot before checking whether the pool has drained
        drop(self.permit.take());
        if self.controller.is_closed() && self.controller.in_flight() == 0 {
            self.controller.drained.notify_waiters();
        }
    }
}

/// Counts a waiting request for as long as it is queued, including when the
/// waiting future is dropped.
struct QueueSlot<'a>(&'a AtomicUsize);

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        let pool_size = config.pool_size.max(1);
        Self {
            config: AdmissionConfig { pool_size, ..config },
            permits: Arc::new(Semaphore::new(pool_size)),
            queued: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            drained: Notify::new(),
        }
    }

    pub fn config(&self) -> AdmissionConfig {
        self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of granted slots.
    ///
    /// Derived from the semaphore itself, so a permit counts as in flight from
    /// the instant it is granted.
    pub fn in_flight(&self) -> usize {
        self.config
            .pool_size
            .saturating_sub(self.permits.available_permits())
    }

    /// Acquire a slot, waiting in the queue if the policy allows.
    pub async fn acquire(self: &Arc<Self>) -> PipelineResult<AdmissionPermit> {
        if self.is_closed() {
            return Err(PipelineError::ShuttingDown);
        }

        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(PipelineError::ShuttingDown),
            Err(TryAcquireError::NoPermits) => self.wait_in_queue().await?,
        };

        Ok(AdmissionPermit {
            controller: Arc::clone(self),
            permit: Some(permit),
        })
    }

    async fn wait_in_queue(&self) -> PipelineResult<OwnedSemaphorePermit> {
        if self.config.policy == OverflowPolicy::Reject {
            warn!(
                pool_size = self.config.pool_size,
                "All synthesis slots busy, rejecting request"
            );
            return Err(PipelineError::Overloaded);
        }

        let depth = self.config.queue_depth;
        let reserved = self
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |queued| {
                (queued < depth).then_some(queued + 1)
            });
        let position = match reserved {
            Ok(previous) => previous + 1,
            Err(_) => {
                warn!(queue_depth = depth, "Admission queue full, rejecting request");
                return Err(PipelineError::Overloaded);
            }
        };
        let _slot = QueueSlot(&self.queued);

        debug!(position, "Waiting for a synthesis slot");
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::ShuttingDown)
    }

    /// Run `work` while holding a slot
    pub async fn run<F, T>(self: &Arc<Self>, work: F) -> PipelineResult<T>
    where
        F: Future<Output = PipelineResult<T>>,
    {
        let _permit = self.acquire().await?;
        work.await
    }

    /// Stop admitting work. Queued requests fail with
    /// [`PipelineError::ShuttingDown`]; granted permits are unaffected.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.permits.close();
            info!(
                in_flight = self.in_flight(),
                "Admission controller closed"
            );
        }
    }

    /// Close and wait for in-flight work to finish
    pub async fn shutdown(&self) {
        self.close();
        loop {
            let drained = self.drained.notified();
            if self.in_flight() == 0 {
                break;
            }
            drained.await;
        }
        info!("Admission controller drained");
    }

    pub fn stats(&self) -> AdmissionStats {
        AdmissionStats {
            pool_size: self.config.pool_size,
            in_flight: self.in_flight(),
            queued: self.queued.load(Ordering::Acquire),
            queue_depth: self.config.queue_depth,
            policy: self.config.policy,
            closed: self.is_closed(),
        }
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(AdmissionConfig::default())
    }
}
