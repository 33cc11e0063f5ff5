//! Admission control for forwarded requests.
//!
//! # Responsibilities
//! - Bound the number of requests being forwarded at once
//! - Let callers wait for capacity, abandoning the wait on cancellation
//! - Release capacity exactly once per granted permit, on every exit path
//!
//! # Design Decisions
//! - Counting semaphore; the permit is an RAII guard, so panics and early returns release it
//! - No fairness beyond tokio's FIFO waiter queue; starvation under overload is accepted
//! - A cancelled wait consumes nothing

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// The wait for an admission permit was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("service unavailable: cancelled while waiting for capacity")]
pub struct Rejected;

/// Fixed-capacity gate in front of the forwarding pipeline.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionController {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Acquire a permit, waiting while the gate is saturated.
    ///
    /// Resolves to [`Rejected`] if `cancelled` completes before capacity frees up.
    pub async fn acquire<F>(&self, cancelled: F) -> Result<AdmissionPermit, Rejected>
    where
        F: Future<Output = ()>,
    {
        if let Ok(permit) = self.permits.clone().try_acquire_owned() {
            return Ok(AdmissionPermit::new(permit));
        }

        tracing::debug!(capacity = self.capacity, "admission gate saturated, waiting");
        tokio::select! {
            biased;
            permit = self.permits.clone().acquire_owned() => {
                // The semaphore is never closed, so an error only happens if that changes.
                permit.map(AdmissionPermit::new).map_err(|_| Rejected)
            }
            _ = cancelled => {
                metrics::record_admission_rejected();
                Err(Rejected)
            }
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }
}

/// A held admission slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    fn new(permit: OwnedSemaphorePermit) -> Self {
        metrics::admission_entered();
        Self { _permit: permit }
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        metrics::admission_left();
        tracing::trace!("admission permit released");
    }
}
