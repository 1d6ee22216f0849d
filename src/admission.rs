//! Admission gate bounding the number of live connection handlers.
//!
//! A fixed-capacity counting semaphore. The acceptor takes one token per
//! accepted connection and hands it to the handler; the slot comes back when
//! the token is dropped, so every exit path of a handler releases it exactly
//! once.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ServerError;

/// Fixed-capacity admission gate.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// One held slot in an [`AdmissionGate`].
#[derive(Debug)]
#[must_use = "dropping the token releases the slot immediately"]
pub struct AdmissionToken {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Create a gate with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait until a slot is free and take it.
    ///
    /// The gate is never closed by this crate, so the error is unreachable in
    /// practice; it is surfaced rather than panicking.
    pub async fn acquire(&self) -> Result<AdmissionToken, ServerError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ServerError::GateClosed)?;
        Ok(AdmissionToken { _permit: permit })
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }
}

impl AdmissionToken {
    /// Return the slot to the gate.
    pub fn release(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let gate = AdmissionGate::new(2);
        assert_eq!(gate.capacity(), 2);
        assert_eq!(gate.available(), 2);

        let t1 = gate.acquire().await.unwrap();
        let t2 = gate.acquire().await.unwrap();
        assert_eq!(gate.in_use(), 2);
        assert_eq!(gate.available(), 0);

        t1.release();
        assert_eq!(gate.in_use(), 1);

        drop(t2);
        assert_eq!(gate.in_use(), 0);
    }

    #[tokio::test]
    async fn test_acquire_blocks_at_capacity() {
        let gate = AdmissionGate::new(1);
        let held = gate.acquire().await.unwrap();

        let blocked = timeout(Duration::from_millis(50), gate.acquire()).await;
        assert!(blocked.is_err(), "acquire should wait while the gate is full");

        held.release();
        let token = timeout(Duration::from_secs(1), gate.acquire())
            .await
            .expect("slot should free up")
            .unwrap();
        assert_eq!(gate.in_use(), 1);
        drop(token);
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_release() {
        let gate = AdmissionGate::new(1);
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        held.release();
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be admitted")
            .unwrap()
            .unwrap();
        assert_eq!(gate.in_use(), 0);
    }

    #[tokio::test]
    async fn test_never_exceeds_capacity() {
        let gate = AdmissionGate::new(3);
        let mut tokens = Vec::new();
        for _ in 0..3 {
            tokens.push(gate.acquire().await.unwrap());
        }
        assert_eq!(gate.in_use(), gate.capacity());
        assert!(timeout(Duration::from_millis(20), gate.acquire())
            .await
            .is_err());

        tokens.clear();
        assert_eq!(gate.available(), 3);
    }
}
