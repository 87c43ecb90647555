//! The gate module holds the process-wide mutual-exclusion [Gate] that serialises every
//! read-modify-write sequence against the record store.

use std::{
    ops::{Deref, DerefMut},
    time::Instant,
};
use tokio::sync::{Mutex, MutexGuard};

/// A FIFO-ordered async mutex around the value it protects.
///
/// Waiters are released strictly in arrival order (the fairness guarantee of
/// [tokio::sync::Mutex]) and there is no acquisition timeout. The critical section is the
/// lifetime of the returned [GateGuard]; dropping it releases the gate on every exit path,
/// including `?` returns and panics.
#[derive(Debug, Default)]
pub struct Gate<T> {
    inner: Mutex<T>,
}

impl<T> Gate<T> {
    /// Creates a new [Gate] around `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Waits for the gate and enters the critical section on behalf of `holder`.
    pub async fn acquire(&self, holder: &'static str) -> GateGuard<'_, T> {
        let waiting = Instant::now();
        let guard = self.inner.lock().await;
        tracing::trace!(target: "gate", "Gate acquired by {} after {:?}", holder, waiting.elapsed());
        GateGuard {
            holder,
            acquired: Instant::now(),
            guard,
        }
    }
}

/// The scoped holder of a [Gate]. Releases the gate when dropped.
pub struct GateGuard<'a, T> {
    holder: &'static str,
    acquired: Instant,
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for GateGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for GateGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for GateGuard<'_, T> {
    fn drop(&mut self) {
        tracing::trace!(target: "gate", "Gate released by {} after {:?}", self.holder, self.acquired.elapsed());
    }
}
