//! Readiness gate and shutdown drain.
//!
//! The gate starts closed, opens once the platform is up, and closes again
//! on shutdown. Closing waits for in-flight operations to finish.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::error::{LagError, LagResult};

/// Gate lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GateState {
    /// Platform not ready yet.
    Starting = 0,
    /// Accepting operations.
    Serving = 1,
    /// Rejecting new operations, waiting for in-flight ones.
    Draining = 2,
    /// Closed for good.
    Stopped = 3,
}

impl GateState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => GateState::Starting,
            1 => GateState::Serving,
            2 => GateState::Draining,
            _ => GateState::Stopped,
        }
    }
}

/// Admission control for service operations.
#[derive(Debug)]
pub struct ServiceGate {
    state: AtomicU8,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl Default for ServiceGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceGate {
    /// Creates a closed gate.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(GateState::Starting as u8),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> GateState {
        GateState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Returns true while operations are admitted.
    pub fn is_serving(&self) -> bool {
        self.state() == GateState::Serving
    }

    /// Returns the number of admitted operations that have not finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Opens the gate. Only valid from `Starting`.
    pub fn open(&self) -> bool {
        let opened = self
            .state
            .compare_exchange(
                GateState::Starting as u8,
                GateState::Serving as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if opened {
            info!("Service gate open");
        }
        opened
    }

    /// Admits one operation, or returns `Busy` when the gate is not open.
    pub fn enter(&self) -> LagResult<GateGuard<'_>> {
        // Count first so a concurrent drain either sees us or we see its state.
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = GateGuard { gate: self };
        match self.state() {
            GateState::Serving => Ok(guard),
            GateState::Starting => Err(LagError::busy("service not ready")),
            GateState::Draining | GateState::Stopped => {
                Err(LagError::busy("service shutting down"))
            }
        }
    }

    fn leave(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Closes the gate and waits up to `timeout` for in-flight operations.
    ///
    /// Returns the number of operations still running when the wait ended.
    pub async fn drain(&self, timeout: Duration) -> usize {
        self.state
            .store(GateState::Draining as u8, Ordering::SeqCst);
        info!(in_flight = self.in_flight(), "Draining service gate");

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            let remaining = self.in_flight();
            if remaining == 0 {
                break;
            }
            if tokio::time::timeout_at(deadline, idle).await.is_err() {
                let remaining = self.in_flight();
                if remaining == 0 {
                    break;
                }
                warn!(remaining, "Drain timed out with operations in flight");
                self.state.store(GateState::Stopped as u8, Ordering::SeqCst);
                return remaining;
            }
        }

        self.state.store(GateState::Stopped as u8, Ordering::SeqCst);
        info!("Service gate drained");
        0
    }
}

/// Admission token; releases its slot on drop.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a ServiceGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.leave();
    }
}
