//! Shutdown state of the HA services.
//!
//! The only way to reach the active payload is [`Lifecycle::with_active`],
//! which checks and acts in one step. Callers keep the lifecycle behind the
//! same lock as everything the payload owns, so a caller can never see
//! "active" and then act on torn-down state.

use crate::error::{Error, Result};

#[derive(Debug)]
pub enum Lifecycle<T> {
    Active(T),
    Closed,
}

impl<T> Lifecycle<T> {
    pub fn new(active: T) -> Self {
        Lifecycle::Active(active)
    }

    /// Run `f` against the active payload, or fail with [`Error::ShutDown`].
    pub fn with_active<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        match self {
            Lifecycle::Active(active) => Ok(f(active)),
            Lifecycle::Closed => Err(Error::ShutDown),
        }
    }

    pub fn assert_active(&self) -> Result<()> {
        match self {
            Lifecycle::Active(_) => Ok(()),
            Lifecycle::Closed => Err(Error::ShutDown),
        }
    }

    /// Transition to `Closed`. Returns the payload on the first call so the
    /// caller can tear it down; later calls are no-ops returning `None`.
    pub fn close(&mut self) -> Option<T> {
        match std::mem::replace(self, Lifecycle::Closed) {
            Lifecycle::Active(active) => Some(active),
            Lifecycle::Closed => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Lifecycle::Closed)
    }
}
