use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::{
    error::SyncError,
    transport::{ports::OutboundPort, wire::ClientRecord},
};

pub const DEFAULT_GUARD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardTimeout {
    Default,
    After(Duration),
    Infinite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub key: String,
    pub acquired_at: Instant,
    pub expires_at: Option<Instant>,
}

impl Guard {
    fn is_active_at(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

/// Named expiring locks. Cloning shares the table.
#[derive(Debug, Clone)]
pub struct GuardTable {
    guards: Arc<Mutex<HashMap<String, Guard>>>,
    default_timeout: Duration,
}

impl Default for GuardTable {
    fn default() -> Self {
        Self::new(DEFAULT_GUARD_TIMEOUT)
    }
}

impl GuardTable {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            guards: Arc::new(Mutex::new(HashMap::new())),
            default_timeout,
        }
    }

    pub fn try_acquire(&self, key: &str, timeout: GuardTimeout) -> bool {
        self.try_acquire_at(key, timeout, Instant::now())
    }

    pub fn try_acquire_at(&self, key: &str, timeout: GuardTimeout, now: Instant) -> bool {
        let mut guards = self.guards.lock().expect("lock poisoned");
        if let Some(existing) = guards.get(key) {
            if existing.is_active_at(now) {
                return false;
            }
            tracing::debug!(target: "guard", key = key, "guard_expired");
        }

        let expires_at = match timeout {
            GuardTimeout::Default => now.checked_add(self.default_timeout),
            GuardTimeout::After(duration) => now.checked_add(duration),
            GuardTimeout::Infinite => None,
        };
        guards.insert(
            key.to_string(),
            Guard {
                key: key.to_string(),
                acquired_at: now,
                expires_at,
            },
        );
        true
    }

    pub fn release(&self, key: &str) -> bool {
        self.guards
            .lock()
            .expect("lock poisoned")
            .remove(key)
            .is_some()
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.is_locked_at(key, Instant::now())
    }

    pub fn is_locked_at(&self, key: &str, now: Instant) -> bool {
        self.guards
            .lock()
            .expect("lock poisoned")
            .get(key)
            .is_some_and(|guard| guard.is_active_at(now))
    }

    pub fn clear(&self) {
        self.guards.lock().expect("lock poisoned").clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Request went out; the guard is held until the confirmation arrives.
    Sent,
    /// Another request for the same action is in flight.
    Busy,
    /// A local precondition failed; nothing was sent.
    Rejected,
}

/// The request half of a guarded action: acquire, send, release on failure.
#[derive(Debug, Clone, Copy)]
pub struct GuardedRequest {
    pub key: &'static str,
    pub timeout: GuardTimeout,
}

impl GuardedRequest {
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            timeout: GuardTimeout::Default,
        }
    }

    pub const fn with_timeout(mut self, timeout: GuardTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn send(
        &self,
        guards: &GuardTable,
        outbound: &dyn OutboundPort,
        record: &ClientRecord,
    ) -> Result<ActionOutcome, SyncError> {
        if !guards.try_acquire(self.key, self.timeout) {
            tracing::trace!(target: "guard", key = self.key, "guarded_action_busy");
            return Ok(ActionOutcome::Busy);
        }

        if let Err(err) = outbound.send(record) {
            guards.release(self.key);
            return Err(err);
        }
        Ok(ActionOutcome::Sent)
    }
}
