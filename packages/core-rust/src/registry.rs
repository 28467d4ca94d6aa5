//! Object registry: keeps returned values alive so later requests can refer
//! to them.
//!
//! Two namespaces live side by side:
//!
//! - **Ephemeral** entries are keyed by a random UUID, stamped with the
//!   monotonic clock on insertion, and removed by [`ObjectRegistry::sweep`]
//!   once older than [`EPHEMERAL_TTL`].
//! - **Persistent** entries are keyed by name, created only by promoting an
//!   ephemeral entry, and never expire.
//!
//! Both maps are `DashMap`s, so `add`, `get`, `promote` and `sweep` may run
//! concurrently from any number of request workers. Lookups return clones of
//! the stored `Value`, so a caller keeps its value even if the entry is swept
//! right after.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use uuid::Uuid;

use crate::clock::{ClockSource, MonotonicClock};
use crate::token::ReferenceToken;
use crate::value::Value;

/// Age after which an ephemeral entry is removed by the next sweep.
pub const EPHEMERAL_TTL: Duration = Duration::from_secs(10 * 60);

/// Lookup failure for a well-formed reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no such object: {token}")]
    NoSuchObject { token: String },
}

#[derive(Debug)]
struct EphemeralEntry {
    created_at_ms: u64,
    value: Value,
}

/// Process-lifetime store of live values under ephemeral and persistent keys.
pub struct ObjectRegistry {
    ephemeral: DashMap<Uuid, EphemeralEntry>,
    persistent: DashMap<String, Value>,
    clock: Arc<dyn ClockSource>,
    ttl_ms: u64,
    next_name: AtomicU64,
}

impl ObjectRegistry {
    /// Creates an empty registry on the monotonic process clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    /// Creates an empty registry that ages entries with the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Self {
        // TTL is ten minutes; the millisecond count trivially fits in u64.
        #[allow(clippy::cast_possible_truncation)]
        let ttl_ms = EPHEMERAL_TTL.as_millis() as u64;
        Self {
            ephemeral: DashMap::new(),
            persistent: DashMap::new(),
            clock,
            ttl_ms,
            next_name: AtomicU64::new(0),
        }
    }

    /// Stores `value` under a fresh random identifier and returns it.
    pub fn add(&self, value: Value) -> Uuid {
        let id = Uuid::new_v4();
        self.ephemeral.insert(
            id,
            EphemeralEntry {
                created_at_ms: self.clock.now(),
                value,
            },
        );
        id
    }

    /// Looks up an ephemeral entry. `None` if never added or already swept.
    #[must_use]
    pub fn get(&self, id: &Uuid) -> Option<Value> {
        self.ephemeral.get(id).map(|entry| entry.value.clone())
    }

    /// Looks up a persistent entry by name.
    #[must_use]
    pub fn get_named(&self, name: &str) -> Option<Value> {
        self.persistent.get(name).map(|entry| entry.value().clone())
    }

    /// Resolves a parsed token against the namespace its syntax selects.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NoSuchObject` when no live entry matches.
    pub fn resolve(&self, token: &ReferenceToken) -> Result<Value, RegistryError> {
        let found = match token {
            ReferenceToken::Ephemeral(id) => self.get(id),
            ReferenceToken::Persistent(name) => self.get_named(name),
        };
        found.ok_or_else(|| RegistryError::NoSuchObject {
            token: token.to_string(),
        })
    }

    /// Copies the ephemeral entry's value into the persistent map under
    /// `name`, replacing whatever was stored there.
    ///
    /// Does not extend the ephemeral entry's life.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NoSuchObject` if the entry is absent at call
    /// time, including when a sweep removed it first.
    pub fn promote(&self, id: &Uuid, name: impl Into<String>) -> Result<(), RegistryError> {
        let value = self.get(id).ok_or_else(|| RegistryError::NoSuchObject {
            token: ReferenceToken::Ephemeral(*id).to_string(),
        })?;
        self.persistent.insert(name.into(), value);
        Ok(())
    }

    /// Promotes under a newly generated name (`o0`, `o1`, ...) and returns it.
    ///
    /// # Errors
    ///
    /// Same as [`promote`](Self::promote).
    pub fn promote_auto(&self, id: &Uuid) -> Result<String, RegistryError> {
        let value = self.get(id).ok_or_else(|| RegistryError::NoSuchObject {
            token: ReferenceToken::Ephemeral(*id).to_string(),
        })?;
        let name = loop {
            let candidate = format!("o{}", self.next_name.fetch_add(1, Ordering::Relaxed));
            if !self.persistent.contains_key(&candidate) {
                break candidate;
            }
        };
        self.persistent.insert(name.clone(), value);
        Ok(name)
    }

    /// Removes every ephemeral entry older than the TTL. Returns how many
    /// entries were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let ttl_ms = self.ttl_ms;
        let mut removed = 0;
        self.ephemeral.retain(|_, entry| {
            let keep = now.saturating_sub(entry.created_at_ms) <= ttl_ms;
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            tracing::debug!(removed, remaining = self.ephemeral.len(), "swept expired objects");
        }
        removed
    }

    #[must_use]
    pub fn ephemeral_len(&self) -> usize {
        self.ephemeral.len()
    }

    #[must_use]
    pub fn persistent_len(&self) -> usize {
        self.persistent.len()
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("ephemeral", &self.ephemeral.len())
            .field("persistent", &self.persistent.len())
            .field("ttl_ms", &self.ttl_ms)
            .finish_non_exhaustive()
    }
}
