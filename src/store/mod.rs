//! # Digest Store
//!
//! Process-wide state of the service: the map from integer key to stored
//! digest, key assignment, and the running processing-time aggregate.
//!
//! ## Concurrency
//!
//! All state sits behind one `RwLock`. [`Store::submit`] holds the write
//! guard for the whole submission, digest computation included, so key
//! assignment, insertion and the counter update happen as one step and at
//! most one submission is in its critical section at a time. [`Store::fetch`]
//! and [`Store::stats`] take read guards and never observe a half-applied
//! submission.
//!
//! ## Lifecycle
//!
//! A store is created empty at startup and shared by `Arc` with the HTTP
//! layer. Entries are never updated or removed; only their visibility is
//! time-gated.

pub mod clock;
pub mod stats;
pub mod visibility;

pub use clock::{Clock, ManualClock, SystemClock};
pub use stats::{StatsAggregator, StatsSnapshot};
pub use visibility::{Visibility, VisibilityPolicy, DEFAULT_VISIBILITY_DELAY_SECS};

use crate::crypto::{Digester, Sha512Digester};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, trace};

/// First key handed out by a fresh store
pub const INITIAL_KEY: u64 = 1;

/// One submitted value's result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Key the entry was stored under
    pub key: u64,
    /// Wall-clock creation time
    pub created_at: DateTime<Utc>,
    /// Encoded digest of the submitted input
    pub digest: String,
}

#[derive(Debug)]
struct StoreState {
    entries: HashMap<u64, Entry>,
    next_key: u64,
    stats: StatsAggregator,
}

impl StoreState {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_key: INITIAL_KEY,
            stats: StatsAggregator::new(),
        }
    }
}

/// Request-serialized digest store with delayed visibility
#[derive(Debug)]
pub struct Store {
    state: RwLock<StoreState>,
    digester: Arc<dyn Digester>,
    clock: Arc<dyn Clock>,
    visibility: Visibility,
}

impl Store {
    /// Create a store using SHA-512 and the system clock
    #[must_use]
    pub fn new(visibility: Visibility) -> Self {
        Self::with_components(visibility, Arc::new(Sha512Digester::new()), Arc::new(SystemClock))
    }

    /// Create a store with an explicit digester and clock
    #[must_use]
    pub fn with_components(
        visibility: Visibility,
        digester: Arc<dyn Digester>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: RwLock::new(StoreState::new()),
            digester,
            clock,
            visibility,
        }
    }

    /// Digest `input`, store it under a fresh key and return the key
    ///
    /// Any string is accepted, including the empty string. The processing
    /// time recorded in the statistics covers the digest computation and the
    /// bookkeeping, both done under the write lock.
    #[instrument(level = "debug", name = "store_submit", skip_all)]
    pub fn submit(&self, input: &str) -> u64 {
        let mut state = self.state.write();
        let started = Instant::now();

        let digest = self.digester.digest(input);

        let key = state.next_key;
        state.next_key += 1;
        state.entries.insert(
            key,
            Entry {
                key,
                created_at: self.clock.now(),
                digest,
            },
        );
        state.stats.record(started.elapsed());

        debug!(key, count = state.stats.request_count(), "Stored digest");
        key
    }

    /// Return the digest stored under `key` if it exists and is visible now
    #[instrument(level = "debug", name = "store_fetch", skip(self))]
    pub fn fetch(&self, key: u64) -> Option<String> {
        let state = self.state.read();
        let entry = state.entries.get(&key)?;

        if self.visibility.is_visible(entry.created_at, self.clock.now()) {
            Some(entry.digest.clone())
        } else {
            trace!(key, "Digest exists but is not visible");
            None
        }
    }

    /// Snapshot of the request count and average processing time
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.state.read().stats.snapshot()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Whether nothing has been submitted yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visibility rule applied by [`Store::fetch`]
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Name of the digest algorithm in use
    #[must_use]
    pub fn algorithm(&self) -> &'static str {
        self.digester.algorithm()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(Visibility::default())
    }
}
