//! Process-wide definition cache with single-flight population.
//!
//! Each name moves through `NoEntry -> Pending -> Resolved` and back to
//! `NoEntry` on invalidation. While an entry is pending, further requests join
//! its waiter list instead of starting another resolution. Waiters are always
//! notified on a later scheduling turn than the request that registered them.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{coordinator::ResolutionCoordinator, types::Resolution};

type Waiter = Box<dyn FnOnce(Resolution) + Send>;

/// What `invalidate` does to an entry whose resolution is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingInvalidation {
    /// Leave the entry alone; the outcome is cached when it arrives.
    #[default]
    Ignore,
    /// Deliver the outcome to current waiters but do not cache it.
    ExpireOnCompletion,
}

/// Externally visible state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    NoEntry,
    Pending,
    Resolved,
}

enum CacheEntry {
    Pending { waiters: Vec<Waiter>, expire_on_completion: bool },
    Resolved(Resolution),
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    pending_invalidation: PendingInvalidation,
}

enum CacheLookup {
    Hit { resolution: Resolution, waiter: Waiter },
    Joined(usize),
    Started,
}

/// Name-keyed cache of resolution outcomes. Cloning yields another handle to
/// the same table.
#[derive(Clone, Default)]
pub struct DefinitionCache {
    state: Arc<Mutex<CacheState>>,
    coordinator: ResolutionCoordinator,
}

impl fmt::Debug for DefinitionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("DefinitionCache")
            .field("entries", &state.entries.len())
            .field("pending_invalidation", &state.pending_invalidation)
            .finish()
    }
}

impl DefinitionCache {
    pub fn new(coordinator: ResolutionCoordinator) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &ResolutionCoordinator {
        &self.coordinator
    }

    pub fn pending_invalidation(&self) -> PendingInvalidation {
        self.lock_state().pending_invalidation
    }

    pub fn set_pending_invalidation(&self, policy: PendingInvalidation) {
        self.lock_state().pending_invalidation = policy;
    }

    /// Resolve `name`, serving cached outcomes without consulting providers.
    ///
    /// Never completes on the poll that issued the request.
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime unless the coordinator's scheduler was
    /// given an explicit runtime handle.
    pub async fn get(&self, name: &str) -> Resolution {
        let (sender, receiver) = oneshot::channel();
        self.get_with(name, move |resolution| {
            let _ = sender.send(resolution);
        });
        receiver.await.unwrap_or_default()
    }

    /// Callback form of [`DefinitionCache::get`]. `on_complete` runs exactly
    /// once, on a later scheduling turn, in registration order relative to
    /// other waiters for the same name.
    pub fn get_with<F>(&self, name: &str, on_complete: F)
    where
        F: FnOnce(Resolution) + Send + 'static,
    {
        match self.lookup_or_join(name, Box::new(on_complete)) {
            CacheLookup::Hit { resolution, waiter } => {
                debug!(name = %name, absent = resolution.is_none(), "definition cache hit");
                self.coordinator.scheduler().post(move || waiter(resolution));
            }
            CacheLookup::Joined(waiter_count) => {
                debug!(name = %name, waiter_count, "joined in-flight resolution");
            }
            CacheLookup::Started => {
                debug!(name = %name, "definition cache miss");
                let cache = self.clone();
                let key = name.to_string();
                self.coordinator
                    .resolve_with(name, move |resolution| cache.complete(&key, resolution));
            }
        }
    }

    /// Drop the stored outcome for `name` so the next `get` resolves again.
    ///
    /// Returns `true` when a resolved entry was dropped. Pending entries are
    /// handled according to [`PendingInvalidation`].
    pub fn invalidate(&self, name: &str) -> bool {
        let mut state = self.lock_state();
        let policy = state.pending_invalidation;
        let Some(entry) = state.entries.remove(name) else {
            return false;
        };

        match entry {
            CacheEntry::Resolved(_) => {
                debug!(name = %name, "definition cache entry invalidated");
                true
            }
            CacheEntry::Pending {
                waiters,
                expire_on_completion,
            } => {
                let expire_on_completion = match policy {
                    PendingInvalidation::Ignore => {
                        debug!(name = %name, "invalidate ignored for in-flight resolution");
                        expire_on_completion
                    }
                    PendingInvalidation::ExpireOnCompletion => {
                        debug!(name = %name, "in-flight resolution will not be cached");
                        true
                    }
                };
                state.entries.insert(
                    name.to_string(),
                    CacheEntry::Pending {
                        waiters,
                        expire_on_completion,
                    },
                );
                false
            }
        }
    }

    /// Forget `name`. Equivalent to [`DefinitionCache::invalidate`].
    pub fn remove(&self, name: &str) -> bool {
        self.invalidate(name)
    }

    pub fn state(&self, name: &str) -> EntryState {
        match self.lock_state().entries.get(name) {
            None => EntryState::NoEntry,
            Some(CacheEntry::Pending { .. }) => EntryState::Pending,
            Some(CacheEntry::Resolved(_)) => EntryState::Resolved,
        }
    }

    /// Drop every resolved entry. In-flight resolutions keep their waiters.
    pub fn clear(&self) {
        self.lock_state()
            .entries
            .retain(|_, entry| matches!(entry, CacheEntry::Pending { .. }));
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn resolved_entries(&self) -> HashMap<String, Resolution> {
        self.lock_state()
            .entries
            .iter()
            .filter_map(|(name, entry)| match entry {
                CacheEntry::Resolved(resolution) => Some((name.clone(), resolution.clone())),
                CacheEntry::Pending { .. } => None,
            })
            .collect()
    }

    /// Replace every resolved entry with `resolved`, leaving in-flight
    /// resolutions untouched.
    pub(crate) fn restore_resolved(&self, resolved: HashMap<String, Resolution>) {
        let mut state = self.lock_state();
        state.entries.retain(|_, entry| matches!(entry, CacheEntry::Pending { .. }));
        for (name, resolution) in resolved {
            state.entries.entry(name).or_insert(CacheEntry::Resolved(resolution));
        }
    }

    fn lookup_or_join(&self, name: &str, waiter: Waiter) -> CacheLookup {
        let mut state = self.lock_state();
        if let Some(entry) = state.entries.get_mut(name) {
            return match entry {
                CacheEntry::Resolved(resolution) => CacheLookup::Hit {
                    resolution: resolution.clone(),
                    waiter,
                },
                CacheEntry::Pending { waiters, .. } => {
                    waiters.push(waiter);
                    CacheLookup::Joined(waiters.len())
                }
            };
        }

        state.entries.insert(
            name.to_string(),
            CacheEntry::Pending {
                waiters: vec![waiter],
                expire_on_completion: false,
            },
        );
        CacheLookup::Started
    }

    fn complete(&self, name: &str, resolution: Resolution) {
        let waiters = {
            let mut state = self.lock_state();
            match state.entries.remove(name) {
                Some(CacheEntry::Pending {
                    waiters,
                    expire_on_completion,
                }) => {
                    if !expire_on_completion {
                        state.entries.insert(name.to_string(), CacheEntry::Resolved(resolution.clone()));
                    }
                    waiters
                }
                Some(resolved @ CacheEntry::Resolved(_)) => {
                    state.entries.insert(name.to_string(), resolved);
                    warn!(name = %name, "resolution completed for an entry that was not pending");
                    return;
                }
                None => {
                    warn!(name = %name, "resolution completed for an entry that no longer exists");
                    return;
                }
            }
        };

        debug!(
            name = %name,
            absent = resolution.is_none(),
            waiter_count = waiters.len(),
            "definition cache entry resolved"
        );
        self.coordinator.scheduler().post(move || {
            for waiter in waiters {
                waiter(resolution.clone());
            }
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
