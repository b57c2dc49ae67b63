//! Read-through, write-through cache in front of a durable settings store.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, trace, warn};

use crate::clock::{SharedClock, SystemClock, deadline};
use crate::config::SettingsCacheConfig;
use crate::document::SettingsDocument;
use crate::error::Result;
use crate::persistence::SettingsStore;
use crate::reaper::Sweep;

/// Entry stored in the cache.
#[derive(Debug, Clone)]
struct CacheEntry<D> {
    /// Cached copy of the durable document.
    document: D,

    /// The entry may be served while `expires_at > now`.
    expires_at: Instant,
}

impl<D> CacheEntry<D> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory state guarded by a synchronous lock.
///
/// Never held across an await.
struct CacheState<D> {
    lru: LruCache<String, CacheEntry<D>>,

    /// Bumped by every invalidation. A read-through load that straddles an
    /// invalidation does not populate the cache.
    generation: u64,

    hits: u64,
    misses: u64,
}

struct CacheInner<S: SettingsStore> {
    state: Mutex<CacheState<S::Document>>,

    /// Serializes durable reads and writes per user.
    user_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,

    store: S,
    config: SettingsCacheConfig,
    clock: SharedClock,
}

impl<S: SettingsStore> CacheInner<S> {
    /// Return a live cached document, dropping the entry if it has expired.
    fn lookup(&self, user_id: &str) -> Option<S::Document> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let live = state.lru.get(user_id).map(|entry| entry.is_live(now))?;
        if !live {
            state.lru.pop(user_id);
            debug!(user_id = %user_id, "Cached settings expired");
            return None;
        }

        state.hits += 1;
        trace!(user_id = %user_id, "Settings cache hit");
        state.lru.peek(user_id).map(|entry| entry.document.clone())
    }

    /// Insert a fresh entry.
    ///
    /// With `expected_generation` set, the insert is skipped if an
    /// invalidation happened since that generation was read.
    fn populate(&self, user_id: &str, document: S::Document, expected_generation: Option<u64>) {
        let expires_at = deadline(self.clock.now(), self.config.ttl);
        let mut state = self.state.lock();

        if let Some(generation) = expected_generation
            && state.generation != generation
        {
            debug!(user_id = %user_id, "Invalidated during load, not caching");
            return;
        }

        let entry = CacheEntry {
            document,
            expires_at,
        };
        if let Some((evicted, _)) = state.lru.push(user_id.to_string(), entry)
            && evicted != user_id
        {
            debug!(user_id = %evicted, "Evicted least recently used settings");
        }
    }
}

impl<S: SettingsStore> Sweep for CacheInner<S> {
    fn name(&self) -> &'static str {
        "settings"
    }

    fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let expired: Vec<String> = state
            .lru
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(user_id, _)| user_id.clone())
            .collect();

        for user_id in &expired {
            state.lru.pop(user_id);
        }

        Ok(expired.len())
    }
}

/// Holds a user's durable-operation lock and prunes it from the lock map
/// once nobody else is waiting on it.
struct UserLock<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    user_id: String,
    locks: &'a Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Drop for UserLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.locks.lock();
        if locks
            .get(&self.user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.user_id);
        }
    }
}

/// Write-through settings cache with TTL expiry and LRU capacity bound.
///
/// - Reads are served from memory while the cached copy is live; otherwise
///   the durable store is consulted and a found document is cached.
/// - Saves go to the durable store first. The cache is only updated when
///   the durable write succeeds, so it never holds data the store rejected.
/// - Durable operations for one user are serialized, so concurrent misses
///   cost a single durable read and concurrent saves cannot leave an older
///   document cached.
///
/// Cloning is cheap and every clone shares the same entries.
pub struct SettingsCache<S: SettingsStore> {
    inner: Arc<CacheInner<S>>,
}

impl<S: SettingsStore> SettingsCache<S> {
    /// Create a cache over `store` using the system clock.
    pub fn new(config: SettingsCacheConfig, store: S) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit clock.
    pub fn with_clock(config: SettingsCacheConfig, store: S, clock: SharedClock) -> Self {
        let cap = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState {
                    lru: LruCache::new(cap),
                    generation: 0,
                    hits: 0,
                    misses: 0,
                }),
                user_locks: Mutex::new(HashMap::new()),
                store,
                config,
                clock,
            }),
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &SettingsCacheConfig {
        &self.inner.config
    }

    /// The durable store behind the cache.
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Number of cached entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.state.lock().lru.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().lru.is_empty()
    }

    /// Get a user's settings, loading them from the durable store on a miss.
    ///
    /// Returns `Ok(None)` when the user has no settings. Absence is not
    /// cached, so the next call asks the durable store again.
    pub async fn get(&self, user_id: &str) -> Result<Option<S::Document>> {
        if let Some(document) = self.inner.lookup(user_id) {
            return Ok(Some(document));
        }

        let _lock = self.lock_user(user_id).await;
        self.load_locked(user_id).await
    }

    /// Save a user's settings to the durable store, then cache them.
    ///
    /// If the durable write fails the error is returned and any cached
    /// entry for the user is left exactly as it was.
    pub async fn save(&self, user_id: &str, document: S::Document) -> Result<()> {
        let _lock = self.lock_user(user_id).await;
        self.save_locked(user_id, document).await
    }

    /// Drop the cached copy without touching durable storage.
    ///
    /// Use when another process may have changed the durable document.
    pub fn invalidate(&self, user_id: &str) {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        if state.lru.pop(user_id).is_some() {
            debug!(user_id = %user_id, "Settings invalidated");
        }
    }

    /// Live cached document, without consulting durable storage.
    pub fn peek(&self, user_id: &str) -> Option<S::Document> {
        let now = self.inner.clock.now();
        let state = self.inner.state.lock();
        state
            .lru
            .peek(user_id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.document.clone())
    }

    /// Remove every expired entry now and return how many were removed.
    pub fn sweep_expired(&self) -> usize {
        // In-memory sweep cannot fail.
        self.inner.sweep_expired().unwrap_or(0)
    }

    /// Sweep target for a [`Reaper`](crate::Reaper).
    pub fn sweep_target(&self) -> Arc<dyn Sweep> {
        Arc::clone(&self.inner) as Arc<dyn Sweep>
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock();
        CacheStats {
            size: state.lru.len(),
            capacity: self.inner.config.max_entries,
            hits: state.hits,
            misses: state.misses,
        }
    }

    async fn lock_user(&self, user_id: &str) -> UserLock<'_> {
        let lock = {
            let mut locks = self.inner.user_locks.lock();
            Arc::clone(
                locks
                    .entry(user_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        // Built before waiting so a cancelled wait still prunes the entry.
        let mut held = UserLock {
            guard: None,
            user_id: user_id.to_string(),
            locks: &self.inner.user_locks,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    /// Read-through load. Caller holds the user's lock.
    async fn load_locked(&self, user_id: &str) -> Result<Option<S::Document>> {
        // Another holder of the lock may have populated the entry while we waited.
        if let Some(document) = self.inner.lookup(user_id) {
            return Ok(Some(document));
        }

        let generation = {
            let mut state = self.inner.state.lock();
            state.misses += 1;
            state.generation
        };

        debug!(user_id = %user_id, "Settings cache miss, loading from store");
        let loaded = self.inner.store.get(user_id).await?;

        match &loaded {
            Some(document) => {
                self.inner
                    .populate(user_id, document.clone(), Some(generation));
            }
            None => debug!(user_id = %user_id, "No stored settings"),
        }

        Ok(loaded)
    }

    /// Write-through save. Caller holds the user's lock.
    async fn save_locked(&self, user_id: &str, document: S::Document) -> Result<()> {
        if let Err(e) = self.inner.store.put(user_id, &document).await {
            warn!(user_id = %user_id, error = %e, "Settings save failed, cache unchanged");
            return Err(e);
        }

        self.inner.populate(user_id, document, None);
        debug!(user_id = %user_id, "Settings saved");
        Ok(())
    }
}

impl<S: SettingsStore<Document = SettingsDocument>> SettingsCache<S> {
    /// Merge `patch` into the user's current settings and save the result.
    ///
    /// A user without settings starts from an empty document. The read,
    /// merge and write happen under the user's lock, so concurrent updates
    /// for one user apply one after another.
    pub async fn update(&self, user_id: &str, patch: SettingsDocument) -> Result<SettingsDocument> {
        let _lock = self.lock_user(user_id).await;

        let mut document = self.load_locked(user_id).await?.unwrap_or_default();
        document.merge(patch);
        self.save_locked(user_id, document.clone()).await?;

        Ok(document)
    }
}

impl<S: SettingsStore> Clone for SettingsCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of cached entries.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,

    /// Reads served from memory.
    pub hits: u64,

    /// Reads that went to the durable store.
    pub misses: u64,
}
