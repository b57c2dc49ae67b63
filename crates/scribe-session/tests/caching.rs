//! Integration tests for session liveness and settings caching.
//!
//! These tests verify:
//! - Sliding session expiry and first-contact behavior
//! - Settings read-through and write-through against a spy store
//! - Behavior under concurrent callers
//! - Background reaping through the public services handle

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use scribe_session::{
    Error, ManualClock, ReaperConfig, ReaperMode, Result, ServicesConfig, SessionConfig,
    SessionServices, SessionStore, SettingsCache, SettingsCacheConfig, SettingsDocument,
    SettingsStore,
};

// ─────────────────────────────────────────────────────────────────────────────
// Spy store
// ─────────────────────────────────────────────────────────────────────────────

/// Durable store that records calls and can be told to fail writes.
#[derive(Default)]
struct SpyStore {
    documents: Mutex<HashMap<String, SettingsDocument>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    fail_puts: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
}

impl SpyStore {
    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    fn slow_reads(&self, delay: Duration) {
        *self.read_delay.lock() = Some(delay);
    }

    fn seed(&self, user_id: &str, document: SettingsDocument) {
        self.documents.lock().insert(user_id.to_string(), document);
    }

    fn stored(&self, user_id: &str) -> Option<SettingsDocument> {
        self.documents.lock().get(user_id).cloned()
    }
}

#[async_trait]
impl SettingsStore for SpyStore {
    type Document = SettingsDocument;

    async fn get(&self, user_id: &str) -> Result<Option<SettingsDocument>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.documents.lock().get(user_id).cloned())
    }

    async fn put(&self, user_id: &str, document: &SettingsDocument) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::Store("firestore unavailable".to_string()));
        }
        self.documents
            .lock()
            .insert(user_id.to_string(), document.clone());
        Ok(())
    }
}

fn settings_cache(ttl: Duration) -> (ManualClock, Arc<SpyStore>, SettingsCache<Arc<SpyStore>>) {
    let clock = ManualClock::new();
    let store = Arc::new(SpyStore::default());
    let cache = SettingsCache::with_clock(
        SettingsCacheConfig::new().with_ttl(ttl),
        Arc::clone(&store),
        Arc::new(clock.clone()),
    );
    (clock, store, cache)
}

fn session_store(timeout: Duration) -> (ManualClock, SessionStore) {
    let clock = ManualClock::new();
    let store = SessionStore::with_clock(
        SessionConfig::new().with_timeout(timeout),
        Arc::new(clock.clone()),
    );
    (clock, store)
}

fn doc(pairs: &[(&str, &str)]) -> SettingsDocument {
    pairs
        .iter()
        .fold(SettingsDocument::new(), |d, (k, v)| d.with(*k, *v))
}

// ─────────────────────────────────────────────────────────────────────────────
// Session store
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_unseen_user_is_admitted_and_stays_live() {
    let (_clock, sessions) = session_store(Duration::from_secs(25 * 60));

    assert!(sessions.check_session("dr-hughes"));
    assert!(sessions.check_session("dr-hughes"));
    assert_eq!(sessions.active_session_count(), 1);
}

#[test]
fn test_idle_session_expires_and_is_recreated() {
    let timeout = Duration::from_secs(25 * 60);
    let (clock, sessions) = session_store(timeout);
    sessions.check_session("dr-hughes");

    clock.advance(timeout);
    assert_eq!(sessions.remaining("dr-hughes"), None);

    assert!(sessions.check_session("dr-hughes"));
    assert_eq!(sessions.active_session_count(), 1);
    assert_eq!(sessions.remaining("dr-hughes"), Some(timeout));
}

#[test]
fn test_clear_then_check_is_first_contact() {
    let (clock, sessions) = session_store(Duration::from_secs(60));
    sessions.check_session("dr-hughes");
    clock.advance(Duration::from_secs(50));

    sessions.clear_session("dr-hughes");
    assert_eq!(sessions.active_session_count(), 0);

    // A clear must not resurrect the old expiry.
    assert!(sessions.check_session("dr-hughes"));
    assert_eq!(sessions.remaining("dr-hughes"), Some(Duration::from_secs(60)));
    assert_eq!(sessions.active_session_count(), 1);
}

#[test]
fn test_sliding_window_scenario() {
    // timeout = 1 unit, with 1 unit = 1s
    let (clock, sessions) = session_store(Duration::from_secs(1));

    // t=0: created, expires at t=1
    assert!(sessions.check_session("a"));
    assert_eq!(sessions.remaining("a"), Some(Duration::from_secs(1)));

    // t=0.5: extended, expires at t=1.5
    clock.advance(Duration::from_millis(500));
    assert!(sessions.check_session("a"));
    assert_eq!(sessions.remaining("a"), Some(Duration::from_secs(1)));

    // t=1.2: still live thanks to the extension
    clock.advance(Duration::from_millis(700));
    assert_eq!(sessions.remaining("a"), Some(Duration::from_millis(300)));

    // t=2: old entry expired, new one created, count stays 1
    clock.advance(Duration::from_millis(800));
    assert!(sessions.check_session("a"));
    assert_eq!(sessions.active_session_count(), 1);
    assert_eq!(sessions.remaining("a"), Some(Duration::from_secs(1)));
}

#[test]
fn test_expired_entries_count_until_swept() {
    let (clock, sessions) = session_store(Duration::from_secs(60));
    for user in ["a", "b", "c"] {
        sessions.check_session(user);
    }
    clock.advance(Duration::from_secs(61));

    assert_eq!(sessions.active_session_count(), 3);
    assert_eq!(sessions.sweep_expired(), 3);
    assert_eq!(sessions.active_session_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checks_hold_one_entry() {
    let (_clock, sessions) = session_store(Duration::from_secs(60));

    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let sessions = sessions.clone();
            tokio::spawn(async move { sessions.check_session("dr-hughes") })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap());
        assert!(sessions.active_session_count() <= 1);
    }
    assert_eq!(sessions.active_session_count(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings cache
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_save_then_get_skips_durable_read() {
    let (_clock, store, cache) = settings_cache(Duration::from_secs(600));
    let settings = doc(&[("practice_name", "Riverside Clinic"), ("language", "en-US")]);

    cache.save("dr-hughes", settings.clone()).await.unwrap();
    assert_eq!(cache.get("dr-hughes").await.unwrap(), Some(settings.clone()));
    assert_eq!(cache.get("dr-hughes").await.unwrap(), Some(settings));

    assert_eq!(store.gets(), 0);
    assert_eq!(store.puts(), 1);
}

#[tokio::test]
async fn test_expired_entry_triggers_exactly_one_reload() {
    let ttl = Duration::from_secs(600);
    let (clock, store, cache) = settings_cache(ttl);
    let settings = doc(&[("theme", "dark")]);
    cache.save("dr-hughes", settings.clone()).await.unwrap();

    clock.advance(ttl);
    assert_eq!(cache.get("dr-hughes").await.unwrap(), Some(settings.clone()));
    assert_eq!(store.gets(), 1);

    assert_eq!(cache.get("dr-hughes").await.unwrap(), Some(settings));
    assert_eq!(store.gets(), 1);
}

#[tokio::test]
async fn test_missing_settings_are_absent_not_error() {
    let (_clock, store, cache) = settings_cache(Duration::from_secs(600));

    assert_eq!(cache.get("dr-new").await.unwrap(), None);
    assert_eq!(cache.get("dr-new").await.unwrap(), None);
    assert_eq!(store.gets(), 2);
}

#[tokio::test]
async fn test_failed_save_leaves_cache_untouched() {
    let ttl = Duration::from_secs(600);
    let (clock, store, cache) = settings_cache(ttl);
    let original = doc(&[("theme", "dark")]);
    cache.save("dr-hughes", original.clone()).await.unwrap();

    clock.advance(Duration::from_secs(400));
    store.fail_puts(true);
    let err = cache
        .save("dr-hughes", doc(&[("theme", "light")]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(_)));

    // Still the original document, still on the original expiry.
    assert_eq!(cache.peek("dr-hughes"), Some(original.clone()));
    assert_eq!(store.stored("dr-hughes"), Some(original.clone()));
    clock.advance(Duration::from_secs(200));
    assert_eq!(cache.peek("dr-hughes"), None);

    // Reload comes from durable storage, which never saw the failed write.
    assert_eq!(cache.get("dr-hughes").await.unwrap(), Some(original));
    assert_eq!(store.gets(), 1);
}

#[tokio::test]
async fn test_failed_save_does_not_create_entry() {
    let (_clock, store, cache) = settings_cache(Duration::from_secs(600));
    store.fail_puts(true);

    assert!(cache.save("dr-hughes", doc(&[("theme", "dark")])).await.is_err());
    assert!(cache.is_empty());
    assert!(store.stored("dr-hughes").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_share_one_durable_read() {
    let (_clock, store, cache) = settings_cache(Duration::from_secs(600));
    store.seed("dr-hughes", doc(&[("theme", "dark")]));
    store.slow_reads(Duration::from_millis(20));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get("dr-hughes").await })
        })
        .collect();

    for task in tasks {
        let loaded = task.await.unwrap().unwrap();
        assert_eq!(loaded, Some(doc(&[("theme", "dark")])));
    }
    assert_eq!(store.gets(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_are_serialized() {
    let (_clock, store, cache) = settings_cache(Duration::from_secs(600));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move {
                let key = format!("field_{i}");
                cache
                    .update("dr-hughes", SettingsDocument::new().with(key, i))
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = store.stored("dr-hughes").unwrap();
    assert_eq!(stored.len(), 8);
    assert_eq!(cache.peek("dr-hughes"), Some(stored));
}

#[tokio::test]
async fn test_invalidate_during_load_is_respected() {
    let (_clock, store, cache) = settings_cache(Duration::from_secs(600));
    store.seed("dr-hughes", doc(&[("theme", "dark")]));
    store.slow_reads(Duration::from_millis(50));

    let loader = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get("dr-hughes").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    cache.invalidate("dr-hughes");

    let loaded = loader.await.unwrap().unwrap();
    assert_eq!(loaded, Some(doc(&[("theme", "dark")])));
    assert!(cache.peek("dr-hughes").is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Services and reaper
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reaper_sweeps_both_stores_in_background() {
    let clock = ManualClock::new();
    let store = Arc::new(SpyStore::default());
    let config = ServicesConfig::new()
        .with_session(SessionConfig::new().with_timeout(Duration::from_secs(60)))
        .with_settings(SettingsCacheConfig::new().with_ttl(Duration::from_secs(60)))
        .with_reaper(
            ReaperConfig::new()
                .with_mode(ReaperMode::Lazy)
                .with_interval(Duration::from_millis(10)),
        );
    let services = SessionServices::with_clock(config, Arc::clone(&store), Arc::new(clock.clone()));

    services.sessions().check_session("dr-hughes");
    services
        .settings()
        .save("dr-hughes", doc(&[("theme", "dark")]))
        .await
        .unwrap();
    assert!(services.reaper().unwrap().is_started());

    clock.advance(Duration::from_secs(61));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(services.sessions().active_session_count(), 0);
    assert!(services.settings().is_empty());
    // Sweeping never touches durable storage.
    assert_eq!(store.stored("dr-hughes"), Some(doc(&[("theme", "dark")])));
    services.shutdown();
}
