//! Durable settings storage behind the cache.
//!
//! The cache never owns settings data: it holds copies of what a
//! [`SettingsStore`] returned or accepted. The associated `Document` type
//! lets a backend hand out its own domain type; the bundled backends use
//! [`SettingsDocument`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::document::SettingsDocument;
use crate::error::Result;

/// Durable per-user settings store.
///
/// Implementations are expected to be safe for concurrent use and to
/// provide their own consistency per document. The cache does not retry
/// failed calls; retry policy belongs to the implementation.
#[async_trait]
pub trait SettingsStore: Send + Sync + 'static {
    /// The document type stored for each user.
    type Document: Clone + Send + Sync + 'static;

    /// Load a user's document.
    ///
    /// Return `Ok(None)` if the user has no settings yet.
    async fn get(&self, user_id: &str) -> Result<Option<Self::Document>>;

    /// Store a user's document, replacing any previous one.
    async fn put(&self, user_id: &str, document: &Self::Document) -> Result<()>;
}

#[async_trait]
impl<T: SettingsStore> SettingsStore for Arc<T> {
    type Document = T::Document;

    async fn get(&self, user_id: &str) -> Result<Option<Self::Document>> {
        (**self).get(user_id).await
    }

    async fn put(&self, user_id: &str, document: &Self::Document) -> Result<()> {
        (**self).put(user_id, document).await
    }
}

/// In-memory settings store for tests and local development.
#[derive(Debug)]
pub struct MemorySettingsStore<D = SettingsDocument> {
    documents: Mutex<HashMap<String, D>>,
}

impl<D> Default for MemorySettingsStore<D> {
    fn default() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
        }
    }
}

impl<D: Clone> MemorySettingsStore<D> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a document directly, bypassing any cache in front of the store.
    pub fn insert(&self, user_id: impl Into<String>, document: D) {
        self.documents.lock().insert(user_id.into(), document);
    }

    /// Read a document directly.
    pub fn snapshot(&self, user_id: &str) -> Option<D> {
        self.documents.lock().get(user_id).cloned()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }
}

#[async_trait]
impl<D: Clone + Send + Sync + 'static> SettingsStore for MemorySettingsStore<D> {
    type Document = D;

    async fn get(&self, user_id: &str) -> Result<Option<D>> {
        Ok(self.documents.lock().get(user_id).cloned())
    }

    async fn put(&self, user_id: &str, document: &D) -> Result<()> {
        self.documents
            .lock()
            .insert(user_id.to_string(), document.clone());
        Ok(())
    }
}
