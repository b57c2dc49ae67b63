//! File-backed settings store. One JSON document per user.
//!
//! Layout: `{root}/{user_id}.json`

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::document::SettingsDocument;
use crate::error::{Error, Result};
use crate::persistence::SettingsStore;

/// Settings store that keeps each user's document in its own JSON file.
///
/// Each write goes to its own uniquely named temporary file in the root,
/// which is synced and then renamed over the target. Readers never observe
/// a partially written document, and concurrent writers for one user
/// cannot interleave: the last rename wins with a complete document. A
/// failed write removes its temporary file.
#[derive(Debug, Clone)]
pub struct JsonFileSettingsStore {
    root: PathBuf,
}

impl JsonFileSettingsStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the documents.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a user's document.
    pub fn document_path(&self, user_id: &str) -> Result<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.root.join(format!("{user_id}.json")))
    }
}

/// Reject ids that are empty or could escape the root directory.
fn validate_user_id(user_id: &str) -> Result<()> {
    let invalid = user_id.is_empty()
        || user_id.starts_with('.')
        || user_id
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control());
    if invalid {
        return Err(Error::InvalidUserId(user_id.to_string()));
    }
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Write `contents` to `path` via a fresh temporary file in `root`.
///
/// Blocking; the temporary file is deleted on every error path.
fn write_atomically(root: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::create_dir_all(root).map_err(|e| io_error(root, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".settings-")
        .suffix(".tmp")
        .tempfile_in(root)
        .map_err(|e| io_error(root, e))?;
    tmp.write_all(contents).map_err(|e| io_error(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| io_error(tmp.path(), e))?;

    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    type Document = SettingsDocument;

    async fn get(&self, user_id: &str) -> Result<Option<SettingsDocument>> {
        let path = self.document_path(user_id)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        let document = serde_json::from_slice(&bytes)?;
        debug!(user_id = %user_id, path = %path.display(), "Loaded settings document");
        Ok(Some(document))
    }

    async fn put(&self, user_id: &str, document: &SettingsDocument) -> Result<()> {
        let path = self.document_path(user_id)?;

        let mut contents = serde_json::to_vec_pretty(document)?;
        contents.push(b'\n');

        let root = self.root.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&root, &target, &contents))
            .await
            .map_err(|e| Error::Store(format!("settings write task failed: {e}")))??;

        debug!(user_id = %user_id, path = %path.display(), "Stored settings document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, JsonFileSettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettingsStore::new(dir.path().join("settings"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_missing_document_is_none() {
        let (_dir, store) = temp_store();
        assert!(store.get("dr-okafor").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_dir, store) = temp_store();
        let doc = SettingsDocument::new()
            .with("practice_name", "Lakeside Family Medicine")
            .with("macros", json!([{"trigger": ".nml", "text": "Normal exam."}]));

        store.put("dr-okafor", &doc).await.unwrap();

        let loaded = store.get("dr-okafor").await.unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(store.document_path("dr-okafor").unwrap().is_file());
    }

    #[tokio::test]
    async fn test_put_replaces_and_leaves_no_temp_file() {
        let (_dir, store) = temp_store();
        store
            .put("dr-okafor", &SettingsDocument::new().with("theme", "light"))
            .await
            .unwrap();
        store
            .put("dr-okafor", &SettingsDocument::new().with("theme", "dark"))
            .await
            .unwrap();

        let loaded = store.get("dr-okafor").await.unwrap().unwrap();
        assert_eq!(loaded.get_str("theme"), Some("dark"));

        let entries: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["dr-okafor.json".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_never_tear_the_document() {
        let (_dir, store) = temp_store();

        for round in 0..20 {
            let writers: Vec<_> = (0..8)
                .map(|writer| {
                    let store = store.clone();
                    let doc = SettingsDocument::new()
                        .with("round", round)
                        .with("writer", writer)
                        .with("notes", "x".repeat(4096 * (writer + 1)));
                    tokio::spawn(async move { store.put("dr-okafor", &doc).await })
                })
                .collect();

            for writer in writers {
                writer.await.unwrap().unwrap();
            }

            let loaded = store.get("dr-okafor").await.unwrap().unwrap();
            assert_eq!(loaded.get("round"), Some(&json!(round)));
            let writer = loaded.get("writer").and_then(|w| w.as_u64()).unwrap() as usize;
            assert_eq!(loaded.get_str("notes").unwrap().len(), 4096 * (writer + 1));
        }

        let entries: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["dr-okafor.json".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_put_leaves_no_temp_file() {
        let (_dir, store) = temp_store();
        std::fs::create_dir_all(store.document_path("dr-okafor").unwrap()).unwrap();

        let err = store
            .put("dr-okafor", &SettingsDocument::new().with("theme", "dark"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));

        let entries: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["dr-okafor.json".to_string()]);
    }

    #[tokio::test]
    async fn test_rejects_path_like_user_ids() {
        let (_dir, store) = temp_store();
        for bad in ["", "../etc/passwd", "a/b", "a\\b", ".hidden"] {
            let err = store.get(bad).await.unwrap_err();
            assert!(matches!(err, Error::InvalidUserId(_)), "accepted {bad:?}");
        }
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let (_dir, store) = temp_store();
        std::fs::create_dir_all(store.root()).unwrap();
        std::fs::write(store.document_path("dr-okafor").unwrap(), "{not json").unwrap();

        let err = store.get("dr-okafor").await.unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
