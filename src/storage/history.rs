use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::platforms::Platform;

/// Completed downloads are capped; inserting beyond this evicts the oldest.
pub const MAX_HISTORY_ENTRIES: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub platform: Platform,
    pub url: String,
    pub title: String,
    pub media_url: String,
    pub timestamp: DateTime<Utc>,
}

/// Store for the most-recent-first download history. Injected into the
/// session controller so tests can swap in the in-memory variant.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> anyhow::Result<()>;
    async fn entries(&self) -> anyhow::Result<Vec<HistoryEntry>>;
    async fn clear(&self) -> anyhow::Result<()>;
}

/// History persisted as one JSON array. A missing or unreadable file degrades
/// to an empty list rather than failing the session.
pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the platform data directory.
    pub fn default_location(app_name: &str) -> Self {
        let dir = dirs::data_dir()
            .map(|d| d.join(app_name))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir.join("history.json"))
    }

    async fn load(&self) -> Vec<HistoryEntry> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    async fn write(&self, entries: &[HistoryEntry]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(entries)?;

        // Write-then-rename so a crash mid-write never truncates the list.
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn append(&self, entry: HistoryEntry) -> anyhow::Result<()> {
        let mut entries = self.load().await;
        entries.insert(0, entry);
        entries.truncate(MAX_HISTORY_ENTRIES);
        self.write(&entries).await
    }

    async fn entries(&self) -> anyhow::Result<Vec<HistoryEntry>> {
        Ok(self.load().await)
    }

    async fn clear(&self) -> anyhow::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Volatile store for tests and hosts without persistence.
#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: tokio::sync::Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, entry: HistoryEntry) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(0, entry);
        entries.truncate(MAX_HISTORY_ENTRIES);
        Ok(())
    }

    async fn entries(&self) -> anyhow::Result<Vec<HistoryEntry>> {
        Ok(self.entries.lock().await.clone())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> HistoryEntry {
        HistoryEntry {
            platform: Platform::TikTok,
            url: "https://www.tiktok.com/@u/video/1".into(),
            title: title.into(),
            media_url: "https://cdn.example.com/v.mp4".into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn memory_store_is_most_recent_first() {
        let store = MemoryHistoryStore::new();
        store.append(entry("first")).await.unwrap();
        store.append(entry("second")).await.unwrap();

        let entries = store.entries().await.unwrap();
        assert_eq!(entries[0].title, "second");
        assert_eq!(entries[1].title, "first");
    }

    #[tokio::test]
    async fn memory_store_caps_at_fifty() {
        let store = MemoryHistoryStore::new();
        for i in 0..55 {
            store.append(entry(&format!("video {}", i))).await.unwrap();
        }

        let entries = store.entries().await.unwrap();
        assert_eq!(entries.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(entries[0].title, "video 54");
        // The oldest five were evicted.
        assert_eq!(entries.last().unwrap().title, "video 5");
    }

    #[tokio::test]
    async fn json_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let store = JsonHistoryStore::new(&path);
        store.append(entry("kept")).await.unwrap();

        let reopened = JsonHistoryStore::new(&path);
        let entries = reopened.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "kept");
        assert_eq!(entries[0].platform, Platform::TikTok);
    }

    #[tokio::test]
    async fn json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("nope.json"));
        assert!(store.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_store_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonHistoryStore::new(&path);
        assert!(store.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_store_caps_at_fifty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("history.json"));
        for i in 0..52 {
            store.append(entry(&format!("video {}", i))).await.unwrap();
        }

        let entries = store.entries().await.unwrap();
        assert_eq!(entries.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(entries[0].title, "video 51");
    }

    #[tokio::test]
    async fn json_store_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = JsonHistoryStore::new(&path);

        store.append(entry("gone")).await.unwrap();
        store.clear().await.unwrap();
        assert!(!path.exists());
        assert!(store.entries().await.unwrap().is_empty());

        // Clearing again is fine.
        store.clear().await.unwrap();
    }
}
