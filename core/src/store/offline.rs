//! Downloaded chapters and reading history kept in the local key-value store.
//!
//! Two keys are used: `manga_downloads` holds a JSON array of [`OfflineChapterRecord`] and
//! `readingHistory` holds a JSON object mapping manga ids to [`ReadingProgressRecord`].
//! Failures are logged here and returned as [`ReaderError::Persistence`]; callers decide
//! whether the user sees them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ReaderError;
use crate::types::Chapter;

use super::KeyValueStore;

pub const DOWNLOADS_KEY: &str = "manga_downloads";
pub const HISTORY_KEY: &str = "readingHistory";

/// Rough per-page size used to estimate the footprint of a download.
pub const ESTIMATED_PAGE_BYTES: u64 = 512 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineChapterRecord {
    pub id: String,
    pub manga_id: String,
    pub manga_title: String,
    pub manga_slug: String,
    pub chapter_id: String,
    pub chapter_number: Option<f64>,
    pub chapter_title: Option<String>,
    pub poster_url: Option<String>,
    pub pages: Vec<String>,
    pub downloaded_at: u64,
    pub size: u64,
}

impl OfflineChapterRecord {
    pub fn storage_key(manga_id: &str, chapter_id: &str) -> String {
        format!("{manga_id}-{chapter_id}")
    }

    /// Synthetic catalog entry used when reading this record without a chapter provider.
    pub fn to_chapter(&self) -> Chapter {
        Chapter {
            id: self.chapter_id.clone(),
            chapter_number: self.chapter_number,
            volume_number: None,
            title: self.chapter_title.clone(),
            page_count: self.pages.len() as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgressRecord {
    pub manga_id: String,
    pub chapter_id: String,
    pub chapter: String,
    pub page: u32,
    pub total_pages: u32,
    pub poster_url: Option<String>,
    pub last_read: u64,
}

/// Adapter over an injected [`KeyValueStore`].
#[derive(Clone)]
pub struct OfflineStore {
    kv: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for OfflineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineStore").finish_non_exhaustive()
    }
}

impl OfflineStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Find a downloaded chapter. A record whose `chapterId` equals `explicit_chapter_id`
    /// wins over one matched by manga id (or slug); ties resolve in storage order.
    pub fn find_offline_chapter(
        &self,
        manga_id: &str,
        explicit_chapter_id: Option<&str>,
    ) -> Option<OfflineChapterRecord> {
        let records = self.list_downloads();
        if let Some(chapter_id) = explicit_chapter_id {
            if let Some(record) = records.iter().find(|record| record.chapter_id == chapter_id) {
                return Some(record.clone());
            }
        }
        records
            .into_iter()
            .find(|record| record.manga_id == manga_id || record.manga_slug == manga_id)
    }

    /// Upsert by `"{mangaId}-{chapterId}"`; the new record replaces any previous one.
    pub fn save_chapter(&self, record: OfflineChapterRecord) -> Result<(), ReaderError> {
        let result = self.read_downloads().and_then(|mut records| {
            let key = OfflineChapterRecord::storage_key(&record.manga_id, &record.chapter_id);
            records.retain(|existing| {
                OfflineChapterRecord::storage_key(&existing.manga_id, &existing.chapter_id) != key
            });
            records.push(record);
            self.write_json(DOWNLOADS_KEY, &records)
        });
        logged(result, "saving offline chapter")
    }

    pub fn remove_download(&self, manga_id: &str, chapter_id: &str) -> Result<bool, ReaderError> {
        let result = self.read_downloads().and_then(|mut records| {
            let before = records.len();
            records.retain(|record| !(record.manga_id == manga_id && record.chapter_id == chapter_id));
            let removed = records.len() != before;
            if removed {
                self.write_json(DOWNLOADS_KEY, &records)?;
            }
            Ok(removed)
        });
        logged(result, "removing offline chapter")
    }

    /// All downloads in storage order. Unreadable storage yields an empty list.
    pub fn list_downloads(&self) -> Vec<OfflineChapterRecord> {
        logged(self.read_downloads(), "reading offline chapters").unwrap_or_default()
    }

    /// Overwrite the progress record for `manga_id`.
    pub fn save_progress(
        &self,
        manga_id: &str,
        progress: ReadingProgressRecord,
    ) -> Result<(), ReaderError> {
        let result = self.read_history().and_then(|mut history| {
            history.insert(manga_id.to_string(), progress);
            self.write_json(HISTORY_KEY, &history)
        });
        logged(result, "saving reading progress")
    }

    pub fn load_progress(&self, manga_id: &str) -> Option<ReadingProgressRecord> {
        logged(self.read_history(), "reading progress history")
            .ok()
            .and_then(|mut history| history.remove(manga_id))
    }

    fn read_downloads(&self) -> crate::Result<Vec<OfflineChapterRecord>> {
        match self.kv.get(DOWNLOADS_KEY)? {
            Some(text) if !text.trim().is_empty() => {
                serde_json::from_str(&text).context("decoding offline chapter list")
            }
            _ => Ok(Vec::new()),
        }
    }

    fn read_history(&self) -> crate::Result<HashMap<String, ReadingProgressRecord>> {
        match self.kv.get(HISTORY_KEY)? {
            Some(text) if !text.trim().is_empty() => {
                serde_json::from_str(&text).context("decoding reading history")
            }
            _ => Ok(HashMap::new()),
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> crate::Result<()> {
        let text = serde_json::to_string(value)?;
        self.kv.set(key, &text)
    }
}

fn logged<T>(result: crate::Result<T>, action: &str) -> Result<T, ReaderError> {
    result.map_err(|err| {
        tracing::warn!(target: "offline", error = %format!("{err:#}"), "{action} failed");
        ReaderError::Persistence(err)
    })
}

pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn record(manga: &str, chapter: &str, pages: &[&str]) -> OfflineChapterRecord {
        OfflineChapterRecord {
            id: OfflineChapterRecord::storage_key(manga, chapter),
            manga_id: manga.to_string(),
            manga_title: format!("Title {manga}"),
            manga_slug: format!("{manga}-slug"),
            chapter_id: chapter.to_string(),
            chapter_number: Some(1.0),
            chapter_title: None,
            poster_url: None,
            pages: pages.iter().map(|page| page.to_string()).collect(),
            downloaded_at: 1,
            size: 0,
        }
    }

    #[test]
    fn save_chapter_replaces_same_key() {
        let store = OfflineStore::new(Arc::new(MemoryStore::new()));
        store.save_chapter(record("m1", "c1", &["a.png"])).unwrap();
        store.save_chapter(record("m1", "c2", &["x.png"])).unwrap();
        store.save_chapter(record("m1", "c1", &["a.png", "b.png"])).unwrap();

        let downloads = store.list_downloads();
        assert_eq!(downloads.len(), 2);
        let c1 = downloads.iter().find(|r| r.chapter_id == "c1").unwrap();
        assert_eq!(c1.pages.len(), 2);
    }

    #[test]
    fn chapter_match_takes_precedence_over_manga_match() {
        let store = OfflineStore::new(Arc::new(MemoryStore::new()));
        store.save_chapter(record("m1", "c1", &["a.png"])).unwrap();
        store.save_chapter(record("m2", "c7", &["z.png"])).unwrap();

        let found = store.find_offline_chapter("m1", Some("c7")).unwrap();
        assert_eq!(found.chapter_id, "c7");
        let by_manga = store.find_offline_chapter("m1", Some("missing")).unwrap();
        assert_eq!(by_manga.chapter_id, "c1");
        let by_slug = store.find_offline_chapter("m2-slug", None).unwrap();
        assert_eq!(by_slug.manga_id, "m2");
        assert!(store.find_offline_chapter("m3", None).is_none());
    }

    #[test]
    fn corrupt_storage_degrades_to_empty() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(DOWNLOADS_KEY, "not json").unwrap();
        let store = OfflineStore::new(kv);
        assert!(store.list_downloads().is_empty());
        assert!(store.find_offline_chapter("m1", None).is_none());
    }

    #[test]
    fn progress_is_overwritten_per_manga() {
        let store = OfflineStore::new(Arc::new(MemoryStore::new()));
        let mut progress = ReadingProgressRecord {
            manga_id: "m1".into(),
            chapter_id: "c1".into(),
            chapter: "Ch. 1".into(),
            page: 3,
            total_pages: 10,
            poster_url: None,
            last_read: 5,
        };
        store.save_progress("m1", progress.clone()).unwrap();
        progress.page = 4;
        store.save_progress("m1", progress).unwrap();

        assert_eq!(store.load_progress("m1").unwrap().page, 4);
        assert!(store.load_progress("m2").is_none());
    }

    #[test]
    fn quota_failure_is_reported_as_persistence_error() {
        let store = OfflineStore::new(Arc::new(MemoryStore::with_quota(32)));
        let err = store.save_chapter(record("m1", "c1", &["a-very-long-page-url.png"])).unwrap_err();
        assert!(matches!(err, ReaderError::Persistence(_)));
        assert!(store.remove_download("m1", "c1").is_ok_and(|removed| !removed));
    }
}
