//! Contracts for the remote collaborators a session consumes.
//!
//! The session never talks HTTP itself; hosts inject implementations of these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::{Chapter, PageSet};

/// Manga record returned by the chapter provider's catalog endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaRecord {
    pub id: String,
    pub title: String,
    pub cover_url: Option<String>,
    pub description: Option<String>,
}

/// Page manifest for a chapter. Any missing field makes the manifest unusable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageManifest {
    pub base_url: Option<String>,
    pub chapter_hash: Option<String>,
    pub page_filenames: Vec<String>,
}

impl PageManifest {
    /// Build the page URLs as `{base_url}/data/{hash}/{filename}`, or `None` when the
    /// manifest lacks its base URL or hash.
    pub fn into_page_set(self, chapter_id: &str) -> Option<PageSet> {
        let base_url = self.base_url.filter(|url| !url.is_empty())?;
        let hash = self.chapter_hash.filter(|hash| !hash.is_empty())?;
        let base = base_url.trim_end_matches('/');
        let page_urls = self
            .page_filenames
            .iter()
            .map(|filename| format!("{base}/data/{hash}/{filename}"))
            .collect();
        Some(PageSet { chapter_id: chapter_id.to_string(), page_urls, base_url })
    }
}

/// Ratings, synopsis and artwork from the supplementary metadata provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplementaryMetadata {
    pub title: Option<String>,
    pub poster_image: Option<String>,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub rating: Option<f32>,
    pub status: Option<String>,
}

/// Chapter and page provider.
#[async_trait]
pub trait ChapterProvider: Send + Sync {
    /// Free-text catalog search used to resolve human-readable slugs.
    async fn search_manga(&self, query: &str, limit: u32) -> Result<Vec<MangaRecord>>;

    async fn get_manga(&self, id: &str) -> Result<MangaRecord>;

    /// Chapters of a manga in provider order, at most `limit` entries.
    async fn get_chapters(&self, manga_id: &str, limit: u32) -> Result<Vec<Chapter>>;

    async fn get_chapter_detail(&self, chapter_id: &str) -> Result<Chapter>;

    async fn get_chapter_pages(&self, chapter_id: &str) -> Result<PageManifest>;
}

/// Supplementary metadata provider. Consulted opportunistically.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn search(&self, title: &str, limit: u32) -> Result<Vec<SupplementaryMetadata>>;
}

/// Loads a single page image. Each call is a full, independent attempt.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the image and return the number of bytes received.
    async fn fetch(&self, url: &str) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_builds_data_urls() {
        let manifest = PageManifest {
            base_url: Some("https://cdn.example/".into()),
            chapter_hash: Some("abc".into()),
            page_filenames: vec!["1.png".into(), "2.png".into()],
        };
        let pages = manifest.into_page_set("c1").expect("complete manifest");
        assert_eq!(pages.page_urls[0], "https://cdn.example/data/abc/1.png");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages.chapter_id, "c1");
    }

    #[test]
    fn manifest_without_hash_is_unusable() {
        let manifest = PageManifest {
            base_url: Some("https://cdn.example".into()),
            chapter_hash: None,
            page_filenames: vec!["1.png".into()],
        };
        assert!(manifest.into_page_set("c1").is_none());
    }
}
