//! Chapter catalog loading and canonical ordering.

use std::sync::Arc;

use crate::error::ReaderError;
use crate::provider::ChapterProvider;
use crate::types::Chapter;

/// Result of a catalog fetch. `degraded` marks a provider failure that was absorbed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogOutcome {
    pub chapters: Vec<Chapter>,
    pub degraded: bool,
}

#[derive(Clone)]
pub struct ChapterCatalog {
    provider: Arc<dyn ChapterProvider>,
    limit: u32,
}

impl std::fmt::Debug for ChapterCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChapterCatalog").field("limit", &self.limit).finish()
    }
}

impl ChapterCatalog {
    pub fn new(provider: Arc<dyn ChapterProvider>, limit: u32) -> Self {
        Self { provider, limit: limit.max(1) }
    }

    /// Fetch and order the chapters of `manga_id`. Provider failures yield an empty,
    /// degraded catalog instead of an error.
    pub async fn load_chapters(&self, manga_id: &str) -> CatalogOutcome {
        match self.provider.get_chapters(manga_id, self.limit).await {
            Ok(mut chapters) => {
                sort_chapters(&mut chapters);
                tracing::debug!(target: "catalog", manga = manga_id, count = chapters.len(), "loaded chapters");
                CatalogOutcome { chapters, degraded: false }
            }
            Err(err) => {
                tracing::warn!(target: "catalog", manga = manga_id, error = %err, "chapter list unavailable, continuing without chapter navigation");
                CatalogOutcome { chapters: Vec::new(), degraded: true }
            }
        }
    }
}

/// Stable ascending sort by `(volume, chapter)`; equal keys keep provider order.
pub fn sort_chapters(chapters: &mut [Chapter]) {
    chapters.sort_by(Chapter::cmp_order);
}

/// Pick the chapter to open: the explicitly requested one, else the first in order.
pub fn select_chapter<'a>(
    chapters: &'a [Chapter],
    requested: Option<&str>,
) -> Result<&'a Chapter, ReaderError> {
    match requested {
        Some(id) => chapters
            .iter()
            .find(|chapter| chapter.id == id)
            .ok_or_else(|| ReaderError::ChapterNotFound(id.to_string())),
        None => chapters
            .first()
            .ok_or_else(|| ReaderError::ChapterNotFound("no chapters available".to_string())),
    }
}

/// Position of `chapter_id` within the ordered catalog.
pub fn position_of(chapters: &[Chapter], chapter_id: &str) -> Option<usize> {
    chapters.iter().position(|chapter| chapter.id == chapter_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(id: &str, vol: Option<f64>, ch: Option<f64>) -> Chapter {
        Chapter { volume_number: vol, chapter_number: ch, ..Chapter::new(id) }
    }

    #[test]
    fn missing_numbers_sort_first() {
        let mut chapters = vec![
            chapter("b", Some(1.0), Some(1.0)),
            chapter("a", None, None),
            chapter("c", None, Some(2.0)),
        ];
        sort_chapters(&mut chapters);
        let ids: Vec<_> = chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn ties_keep_provider_order() {
        let mut chapters = vec![
            chapter("first", Some(1.0), Some(4.0)),
            chapter("early", Some(1.0), Some(1.0)),
            chapter("second", Some(1.0), Some(4.0)),
        ];
        sort_chapters(&mut chapters);
        let ids: Vec<_> = chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "first", "second"]);
    }

    #[test]
    fn select_defaults_to_first_and_reports_missing() {
        let chapters = vec![chapter("x", Some(1.0), Some(1.0)), chapter("y", Some(1.0), Some(2.0))];
        assert_eq!(select_chapter(&chapters, None).unwrap().id, "x");
        assert_eq!(select_chapter(&chapters, Some("y")).unwrap().id, "y");
        let err = select_chapter(&chapters, Some("z")).unwrap_err();
        assert!(matches!(err, ReaderError::ChapterNotFound(id) if id == "z"));
        assert!(select_chapter(&[], None).is_err());
    }
}
