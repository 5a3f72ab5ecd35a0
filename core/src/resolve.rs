//! Maps a human-readable slug or literal id onto the provider's canonical manga id.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::ReaderError;
use crate::provider::{ChapterProvider, MangaRecord};
use crate::types::MangaIdentity;

#[derive(Clone)]
pub struct IdentifierResolver {
    provider: Arc<dyn ChapterProvider>,
    search_limit: u32,
}

impl std::fmt::Debug for IdentifierResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierResolver").field("search_limit", &self.search_limit).finish()
    }
}

impl IdentifierResolver {
    pub fn new(provider: Arc<dyn ChapterProvider>, search_limit: u32) -> Self {
        Self { provider, search_limit: search_limit.max(1) }
    }

    /// Resolve `raw_slug`. Canonical ids are returned as-is with an empty title; the caller
    /// fills the title from the manga record.
    pub async fn resolve(&self, raw_slug: &str) -> Result<MangaIdentity, ReaderError> {
        let raw = raw_slug.trim();
        if is_canonical_id(raw) {
            tracing::debug!(target: "resolve", id = raw, "slug is a canonical id");
            return Ok(MangaIdentity::new(raw, ""));
        }

        let phrase = search_phrase(raw);
        if phrase.is_empty() {
            return Err(ReaderError::IdentifierNotFound(raw_slug.to_string()));
        }

        let candidates = self
            .provider
            .search_manga(&phrase, self.search_limit)
            .await
            .map_err(ReaderError::Provider)?;

        let best = best_match(&phrase, &candidates)
            .ok_or_else(|| ReaderError::IdentifierNotFound(raw_slug.to_string()))?;
        tracing::info!(target: "resolve", slug = raw, id = %best.id, title = %best.title, "resolved slug");
        Ok(MangaIdentity::new(best.id.clone(), best.title.clone()))
    }
}

/// MangaDex identifies manga by UUID.
pub fn is_canonical_id(raw: &str) -> bool {
    raw.len() == 36 && Uuid::parse_str(raw).is_ok()
}

/// Turn `one-piece_colored` into `one piece colored`.
pub fn search_phrase(slug: &str) -> String {
    slug.split(|ch: char| matches!(ch, '-' | '_' | '+' | '.') || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn best_match<'a>(phrase: &str, candidates: &'a [MangaRecord]) -> Option<&'a MangaRecord> {
    candidates
        .iter()
        .find(|candidate| candidate.title.eq_ignore_ascii_case(phrase))
        .or_else(|| candidates.first())
}
