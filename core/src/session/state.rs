//! Mutable session state and its serialisable snapshot.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::preload::LoadState;
use crate::provider::SupplementaryMetadata;
use crate::store::ReadingProgressRecord;
use crate::store::offline::now_ms;
use crate::types::{
    Chapter, MangaIdentity, PageSet, ReaderAddress, ReadingMode, SessionPhase, SessionToken,
    clamp_page,
};

/// Address a session was (or will be) opened at.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    /// Manga slug or canonical id.
    pub slug: String,
    pub chapter_id: Option<String>,
    /// 1-based page to resume at; defaults to the first page.
    pub page: Option<u32>,
}

impl OpenRequest {
    pub fn new(slug: impl Into<String>) -> Self {
        Self { slug: slug.into(), chapter_id: None, page: None }
    }

    pub fn chapter(mut self, chapter_id: impl Into<String>) -> Self {
        self.chapter_id = Some(chapter_id.into());
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

impl From<&ReaderAddress> for OpenRequest {
    fn from(address: &ReaderAddress) -> Self {
        Self {
            slug: address.manga_id.clone(),
            chapter_id: address.chapter_id.clone(),
            page: Some(address.page),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) token: SessionToken,
    pub(crate) phase: SessionPhase,
    pub(crate) request: OpenRequest,
    pub(crate) manga: Option<MangaIdentity>,
    pub(crate) chapters: Vec<Chapter>,
    pub(crate) active: Option<Chapter>,
    pub(crate) pages: PageSet,
    pub(crate) current_page: u32,
    pub(crate) is_offline: bool,
    pub(crate) catalog_degraded: bool,
    pub(crate) poster_url: Option<String>,
    pub(crate) supplementary: Option<SupplementaryMetadata>,
    pub(crate) page_transition: bool,
    pub(crate) controls_visible: bool,
    // Preferences below survive chapter changes.
    pub(crate) mode: ReadingMode,
    pub(crate) zoom: f32,
    pub(crate) autoplay: bool,
    pub(crate) autoplay_delay: Duration,
}

impl SessionState {
    pub(crate) fn new(autoplay_delay: Duration) -> Self {
        Self {
            token: SessionToken::default(),
            phase: SessionPhase::Initializing,
            request: OpenRequest::default(),
            manga: None,
            chapters: Vec::new(),
            active: None,
            pages: PageSet::default(),
            current_page: 1,
            is_offline: false,
            catalog_degraded: false,
            poster_url: None,
            supplementary: None,
            page_transition: false,
            controls_visible: true,
            mode: ReadingMode::default(),
            zoom: 1.0,
            autoplay: false,
            autoplay_delay,
        }
    }

    /// Clear everything tied to the previous chapter and enter `Initializing`.
    pub(crate) fn restart(&mut self, token: SessionToken, request: OpenRequest) {
        self.token = token;
        self.phase = SessionPhase::Initializing;
        self.request = request;
        self.manga = None;
        self.chapters.clear();
        self.active = None;
        self.pages = PageSet::default();
        self.current_page = 1;
        self.is_offline = false;
        self.catalog_degraded = false;
        self.poster_url = None;
        self.supplementary = None;
        self.page_transition = false;
    }

    pub(crate) fn total_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    pub(crate) fn set_current_page(&mut self, page: u32) {
        self.current_page = clamp_page(page, self.total_pages());
    }

    pub(crate) fn address(&self) -> Option<ReaderAddress> {
        let manga = self.manga.as_ref()?;
        Some(ReaderAddress {
            manga_id: manga.id.clone(),
            chapter_id: self.active.as_ref().map(|chapter| chapter.id.clone()),
            page: self.current_page,
        })
    }

    /// Progress record for `chapter` at `page`, stamped now.
    pub(crate) fn progress_for(
        &self,
        chapter: &Chapter,
        page: u32,
        total_pages: u32,
    ) -> Option<ReadingProgressRecord> {
        let manga = self.manga.as_ref()?;
        Some(ReadingProgressRecord {
            manga_id: manga.id.clone(),
            chapter_id: chapter.id.clone(),
            chapter: chapter.label(),
            page,
            total_pages,
            poster_url: self.poster_url.clone(),
            last_read: now_ms(),
        })
    }

    pub(crate) fn current_progress(&self) -> Option<ReadingProgressRecord> {
        let chapter = self.active.as_ref()?;
        self.progress_for(chapter, self.current_page, self.total_pages())
    }

    /// Ordered catalog position of the active chapter.
    pub(crate) fn active_position(&self) -> Option<usize> {
        let active = self.active.as_ref()?;
        crate::catalog::position_of(&self.chapters, &active.id)
    }

    pub(crate) fn snapshot(&self, load_states: BTreeMap<usize, LoadState>) -> SessionSnapshot {
        SessionSnapshot {
            token: self.token,
            phase: self.phase.clone(),
            manga: self.manga.clone(),
            chapters: self.chapters.clone(),
            active_chapter: self.active.clone(),
            pages: self.pages.clone(),
            current_page: self.current_page,
            total_pages: self.total_pages(),
            is_offline: self.is_offline,
            catalog_degraded: self.catalog_degraded,
            poster_url: self.poster_url.clone(),
            supplementary: self.supplementary.clone(),
            mode: self.mode,
            zoom: self.zoom,
            page_transition: self.page_transition,
            controls_visible: self.controls_visible,
            autoplay: self.autoplay,
            autoplay_delay_ms: self.autoplay_delay.as_millis() as u64,
            load_states,
        }
    }
}

/// Read-only view of a session handed to renderers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub token: SessionToken,
    pub phase: SessionPhase,
    pub manga: Option<MangaIdentity>,
    pub chapters: Vec<Chapter>,
    pub active_chapter: Option<Chapter>,
    pub pages: PageSet,
    pub current_page: u32,
    pub total_pages: u32,
    pub is_offline: bool,
    pub catalog_degraded: bool,
    pub poster_url: Option<String>,
    pub supplementary: Option<SupplementaryMetadata>,
    pub mode: ReadingMode,
    pub zoom: f32,
    pub page_transition: bool,
    pub controls_visible: bool,
    pub autoplay: bool,
    pub autoplay_delay_ms: u64,
    /// Keyed by 0-based page index.
    pub load_states: BTreeMap<usize, LoadState>,
}

impl SessionSnapshot {
    /// Pages shown on screen: the current page plus its partner in paired mode.
    pub fn visible_pages(&self) -> Vec<u32> {
        if self.total_pages == 0 {
            return Vec::new();
        }
        let mut pages = vec![self.current_page];
        if self.mode.layout().pair_with_next && self.current_page < self.total_pages {
            pages.push(self.current_page + 1);
        }
        pages
    }

    pub fn load_state(&self, page: u32) -> LoadState {
        page.checked_sub(1)
            .and_then(|index| self.load_states.get(&(index as usize)).cloned())
            .unwrap_or_default()
    }
}
