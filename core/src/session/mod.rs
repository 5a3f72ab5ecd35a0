//! Reader session controller.
//!
//! A [`ReaderSession`] owns the current manga/chapter/page position and drives the other
//! components: it consults the offline store, resolves identifiers, loads the catalog and
//! page manifest, schedules look-ahead preloads and persists progress after every move.
//!
//! Each [`ReaderSession::open`] call takes a fresh [`SessionToken`]. Anything that completes
//! asynchronously (remote fetches, preloads, timers) carries the token it was started with
//! and is dropped when the session has since moved on.

mod host;
mod state;
mod timer;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::catalog::{self, ChapterCatalog};
use crate::config::ReaderConfig;
use crate::error::ReaderError;
use crate::keymap::ReaderAction;
use crate::preload::{ImagePreloader, RetryPolicy, plan_look_ahead};
use crate::provider::{ChapterProvider, ImageFetcher, MetadataProvider};
use crate::resolve::IdentifierResolver;
use crate::stats::PreloadSnapshot;
use crate::store::offline::{ESTIMATED_PAGE_BYTES, now_ms};
use crate::store::{KeyValueStore, OfflineChapterRecord, OfflineStore, ReadingProgressRecord};
use crate::types::{
    Chapter, MangaIdentity, PageSet, ReaderAddress, ReadingMode, SessionPhase, SessionToken,
    clamp_page,
};

pub use host::NavigationHost;
pub use state::{OpenRequest, SessionSnapshot};

use state::SessionState;
use timer::SessionTimers;

/// Collaborators injected into a session.
#[derive(Clone)]
pub struct SessionDeps {
    pub chapters: Arc<dyn ChapterProvider>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub images: Arc<dyn ImageFetcher>,
    pub store: Arc<dyn KeyValueStore>,
    pub host: Arc<dyn NavigationHost>,
}

impl std::fmt::Debug for SessionDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDeps").finish_non_exhaustive()
    }
}

/// How an `open` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Ready { offline: bool },
    /// A newer `open` started before this one finished; its results were discarded.
    Superseded,
}

/// Result of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Page(u32),
    Chapter(ReaderAddress),
    NoNextChapter,
    NoPrevChapter,
    Unchanged,
    NotReady,
}

enum Step {
    Page(u32),
    NextChapter,
    PrevChapter,
}

/// Chapter data gathered by the online pipeline, committed in one go.
struct LoadedChapter {
    manga: MangaIdentity,
    cover_url: Option<String>,
    chapters: Vec<Chapter>,
    degraded: bool,
    active: Chapter,
    pages: PageSet,
}

struct Shared {
    config: ReaderConfig,
    chapters: Arc<dyn ChapterProvider>,
    metadata: Arc<dyn MetadataProvider>,
    host: Arc<dyn NavigationHost>,
    offline: OfflineStore,
    resolver: IdentifierResolver,
    catalog: ChapterCatalog,
    preloader: ImagePreloader,
    generation: AtomicU64,
    state: Mutex<SessionState>,
    timers: Mutex<SessionTimers>,
}

impl Shared {
    fn is_current(&self, token: SessionToken) -> bool {
        self.generation.load(Ordering::SeqCst) == token.as_u64()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.timers.get_mut().cancel_all();
        self.preloader.reset(SessionToken::new(u64::MAX));
    }
}

/// Cheaply cloneable handle to one reader session. Requires a Tokio runtime.
#[derive(Clone)]
pub struct ReaderSession {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ReaderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ReaderSession")
            .field("token", &state.token)
            .field("phase", &state.phase)
            .field("current_page", &state.current_page)
            .finish_non_exhaustive()
    }
}

impl ReaderSession {
    pub fn new(config: ReaderConfig, deps: SessionDeps) -> Self {
        let preloader = ImagePreloader::new(deps.images, RetryPolicy::from(&config.preload));
        let shared = Shared {
            resolver: IdentifierResolver::new(
                Arc::clone(&deps.chapters),
                config.catalog.search_limit,
            ),
            catalog: ChapterCatalog::new(Arc::clone(&deps.chapters), config.catalog.chapter_limit),
            chapters: deps.chapters,
            metadata: deps.metadata,
            host: deps.host,
            offline: OfflineStore::new(deps.store),
            preloader,
            generation: AtomicU64::new(0),
            state: Mutex::new(SessionState::new(config.timing.autoplay_delay())),
            timers: Mutex::new(SessionTimers::default()),
            config,
        };
        Self { shared: Arc::new(shared) }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.shared.config
    }

    pub fn offline_store(&self) -> &OfflineStore {
        &self.shared.offline
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let load_states = self.shared.preloader.states();
        self.shared.state.lock().snapshot(load_states)
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.state.lock().phase.clone()
    }

    pub fn preload_stats(&self) -> PreloadSnapshot {
        self.shared.preloader.stats()
    }

    /// Open the session at `request`, replacing whatever was loaded before.
    ///
    /// A downloaded copy of the chapter short-circuits every remote call. Otherwise the
    /// identifier is resolved, the manga record and catalog are fetched concurrently, and the
    /// chapter detail and page manifest follow. Failures during loading move the session to
    /// a terminal phase and are returned; `retry` re-runs the same request.
    pub async fn open(&self, request: OpenRequest) -> Result<OpenOutcome, ReaderError> {
        let token = self.begin(request.clone());
        tracing::info!(target: "session", token = token.as_u64(), slug = %request.slug, chapter = ?request.chapter_id, "opening session");

        let offline = self
            .shared
            .offline
            .find_offline_chapter(&request.slug, request.chapter_id.as_deref())
            .filter(|record| {
                request.chapter_id.as_deref().is_none_or(|requested| requested == record.chapter_id)
            });
        if let Some(record) = offline {
            return Ok(self.commit_offline(token, &request, record));
        }

        if !self.set_phase(token, SessionPhase::OnlineLoading) {
            return Ok(OpenOutcome::Superseded);
        }

        match self.load_online(token, &request).await {
            Ok(Some(loaded)) => Ok(self.commit_online(token, &request, loaded)),
            Ok(None) => Ok(OpenOutcome::Superseded),
            Err(err) => {
                let phase = if err.is_not_found() {
                    SessionPhase::NotFound(err.to_string())
                } else {
                    SessionPhase::Error(err.to_string())
                };
                if !self.set_phase(token, phase) {
                    return Ok(OpenOutcome::Superseded);
                }
                tracing::warn!(target: "session", token = token.as_u64(), error = %err, "session failed to load");
                Err(err)
            }
        }
    }

    /// Re-run the last `open` request, e.g. after a terminal error.
    pub async fn retry(&self) -> Result<OpenOutcome, ReaderError> {
        let request = self.shared.state.lock().request.clone();
        self.open(request).await
    }

    /// Stop every timer and in-flight preload. Later completions are discarded.
    pub fn shutdown(&self) {
        let token = self.next_token();
        self.shared.timers.lock().cancel_all();
        self.shared.preloader.reset(token);
        let mut state = self.shared.state.lock();
        state.token = token;
        state.autoplay = false;
        state.page_transition = false;
        tracing::debug!(target: "session", token = token.as_u64(), "session shut down");
    }

    pub fn next_page(&self) -> NavOutcome {
        self.navigate(|state| {
            let total = state.total_pages();
            let target = state.current_page + state.mode.layout().step;
            if target > total && state.current_page >= total {
                Step::NextChapter
            } else {
                Step::Page(target.min(total))
            }
        })
    }

    pub fn prev_page(&self) -> NavOutcome {
        self.navigate(|state| {
            if state.current_page <= 1 {
                Step::PrevChapter
            } else {
                Step::Page(state.current_page.saturating_sub(state.mode.layout().step).max(1))
            }
        })
    }

    /// Jump to an absolute 1-based page, clamped to the chapter.
    pub fn jump_to_page(&self, page: u32) -> NavOutcome {
        self.navigate(|_| Step::Page(page))
    }

    pub fn go_to_next_chapter(&self) -> NavOutcome {
        self.change_chapter(true)
    }

    pub fn go_to_prev_chapter(&self) -> NavOutcome {
        self.change_chapter(false)
    }

    /// Switch layout. The page position is kept; the look-ahead window is re-planned.
    pub fn set_reading_mode(&self, mode: ReadingMode) {
        let ready = {
            let mut state = self.shared.state.lock();
            if state.mode == mode {
                return;
            }
            state.mode = mode;
            state.phase.is_ready()
        };
        tracing::debug!(target: "session", ?mode, "reading mode changed");
        if ready {
            self.refresh_preload();
        }
    }

    pub fn set_zoom(&self, zoom: f32) -> f32 {
        let zoom = self.shared.config.zoom.clamp(zoom);
        self.shared.state.lock().zoom = zoom;
        zoom
    }

    pub fn zoom_in(&self) -> f32 {
        let current = self.shared.state.lock().zoom;
        self.set_zoom(current + self.shared.config.zoom.step)
    }

    pub fn zoom_out(&self) -> f32 {
        let current = self.shared.state.lock().zoom;
        self.set_zoom(current - self.shared.config.zoom.step)
    }

    pub fn reset_zoom(&self) -> f32 {
        self.set_zoom(1.0)
    }

    /// Enable or disable automatic page advance.
    pub fn set_autoplay(&self, enabled: bool) {
        self.shared.state.lock().autoplay = enabled;
        if enabled {
            self.reschedule_autoplay();
        } else {
            self.shared.timers.lock().autoplay.cancel();
        }
    }

    pub fn set_autoplay_delay(&self, delay: Duration) {
        self.shared.state.lock().autoplay_delay = delay;
        self.reschedule_autoplay();
    }

    /// Any user input shows the controls and restarts their hide countdown. The countdown
    /// spans chapter changes; only `shutdown` or dropping the session cancels it.
    pub fn register_interaction(&self) {
        self.shared.state.lock().controls_visible = true;
        let weak = Arc::downgrade(&self.shared);
        self.shared.timers.lock().controls.schedule(
            self.shared.config.timing.controls_hide(),
            move || {
                if let Some(shared) = weak.upgrade() {
                    shared.state.lock().controls_visible = false;
                }
            },
        );
    }

    pub fn apply_action(&self, action: ReaderAction) -> NavOutcome {
        match action {
            ReaderAction::NextPage => self.next_page(),
            ReaderAction::PrevPage => self.prev_page(),
            ReaderAction::NextChapter => self.go_to_next_chapter(),
            ReaderAction::PrevChapter => self.go_to_prev_chapter(),
            ReaderAction::FirstPage => self.jump_to_page(1),
            ReaderAction::LastPage => self.jump_to_page(u32::MAX),
            ReaderAction::ZoomIn => {
                self.zoom_in();
                NavOutcome::Unchanged
            }
            ReaderAction::ZoomOut => {
                self.zoom_out();
                NavOutcome::Unchanged
            }
            ReaderAction::ResetZoom => {
                self.reset_zoom();
                NavOutcome::Unchanged
            }
            ReaderAction::CycleMode => {
                let mode = self.shared.state.lock().mode.cycle();
                self.set_reading_mode(mode);
                NavOutcome::Unchanged
            }
            ReaderAction::ToggleAutoplay => {
                let enabled = !self.shared.state.lock().autoplay;
                self.set_autoplay(enabled);
                NavOutcome::Unchanged
            }
        }
    }

    /// Save the active chapter for offline reading. Failures are returned so the host can
    /// tell the user.
    pub fn download_current_chapter(&self) -> Result<OfflineChapterRecord, ReaderError> {
        let record = {
            let state = self.shared.state.lock();
            if !state.phase.is_ready() {
                return Err(ReaderError::NotReady);
            }
            let (Some(manga), Some(chapter)) = (state.manga.as_ref(), state.active.as_ref()) else {
                return Err(ReaderError::NotReady);
            };
            if state.pages.is_empty() {
                return Err(ReaderError::PageDataMissing(chapter.id.clone()));
            }
            OfflineChapterRecord {
                id: OfflineChapterRecord::storage_key(&manga.id, &chapter.id),
                manga_id: manga.id.clone(),
                manga_title: manga.title.clone(),
                manga_slug: state.request.slug.clone(),
                chapter_id: chapter.id.clone(),
                chapter_number: chapter.chapter_number,
                chapter_title: chapter.title.clone(),
                poster_url: state.poster_url.clone(),
                pages: state.pages.page_urls.clone(),
                downloaded_at: now_ms(),
                size: state.pages.len() as u64 * ESTIMATED_PAGE_BYTES,
            }
        };
        self.shared.offline.save_chapter(record.clone())?;
        tracing::info!(target: "session", key = %record.id, pages = record.pages.len(), "chapter downloaded");
        Ok(record)
    }

    fn next_token(&self) -> SessionToken {
        SessionToken::new(self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Take a new token and reset per-chapter state.
    fn begin(&self, request: OpenRequest) -> SessionToken {
        let token = self.next_token();
        {
            let mut timers = self.shared.timers.lock();
            timers.autoplay.cancel();
            timers.transition.cancel();
            timers.supplementary.cancel();
        }
        self.shared.preloader.reset(token);
        self.shared.state.lock().restart(token, request);
        token
    }

    fn set_phase(&self, token: SessionToken, phase: SessionPhase) -> bool {
        let mut state = self.shared.state.lock();
        if state.token != token || !self.shared.is_current(token) {
            return false;
        }
        state.phase = phase;
        true
    }

    fn commit_offline(
        &self,
        token: SessionToken,
        request: &OpenRequest,
        record: OfflineChapterRecord,
    ) -> OpenOutcome {
        {
            let mut state = self.shared.state.lock();
            if state.token != token || !self.shared.is_current(token) {
                return OpenOutcome::Superseded;
            }
            state.phase = SessionPhase::OfflineReady;
            tracing::debug!(target: "session", token = token.as_u64(), key = %record.id, "offline copy found");
            let chapter = record.to_chapter();
            state.manga = Some(MangaIdentity::new(&record.manga_id, &record.manga_title));
            state.chapters = vec![chapter.clone()];
            state.active = Some(chapter);
            state.pages = PageSet {
                chapter_id: record.chapter_id.clone(),
                page_urls: record.pages,
                base_url: String::new(),
            };
            state.poster_url = record.poster_url;
            state.is_offline = true;
            state.set_current_page(request.page.unwrap_or(1));
        }
        // Snapshots report `OfflineReady` until this point.
        if !self.set_phase(token, SessionPhase::Ready) {
            return OpenOutcome::Superseded;
        }
        tracing::info!(target: "session", token = token.as_u64(), chapter = %record.chapter_id, "opened offline chapter");
        self.after_page_change();
        OpenOutcome::Ready { offline: true }
    }

    fn commit_online(
        &self,
        token: SessionToken,
        request: &OpenRequest,
        loaded: LoadedChapter,
    ) -> OpenOutcome {
        {
            let mut state = self.shared.state.lock();
            if state.token != token || !self.shared.is_current(token) {
                return OpenOutcome::Superseded;
            }
            state.manga = Some(loaded.manga);
            state.chapters = loaded.chapters;
            state.catalog_degraded = loaded.degraded;
            state.active = Some(loaded.active);
            state.pages = loaded.pages;
            if state.poster_url.is_none() {
                state.poster_url = loaded.cover_url;
            }
            state.is_offline = false;
            state.set_current_page(request.page.unwrap_or(1));
            state.phase = SessionPhase::Ready;
            tracing::info!(target: "session", token = token.as_u64(), pages = state.total_pages(), page = state.current_page, "session ready");
        }
        self.after_page_change();
        OpenOutcome::Ready { offline: false }
    }

    /// Resolve, fetch catalog, chapter detail and manifest. `Ok(None)` means superseded.
    async fn load_online(
        &self,
        token: SessionToken,
        request: &OpenRequest,
    ) -> Result<Option<LoadedChapter>, ReaderError> {
        let shared = &self.shared;

        let identity = shared.resolver.resolve(&request.slug).await?;
        if !shared.is_current(token) {
            return Ok(None);
        }

        let (manga, catalog) = tokio::join!(
            shared.chapters.get_manga(&identity.id),
            shared.catalog.load_chapters(&identity.id)
        );
        if !shared.is_current(token) {
            return Ok(None);
        }
        let manga_record = manga.map_err(ReaderError::Provider)?;
        let title =
            if identity.title.is_empty() { manga_record.title.clone() } else { identity.title };
        let manga = MangaIdentity::new(identity.id, title);
        self.spawn_supplementary(token, manga.title.clone());

        let mut chapters = catalog.chapters;
        let requested = match (request.chapter_id.as_deref(), catalog.degraded) {
            // Without a catalog the explicit chapter can still be read on its own.
            (Some(id), true) => id.to_string(),
            (requested, _) => catalog::select_chapter(&chapters, requested)?.id.clone(),
        };

        let mut active =
            shared.chapters.get_chapter_detail(&requested).await.map_err(ReaderError::Provider)?;
        if !shared.is_current(token) {
            return Ok(None);
        }
        active.id = requested.clone();
        match catalog::position_of(&chapters, &requested) {
            Some(position) => {
                if active.page_count == 0 {
                    active.page_count = chapters[position].page_count;
                }
                chapters[position] = active.clone();
            }
            None => chapters = vec![active.clone()],
        }

        let manifest =
            shared.chapters.get_chapter_pages(&requested).await.map_err(ReaderError::Provider)?;
        if !shared.is_current(token) {
            return Ok(None);
        }
        let pages = manifest.into_page_set(&requested).unwrap_or_else(|| {
            let err = ReaderError::PageDataMissing(requested.clone());
            tracing::warn!(target: "session", "{err}, opening chapter without pages");
            PageSet { chapter_id: requested.clone(), ..PageSet::default() }
        });

        Ok(Some(LoadedChapter {
            manga,
            cover_url: manga_record.cover_url,
            chapters,
            degraded: catalog.degraded,
            active,
            pages,
        }))
    }

    /// Fetch supplementary metadata in the background; failure never affects the session.
    fn spawn_supplementary(&self, token: SessionToken, title: String) {
        let weak = Arc::downgrade(&self.shared);
        let provider = Arc::clone(&self.shared.metadata);
        let task = async move {
            let result = provider.search(&title, 1).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            match result {
                Ok(results) => match results.into_iter().next() {
                    Some(metadata) => {
                        let mut state = shared.state.lock();
                        if state.token != token {
                            return;
                        }
                        if let Some(poster) = metadata.poster_image.clone() {
                            state.poster_url = Some(poster);
                        }
                        state.supplementary = Some(metadata);
                    }
                    None => {
                        let err = ReaderError::SupplementaryMetadataUnavailable(format!(
                            "no match for `{title}`"
                        ));
                        tracing::debug!(target: "session", "{err}");
                    }
                },
                Err(err) => {
                    let err = ReaderError::SupplementaryMetadataUnavailable(format!("{err:#}"));
                    tracing::warn!(target: "session", "{err}");
                }
            }
        };
        self.shared.timers.lock().supplementary.spawn(task);
    }

    fn navigate(&self, plan: impl FnOnce(&SessionState) -> Step) -> NavOutcome {
        let step = {
            let mut state = self.shared.state.lock();
            if !state.phase.is_ready() {
                return NavOutcome::NotReady;
            }
            match plan(&state) {
                Step::Page(page) => {
                    let page = clamp_page(page, state.total_pages());
                    if page == state.current_page {
                        return NavOutcome::Unchanged;
                    }
                    state.set_current_page(page);
                    state.page_transition = true;
                    Step::Page(page)
                }
                chapter => chapter,
            }
        };

        match step {
            Step::NextChapter => self.go_to_next_chapter(),
            Step::PrevChapter => self.go_to_prev_chapter(),
            Step::Page(page) => {
                self.after_page_change();
                NavOutcome::Page(page)
            }
        }
    }

    fn change_chapter(&self, forward: bool) -> NavOutcome {
        let (address, progress) = {
            let state = self.shared.state.lock();
            if !state.phase.is_ready() {
                return NavOutcome::NotReady;
            }
            let neighbor = state.active_position().and_then(|position| {
                let target = if forward { position.checked_add(1) } else { position.checked_sub(1) };
                target.and_then(|index| state.chapters.get(index))
            });
            let (Some(neighbor), Some(manga)) = (neighbor, state.manga.as_ref()) else {
                let outcome =
                    if forward { NavOutcome::NoNextChapter } else { NavOutcome::NoPrevChapter };
                tracing::info!(target: "session", ?outcome, "no neighbouring chapter available");
                return outcome;
            };
            let address = ReaderAddress {
                manga_id: manga.id.clone(),
                chapter_id: Some(neighbor.id.clone()),
                page: 1,
            };
            (address, state.progress_for(neighbor, 1, neighbor.page_count))
        };

        self.shared.timers.lock().autoplay.cancel();
        tracing::info!(target: "session", %address, "navigating to chapter");
        self.shared.host.navigate_to(&address);
        if let Some(progress) = progress {
            self.persist_progress(progress);
        }
        NavOutcome::Chapter(address)
    }

    /// Side effects that follow every committed page position.
    fn after_page_change(&self) {
        let (token, address, progress) = {
            let state = self.shared.state.lock();
            (state.token, state.address(), state.current_progress())
        };

        if let Some(address) = address {
            self.shared.host.replace_address(&address);
        }
        if let Some(progress) = progress {
            self.persist_progress(progress);
        }
        self.refresh_preload();
        self.schedule_transition_clear(token);
        self.reschedule_autoplay();
    }

    fn persist_progress(&self, progress: ReadingProgressRecord) {
        let manga_id = progress.manga_id.clone();
        // Already logged by the store; automatic saves are not surfaced.
        let _ = self.shared.offline.save_progress(&manga_id, progress);
    }

    fn refresh_preload(&self) {
        let targets: Vec<(usize, String)> = {
            let state = self.shared.state.lock();
            if !state.phase.is_ready() {
                return;
            }
            plan_look_ahead(
                state.current_page,
                state.total_pages(),
                state.mode,
                self.shared.config.preload.look_ahead,
            )
            .into_iter()
            .filter_map(|page| {
                state.pages.url_for_page(page).map(|url| (page as usize - 1, url.to_string()))
            })
            .collect()
        };
        for (index, url) in targets {
            self.shared.preloader.load(index, &url);
        }
    }

    fn schedule_transition_clear(&self, token: SessionToken) {
        let weak = Arc::downgrade(&self.shared);
        self.shared.timers.lock().transition.schedule(
            self.shared.config.timing.page_transition(),
            move || {
                if let Some(shared) = weak.upgrade() {
                    let mut state = shared.state.lock();
                    if state.token == token {
                        state.page_transition = false;
                    }
                }
            },
        );
    }

    fn reschedule_autoplay(&self) {
        let (token, delay) = {
            let state = self.shared.state.lock();
            if !state.autoplay || !state.phase.is_ready() {
                drop(state);
                self.shared.timers.lock().autoplay.cancel();
                return;
            }
            (state.token, state.autoplay_delay)
        };
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        self.shared.timers.lock().autoplay.schedule(delay, move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if !shared.is_current(token) {
                return;
            }
            let session = ReaderSession { shared };
            let outcome = session.next_page();
            tracing::trace!(target: "session", ?outcome, "autoplay advanced");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_request_from_address_resumes_page() {
        let address = ReaderAddress { manga_id: "m".into(), chapter_id: Some("c".into()), page: 7 };
        let request = OpenRequest::from(&address);
        assert_eq!(request, OpenRequest::new("m").chapter("c").page(7));
    }
}
