#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use manga_reader_core::store::MemoryStore;
use manga_reader_core::{
    Chapter, ChapterProvider, ImageFetcher, KeyValueStore, MangaRecord, MetadataProvider,
    NavigationHost, PageManifest, ReaderAddress, ReaderConfig, ReaderSession, SessionDeps,
    SupplementaryMetadata,
};
use tokio::sync::Notify;
use tokio::time::Instant;

pub const MANGA_ID: &str = "a1c7c817-4e59-43b7-9365-09675a149a6f";

pub fn chapter(id: &str, vol: Option<f64>, ch: Option<f64>, pages: u32) -> Chapter {
    Chapter {
        id: id.to_string(),
        volume_number: vol,
        chapter_number: ch,
        title: None,
        page_count: pages,
    }
}

pub fn manifest(pages: usize) -> PageManifest {
    PageManifest {
        base_url: Some("https://cdn.test".to_string()),
        chapter_hash: Some("hash".to_string()),
        page_filenames: (1..=pages).map(|page| format!("{page}.png")).collect(),
    }
}

/// Holds `get_chapter_pages` for one chapter until released.
#[derive(Default)]
pub struct PageGate {
    pub started: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct FakeProvider {
    pub manga: Mutex<Option<MangaRecord>>,
    pub search_results: Mutex<Vec<MangaRecord>>,
    pub chapters: Mutex<Vec<Chapter>>,
    pub manifests: Mutex<HashMap<String, PageManifest>>,
    pub gates: Mutex<HashMap<String, Arc<PageGate>>>,
    pub fail_chapters: Mutex<bool>,
    pub fail_manga: Mutex<bool>,
    pub calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl FakeProvider {
    /// Provider with chapters `c1..cN` in volume 1, each with `pages` pages.
    pub fn with_chapters(count: usize, pages: usize) -> Arc<Self> {
        let provider = FakeProvider::default();
        *provider.manga.lock().unwrap() = Some(MangaRecord {
            id: MANGA_ID.to_string(),
            title: "Test Manga".to_string(),
            cover_url: Some("https://covers.test/cover.jpg".to_string()),
            description: None,
        });
        let mut chapters = Vec::new();
        let mut manifests = HashMap::new();
        // Provider order is newest first, the session must reorder.
        for number in (1..=count).rev() {
            let id = format!("c{number}");
            chapters.push(chapter(&id, Some(1.0), Some(number as f64), pages as u32));
            manifests.insert(id, manifest(pages));
        }
        *provider.chapters.lock().unwrap() = chapters;
        *provider.manifests.lock().unwrap() = manifests;
        Arc::new(provider)
    }

    pub fn gate(&self, chapter_id: &str) -> Arc<PageGate> {
        let gate = Arc::new(PageGate::default());
        self.gates.lock().unwrap().insert(chapter_id.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn remote_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst) + self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChapterProvider for FakeProvider {
    async fn search_manga(&self, _query: &str, _limit: u32) -> anyhow::Result<Vec<MangaRecord>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.search_results.lock().unwrap().clone())
    }

    async fn get_manga(&self, id: &str) -> anyhow::Result<MangaRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_manga.lock().unwrap() {
            return Err(anyhow!("manga endpoint unavailable"));
        }
        self.manga.lock().unwrap().clone().ok_or_else(|| anyhow!("unknown manga {id}"))
    }

    async fn get_chapters(&self, _manga_id: &str, limit: u32) -> anyhow::Result<Vec<Chapter>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_chapters.lock().unwrap() {
            return Err(anyhow!("feed unavailable"));
        }
        Ok(self.chapters.lock().unwrap().iter().take(limit as usize).cloned().collect())
    }

    async fn get_chapter_detail(&self, chapter_id: &str) -> anyhow::Result<Chapter> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let known = self.chapters.lock().unwrap().iter().find(|c| c.id == chapter_id).cloned();
        Ok(known.unwrap_or_else(|| chapter(chapter_id, None, None, 0)))
    }

    async fn get_chapter_pages(&self, chapter_id: &str) -> anyhow::Result<PageManifest> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().get(chapter_id).cloned();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        self.manifests
            .lock()
            .unwrap()
            .get(chapter_id)
            .cloned()
            .ok_or_else(|| anyhow!("no pages for {chapter_id}"))
    }
}

#[derive(Default)]
pub struct FakeMetadata {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl MetadataProvider for FakeMetadata {
    async fn search(&self, title: &str, _limit: u32) -> anyhow::Result<Vec<SupplementaryMetadata>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("metadata service down"));
        }
        Ok(vec![SupplementaryMetadata {
            title: Some(title.to_string()),
            poster_image: Some("https://posters.test/p.jpg".to_string()),
            rating: Some(8.1),
            ..SupplementaryMetadata::default()
        }])
    }
}

#[derive(Default)]
pub struct FakeImages {
    pub always_fail: bool,
    pub attempts: Mutex<Vec<(String, Instant)>>,
}

impl FakeImages {
    pub fn failing() -> Arc<Self> {
        Arc::new(Self { always_fail: true, ..Self::default() })
    }

    pub fn attempts_for(&self, url: &str) -> Vec<Instant> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(attempted, _)| attempted == url)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageFetcher for FakeImages {
    async fn fetch(&self, url: &str) -> anyhow::Result<u64> {
        self.attempts.lock().unwrap().push((url.to_string(), Instant::now()));
        if self.always_fail {
            return Err(anyhow!("connection reset"));
        }
        Ok(1024)
    }
}

#[derive(Default)]
pub struct RecordingHost {
    pub navigations: Mutex<Vec<ReaderAddress>>,
    pub replacements: Mutex<Vec<ReaderAddress>>,
}

impl RecordingHost {
    pub fn navigations(&self) -> Vec<ReaderAddress> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn last_replacement(&self) -> Option<ReaderAddress> {
        self.replacements.lock().unwrap().last().cloned()
    }
}

impl NavigationHost for RecordingHost {
    fn navigate_to(&self, address: &ReaderAddress) {
        self.navigations.lock().unwrap().push(address.clone());
    }

    fn replace_address(&self, address: &ReaderAddress) {
        self.replacements.lock().unwrap().push(address.clone());
    }
}

pub struct Harness {
    pub session: ReaderSession,
    pub provider: Arc<FakeProvider>,
    pub metadata: Arc<FakeMetadata>,
    pub images: Arc<FakeImages>,
    pub store: Arc<dyn KeyValueStore>,
    pub host: Arc<RecordingHost>,
}

impl Harness {
    pub fn new(provider: Arc<FakeProvider>) -> Self {
        Self::build(provider, Arc::new(FakeImages::default()), Arc::new(MemoryStore::new()))
    }

    pub fn build(
        provider: Arc<FakeProvider>,
        images: Arc<FakeImages>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::assemble(
            provider,
            Arc::new(FakeMetadata::default()),
            images,
            store,
            ReaderConfig::default(),
        )
    }

    pub fn with_metadata(provider: Arc<FakeProvider>, metadata: FakeMetadata) -> Self {
        Self::assemble(
            provider,
            Arc::new(metadata),
            Arc::new(FakeImages::default()),
            Arc::new(MemoryStore::new()),
            ReaderConfig::default(),
        )
    }

    pub fn with_config(provider: Arc<FakeProvider>, config: ReaderConfig) -> Self {
        Self::assemble(
            provider,
            Arc::new(FakeMetadata::default()),
            Arc::new(FakeImages::default()),
            Arc::new(MemoryStore::new()),
            config,
        )
    }

    fn assemble(
        provider: Arc<FakeProvider>,
        metadata: Arc<FakeMetadata>,
        images: Arc<FakeImages>,
        store: Arc<dyn KeyValueStore>,
        config: ReaderConfig,
    ) -> Self {
        let host = Arc::new(RecordingHost::default());
        let deps = SessionDeps {
            chapters: provider.clone(),
            metadata: metadata.clone(),
            images: images.clone(),
            store: Arc::clone(&store),
            host: host.clone(),
        };
        let session = ReaderSession::new(config, deps);
        Self { session, provider, metadata, images, store, host }
    }
}
