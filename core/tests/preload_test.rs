mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeImages, FakeProvider, Harness, MANGA_ID};
use manga_reader_core::store::MemoryStore;
use manga_reader_core::{
    ImagePreloader, LoadState, OpenRequest, ReaderConfig, ReadingMode, RetryPolicy,
};

#[tokio::test(start_paused = true)]
async fn failing_image_settles_on_placeholder_after_three_attempts() {
    let images = FakeImages::failing();
    let preloader = ImagePreloader::new(images.clone(), RetryPolicy::default());

    assert!(preloader.load(0, "https://cdn.test/broken.png"));
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(preloader.state(0), LoadState::Loading);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(preloader.state(0), LoadState::Failed("/placeholder.png".to_string()));

    let attempts = images.attempts_for("https://cdn.test/broken.png");
    assert_eq!(attempts.len(), 3);
    for pair in attempts.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_secs(1));
    }
    let stats = preloader.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retries, 2);
}

#[tokio::test(start_paused = true)]
async fn repeated_load_runs_a_single_attempt_sequence() {
    let images = Arc::new(FakeImages::default());
    let preloader = ImagePreloader::new(images.clone(), RetryPolicy::default());

    assert!(preloader.load(3, "https://cdn.test/4.png"));
    assert!(!preloader.load(3, "https://cdn.test/4.png"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!preloader.load(3, "https://cdn.test/4.png"));

    assert_eq!(images.total_attempts(), 1);
    assert_eq!(preloader.state(3), LoadState::Loaded("https://cdn.test/4.png".to_string()));
}

#[tokio::test(start_paused = true)]
async fn session_preloads_look_ahead_window() {
    let harness = Harness::new(FakeProvider::with_chapters(1, 8));
    harness.session.open(OpenRequest::new(MANGA_ID).chapter("c1").page(2)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let snapshot = harness.session.snapshot();
    let loaded: Vec<usize> = snapshot.load_states.keys().copied().collect();
    // Current page plus three ahead, as 0-based indices.
    assert_eq!(loaded, vec![1, 2, 3, 4]);
    assert!(snapshot.load_state(2).is_terminal());
    assert_eq!(snapshot.load_state(1), LoadState::NotStarted);

    harness.session.next_page();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(harness.images.total_attempts(), 5);
}

#[tokio::test(start_paused = true)]
async fn switching_to_double_mode_loads_partner_page() {
    let mut config = ReaderConfig::default();
    config.preload.look_ahead = 0;
    let harness = Harness::with_config(FakeProvider::with_chapters(1, 4), config);
    harness.session.open(OpenRequest::new(MANGA_ID).chapter("c1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(harness.images.total_attempts(), 1);

    harness.session.set_reading_mode(ReadingMode::Double);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(harness.images.total_attempts(), 2);
    assert_eq!(harness.images.attempts_for("https://cdn.test/data/hash/2.png").len(), 1);
    assert!(harness.session.snapshot().load_state(2).is_terminal());
}

#[tokio::test(start_paused = true)]
async fn failed_pages_keep_the_session_usable() {
    let harness = Harness::build(
        FakeProvider::with_chapters(1, 3),
        FakeImages::failing(),
        Arc::new(MemoryStore::new()),
    );
    harness.session.open(OpenRequest::new(MANGA_ID)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let snapshot = harness.session.snapshot();
    assert_eq!(snapshot.load_state(1).display_url(), Some("/placeholder.png"));
    assert!(snapshot.phase.is_ready());
    assert_eq!(harness.session.next_page(), manga_reader_core::NavOutcome::Page(2));
}

#[tokio::test(start_paused = true)]
async fn reopening_discards_in_flight_loads() {
    let harness = Harness::build(
        FakeProvider::with_chapters(2, 3),
        FakeImages::failing(),
        Arc::new(MemoryStore::new()),
    );
    harness.session.open(OpenRequest::new(MANGA_ID).chapter("c1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    harness.session.open(OpenRequest::new(MANGA_ID).chapter("c2")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let stats = harness.session.preload_stats();
    // Only the second chapter's three pages ever settle.
    assert_eq!(stats.failed, 3);
    assert_eq!(harness.images.attempts_for("https://cdn.test/data/hash/1.png").len(), 1 + 3);
}
