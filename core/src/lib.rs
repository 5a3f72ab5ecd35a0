//! Reader session core for the manga reader.
//!
//! The crate is UI-agnostic: hosts inject the chapter provider, metadata provider, image
//! fetcher, key-value store and navigation hooks, then drive a [`ReaderSession`].

#![deny(missing_debug_implementations)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod keymap;
pub mod log;
pub mod preload;
pub mod provider;
pub mod resolve;
pub mod session;
pub mod stats;
pub mod store;
pub mod types;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

pub use config::ReaderConfig;
pub use error::ReaderError;
pub use keymap::{Keymap, ReaderAction};
pub use preload::{ImagePreloader, LoadState, RetryPolicy};
pub use provider::{
    ChapterProvider, ImageFetcher, MangaRecord, MetadataProvider, PageManifest,
    SupplementaryMetadata,
};
pub use session::{
    NavOutcome, NavigationHost, OpenOutcome, OpenRequest, ReaderSession, SessionDeps,
    SessionSnapshot,
};
pub use store::{KeyValueStore, OfflineChapterRecord, OfflineStore, ReadingProgressRecord};
pub use types::{
    Chapter, MangaIdentity, ModeLayout, PageSet, ReaderAddress, ReadingMode, SessionPhase,
    SessionToken,
};

/// Returns the version of the core crate for telemetry and debugging.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
