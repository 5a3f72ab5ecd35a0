//! Error taxonomy surfaced by the reader session.

use thiserror::Error;

/// Errors produced while opening or operating a reader session.
///
/// Only the resolver, catalog and chapter-detail failures raised during `open` are
/// terminal; everything else degrades the session but keeps it usable.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("manga not found: {0}")]
    IdentifierNotFound(String),

    #[error("chapter not found: {0}")]
    ChapterNotFound(String),

    #[error("page manifest incomplete for chapter {0}")]
    PageDataMissing(String),

    #[error("image for page {index} failed after {attempts} attempts")]
    ImageLoadFailure { index: usize, attempts: u32 },

    #[error("supplementary metadata unavailable: {0}")]
    SupplementaryMetadataUnavailable(String),

    #[error("persistence failure: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("provider request failed: {0}")]
    Provider(#[source] anyhow::Error),

    #[error("session is not ready")]
    NotReady,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid reader address `{0}`")]
    InvalidAddress(String),
}

impl ReaderError {
    /// Whether this error ends the session pending an explicit retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReaderError::IdentifierNotFound(_)
                | ReaderError::ChapterNotFound(_)
                | ReaderError::Provider(_)
        )
    }

    /// Whether the failure means the requested manga or chapter does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReaderError::IdentifierNotFound(_) | ReaderError::ChapterNotFound(_))
    }
}
