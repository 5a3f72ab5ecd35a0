//! Local key-value persistence and the offline chapter / reading history adapter.

pub mod file;
pub mod memory;
pub mod offline;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use offline::{OfflineChapterRecord, OfflineStore, ReadingProgressRecord};

pub type Result<T> = crate::Result<T>;

/// Minimal string key-value storage, e.g. browser local storage or a directory of files.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}
