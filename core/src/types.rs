//! Shared data structures exchanged between the session core and its hosts.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReaderError;

/// Canonical manga identity, fixed for the lifetime of a session once committed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MangaIdentity {
    pub id: String,
    pub title: String,
}

impl MangaIdentity {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into() }
    }
}

/// A single chapter as returned by the chapter provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub chapter_number: Option<f64>,
    pub volume_number: Option<f64>,
    pub title: Option<String>,
    pub page_count: u32,
}

impl Chapter {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            chapter_number: None,
            volume_number: None,
            title: None,
            page_count: 0,
        }
    }

    /// Ordering key used by the catalog; missing numbers sort as zero.
    pub fn sort_key(&self) -> (f64, f64) {
        (self.volume_number.unwrap_or(0.0), self.chapter_number.unwrap_or(0.0))
    }

    /// Compare two chapters by `(volume, chapter)`.
    pub fn cmp_order(&self, other: &Self) -> Ordering {
        let (a_vol, a_ch) = self.sort_key();
        let (b_vol, b_ch) = other.sort_key();
        a_vol.total_cmp(&b_vol).then_with(|| a_ch.total_cmp(&b_ch))
    }

    /// Human readable label, e.g. `Vol. 2 Ch. 10.5`.
    pub fn label(&self) -> String {
        match (self.volume_number, self.chapter_number) {
            (Some(vol), Some(ch)) => format!("Vol. {} Ch. {}", format_number(vol), format_number(ch)),
            (None, Some(ch)) => format!("Ch. {}", format_number(ch)),
            (Some(vol), None) => format!("Vol. {}", format_number(vol)),
            (None, None) => "Oneshot".to_string(),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 { format!("{}", value as i64) } else { format!("{value}") }
}

/// Image URLs for one chapter, replaced wholesale whenever the chapter changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSet {
    pub chapter_id: String,
    pub page_urls: Vec<String>,
    pub base_url: String,
}

impl PageSet {
    pub fn len(&self) -> usize {
        self.page_urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.page_urls.is_empty()
    }

    /// URL for a 1-based page number.
    pub fn url_for_page(&self, page: u32) -> Option<&str> {
        let index = (page as usize).checked_sub(1)?;
        self.page_urls.get(index).map(String::as_str)
    }
}

/// Reading layout selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingMode {
    #[default]
    Single,
    Double,
    Vertical,
    Webtoon,
}

/// Page-advance behaviour attached to a [`ReadingMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeLayout {
    pub step: u32,
    pub pair_with_next: bool,
}

impl ReadingMode {
    pub const ALL: [ReadingMode; 4] =
        [ReadingMode::Single, ReadingMode::Double, ReadingMode::Vertical, ReadingMode::Webtoon];

    pub fn layout(self) -> ModeLayout {
        match self {
            ReadingMode::Single => ModeLayout { step: 1, pair_with_next: false },
            ReadingMode::Double => ModeLayout { step: 2, pair_with_next: true },
            ReadingMode::Vertical => ModeLayout { step: 1, pair_with_next: false },
            ReadingMode::Webtoon => ModeLayout { step: 1, pair_with_next: false },
        }
    }

    /// Next mode in display order, wrapping around.
    pub fn cycle(self) -> Self {
        let position = Self::ALL.iter().position(|mode| *mode == self).unwrap_or(0);
        Self::ALL[(position + 1) % Self::ALL.len()]
    }
}

/// Externally visible reader position: reloading at this address resumes the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderAddress {
    pub manga_id: String,
    pub chapter_id: Option<String>,
    pub page: u32,
}

impl fmt::Display for ReaderAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.chapter_id {
            Some(chapter) => write!(f, "{}?chapter={}&page={}", self.manga_id, chapter, self.page),
            None => write!(f, "{}?page={}", self.manga_id, self.page),
        }
    }
}

/// Parses the `Display` form. A missing page means the first page.
impl FromStr for ReaderAddress {
    type Err = ReaderError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || ReaderError::InvalidAddress(raw.to_string());
        let (manga_id, query) = raw.trim().split_once('?').unwrap_or((raw.trim(), ""));
        if manga_id.is_empty() {
            return Err(invalid());
        }

        let mut address = ReaderAddress { manga_id: manga_id.to_string(), chapter_id: None, page: 1 };
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            match pair.split_once('=') {
                Some(("chapter", id)) if !id.is_empty() => address.chapter_id = Some(id.to_string()),
                Some(("page", page)) => {
                    address.page = page.parse().ok().filter(|page| *page > 0).ok_or_else(invalid)?;
                }
                _ => return Err(invalid()),
            }
        }
        Ok(address)
    }
}

/// Generation token identifying one `open` of a session. Completions carrying an older
/// token are stale and must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SessionToken(u64);

impl SessionToken {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Lifecycle phase of a reader session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "detail", rename_all = "camelCase")]
pub enum SessionPhase {
    Initializing,
    OfflineReady,
    OnlineLoading,
    Ready,
    NotFound(String),
    Error(String),
}

impl SessionPhase {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionPhase::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::NotFound(_) | SessionPhase::Error(_))
    }
}

/// Clamp a 1-based page number into `[1, total]`; with no pages the position pins to 1.
pub fn clamp_page(page: u32, total: u32) -> u32 {
    if total == 0 { 1 } else { page.clamp(1, total) }
}
