//! Per-page load state table.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::types::SessionToken;

/// Load status of one page. Transitions only move forward:
/// `NotStarted -> Loading -> Loaded | Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "url", rename_all = "camelCase")]
pub enum LoadState {
    #[default]
    NotStarted,
    Loading,
    Loaded(String),
    /// Carries the placeholder URL that replaces the broken image.
    Failed(String),
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Loaded(_) | LoadState::Failed(_))
    }

    /// URL a renderer should display, if one is settled. `Failed` is always renderable.
    pub fn display_url(&self) -> Option<&str> {
        match self {
            LoadState::Loaded(url) | LoadState::Failed(url) => Some(url),
            LoadState::NotStarted | LoadState::Loading => None,
        }
    }
}

/// Load states for the active chapter, tagged with the session token that owns them.
#[derive(Debug, Default)]
pub(crate) struct LoadTable {
    token: SessionToken,
    entries: HashMap<usize, LoadState>,
    tasks: HashMap<usize, JoinHandle<()>>,
}

impl LoadTable {
    pub(crate) fn token(&self) -> SessionToken {
        self.token
    }

    pub(crate) fn get(&self, index: usize) -> LoadState {
        self.entries.get(&index).cloned().unwrap_or_default()
    }

    pub(crate) fn snapshot(&self) -> BTreeMap<usize, LoadState> {
        self.entries.iter().map(|(index, state)| (*index, state.clone())).collect()
    }

    /// Move `index` to `Loading`. Returns false when a load already started.
    pub(crate) fn begin(&mut self, index: usize) -> bool {
        let entry = self.entries.entry(index).or_default();
        if *entry != LoadState::NotStarted {
            return false;
        }
        *entry = LoadState::Loading;
        true
    }

    pub(crate) fn track(&mut self, index: usize, handle: JoinHandle<()>) {
        if let Some(previous) = self.tasks.insert(index, handle) {
            previous.abort();
        }
    }

    /// Settle a `Loading` entry. Completions from another token or for entries that are not
    /// loading are ignored.
    pub(crate) fn settle(&mut self, token: SessionToken, index: usize, next: LoadState) -> bool {
        if token != self.token || !next.is_terminal() {
            return false;
        }
        match self.entries.get_mut(&index) {
            Some(state) if *state == LoadState::Loading => {
                *state = next;
                self.tasks.remove(&index);
                true
            }
            _ => false,
        }
    }

    /// Drop every entry and abort outstanding tasks. Returns how many loads were abandoned.
    pub(crate) fn reset(&mut self, token: SessionToken) -> usize {
        let abandoned =
            self.entries.values().filter(|state| **state == LoadState::Loading).count();
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
        self.entries.clear();
        self.token = token;
        abandoned
    }
}
