//! Keyboard shortcuts for the reader.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Host-independent reader command triggered by a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReaderAction {
    NextPage,
    PrevPage,
    NextChapter,
    PrevChapter,
    FirstPage,
    LastPage,
    ZoomIn,
    ZoomOut,
    ResetZoom,
    CycleMode,
    ToggleAutoplay,
}

/// Key names follow the DOM `KeyboardEvent.key` spelling.
pub fn default_layout() -> Vec<(&'static str, ReaderAction)> {
    vec![
        ("ArrowRight", ReaderAction::NextPage),
        ("d", ReaderAction::NextPage),
        (" ", ReaderAction::NextPage),
        ("ArrowLeft", ReaderAction::PrevPage),
        ("a", ReaderAction::PrevPage),
        ("]", ReaderAction::NextChapter),
        ("[", ReaderAction::PrevChapter),
        ("Home", ReaderAction::FirstPage),
        ("End", ReaderAction::LastPage),
        ("+", ReaderAction::ZoomIn),
        ("=", ReaderAction::ZoomIn),
        ("-", ReaderAction::ZoomOut),
        ("0", ReaderAction::ResetZoom),
        ("m", ReaderAction::CycleMode),
        ("p", ReaderAction::ToggleAutoplay),
    ]
}

#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: HashMap<String, ReaderAction>,
}

impl Default for Keymap {
    fn default() -> Self {
        Self {
            bindings: default_layout().into_iter().map(|(key, action)| (key.to_string(), action)).collect(),
        }
    }
}

impl Keymap {
    /// Look up a key; single letters match case-insensitively.
    pub fn resolve(&self, key: &str) -> Option<ReaderAction> {
        self.bindings.get(key).copied().or_else(|| {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) if ch.is_ascii_uppercase() => {
                    self.bindings.get(&ch.to_ascii_lowercase().to_string()).copied()
                }
                _ => None,
            }
        })
    }

    pub fn bind(&mut self, key: impl Into<String>, action: ReaderAction) {
        self.bindings.insert(key.into(), action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_default_bindings() {
        let keymap = Keymap::default();
        assert_eq!(keymap.resolve("ArrowRight"), Some(ReaderAction::NextPage));
        assert_eq!(keymap.resolve("D"), Some(ReaderAction::NextPage));
        assert_eq!(keymap.resolve("End"), Some(ReaderAction::LastPage));
        assert_eq!(keymap.resolve("F12"), None);
    }

    #[test]
    fn custom_binding_overrides_default() {
        let mut keymap = Keymap::default();
        keymap.bind("ArrowRight", ReaderAction::PrevPage);
        assert_eq!(keymap.resolve("ArrowRight"), Some(ReaderAction::PrevPage));
    }
}
