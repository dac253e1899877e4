//! Voice catalog and selection.

use serde::{Deserialize, Serialize};

/// A synthesis voice reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    pub name: String,
    /// BCP-47 style tag, e.g. `es-ES`.
    pub language: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
        }
    }
}

/// Filtered voice catalog plus the currently selected entry.
#[derive(Debug, Clone)]
pub struct VoiceSelector {
    language: String,
    preferred: Vec<String>,
    catalog: Vec<Voice>,
    selected: usize,
}

impl VoiceSelector {
    /// `language` is a prefix matched against each voice's tag (`"es"` keeps
    /// `es-ES`, `es-MX`, ...). `preferred` lists name fragments that mark a
    /// voice worth selecting by default.
    pub fn new(language: impl Into<String>, preferred: Vec<String>) -> Self {
        Self {
            language: language.into(),
            preferred,
            catalog: Vec::new(),
            selected: 0,
        }
    }

    /// Replace the catalog with the host's current voice list.
    ///
    /// The preferred-vendor default is applied only when the catalog goes from
    /// empty to non-empty, so a late refresh never overrides a user's choice.
    pub fn refresh(&mut self, voices: Vec<Voice>) {
        let was_empty = self.catalog.is_empty();
        let language = self.language.to_ascii_lowercase();
        self.catalog = voices
            .into_iter()
            .filter(|v| v.language.to_ascii_lowercase().starts_with(&language))
            .collect();

        if was_empty && !self.catalog.is_empty() {
            self.selected = self.preferred_index().unwrap_or(0);
        } else if self.selected >= self.catalog.len() {
            self.selected = 0;
        }
    }

    /// Advance to the next voice, wrapping around. No-op below two voices.
    pub fn cycle(&mut self) -> bool {
        if self.catalog.len() < 2 {
            return false;
        }
        self.selected = (self.selected + 1) % self.catalog.len();
        true
    }

    pub fn current(&self) -> Option<&Voice> {
        self.catalog.get(self.selected)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn catalog(&self) -> &[Voice] {
        &self.catalog
    }

    fn preferred_index(&self) -> Option<usize> {
        self.catalog.iter().position(|v| {
            self.preferred
                .iter()
                .any(|marker| v.name.contains(marker.as_str()))
        })
    }
}
