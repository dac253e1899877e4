//! Shared observable types.
//!
//! Kept in studycast-core so presentational callers can depend on the status
//! shape without pulling in tokio, rodio or axum.

use serde::{Deserialize, Serialize};

use crate::voice::Voice;

// ─── Narration types ───────────────────────────────────────────────────────

/// Where the narration controller is in its script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Speaking,
    Completed,
}

/// Narration status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationStatus {
    pub state: PlaybackState,
    pub is_playing: bool,
    pub progress_percent: f32,
    pub position: usize,
    pub total_utterances: usize,
    pub current_voice_name: Option<String>,
}

impl Default for NarrationStatus {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            is_playing: false,
            progress_percent: 0.0,
            position: 0,
            total_utterances: 0,
            current_voice_name: None,
        }
    }
}

/// Voice catalog payload for the control API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCatalog {
    pub voices: Vec<Voice>,
    pub selected: Option<usize>,
}
