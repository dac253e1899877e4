//! Sequential narration controller.
//!
//! Walks a script's utterances through a [`SpeechSynth`], one at a time:
//!
//! ```text
//!          play()                    on_utterance_end() at last utterance
//!   Idle ──────────▶ Speaking ───────────────────────────────────▶ Completed
//!    ▲                 │  │ on_utterance_end(): position += 1, speak next
//!    └──── pause() ────┘  └──────────────┘
//!     on_utterance_failed()
//! ```
//!
//! Every speak is tagged with a fresh [`UtteranceTicket`]. Pausing, seeking,
//! switching voice or loading a new script retire the active ticket, so a
//! completion that was already on its way is recognized as stale and dropped.
//! Cancellation on real hosts is best-effort; the ticket check is what keeps
//! an old completion from restarting playback.

use crate::speech::{SpeechSynth, UtteranceRequest, UtteranceTicket, profile_for};
use crate::text_prep::split_utterances;
use crate::types::{NarrationStatus, PlaybackState, VoiceCatalog};
use crate::voice::{Voice, VoiceSelector};

pub struct NarrationController<S: SpeechSynth> {
    synth: S,
    voices: VoiceSelector,
    utterances: Vec<String>,
    position: usize,
    progress: f32,
    playing: bool,
    next_ticket: u64,
    active: Option<UtteranceTicket>,
}

impl<S: SpeechSynth> NarrationController<S> {
    /// Mount a controller on `script`, taking ownership of the speech host.
    /// Voices the host already knows are loaded into the selector.
    pub fn new(script: &str, synth: S, mut voices: VoiceSelector) -> Self {
        voices.refresh(synth.voices());
        Self {
            synth,
            voices,
            utterances: split_utterances(script),
            position: 0,
            progress: 0.0,
            playing: false,
            next_ticket: 0,
            active: None,
        }
    }

    /// Replace the script. Any in-flight speech is cancelled and playback
    /// rewinds to the start; the voice selection is kept.
    pub fn load_script(&mut self, script: &str) {
        if self.playing {
            self.synth.cancel();
        }
        self.utterances = split_utterances(script);
        self.position = 0;
        self.progress = 0.0;
        self.playing = false;
        self.active = None;
    }

    /// Start speaking at the current position.
    ///
    /// No-op while already playing, at the end of the script, or when the host
    /// has no speech output.
    pub fn play(&mut self) {
        if self.playing || self.is_at_end() {
            return;
        }
        if !self.synth.is_available() {
            return;
        }
        self.playing = true;
        self.speak_current();
    }

    /// Stop speaking, keeping the position. Resuming re-speaks the current
    /// utterance from its start.
    pub fn pause(&mut self) {
        if !self.playing {
            return;
        }
        self.synth.cancel();
        self.playing = false;
        self.active = None;
    }

    /// Play when idle, pause when speaking.
    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Jump to `percent` (clamped to 0..=100) of the script.
    ///
    /// Progress reports the requested percentage, not the one implied by the
    /// rounded position, so a dragged slider does not snap back.
    pub fn seek(&mut self, percent: f32) {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        let len = self.utterances.len();
        self.position = ((percent / 100.0 * len as f32).floor() as usize).min(len);
        self.progress = percent;

        if self.playing {
            if self.is_at_end() {
                self.synth.cancel();
                self.finish();
            } else {
                self.speak_current();
            }
        }
    }

    /// Select the next voice. While playing, the current utterance restarts
    /// with it.
    pub fn cycle_voice(&mut self) {
        if self.voices.cycle() && self.playing {
            self.speak_current();
        }
    }

    /// Feed the host's latest voice list. Never starts or stops playback.
    pub fn refresh_voices(&mut self, voices: Vec<Voice>) {
        self.voices.refresh(voices);
    }

    /// Completion from the host. Ignored unless it belongs to the request
    /// that is currently active.
    pub fn on_utterance_end(&mut self, ticket: UtteranceTicket) {
        if !self.playing || self.active != Some(ticket) {
            return;
        }
        self.active = None;
        self.position += 1;
        self.progress = self.position as f32 / self.utterances.len() as f32 * 100.0;

        if self.is_at_end() {
            self.finish();
        } else {
            self.speak_current();
        }
    }

    /// The host could not speak the active request. Playback pauses on the
    /// failed utterance so a later `play` retries it.
    pub fn on_utterance_failed(&mut self, ticket: UtteranceTicket) {
        if !self.playing || self.active != Some(ticket) {
            return;
        }
        self.playing = false;
        self.active = None;
    }

    pub fn state(&self) -> PlaybackState {
        if self.playing {
            PlaybackState::Speaking
        } else if self.is_at_end() {
            PlaybackState::Completed
        } else {
            PlaybackState::Idle
        }
    }

    pub fn status(&self) -> NarrationStatus {
        NarrationStatus {
            state: self.state(),
            is_playing: self.playing,
            progress_percent: self.progress,
            position: self.position,
            total_utterances: self.utterances.len(),
            current_voice_name: self.voices.current().map(|v| v.name.clone()),
        }
    }

    pub fn voice_catalog(&self) -> VoiceCatalog {
        VoiceCatalog {
            voices: self.voices.catalog().to_vec(),
            selected: self.voices.current().map(|_| self.voices.selected_index()),
        }
    }

    pub fn utterances(&self) -> &[String] {
        &self.utterances
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn synth(&self) -> &S {
        &self.synth
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.utterances.len()
    }

    fn finish(&mut self) {
        self.playing = false;
        self.active = None;
        self.progress = 100.0;
    }

    /// Cancel whatever is pending and speak the utterance at `position`.
    fn speak_current(&mut self) {
        self.synth.cancel();

        let ticket = UtteranceTicket(self.next_ticket);
        self.next_ticket += 1;
        self.active = Some(ticket);

        let text = self.utterances[self.position].clone();
        let profile = profile_for(&text);
        self.synth.speak(UtteranceRequest {
            ticket,
            text,
            voice: self.voices.current().cloned(),
            profile,
        });
    }
}

impl<S: SpeechSynth> Drop for NarrationController<S> {
    fn drop(&mut self) {
        if self.playing {
            self.synth.cancel();
        }
    }
}
