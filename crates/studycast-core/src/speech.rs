//! Speech capability seam.
//!
//! The narration controller drives any host that can speak one utterance at
//! a time. Hosts report back through [`SpeechEvents`] from whatever thread
//! they run on; the owner of the controller is responsible for feeding those
//! events back in order.

use serde::Serialize;

use crate::voice::Voice;

/// Identifies one speak request. A completion carrying an older ticket than
/// the controller's active one is stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UtteranceTicket(pub u64);

/// Pitch and rate applied to one utterance. `1.0` is the host default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceProfile {
    pub pitch: f32,
    pub rate: f32,
}

impl VoiceProfile {
    pub const NEUTRAL: Self = Self {
        pitch: 1.0,
        rate: 1.0,
    };
    pub const FIRST_HOST: Self = Self {
        pitch: 0.9,
        rate: 1.0,
    };
    pub const SECOND_HOST: Self = Self {
        pitch: 1.1,
        rate: 1.1,
    };
}

/// Speaker marker for the first podcast host.
pub const FIRST_HOST_MARKER: &str = "Host A:";
/// Speaker marker for the second podcast host.
pub const SECOND_HOST_MARKER: &str = "Host B:";

/// Map utterance text to the profile of whoever is speaking it.
pub fn profile_for(text: &str) -> VoiceProfile {
    if text.contains(FIRST_HOST_MARKER) {
        VoiceProfile::FIRST_HOST
    } else if text.contains(SECOND_HOST_MARKER) {
        VoiceProfile::SECOND_HOST
    } else {
        VoiceProfile::NEUTRAL
    }
}

/// One unit of work for the capability.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    pub ticket: UtteranceTicket,
    pub text: String,
    /// `None` means the host's default voice.
    pub voice: Option<Voice>,
    pub profile: VoiceProfile,
}

/// A host able to synthesize speech, one utterance at a time.
///
/// `speak` must not block. When an utterance finishes naturally the host
/// calls [`SpeechEvents::utterance_ended`] exactly once with the request's
/// ticket; when it cannot be synthesized at all the host calls
/// [`SpeechEvents::utterance_failed`] instead. After `cancel` a completion may
/// or may not arrive.
pub trait SpeechSynth {
    /// Whether the host can produce audio at all.
    fn is_available(&self) -> bool {
        true
    }

    fn speak(&mut self, request: UtteranceRequest);

    /// Stop whatever is being spoken, best-effort.
    fn cancel(&mut self);

    /// Voices known right now. Hosts that discover voices later report them
    /// through [`SpeechEvents::voices_changed`].
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }
}

impl<S: SpeechSynth + ?Sized> SpeechSynth for Box<S> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn speak(&mut self, request: UtteranceRequest) {
        (**self).speak(request)
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }

    fn voices(&self) -> Vec<Voice> {
        (**self).voices()
    }
}

/// Callbacks from a speech host back to the controller's owner.
pub trait SpeechEvents: Send + Sync {
    fn utterance_ended(&self, ticket: UtteranceTicket);
    /// The request produced no audio. Narration stops where it is.
    fn utterance_failed(&self, ticket: UtteranceTicket);
    fn voices_changed(&self, voices: Vec<Voice>);
}

/// A host with no speech output. Every play is a silent no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSpeech;

impl SpeechSynth for NoSpeech {
    fn is_available(&self) -> bool {
        false
    }

    fn speak(&mut self, _request: UtteranceRequest) {}

    fn cancel(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_markers_pick_profiles() {
        assert_eq!(profile_for("Host A: Hola a todos."), VoiceProfile::FIRST_HOST);
        assert_eq!(profile_for("Host B: Gracias."), VoiceProfile::SECOND_HOST);
        assert_eq!(profile_for("Plain narration."), VoiceProfile::NEUTRAL);
    }

    #[test]
    fn first_marker_wins_when_both_present() {
        assert_eq!(
            profile_for("Host B: and Host A: both"),
            VoiceProfile::FIRST_HOST
        );
    }

    #[test]
    fn markers_are_case_sensitive() {
        assert_eq!(profile_for("host a: lower"), VoiceProfile::NEUTRAL);
    }
}
