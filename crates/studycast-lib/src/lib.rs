//! studycast-lib: Narration engine.
//!
//! Kokoro speech capability, async narration player, HTTP control API and
//! the coaching backend client. Depends on studycast-core for pure types and
//! the narration state machine.

pub mod coach;
pub mod kokoro;
pub mod player;
pub mod server;
pub mod utterance_source;

// Re-export studycast-core for convenience
pub use studycast_core;
