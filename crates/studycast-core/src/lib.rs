//! studycast-core: Pure types, narration logic and backend schemas.
//!
//! No async runtime, no I/O beyond reading a config file, no platform
//! dependencies.

pub mod artifacts;
pub mod config;
pub mod narrator;
pub mod quiz;
pub mod speech;
pub mod text_prep;
pub mod types;
pub mod voice;
