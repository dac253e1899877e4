//! Configuration for the narration engine, control API and backend client.
//!
//! Every field has a default so a partial JSON file is enough; CLI flags are
//! applied on top by the binary.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::voice::VoiceSelector;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudycastConfig {
    pub speech: SpeechConfig,
    pub server: ServerConfig,
    pub backend: BackendConfig,
}

impl StudycastConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}

/// Speech host and voice selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub kokoro_url: String,
    /// Voice used when the catalog is empty or unavailable.
    pub default_voice: String,
    /// Language prefix the voice catalog is filtered to.
    pub language: String,
    /// Name fragments of voices preferred as the initial selection.
    pub preferred_vendors: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            kokoro_url: "http://localhost:3001".into(),
            default_voice: "ef_dora".into(),
            language: "es".into(),
            preferred_vendors: vec!["Google".into(), "Microsoft".into()],
        }
    }
}

impl SpeechConfig {
    pub fn voice_selector(&self) -> VoiceSelector {
        VoiceSelector::new(self.language.clone(), self.preferred_vendors.clone())
    }
}

/// Control API listen address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 2010,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Career-coaching generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".into(),
            timeout_secs: 180,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let c = StudycastConfig::default();
        assert_eq!(c.speech.language, "es");
        assert_eq!(c.server.addr(), "127.0.0.1:2010");
        assert_eq!(c.backend.url, "http://localhost:3000");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"speech": {{"language": "en"}}, "server": {{"port": 9000}}}}"#).unwrap();

        let c = StudycastConfig::load(file.path()).unwrap();
        assert_eq!(c.speech.language, "en");
        assert_eq!(c.speech.kokoro_url, "http://localhost:3001");
        assert_eq!(c.server.port, 9000);
        assert_eq!(c.server.host, "127.0.0.1");
        assert_eq!(c.backend, BackendConfig::default());
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = StudycastConfig::load(Path::new("/nonexistent/studycast.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn bad_json_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = StudycastConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
