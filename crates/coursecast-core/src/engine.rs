//! Streaming engine seam
//!
//! The engine (hls.js in a browser, `HeadlessEngine` natively) owns
//! manifest/segment networking and decoding. The player only issues
//! commands and consumes the events it reports back.

use crate::{
    error::EngineErrorKind, PlayerConfig, QualityRendition, QualitySelection, Result, SessionId,
};
use serde::{Deserialize, Serialize};
use url::Url;

/// Settings handed to the engine at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Session the engine belongs to; every event it reports carries this id
    pub session: SessionId,
    /// Include cookies on manifest and segment requests
    pub with_credentials: bool,
    /// Level to start with; `Auto` lets the engine decide
    pub start_level: QualitySelection,
}

impl EngineConfig {
    pub fn new(config: &PlayerConfig, session: SessionId) -> Self {
        Self {
            session,
            with_credentials: config.with_credentials,
            start_level: QualitySelection::Auto,
        }
    }
}

/// Commands accepted by a streaming engine instance
pub trait StreamingEngine {
    /// Bind the engine to the session's media element
    fn attach_media(&mut self);

    /// Start loading the manifest at `url`
    fn load_source(&mut self, url: &Url);

    /// Set the desired level directly; `Auto` re-enables adaptive selection
    fn set_current_level(&mut self, selection: QualitySelection);

    /// Stop all network activity and release decoder resources
    fn destroy(&mut self);
}

/// Constructs engine instances for sessions
pub trait EngineFactory {
    /// Whether adaptive streaming works on this platform at all
    fn is_supported(&self) -> bool;

    /// Create a fresh engine instance. Events it reports must be tagged
    /// with `config.session` so a replaced engine cannot touch a newer
    /// session.
    fn create(&mut self, config: &EngineConfig) -> Result<Box<dyn StreamingEngine>>;
}

/// Lifecycle events reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// Manifest loaded and parsed; `levels` is the rendition ladder
    ManifestParsed { levels: Vec<QualityRendition> },
    /// Engine finished switching to `level`
    LevelSwitched { level: usize },
    /// Engine failure; fatal ones end the session
    Error {
        kind: EngineErrorKind,
        details: String,
        fatal: bool,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::ManifestParsed { .. } => "manifest-parsed",
            EngineEvent::LevelSwitched { .. } => "level-switched",
            EngineEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_uses_credentials() {
        let session = SessionId::new();
        let config = EngineConfig::new(&PlayerConfig::default(), session);
        assert_eq!(config.session, session);
        assert!(config.with_credentials);
        assert_eq!(config.start_level, QualitySelection::Auto);
    }

    #[test]
    fn test_event_from_json() {
        let json = r#"{"type": "levelSwitched", "level": 2}"#;
        let event: EngineEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, EngineEvent::LevelSwitched { level: 2 });
        assert_eq!(event.name(), "level-switched");

        let json = r#"{"type": "error", "kind": "network", "details": "manifestLoadError", "fatal": true}"#;
        let event: EngineEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, EngineEvent::Error { fatal: true, .. }));
    }
}
