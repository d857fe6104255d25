//! Error types for Coursecast Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Category of an engine-reported error, mirroring what HLS engines expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineErrorKind {
    /// Manifest or segment request failed
    Network,
    /// Decoding or buffer append failed
    Media,
    /// Key system / DRM failure
    KeySystem,
    /// Anything else the engine reports
    Other,
}

impl std::fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineErrorKind::Network => write!(f, "network"),
            EngineErrorKind::Media => write!(f, "media"),
            EngineErrorKind::KeySystem => write!(f, "key-system"),
            EngineErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Session errors
    #[error("No lesson selected")]
    MissingLesson,

    #[error("Adaptive streaming is not supported on this platform")]
    UnsupportedPlatform,

    #[error("Streaming engine error ({kind}): {details}")]
    Engine {
        kind: EngineErrorKind,
        details: String,
        fatal: bool,
    },

    // Manifest errors
    #[error("Failed to fetch manifest: {0}")]
    ManifestFetch(String),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    // Local, non-fatal failures
    #[error("Playback was rejected: {0}")]
    PlaybackRejected(String),

    #[error("Fullscreen request failed: {0}")]
    Fullscreen(String),

    #[error("Poster frame capture failed: {0}")]
    FrameCapture(String),

    // Control errors
    #[error("Quality level {index} out of range ({available} available)")]
    InvalidQualityLevel { index: usize, available: usize },

    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // Runtime errors
    #[error("Player driver has shut down")]
    DriverClosed,

    // Network errors
    #[cfg(feature = "http")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl Error {
    /// Create an engine error
    pub fn engine(kind: EngineErrorKind, details: impl Into<String>, fatal: bool) -> Self {
        Error::Engine {
            kind,
            details: details.into(),
            fatal,
        }
    }

    /// Returns true if this error moves the whole session into the error state
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::MissingLesson | Error::UnsupportedPlatform => true,
            Error::Engine { fatal, .. } => *fatal,
            Error::ManifestFetch(_) | Error::ManifestParse(_) => true,
            #[cfg(feature = "http")]
            Error::Network(_) => true,
            _ => false,
        }
    }

    /// Returns true if a retry control makes sense for this error
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::MissingLesson | Error::UnsupportedPlatform)
    }

    /// Returns the error code used in logs and the error view
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::MissingLesson => "MISSING_LESSON",
            Error::UnsupportedPlatform => "UNSUPPORTED_PLATFORM",
            Error::Engine { kind: EngineErrorKind::Network, .. } => "ENGINE_NETWORK",
            Error::Engine { kind: EngineErrorKind::Media, .. } => "ENGINE_MEDIA",
            Error::Engine { kind: EngineErrorKind::KeySystem, .. } => "ENGINE_KEY_SYSTEM",
            Error::Engine { kind: EngineErrorKind::Other, .. } => "ENGINE_OTHER",
            Error::ManifestFetch(_) => "MANIFEST_FETCH",
            Error::ManifestParse(_) => "MANIFEST_PARSE",
            Error::PlaybackRejected(_) => "PLAYBACK_REJECTED",
            Error::Fullscreen(_) => "FULLSCREEN",
            Error::FrameCapture(_) => "FRAME_CAPTURE",
            Error::InvalidQualityLevel { .. } => "INVALID_LEVEL",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::DriverClosed => "DRIVER_CLOSED",
            #[cfg(feature = "http")]
            Error::Network(_) => "NETWORK",
        }
    }
}
