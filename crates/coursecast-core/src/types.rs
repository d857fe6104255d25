//! Core types for Coursecast

use crate::{manifest::ManifestRoute, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque lesson identifier supplied by the embedding page.
///
/// Always non-empty; construction from blank input fails with
/// [`Error::MissingLesson`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LessonId(String);

impl LessonId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::MissingLesson);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LessonId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<LessonId> for String {
    fn from(id: LessonId) -> Self {
        id.0
    }
}

impl std::fmt::Display for LessonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One encoded quality variant of the lesson video.
///
/// Field names match the level objects HLS engines report, so a level list
/// can be deserialized directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityRendition {
    /// Vertical resolution in pixels
    #[serde(default)]
    pub height: u32,
    /// Horizontal resolution in pixels
    #[serde(default)]
    pub width: u32,
    /// Bits per second
    #[serde(default)]
    pub bitrate: u64,
    /// Variant name, when the manifest carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl QualityRendition {
    pub fn new(width: u32, height: u32, bitrate: u64) -> Self {
        Self {
            width,
            height,
            bitrate,
            name: None,
        }
    }

    /// Bitrate in megabits per second
    pub fn bitrate_mbps(&self) -> f64 {
        self.bitrate as f64 / 1_000_000.0
    }

    /// Human-readable label, e.g. `720p • 2.5 Mbps`
    pub fn label(&self) -> String {
        format!("{}p • {:.1} Mbps", self.height, self.bitrate_mbps())
    }
}

/// Requested or displayed quality level.
///
/// On the wire this is the engine's level index, with `-1` meaning
/// automatic selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum QualitySelection {
    /// Engine picks renditions from its bandwidth estimate
    #[default]
    Auto,
    /// Pinned to one rendition index
    Level(usize),
}

impl QualitySelection {
    /// Engine sentinel for automatic mode
    pub const AUTO_INDEX: i32 = -1;

    pub fn from_index(index: i32) -> Self {
        if index < 0 {
            QualitySelection::Auto
        } else {
            QualitySelection::Level(index as usize)
        }
    }

    pub fn index(&self) -> i32 {
        match self {
            QualitySelection::Auto => Self::AUTO_INDEX,
            QualitySelection::Level(level) => *level as i32,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, QualitySelection::Auto)
    }
}

impl From<i32> for QualitySelection {
    fn from(index: i32) -> Self {
        Self::from_index(index)
    }
}

impl From<QualitySelection> for i32 {
    fn from(selection: QualitySelection) -> Self {
        selection.index()
    }
}

impl std::fmt::Display for QualitySelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualitySelection::Auto => write!(f, "auto"),
            QualitySelection::Level(level) => write!(f, "level {}", level),
        }
    }
}

/// Playback phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    /// No session, or session created but nothing requested yet
    #[default]
    Idle,
    /// Manifest requested, waiting for the engine to parse it
    Loading,
    /// Manifest parsed, playback not started
    Ready,
    /// Media element reported `play`
    Playing,
    /// Media element reported `pause`
    Paused,
    /// Fatal failure; only a retry leaves this state
    Error,
}

impl PlaybackState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (self, target),
            // From Idle
            (Idle, Loading) | (Idle, Error) |
            // From Loading
            (Loading, Ready) | (Loading, Playing) | (Loading, Paused) | (Loading, Error) |
            // From Ready
            (Ready, Playing) | (Ready, Paused) | (Ready, Error) |
            // From Playing
            (Playing, Paused) | (Playing, Error) |
            // From Paused
            (Paused, Playing) | (Paused, Error) |
            // From Error
            (Error, Idle)
        )
    }

    /// True once the manifest has been parsed and no fatal error occurred
    pub fn is_ready(&self) -> bool {
        matches!(self, PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Error => write!(f, "error"),
        }
    }
}

/// Why the loading indicator is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadingReason {
    /// Initial manifest and first segments
    Manifest,
    /// Media element is waiting for data
    Buffering,
    /// Seek in flight
    Seeking,
    /// Manual quality switch awaiting engine confirmation
    QualitySwitch,
}

/// Presentation hints supplied by the embedding page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedOptions {
    /// Poster image; disables frame capture when present
    #[serde(default)]
    pub poster: Option<String>,
    /// Start playback as soon as the manifest is parsed
    #[serde(default)]
    pub autoplay: bool,
}

/// Default API base used when nothing is configured
pub const DEFAULT_API_BASE: &str = "http://localhost:5000";

/// Default grace period before controls hide during playback
pub const DEFAULT_CONTROLS_HIDE_MS: u64 = 3000;

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Base URL of the platform API
    pub api_base: Url,
    /// Manifest endpoint layout
    pub manifest_route: ManifestRoute,
    /// Send cookies with manifest and segment requests
    pub with_credentials: bool,
    /// Grace period before controls hide (milliseconds)
    pub controls_hide_delay_ms: u64,
    /// Capture a poster frame on first `canplay` when none was supplied
    pub capture_poster: bool,
    /// Number of non-fatal notices retained
    pub notice_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL"),
            manifest_route: ManifestRoute::HlsStream,
            with_credentials: true,
            controls_hide_delay_ms: DEFAULT_CONTROLS_HIDE_MS,
            capture_poster: true,
            notice_capacity: 16,
        }
    }
}

impl PlayerConfig {
    /// Environment variable holding the API base URL
    pub const ENV_API_URL: &'static str = "COURSECAST_API_URL";
    /// Environment variable selecting the manifest route
    pub const ENV_MANIFEST_ROUTE: &'static str = "COURSECAST_MANIFEST_ROUTE";
    /// Environment variable overriding the controls grace period
    pub const ENV_CONTROLS_HIDE_MS: &'static str = "COURSECAST_CONTROLS_HIDE_MS";

    /// Create a config for the given API base
    pub fn new(api_base: &str) -> Result<Self> {
        Self::default().with_api_base(api_base)
    }

    /// Build config from `COURSECAST_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (environment, JS object, ...)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base = lookup(Self::ENV_API_URL).ok_or_else(|| {
            Error::InvalidConfig(format!("{} is not set", Self::ENV_API_URL))
        })?;
        let mut config = Self::new(&api_base)?;

        if let Some(route) = lookup(Self::ENV_MANIFEST_ROUTE) {
            config.manifest_route = route.parse()?;
        }

        if let Some(delay) = lookup(Self::ENV_CONTROLS_HIDE_MS) {
            config.controls_hide_delay_ms = delay.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!(
                    "{} must be a number of milliseconds, got '{}'",
                    Self::ENV_CONTROLS_HIDE_MS,
                    delay
                ))
            })?;
        }

        Ok(config)
    }

    /// Set the API base URL
    pub fn with_api_base(mut self, api_base: &str) -> Result<Self> {
        let url = Url::parse(api_base.trim())?;
        if url.cannot_be_a_base() {
            return Err(Error::InvalidConfig(format!(
                "API base '{}' cannot carry a path",
                api_base
            )));
        }
        self.api_base = url;
        Ok(self)
    }

    /// Set the manifest route
    pub fn with_manifest_route(mut self, route: ManifestRoute) -> Self {
        self.manifest_route = route;
        self
    }

    /// Set the controls grace period
    pub fn with_controls_hide_delay(mut self, delay: Duration) -> Self {
        self.controls_hide_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Enable or disable poster frame capture
    pub fn with_poster_capture(mut self, enabled: bool) -> Self {
        self.capture_poster = enabled;
        self
    }

    /// Grace period before controls hide
    pub fn controls_hide_delay(&self) -> Duration {
        Duration::from_millis(self.controls_hide_delay_ms)
    }
}
