//! Coursecast Core - Lesson Playback Library for Coursecast
//!
//! This crate provides the playback core behind the lesson player:
//! - Manifest URL construction and master playlist parsing
//! - Playback session lifecycle around a streaming engine
//! - Playback state machine driven by native media events
//! - Manual/automatic quality selection with switch confirmation
//! - Controls auto-hide timing and fullscreen state
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Coursecast Core                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Playback   │  │   Quality    │  │   Controls   │           │
//! │  │   Machine    │  │  Controller  │  │    Timer     │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │   Lesson    │                              │
//! │                    │   Player    │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │    Media     │  │  Playback   │  │  Fullscreen  │            │
//! │  │   Element    │  │   Session   │  │   Surface    │            │
//! │  └──────────────┘  └──────┬──────┘  └──────────────┘            │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Streaming  │                              │
//! │                    │   Engine    │                              │
//! │                    └─────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod manifest;
pub mod engine;
pub mod media;
pub mod playback;
pub mod quality;
pub mod controls;
pub mod fullscreen;
pub mod session;
pub mod player;
#[cfg(feature = "runtime")]
pub mod driver;
#[cfg(feature = "http")]
pub mod headless;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{EngineErrorKind, Error, Result};
pub use types::*;
pub use manifest::{manifest_url, parse_master_playlist, ManifestRoute};
#[cfg(feature = "http")]
pub use manifest::{ManifestFetcher, ManifestSource};
pub use engine::{EngineConfig, EngineEvent, EngineFactory, StreamingEngine};
pub use media::{MediaElement, MediaEvent};
pub use playback::{AudioState, Failure, PlaybackClock, PlaybackMachine};
pub use quality::{QualityController, QualityOption, SwitchRequest};
pub use controls::{Clock, ControlsTimer, VisibilityInputs};
#[cfg(not(target_arch = "wasm32"))]
pub use controls::SystemClock;
pub use fullscreen::{FullscreenState, FullscreenSurface};
pub use session::PlaybackSession;
pub use player::{LessonPlayer, Notice, PlayerView};
#[cfg(feature = "runtime")]
pub use driver::{PlayerDriver, PlayerHandle, PlayerMessage, WeakPlayerHandle};
#[cfg(feature = "http")]
pub use headless::{HeadlessEngine, HeadlessEngineFactory};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Coursecast Core initialized");
}
