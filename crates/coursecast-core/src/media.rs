//! Media element seam

use crate::Result;
use serde::{Deserialize, Serialize};

/// Commands accepted by the media element (an `HTMLVideoElement` in a
/// browser).
///
/// None of these update player state directly: the element reports the
/// outcome through [`MediaEvent`]s.
pub trait MediaElement {
    /// Request playback. An `Err` is a rejected request (autoplay policy,
    /// no source yet) and is never fatal.
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn set_current_time(&mut self, seconds: f64);

    fn set_volume(&mut self, volume: f64);

    fn set_muted(&mut self, muted: bool);

    /// Grab the current frame as an image URL for use as a poster
    fn capture_frame(&mut self) -> Result<String>;
}

/// Native media element notifications
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MediaEvent {
    LoadStart,
    CanPlay,
    Play,
    /// Playback actually resumed after buffering
    Playing,
    Pause,
    Ended,
    Waiting,
    Seeking,
    Seeked,
    #[serde(rename_all = "camelCase")]
    TimeUpdate { current_time: f64 },
    DurationChange { duration: f64 },
    VolumeChange { volume: f64, muted: bool },
}

impl MediaEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MediaEvent::LoadStart => "loadstart",
            MediaEvent::CanPlay => "canplay",
            MediaEvent::Play => "play",
            MediaEvent::Playing => "playing",
            MediaEvent::Pause => "pause",
            MediaEvent::Ended => "ended",
            MediaEvent::Waiting => "waiting",
            MediaEvent::Seeking => "seeking",
            MediaEvent::Seeked => "seeked",
            MediaEvent::TimeUpdate { .. } => "timeupdate",
            MediaEvent::DurationChange { .. } => "durationchange",
            MediaEvent::VolumeChange { .. } => "volumechange",
        }
    }
}
