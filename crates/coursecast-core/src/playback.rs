//! Playback state machine
//!
//! Tracks the playback phase, clock, audio and loading indicator. Media
//! element events are the only input for play/pause, time and audio; engine
//! events drive the manifest and error transitions.

use crate::{
    media::MediaEvent,
    Error, LoadingReason, PlaybackState, Result,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Current position and duration, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    current_time: f64,
    duration: f64,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: f64::NAN,
        }
    }
}

impl PlaybackClock {
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Duration, NaN until metadata is loaded
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Finite, positive duration
    pub fn known_duration(&self) -> Option<f64> {
        (self.duration.is_finite() && self.duration > 0.0).then_some(self.duration)
    }

    pub fn set_current_time(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.current_time = match self.known_duration() {
            Some(duration) => seconds.min(duration),
            None => seconds,
        };
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration;
        if let Some(duration) = self.known_duration() {
            self.current_time = self.current_time.min(duration);
        }
    }

    /// Position as a percentage of duration; 0 while the duration is
    /// unknown, zero or infinite
    pub fn progress_percentage(&self) -> f64 {
        match self.known_duration() {
            Some(duration) => (self.current_time / duration * 100.0).clamp(0.0, 100.0),
            None => 0.0,
        }
    }

    /// Seek target for a slider position in `[0, 100]`
    pub fn position_for_percent(&self, percent: f64) -> Option<f64> {
        if !percent.is_finite() {
            return None;
        }
        self.known_duration()
            .map(|duration| percent.clamp(0.0, 100.0) / 100.0 * duration)
    }
}

/// Volume and mute as last reported by the media element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioState {
    pub volume: f64,
    pub muted: bool,
}

impl Default for AudioState {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
        }
    }
}

impl AudioState {
    pub fn new(volume: f64, muted: bool) -> Self {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        Self { volume, muted }
    }

    /// Output is silent, either by explicit mute or zero volume
    pub fn shows_muted_icon(&self) -> bool {
        self.muted || self.volume == 0.0
    }
}

/// What the error surface shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&Error> for Failure {
    fn from(error: &Error) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// The playback phase plus everything that hangs off it
#[derive(Debug, Clone, Default)]
pub struct PlaybackMachine {
    state: PlaybackState,
    clock: PlaybackClock,
    audio: AudioState,
    loading: Option<LoadingReason>,
    failure: Option<Failure>,
}

impl PlaybackMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn audio(&self) -> &AudioState {
        &self.audio
    }

    pub fn loading(&self) -> Option<LoadingReason> {
        self.loading
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// Move to `target`, rejecting transitions the phase graph does not allow
    fn transition(&mut self, target: PlaybackState) -> Result<()> {
        let current = self.state;
        if current == target {
            return Ok(());
        }
        if !current.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: target.to_string(),
            });
        }
        self.state = target;
        info!(from = %current, to = %target, "State transition");
        Ok(())
    }

    /// Apply a transition triggered by an event; illegal ones are dropped
    fn follow(&mut self, target: PlaybackState, cause: &str) {
        if let Err(e) = self.transition(target) {
            debug!(cause, error = %e, "Ignoring event");
        }
    }

    /// Raise the indicator unless a quality switch is already showing it
    fn raise_loading(&mut self, reason: LoadingReason) {
        if self.loading != Some(LoadingReason::QualitySwitch) {
            self.loading = Some(reason);
        }
    }

    /// Session opened: manifest requested
    pub fn begin_loading(&mut self) {
        self.follow(PlaybackState::Loading, "session-open");
        if self.state == PlaybackState::Loading {
            self.loading = Some(LoadingReason::Manifest);
        }
    }

    /// Engine parsed the manifest
    pub fn manifest_parsed(&mut self) {
        if self.state == PlaybackState::Idle {
            self.follow(PlaybackState::Loading, "manifest-parsed");
        }
        if self.state == PlaybackState::Loading {
            self.follow(PlaybackState::Ready, "manifest-parsed");
        }
        if self.state != PlaybackState::Error {
            self.failure = None;
        }
    }

    /// Fatal failure: the session must be rebuilt to leave this state
    pub fn fail(&mut self, error: &Error) {
        if self.state != PlaybackState::Error {
            self.follow(PlaybackState::Error, error.error_code());
        }
        self.loading = None;
        self.failure = Some(Failure::from(error));
    }

    /// Show the quality-switch indicator until the engine confirms
    pub fn begin_quality_switch(&mut self) {
        if self.state != PlaybackState::Error {
            self.loading = Some(LoadingReason::QualitySwitch);
        }
    }

    /// Engine confirmed a switch
    pub fn finish_quality_switch(&mut self) {
        if self.loading == Some(LoadingReason::QualitySwitch) {
            self.loading = None;
        }
    }

    /// Slider position to a seek target, if seeking is possible right now
    pub fn seek_target(&self, percent: f64) -> Option<f64> {
        if !self.state.is_ready() {
            return None;
        }
        self.clock.position_for_percent(percent)
    }

    /// Apply a native media element event
    pub fn apply_media(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::TimeUpdate { current_time } => self.clock.set_current_time(current_time),
            MediaEvent::DurationChange { duration } => self.clock.set_duration(duration),
            MediaEvent::VolumeChange { volume, muted } => self.audio = AudioState::new(volume, muted),
            _ if self.state == PlaybackState::Error => {
                debug!(event = event.name(), "Ignoring media event in error state");
            }
            MediaEvent::LoadStart => {
                if matches!(self.state, PlaybackState::Idle | PlaybackState::Loading) {
                    self.follow(PlaybackState::Loading, "loadstart");
                    self.loading = Some(LoadingReason::Manifest);
                } else {
                    self.raise_loading(LoadingReason::Buffering);
                }
            }
            MediaEvent::CanPlay => self.loading = None,
            MediaEvent::Play => self.follow(PlaybackState::Playing, "play"),
            MediaEvent::Playing => {
                self.follow(PlaybackState::Playing, "playing");
                if matches!(self.loading, Some(LoadingReason::Buffering | LoadingReason::Seeking)) {
                    self.loading = None;
                }
            }
            MediaEvent::Pause => self.follow(PlaybackState::Paused, "pause"),
            MediaEvent::Ended => {
                self.follow(PlaybackState::Paused, "ended");
                if let Some(duration) = self.clock.known_duration() {
                    self.clock.set_current_time(duration);
                }
            }
            MediaEvent::Waiting => self.raise_loading(LoadingReason::Buffering),
            MediaEvent::Seeking => self.raise_loading(LoadingReason::Seeking),
            MediaEvent::Seeked => {
                if self.loading == Some(LoadingReason::Seeking) {
                    self.loading = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineErrorKind;

    fn ready_machine() -> PlaybackMachine {
        let mut machine = PlaybackMachine::new();
        machine.begin_loading();
        machine.manifest_parsed();
        machine
    }

    #[test]
    fn test_progress_percentage() {
        let mut clock = PlaybackClock::default();
        clock.set_duration(120.0);
        clock.set_current_time(60.0);
        assert_eq!(clock.progress_percentage(), 50.0);
    }

    #[test]
    fn test_progress_is_zero_without_duration() {
        for duration in [0.0, f64::NAN, f64::INFINITY] {
            let mut clock = PlaybackClock::default();
            clock.set_duration(duration);
            clock.set_current_time(42.0);
            assert_eq!(clock.progress_percentage(), 0.0, "duration {}", duration);
        }
    }

    #[test]
    fn test_current_time_bounded_by_duration() {
        let mut clock = PlaybackClock::default();
        clock.set_current_time(200.0);
        clock.set_duration(120.0);
        assert_eq!(clock.current_time(), 120.0);
        clock.set_current_time(-3.0);
        assert_eq!(clock.current_time(), 0.0);
        assert_eq!(clock.progress_percentage(), 0.0);
    }

    #[test]
    fn test_muted_icon() {
        assert!(AudioState::new(0.8, true).shows_muted_icon());
        assert!(AudioState::new(0.0, false).shows_muted_icon());
        assert!(!AudioState::new(0.5, false).shows_muted_icon());
        assert_eq!(AudioState::new(3.0, false).volume, 1.0);
    }

    #[test]
    fn test_load_and_play_cycle() {
        let mut machine = PlaybackMachine::new();
        machine.begin_loading();
        assert_eq!(machine.state(), PlaybackState::Loading);
        assert_eq!(machine.loading(), Some(LoadingReason::Manifest));

        machine.manifest_parsed();
        assert_eq!(machine.state(), PlaybackState::Ready);

        machine.apply_media(MediaEvent::CanPlay);
        assert_eq!(machine.loading(), None);

        machine.apply_media(MediaEvent::Play);
        assert!(machine.is_playing());
        machine.apply_media(MediaEvent::Pause);
        assert_eq!(machine.state(), PlaybackState::Paused);
        machine.apply_media(MediaEvent::Play);
        assert!(machine.is_playing());
    }

    #[test]
    fn test_buffering_keeps_play_state() {
        let mut machine = ready_machine();
        machine.apply_media(MediaEvent::Play);
        machine.apply_media(MediaEvent::Waiting);
        assert!(machine.is_playing());
        assert_eq!(machine.loading(), Some(LoadingReason::Buffering));
        machine.apply_media(MediaEvent::Playing);
        assert_eq!(machine.loading(), None);
    }

    #[test]
    fn test_quality_switch_indicator_survives_buffering() {
        let mut machine = ready_machine();
        machine.begin_quality_switch();
        machine.apply_media(MediaEvent::Waiting);
        assert_eq!(machine.loading(), Some(LoadingReason::QualitySwitch));
        machine.finish_quality_switch();
        assert_eq!(machine.loading(), None);
    }

    #[test]
    fn test_fatal_error_blocks_playback_events() {
        let mut machine = ready_machine();
        machine.apply_media(MediaEvent::Play);
        machine.fail(&Error::engine(EngineErrorKind::Network, "fragLoadError", true));
        assert_eq!(machine.state(), PlaybackState::Error);
        assert_eq!(machine.failure().unwrap().code, "ENGINE_NETWORK");

        machine.apply_media(MediaEvent::Play);
        assert_eq!(machine.state(), PlaybackState::Error);
        assert!(!machine.is_playing());
    }

    #[test]
    fn test_seek_requires_ready_and_duration() {
        let mut machine = PlaybackMachine::new();
        machine.apply_media(MediaEvent::DurationChange { duration: 100.0 });
        assert_eq!(machine.seek_target(50.0), None);

        machine.begin_loading();
        assert_eq!(machine.seek_target(50.0), None);

        machine.manifest_parsed();
        assert_eq!(machine.seek_target(50.0), Some(50.0));
        assert_eq!(machine.seek_target(150.0), Some(100.0));
        assert_eq!(machine.seek_target(f64::NAN), None);

        let mut unknown = ready_machine();
        unknown.apply_media(MediaEvent::DurationChange { duration: f64::NAN });
        assert_eq!(unknown.seek_target(50.0), None);
    }

    #[test]
    fn test_ended_pauses_at_duration() {
        let mut machine = ready_machine();
        machine.apply_media(MediaEvent::DurationChange { duration: 30.0 });
        machine.apply_media(MediaEvent::Play);
        machine.apply_media(MediaEvent::TimeUpdate { current_time: 29.8 });
        machine.apply_media(MediaEvent::Ended);
        assert_eq!(machine.state(), PlaybackState::Paused);
        assert_eq!(machine.clock().progress_percentage(), 100.0);
    }

    #[test]
    fn test_pause_before_session_is_ignored() {
        let mut machine = PlaybackMachine::new();
        machine.apply_media(MediaEvent::Play);
        assert_eq!(machine.state(), PlaybackState::Idle);
    }
}
