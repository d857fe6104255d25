//! Lesson Player - the streaming playback controller
//!
//! Composes the session, playback state machine, quality controller,
//! controls timer and fullscreen state behind one embeddable surface.
//! Commands go out to the media element and engine; state only changes when
//! their events come back.

use crate::{
    controls::{Clock, ControlsTimer, VisibilityInputs},
    engine::{EngineEvent, EngineFactory},
    fullscreen::{FullscreenState, FullscreenSurface},
    media::{MediaElement, MediaEvent},
    playback::{Failure, PlaybackMachine},
    quality::{QualityController, QualityOption, SwitchRequest},
    session::PlaybackSession,
    EmbedOptions, Error, LessonId, LoadingReason, PlaybackState, PlayerConfig, QualitySelection,
    Result, SessionId,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// A non-fatal problem worth surfacing to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub code: String,
    pub message: String,
}

impl From<&Error> for Notice {
    fn from(error: &Error) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Everything the UI needs to render, as one serializable snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub session_id: Option<String>,
    pub lesson_id: Option<String>,
    pub manifest_url: Option<String>,
    pub state: PlaybackState,
    pub is_playing: bool,
    pub is_loading: bool,
    pub loading_reason: Option<LoadingReason>,
    pub current_time: f64,
    pub duration: Option<f64>,
    pub progress_percentage: f64,
    pub volume: f64,
    pub is_muted: bool,
    pub shows_muted_icon: bool,
    pub show_quality_selector: bool,
    pub qualities: Vec<QualityOption>,
    pub current_level_index: i32,
    pub active_level: Option<usize>,
    pub is_fullscreen: bool,
    pub controls_visible: bool,
    pub poster: Option<String>,
    pub error: Option<Failure>,
    pub last_notice: Option<Notice>,
}

impl PlayerView {
    /// Serialize for hosts that render from JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Playback controller for one player surface
pub struct LessonPlayer<M, S> {
    config: PlayerConfig,
    engines: Box<dyn EngineFactory>,
    media: M,
    surface: S,
    clock: Box<dyn Clock>,
    options: EmbedOptions,
    /// Lesson currently mounted, kept even when its session failed to open
    lesson: Option<LessonId>,
    session: Option<PlaybackSession>,
    playback: PlaybackMachine,
    quality: QualityController,
    controls: ControlsTimer,
    hovering: bool,
    popover_open: bool,
    fullscreen: FullscreenState,
    poster: Option<String>,
    poster_attempted: bool,
    last_audible_volume: f64,
    notices: VecDeque<Notice>,
}

impl<M: MediaElement, S: FullscreenSurface> LessonPlayer<M, S> {
    /// Create a player with nothing mounted
    pub fn new(
        config: PlayerConfig,
        engines: Box<dyn EngineFactory>,
        media: M,
        surface: S,
        clock: Box<dyn Clock>,
    ) -> Self {
        let controls = ControlsTimer::new(config.controls_hide_delay());
        let notices = VecDeque::with_capacity(config.notice_capacity);
        Self {
            config,
            engines,
            media,
            surface,
            clock,
            options: EmbedOptions::default(),
            lesson: None,
            session: None,
            playback: PlaybackMachine::new(),
            quality: QualityController::new(),
            controls,
            hovering: false,
            popover_open: false,
            fullscreen: FullscreenState::default(),
            poster: None,
            poster_attempted: false,
            last_audible_volume: 1.0,
            notices,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn playback(&self) -> &PlaybackMachine {
        &self.playback
    }

    pub fn quality(&self) -> &QualityController {
        &self.quality
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Id of the live session; engine events must carry it to be applied
    pub fn session_id(&self) -> Option<SessionId> {
        self.session
            .as_ref()
            .filter(|s| s.is_active())
            .map(PlaybackSession::id)
    }

    pub fn lesson(&self) -> Option<&LessonId> {
        self.lesson.as_ref()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.is_active()
    }

    pub fn controls_visible(&self) -> bool {
        self.controls.is_visible()
    }

    /// When the controls will hide unless something re-arms the countdown
    pub fn controls_deadline(&self) -> Option<Duration> {
        self.controls.deadline()
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Mount a lesson. A blank id renders the missing-lesson error without
    /// constructing an engine; the same lesson twice is a no-op.
    #[instrument(skip(self, options))]
    pub fn load_lesson(&mut self, lesson_id: &str, options: EmbedOptions) -> Result<()> {
        let lesson = match LessonId::new(lesson_id) {
            Ok(lesson) => lesson,
            Err(e) => {
                self.options = options;
                self.teardown();
                self.reset_state();
                self.lesson = None;
                error!(error = %e, "Cannot mount player");
                self.playback.fail(&e);
                return Err(e);
            }
        };

        let already_open = self
            .session
            .as_ref()
            .is_some_and(|s| s.is_active() && s.lesson_id() == &lesson);
        if already_open {
            debug!("Lesson already mounted");
            return Ok(());
        }

        self.options = options;
        self.open(lesson)
    }

    /// Rebuild the session for the current lesson from scratch
    #[instrument(skip(self))]
    pub fn retry(&mut self) -> Result<()> {
        let lesson = self.lesson.clone().ok_or(Error::MissingLesson)?;
        info!(lesson_id = %lesson, "Retrying playback");
        self.open(lesson)
    }

    /// Dispose the engine and clear the controls countdown
    #[instrument(skip(self))]
    pub fn unmount(&mut self) {
        self.teardown();
        self.controls.cancel();
        self.lesson = None;
        info!("Player unmounted");
    }

    fn open(&mut self, lesson: LessonId) -> Result<()> {
        // Old engine goes away before the new one exists
        self.teardown();
        self.reset_state();
        self.lesson = Some(lesson.clone());

        match PlaybackSession::open(lesson, &self.config, self.engines.as_mut()) {
            Ok(session) => {
                self.session = Some(session);
                self.playback.begin_loading();
                self.reconcile_controls();
                Ok(())
            }
            Err(e) => {
                error!(error = %e, code = e.error_code(), "Failed to open session");
                self.playback.fail(&e);
                Err(e)
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.dispose();
        }
    }

    fn reset_state(&mut self) {
        self.playback = PlaybackMachine::new();
        self.quality = QualityController::new();
        self.controls.reset();
        self.poster = self.options.poster.clone();
        self.poster_attempted = false;
    }

    fn has_live_session(&self) -> bool {
        self.session.as_ref().is_some_and(PlaybackSession::is_active)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Ask the media element to play; the `play` event confirms
    pub fn play(&mut self) {
        if !self.has_live_session() || self.playback.state() == PlaybackState::Error {
            debug!(state = %self.playback.state(), "Play ignored");
            return;
        }
        if let Err(e) = self.media.play() {
            self.record_notice(&e);
        }
    }

    /// Ask the media element to pause; the `pause` event confirms
    pub fn pause(&mut self) {
        if self.has_live_session() {
            self.media.pause();
        }
    }

    pub fn toggle_play(&mut self) {
        if self.playback.is_playing() {
            self.pause();
        } else {
            self.play();
        }
        self.interact();
    }

    /// A `play()` promise rejected after the fact (autoplay policy)
    pub fn report_play_rejected(&mut self, reason: &str) {
        self.record_notice(&Error::PlaybackRejected(reason.to_string()));
    }

    /// Seek to a slider position in `[0, 100]`. Returns false when the
    /// session is not ready or the duration is unknown.
    pub fn seek_to_percent(&mut self, percent: f64) -> bool {
        self.interact();
        match self.playback.seek_target(percent) {
            Some(target) => {
                debug!(percent, target, "Seeking");
                self.media.set_current_time(target);
                true
            }
            None => {
                debug!(percent, state = %self.playback.state(), "Seek rejected");
                false
            }
        }
    }

    /// Set volume in `[0, 1]`; raising it above zero also unmutes
    pub fn set_volume(&mut self, volume: f64) {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        self.media.set_volume(volume);
        if volume > 0.0 && self.playback.audio().muted {
            self.media.set_muted(false);
        }
        self.interact();
    }

    /// Mute, or unmute and restore an audible volume
    pub fn toggle_mute(&mut self) {
        let audio = *self.playback.audio();
        if audio.shows_muted_icon() {
            self.media.set_muted(false);
            if audio.volume == 0.0 {
                self.media.set_volume(self.last_audible_volume);
            }
        } else {
            self.media.set_muted(true);
        }
        self.interact();
    }

    /// Pick a rendition, or `Auto`
    pub fn select_quality(&mut self, selection: QualitySelection) -> Result<()> {
        self.interact();
        if !self.has_live_session() {
            return Err(Error::InvalidStateTransition {
                from: self.playback.state().to_string(),
                to: "quality switch".to_string(),
            });
        }

        let request = self.quality.request(selection)?;
        info!(selection = %selection, "Quality selected");
        if let Some(session) = self.session.as_mut() {
            session.set_level(selection);
        }
        match request {
            SwitchRequest::AwaitConfirmation => self.playback.begin_quality_switch(),
            SwitchRequest::Immediate => self.playback.finish_quality_switch(),
        }
        Ok(())
    }

    /// Convenience for hosts speaking engine indices (`-1` = auto)
    pub fn select_quality_index(&mut self, index: i32) -> Result<()> {
        self.select_quality(QualitySelection::from_index(index))
    }

    pub fn toggle_fullscreen(&mut self) {
        if let Err(e) = self.fullscreen.toggle(&mut self.surface) {
            self.record_notice(&e);
        }
        self.interact();
    }

    // ------------------------------------------------------------------
    // Pointer input
    // ------------------------------------------------------------------

    pub fn pointer_moved(&mut self) {
        self.interact();
    }

    pub fn set_hovering(&mut self, hovering: bool) {
        self.hovering = hovering;
        self.reconcile_controls();
    }

    pub fn set_volume_popover(&mut self, open: bool) {
        self.popover_open = open;
        self.interact();
    }

    pub fn begin_seek_drag(&mut self) {
        self.interact();
    }

    pub fn begin_volume_drag(&mut self) {
        self.interact();
    }

    /// Hide the controls if their countdown expired. Returns true when
    /// visibility changed.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now();
        self.controls.poll(now)
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Apply an engine lifecycle event reported by the engine of `session`.
    ///
    /// Events from a disposed or replaced engine are dropped, including ones
    /// already queued when the lesson changed.
    pub fn handle_engine_event(&mut self, session: SessionId, event: EngineEvent) {
        if self.session_id() != Some(session) {
            debug!(
                event = event.name(),
                %session,
                "Dropping engine event from a stale session"
            );
            return;
        }

        match event {
            EngineEvent::ManifestParsed { levels } => {
                info!(levels = levels.len(), "Manifest parsed");
                self.quality.set_renditions(levels);
                self.playback.manifest_parsed();
                if self.options.autoplay {
                    self.play();
                }
            }
            EngineEvent::LevelSwitched { level } => {
                debug!(level, "Level switched");
                if self.quality.confirm(level) {
                    self.playback.finish_quality_switch();
                }
            }
            EngineEvent::Error { kind, details, fatal } => {
                let e = Error::engine(kind, details, fatal);
                if fatal {
                    error!(error = %e, code = e.error_code(), "Fatal engine error");
                    self.playback.fail(&e);
                    // Partial engine state is not trusted after a fatal error
                    self.teardown();
                } else {
                    self.record_notice(&e);
                }
            }
        }
        self.reconcile_controls();
    }

    /// Apply a native media element event
    pub fn handle_media_event(&mut self, event: MediaEvent) {
        if self.session.is_none() {
            debug!(event = event.name(), "Dropping media event without session");
            return;
        }

        self.playback.apply_media(event);
        match event {
            MediaEvent::CanPlay => self.capture_poster(),
            MediaEvent::VolumeChange { volume, .. } if volume > 0.0 => {
                self.last_audible_volume = volume.min(1.0);
            }
            _ => {}
        }
        self.reconcile_controls();
    }

    /// Platform `fullscreenchange` notification
    pub fn handle_fullscreen_change(&mut self, active: bool) {
        self.fullscreen.on_change(active);
    }

    /// Platform `fullscreenerror` notification for a request that was
    /// accepted synchronously and refused later
    pub fn handle_fullscreen_rejected(&mut self, reason: &str) {
        self.fullscreen.on_rejected();
        self.record_notice(&Error::Fullscreen(reason.to_string()));
    }

    fn capture_poster(&mut self) {
        if !self.config.capture_poster || self.poster.is_some() || self.poster_attempted {
            return;
        }
        self.poster_attempted = true;
        match self.media.capture_frame() {
            Ok(poster) => {
                debug!("Captured poster frame");
                self.poster = Some(poster);
            }
            Err(e) => self.record_notice(&e),
        }
    }

    // ------------------------------------------------------------------
    // Controls visibility
    // ------------------------------------------------------------------

    fn visibility_inputs(&self) -> VisibilityInputs {
        VisibilityInputs {
            playing: self.playback.is_playing(),
            hovering: self.hovering,
            popover_open: self.popover_open,
        }
    }

    fn reconcile_controls(&mut self) {
        let now = self.clock.now();
        self.controls.reconcile(self.visibility_inputs(), now);
    }

    fn interact(&mut self) {
        let now = self.clock.now();
        self.controls.interact(self.visibility_inputs(), now);
    }

    fn record_notice(&mut self, error: &Error) {
        warn!(code = error.error_code(), error = %error, "Non-fatal playback issue");
        if self.config.notice_capacity == 0 {
            return;
        }
        if self.notices.len() >= self.config.notice_capacity {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice::from(error));
    }

    /// Snapshot for rendering
    pub fn view(&self) -> PlayerView {
        let clock = self.playback.clock();
        let audio = self.playback.audio();

        PlayerView {
            session_id: self.session.as_ref().map(|s| s.id().to_string()),
            lesson_id: self.lesson.as_ref().map(|l| l.to_string()),
            manifest_url: self.session.as_ref().map(|s| s.manifest_url().to_string()),
            state: self.playback.state(),
            is_playing: self.playback.is_playing(),
            is_loading: self.playback.loading().is_some(),
            loading_reason: self.playback.loading(),
            current_time: clock.current_time(),
            duration: clock.known_duration(),
            progress_percentage: clock.progress_percentage(),
            volume: audio.volume,
            is_muted: audio.muted,
            shows_muted_icon: audio.shows_muted_icon(),
            show_quality_selector: self.quality.show_selector(),
            qualities: if self.quality.show_selector() {
                self.quality.options()
            } else {
                Vec::new()
            },
            current_level_index: self.quality.current_level_index(),
            active_level: self.quality.active_level(),
            is_fullscreen: self.fullscreen.is_active(),
            controls_visible: self.controls.is_visible(),
            poster: self.poster.clone(),
            error: self.playback.failure().cloned(),
            last_notice: self.notices.back().cloned(),
        }
    }
}

impl<M, S> std::fmt::Debug for LessonPlayer<M, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LessonPlayer")
            .field("lesson", &self.lesson)
            .field("session", &self.session)
            .field("state", &self.playback.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEngineFactory, FakeMedia, FakeSurface, ManualClock, MediaCall};
    use crate::QualityRendition;

    struct Harness {
        player: LessonPlayer<FakeMedia, FakeSurface>,
        engines: FakeEngineFactory,
        media: FakeMedia,
        clock: ManualClock,
    }

    fn harness() -> Harness {
        let engines = FakeEngineFactory::new();
        let media = FakeMedia::new();
        let clock = ManualClock::new();
        let player = LessonPlayer::new(
            PlayerConfig::default(),
            Box::new(engines.clone()),
            media.clone(),
            FakeSurface::new(),
            Box::new(clock.clone()),
        );
        Harness {
            player,
            engines,
            media,
            clock,
        }
    }

    fn ladder() -> Vec<QualityRendition> {
        vec![
            QualityRendition::new(640, 360, 800_000),
            QualityRendition::new(1280, 720, 2_500_000),
        ]
    }

    impl Harness {
        fn engine(&mut self, event: EngineEvent) {
            let session = self.player.session_id().unwrap();
            self.player.handle_engine_event(session, event);
        }
    }

    fn ready(h: &mut Harness) {
        h.player.load_lesson("abc", EmbedOptions::default()).unwrap();
        h.engine(EngineEvent::ManifestParsed { levels: ladder() });
    }

    #[test]
    fn test_blank_lesson_renders_error_without_engine() {
        let mut h = harness();
        assert!(matches!(
            h.player.load_lesson("", EmbedOptions::default()),
            Err(Error::MissingLesson)
        ));
        assert_eq!(h.engines.created(), 0);
        assert_eq!(h.player.state(), PlaybackState::Error);
        let view = h.player.view();
        assert_eq!(view.error.unwrap().code, "MISSING_LESSON");
    }

    #[test]
    fn test_same_lesson_is_not_reloaded() {
        let mut h = harness();
        h.player.load_lesson("abc", EmbedOptions::default()).unwrap();
        h.player.load_lesson("abc", EmbedOptions::default()).unwrap();
        assert_eq!(h.engines.created(), 1);
    }

    #[test]
    fn test_play_waits_for_native_event() {
        let mut h = harness();
        ready(&mut h);
        h.player.toggle_play();
        assert_eq!(h.media.calls(), vec![MediaCall::Play]);
        assert!(!h.player.is_playing());

        h.player.handle_media_event(MediaEvent::Play);
        assert!(h.player.is_playing());
    }

    #[test]
    fn test_autoplay_after_manifest() {
        let mut h = harness();
        let options = EmbedOptions {
            autoplay: true,
            ..Default::default()
        };
        h.player.load_lesson("abc", options).unwrap();
        assert!(h.media.calls().is_empty());
        h.engine(EngineEvent::ManifestParsed { levels: ladder() });
        assert_eq!(h.media.calls(), vec![MediaCall::Play]);
    }

    #[test]
    fn test_volume_above_zero_unmutes() {
        let mut h = harness();
        ready(&mut h);
        h.player
            .handle_media_event(MediaEvent::VolumeChange { volume: 0.4, muted: true });
        h.player.set_volume(0.7);
        assert_eq!(
            h.media.calls(),
            vec![MediaCall::SetVolume(0.7), MediaCall::SetMuted(false)]
        );
        // Displayed state still waits for volumechange
        assert!(h.player.view().is_muted);
    }

    #[test]
    fn test_unmute_from_zero_restores_volume() {
        let mut h = harness();
        ready(&mut h);
        h.player
            .handle_media_event(MediaEvent::VolumeChange { volume: 0.6, muted: false });
        h.player
            .handle_media_event(MediaEvent::VolumeChange { volume: 0.0, muted: false });
        h.player.toggle_mute();
        assert_eq!(
            h.media.calls(),
            vec![MediaCall::SetMuted(false), MediaCall::SetVolume(0.6)]
        );
    }

    #[test]
    fn test_poster_capture_once_and_non_fatal() {
        let mut h = harness();
        h.media.fail_capture("SecurityError");
        ready(&mut h);
        h.player.handle_media_event(MediaEvent::CanPlay);
        h.player.handle_media_event(MediaEvent::CanPlay);

        let captures = h
            .media
            .calls()
            .into_iter()
            .filter(|c| *c == MediaCall::CaptureFrame)
            .count();
        assert_eq!(captures, 1);
        assert_eq!(h.player.state(), PlaybackState::Ready);
        assert_eq!(h.player.view().poster, None);
        assert_eq!(h.player.notices().count(), 1);
    }

    #[test]
    fn test_supplied_poster_skips_capture() {
        let mut h = harness();
        let options = EmbedOptions {
            poster: Some("https://cdn.example.com/thumb.jpg".into()),
            autoplay: false,
        };
        h.player.load_lesson("abc", options).unwrap();
        h.engine(EngineEvent::ManifestParsed { levels: ladder() });
        h.player.handle_media_event(MediaEvent::CanPlay);
        assert!(h.media.calls().is_empty());
        assert_eq!(
            h.player.view().poster.as_deref(),
            Some("https://cdn.example.com/thumb.jpg")
        );
    }

    #[test]
    fn test_non_fatal_engine_error_keeps_playing() {
        let mut h = harness();
        ready(&mut h);
        h.player.handle_media_event(MediaEvent::Play);
        h.engine(EngineEvent::Error {
            kind: crate::EngineErrorKind::Media,
            details: "bufferStalledError".into(),
            fatal: false,
        });
        assert!(h.player.is_playing());
        assert_eq!(h.engines.live_instances(), 1);
        assert_eq!(
            h.player.view().last_notice.unwrap().code,
            "ENGINE_MEDIA"
        );
    }

    #[test]
    fn test_notice_ring_is_bounded() {
        let mut h = harness();
        ready(&mut h);
        h.media.reject_play("NotAllowedError");
        for _ in 0..40 {
            h.player.play();
        }
        assert_eq!(h.player.notices().count(), 16);
    }

    #[test]
    fn test_controls_hide_while_playing() {
        let mut h = harness();
        ready(&mut h);
        h.player.handle_media_event(MediaEvent::Play);
        assert!(h.player.controls_visible());

        h.clock.advance(Duration::from_millis(2999));
        assert!(!h.player.tick());
        h.clock.advance(Duration::from_millis(1));
        assert!(h.player.tick());
        assert!(!h.player.controls_visible());

        h.player.pointer_moved();
        assert!(h.player.controls_visible());
    }

    #[test]
    fn test_unmount_clears_countdown_and_engine() {
        let mut h = harness();
        ready(&mut h);
        h.player.handle_media_event(MediaEvent::Play);
        assert!(h.player.controls_deadline().is_some());

        h.player.unmount();
        assert_eq!(h.player.controls_deadline(), None);
        assert_eq!(h.engines.live_instances(), 0);
    }
}
