//! In-memory fakes for the engine, media element, fullscreen surface and
//! clock. Clones share their recorded state, so a test can hand one clone to
//! the player and inspect another.

use crate::{
    controls::Clock,
    engine::{EngineConfig, EngineFactory, StreamingEngine},
    fullscreen::FullscreenSurface,
    media::MediaElement,
    Error, QualitySelection, Result, SessionId,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use url::Url;

/// Command received by a fake engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Create { with_credentials: bool },
    AttachMedia,
    LoadSource(String),
    SetLevel(i32),
    Destroy,
}

#[derive(Debug, Default)]
struct EngineLog {
    calls: Vec<EngineCall>,
    sessions: Vec<SessionId>,
    created: usize,
    destroyed: usize,
}

/// Engine factory that records every engine command
#[derive(Debug, Clone)]
pub struct FakeEngineFactory {
    supported: bool,
    log: Rc<RefCell<EngineLog>>,
}

impl FakeEngineFactory {
    pub fn new() -> Self {
        Self {
            supported: true,
            log: Rc::default(),
        }
    }

    /// Factory for a platform without adaptive streaming
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.log.borrow().calls.clone()
    }

    pub fn created(&self) -> usize {
        self.log.borrow().created
    }

    pub fn destroyed(&self) -> usize {
        self.log.borrow().destroyed
    }

    /// Session ids handed to engines, in creation order
    pub fn sessions(&self) -> Vec<SessionId> {
        self.log.borrow().sessions.clone()
    }

    /// Engines created and not yet destroyed
    pub fn live_instances(&self) -> usize {
        let log = self.log.borrow();
        log.created - log.destroyed
    }

    /// Most recent level pushed to any engine
    pub fn last_level(&self) -> Option<i32> {
        self.log.borrow().calls.iter().rev().find_map(|call| match call {
            EngineCall::SetLevel(level) => Some(*level),
            _ => None,
        })
    }

    /// Most recent manifest URL handed to any engine
    pub fn last_source(&self) -> Option<String> {
        self.log.borrow().calls.iter().rev().find_map(|call| match call {
            EngineCall::LoadSource(url) => Some(url.clone()),
            _ => None,
        })
    }
}

impl Default for FakeEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for FakeEngineFactory {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&mut self, config: &EngineConfig) -> Result<Box<dyn StreamingEngine>> {
        let mut log = self.log.borrow_mut();
        log.created += 1;
        log.sessions.push(config.session);
        log.calls.push(EngineCall::Create {
            with_credentials: config.with_credentials,
        });
        Ok(Box::new(FakeEngine {
            log: Rc::clone(&self.log),
            destroyed: false,
        }))
    }
}

struct FakeEngine {
    log: Rc<RefCell<EngineLog>>,
    destroyed: bool,
}

impl StreamingEngine for FakeEngine {
    fn attach_media(&mut self) {
        self.log.borrow_mut().calls.push(EngineCall::AttachMedia);
    }

    fn load_source(&mut self, url: &Url) {
        self.log.borrow_mut().calls.push(EngineCall::LoadSource(url.to_string()));
    }

    fn set_current_level(&mut self, selection: QualitySelection) {
        self.log.borrow_mut().calls.push(EngineCall::SetLevel(selection.index()));
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        let mut log = self.log.borrow_mut();
        log.destroyed += 1;
        log.calls.push(EngineCall::Destroy);
    }
}

/// Command received by the fake media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCall {
    Play,
    Pause,
    SetCurrentTime(f64),
    SetVolume(f64),
    SetMuted(bool),
    CaptureFrame,
}

#[derive(Debug, Default)]
struct MediaLog {
    calls: Vec<MediaCall>,
    reject_play: Option<String>,
    fail_capture: Option<String>,
}

/// Media element fake. Commands are recorded; no events are generated, the
/// test feeds them explicitly.
#[derive(Debug, Clone, Default)]
pub struct FakeMedia {
    log: Rc<RefCell<MediaLog>>,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `play()` fail, as an autoplay policy would
    pub fn reject_play(&self, reason: &str) {
        self.log.borrow_mut().reject_play = Some(reason.to_string());
    }

    /// Make frame capture fail, as a cross-origin canvas would
    pub fn fail_capture(&self, reason: &str) {
        self.log.borrow_mut().fail_capture = Some(reason.to_string());
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.log.borrow().calls.clone()
    }

    pub fn last_seek(&self) -> Option<f64> {
        self.log.borrow().calls.iter().rev().find_map(|call| match call {
            MediaCall::SetCurrentTime(t) => Some(*t),
            _ => None,
        })
    }
}

impl MediaElement for FakeMedia {
    fn play(&mut self) -> Result<()> {
        let mut log = self.log.borrow_mut();
        log.calls.push(MediaCall::Play);
        match &log.reject_play {
            Some(reason) => Err(Error::PlaybackRejected(reason.clone())),
            None => Ok(()),
        }
    }

    fn pause(&mut self) {
        self.log.borrow_mut().calls.push(MediaCall::Pause);
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.log.borrow_mut().calls.push(MediaCall::SetCurrentTime(seconds));
    }

    fn set_volume(&mut self, volume: f64) {
        self.log.borrow_mut().calls.push(MediaCall::SetVolume(volume));
    }

    fn set_muted(&mut self, muted: bool) {
        self.log.borrow_mut().calls.push(MediaCall::SetMuted(muted));
    }

    fn capture_frame(&mut self) -> Result<String> {
        let mut log = self.log.borrow_mut();
        log.calls.push(MediaCall::CaptureFrame);
        match &log.fail_capture {
            Some(reason) => Err(Error::FrameCapture(reason.clone())),
            None => Ok("data:image/jpeg;base64,AAAA".to_string()),
        }
    }
}

/// Fullscreen surface fake
#[derive(Debug, Clone)]
pub struct FakeSurface {
    allow: Rc<Cell<bool>>,
    requests: Rc<Cell<usize>>,
    exits: Rc<Cell<usize>>,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self {
            allow: Rc::new(Cell::new(true)),
            requests: Rc::default(),
            exits: Rc::default(),
        }
    }

    /// Deny subsequent fullscreen requests
    pub fn deny(&self) {
        self.allow.set(false);
    }

    pub fn requests(&self) -> usize {
        self.requests.get()
    }

    pub fn exits(&self) -> usize {
        self.exits.get()
    }
}

impl Default for FakeSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl FullscreenSurface for FakeSurface {
    fn request_fullscreen(&mut self) -> Result<()> {
        self.requests.set(self.requests.get() + 1);
        if self.allow.get() {
            Ok(())
        } else {
            Err(Error::Fullscreen("request denied".to_string()))
        }
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        self.exits.set(self.exits.get() + 1);
        Ok(())
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
