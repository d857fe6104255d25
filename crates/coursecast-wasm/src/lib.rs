//! Coursecast WASM - WebAssembly Lesson Player Binding
//!
//! Runs the Coursecast playback core in the browser on top of hls.js:
//! - Native video events drive the playback state machine
//! - hls.js events drive manifest, quality and error handling
//! - The controls auto-hide countdown runs on `setTimeout`
//!
//! ## Integration with hls.js
//!
//! ```javascript
//! import Hls from 'hls.js';
//! import init, { CoursecastPlayer } from '@coursecast/wasm';
//!
//! await init();
//! const player = new CoursecastPlayer(container, video, Hls, { apiUrl: 'https://api.example.com' });
//! player.onChange((view) => render(view));
//! player.load('lesson-42', null, false);
//! ```

use coursecast_core::{
    EmbedOptions, EngineEvent, LessonPlayer, ManifestRoute, MediaEvent, PlayerConfig,
    QualitySelection, SessionId, DEFAULT_API_BASE,
};
use js_sys::Function;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, EventTarget, HtmlElement, HtmlVideoElement, Window};

mod hls;
mod media;

pub use hls::{JsEngine, JsEngineFactory};
pub use media::{ContainerSurface, PerformanceClock, VideoElement};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    coursecast_core::init();
    web_sys::console::log_1(&"[Coursecast WASM] Initialized".into());
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    coursecast_core::VERSION.to_string()
}

/// Options accepted by the [`CoursecastPlayer`] constructor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerOptions {
    /// API base URL, e.g. `https://api.example.com`
    pub api_url: Option<String>,
    /// `hls-stream` (default) or `video-master`
    pub manifest_route: Option<String>,
    pub with_credentials: Option<bool>,
    pub controls_hide_ms: Option<u64>,
    pub capture_poster: Option<bool>,
}

impl PlayerOptions {
    fn into_config(self) -> coursecast_core::Result<PlayerConfig> {
        let mut config = PlayerConfig::new(self.api_url.as_deref().unwrap_or(DEFAULT_API_BASE))?;
        if let Some(route) = self.manifest_route {
            config = config.with_manifest_route(route.parse::<ManifestRoute>()?);
        }
        if let Some(with_credentials) = self.with_credentials {
            config.with_credentials = with_credentials;
        }
        if let Some(ms) = self.controls_hide_ms {
            config = config.with_controls_hide_delay(Duration::from_millis(ms));
        }
        if let Some(capture) = self.capture_poster {
            config = config.with_poster_capture(capture);
        }
        Ok(config)
    }
}

type Player = LessonPlayer<VideoElement, ContainerSurface>;

/// Work that arrives from JS callbacks, applied outside any player borrow
pub(crate) enum Input {
    Engine {
        session: SessionId,
        event: EngineEvent,
    },
    Media(MediaEvent),
    PlayRejected(String),
    FullscreenChanged(bool),
    FullscreenRejected,
    Hover(bool),
    PointerMoved,
    Tick,
}

impl Input {
    fn apply(self, player: &mut Player) {
        match self {
            Input::Engine { session, event } => player.handle_engine_event(session, event),
            Input::Media(event) => player.handle_media_event(event),
            Input::PlayRejected(reason) => player.report_play_rejected(&reason),
            Input::FullscreenChanged(active) => player.handle_fullscreen_change(active),
            Input::FullscreenRejected => {
                player.handle_fullscreen_rejected("request refused by the browser")
            }
            Input::Hover(hovering) => player.set_hovering(hovering),
            Input::PointerMoved => player.pointer_moved(),
            Input::Tick => {
                player.tick();
            }
        }
    }
}

/// Weak route back into the player for callbacks
#[derive(Clone)]
pub(crate) struct Mailbox(Weak<Shared>);

impl Mailbox {
    /// Queue an input and apply it on the next microtask. Callbacks never
    /// touch the player directly, so an engine can be destroyed from inside
    /// its own event.
    pub(crate) fn post(&self, input: Input) {
        let Some(shared) = self.0.upgrade() else {
            return;
        };
        shared.pending.borrow_mut().push_back(input);
        let weak = self.0.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Some(shared) = weak.upgrade() {
                shared.drain();
            }
        });
    }
}

/// DOM listener removed on drop
struct Listener {
    target: EventTarget,
    name: &'static str,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

impl Listener {
    fn attach(
        target: &EventTarget,
        name: &'static str,
        closure: Closure<dyn FnMut(web_sys::Event)>,
    ) -> Result<Self, JsValue> {
        target.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            name,
            closure,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.name, self.closure.as_ref().unchecked_ref());
    }
}

struct Shared {
    player: RefCell<Player>,
    pending: RefCell<VecDeque<Input>>,
    window: Window,
    document: Document,
    container: HtmlElement,
    video: HtmlVideoElement,
    on_change: RefCell<Option<Function>>,
    hide_timer: Cell<Option<i32>>,
    hide_callback: Closure<dyn FnMut()>,
    listeners: RefCell<Vec<Listener>>,
}

impl Shared {
    /// Apply queued inputs; a no-op while a command holds the player
    fn drain(&self) {
        let Ok(mut player) = self.player.try_borrow_mut() else {
            return;
        };
        let mut applied = false;
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(input) = next else {
                break;
            };
            input.apply(&mut player);
            applied = true;
        }
        drop(player);

        if applied {
            self.after_change();
        }
    }

    fn command<R>(&self, f: impl FnOnce(&mut Player) -> R) -> Result<R, JsValue> {
        let result = {
            let mut player = self
                .player
                .try_borrow_mut()
                .map_err(|_| JsValue::from_str("player is busy"))?;
            f(&mut player)
        };
        self.drain();
        self.after_change();
        Ok(result)
    }

    /// Re-arm the hide timer and notify the host
    fn after_change(&self) {
        let Ok(player) = self.player.try_borrow() else {
            return;
        };

        if let Some(handle) = self.hide_timer.take() {
            self.window.clear_timeout_with_handle(handle);
        }
        if let Some(deadline) = player.controls_deadline() {
            let delay = deadline.saturating_sub(player.now());
            let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
            match self.window.set_timeout_with_callback_and_timeout_and_arguments_0(
                self.hide_callback.as_ref().unchecked_ref(),
                millis,
            ) {
                Ok(handle) => self.hide_timer.set(Some(handle)),
                Err(e) => web_sys::console::error_1(&e),
            }
        }

        let view = player.view();
        drop(player);

        let callback = self.on_change.borrow().clone();
        if let Some(callback) = callback {
            match serde_wasm_bindgen::to_value(&view) {
                Ok(value) => {
                    if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                        web_sys::console::error_1(&e);
                    }
                }
                Err(e) => web_sys::console::error_1(&e.into()),
            }
        }
    }

    fn clear_timer(&self) {
        if let Some(handle) = self.hide_timer.take() {
            self.window.clear_timeout_with_handle(handle);
        }
    }

    /// Subscribe to media, pointer and fullscreen events unless already
    /// subscribed
    fn attach_listeners(self: &Rc<Self>) -> Result<(), JsValue> {
        if !self.listeners.borrow().is_empty() {
            return Ok(());
        }

        let mailbox = Mailbox(Rc::downgrade(self));
        let (video, container, document) = (&self.video, &self.container, &self.document);
        let mut listeners = Vec::new();

        for name in media::MEDIA_EVENTS {
            let source = video.clone();
            listeners.push(listen(&mailbox, video, name, move || {
                media::media_event(name, &source).map(Input::Media)
            })?);
        }

        listeners.push(listen(&mailbox, container, "mouseenter", || {
            Some(Input::Hover(true))
        })?);
        listeners.push(listen(&mailbox, container, "mouseleave", || {
            Some(Input::Hover(false))
        })?);
        for name in ["mousemove", "touchstart"] {
            listeners.push(listen(&mailbox, container, name, || Some(Input::PointerMoved))?);
        }

        let (element, doc) = (container.clone(), document.clone());
        listeners.push(listen(&mailbox, document, "fullscreenchange", move || {
            Some(Input::FullscreenChanged(ContainerSurface::is_fullscreen(&element, &doc)))
        })?);
        // The request promise is not observed, so refusals arrive here
        listeners.push(listen(&mailbox, document, "fullscreenerror", || {
            Some(Input::FullscreenRejected)
        })?);

        *self.listeners.borrow_mut() = listeners;
        Ok(())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.clear_timer();
    }
}

fn listen(
    mailbox: &Mailbox,
    target: &EventTarget,
    name: &'static str,
    input: impl Fn() -> Option<Input> + 'static,
) -> Result<Listener, JsValue> {
    let mailbox = mailbox.clone();
    let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
        if let Some(input) = input() {
            mailbox.post(input);
        }
    });
    Listener::attach(target, name, closure)
}

fn to_js(error: coursecast_core::Error) -> JsValue {
    js_sys::Error::new(&format!("{}: {}", error.error_code(), error)).into()
}

/// Lesson player bound to a container, a video element and hls.js
#[wasm_bindgen]
pub struct CoursecastPlayer {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl CoursecastPlayer {
    /// Create a player. `hls` is the hls.js `Hls` constructor.
    #[wasm_bindgen(constructor)]
    pub fn new(
        container: HtmlElement,
        video: HtmlVideoElement,
        hls: Function,
        options: JsValue,
    ) -> Result<CoursecastPlayer, JsValue> {
        let options: PlayerOptions = if options.is_undefined() || options.is_null() {
            PlayerOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };
        let config = options.into_config().map_err(to_js)?;

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document: Document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let shared = Rc::new_cyclic(|weak: &Weak<Shared>| {
            let mailbox = Mailbox(weak.clone());
            let engines = JsEngineFactory::new(hls, video.clone(), mailbox.clone());
            let media = VideoElement::new(video.clone(), document.clone(), mailbox.clone());
            let surface = ContainerSurface::new(container.clone(), document.clone());
            let clock = PerformanceClock::new(&window);

            let tick = mailbox.clone();
            let hide_callback = Closure::<dyn FnMut()>::new(move || tick.post(Input::Tick));

            Shared {
                player: RefCell::new(LessonPlayer::new(
                    config,
                    Box::new(engines),
                    media,
                    surface,
                    Box::new(clock),
                )),
                pending: RefCell::new(VecDeque::new()),
                window: window.clone(),
                document: document.clone(),
                container: container.clone(),
                video: video.clone(),
                on_change: RefCell::new(None),
                hide_timer: Cell::new(None),
                hide_callback,
                listeners: RefCell::new(Vec::new()),
            }
        });

        shared.attach_listeners()?;
        Ok(Self { shared })
    }

    /// Register a callback receiving a view snapshot after every change
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: Function) {
        *self.shared.on_change.borrow_mut() = Some(callback);
    }

    /// Mount a lesson; a blank id shows the missing-lesson error. After
    /// `unmount` this subscribes to DOM events again.
    pub fn load(&self, lesson_id: &str, poster: Option<String>, autoplay: bool) -> Result<(), JsValue> {
        self.shared.attach_listeners()?;
        let options = EmbedOptions { poster, autoplay };
        self.shared
            .command(|player| player.load_lesson(lesson_id, options))?
            .map_err(to_js)
    }

    pub fn retry(&self) -> Result<(), JsValue> {
        self.shared.command(|player| player.retry())?.map_err(to_js)
    }

    /// Destroy the engine, stop the hide timer and detach DOM listeners
    pub fn unmount(&self) -> Result<(), JsValue> {
        self.shared.command(|player| player.unmount())?;
        self.shared.clear_timer();
        self.shared.listeners.borrow_mut().clear();
        Ok(())
    }

    #[wasm_bindgen(js_name = togglePlay)]
    pub fn toggle_play(&self) -> Result<(), JsValue> {
        self.shared.command(|player| player.toggle_play())
    }

    pub fn play(&self) -> Result<(), JsValue> {
        self.shared.command(|player| player.play())
    }

    pub fn pause(&self) -> Result<(), JsValue> {
        self.shared.command(|player| player.pause())
    }

    /// Seek to a percentage of the duration
    pub fn seek(&self, percent: f64) -> Result<bool, JsValue> {
        self.shared.command(|player| player.seek_to_percent(percent))
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, volume: f64) -> Result<(), JsValue> {
        self.shared.command(|player| player.set_volume(volume))
    }

    #[wasm_bindgen(js_name = toggleMute)]
    pub fn toggle_mute(&self) -> Result<(), JsValue> {
        self.shared.command(|player| player.toggle_mute())
    }

    /// Select a level index, `-1` for automatic
    #[wasm_bindgen(js_name = selectQuality)]
    pub fn select_quality(&self, index: i32) -> Result<(), JsValue> {
        self.shared
            .command(|player| player.select_quality(QualitySelection::from_index(index)))?
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = toggleFullscreen)]
    pub fn toggle_fullscreen(&self) -> Result<(), JsValue> {
        self.shared.command(|player| player.toggle_fullscreen())
    }

    #[wasm_bindgen(js_name = setVolumePopover)]
    pub fn set_volume_popover(&self, open: bool) -> Result<(), JsValue> {
        self.shared.command(|player| player.set_volume_popover(open))
    }

    #[wasm_bindgen(js_name = beginSeekDrag)]
    pub fn begin_seek_drag(&self) -> Result<(), JsValue> {
        self.shared.command(|player| player.begin_seek_drag())
    }

    #[wasm_bindgen(js_name = beginVolumeDrag)]
    pub fn begin_volume_drag(&self) -> Result<(), JsValue> {
        self.shared.command(|player| player.begin_volume_drag())
    }

    /// Current view snapshot
    pub fn view(&self) -> Result<JsValue, JsValue> {
        let view = self
            .shared
            .player
            .try_borrow()
            .map_err(|_| JsValue::from_str("player is busy"))?
            .view();
        Ok(serde_wasm_bindgen::to_value(&view)?)
    }
}
