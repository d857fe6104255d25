//! DOM-backed media element, fullscreen surface and clock

use crate::{Input, Mailbox};
use coursecast_core::{Clock, Error, FullscreenSurface, MediaElement, MediaEvent, Result};
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlElement, HtmlVideoElement};

/// Native events forwarded to the player
pub(crate) const MEDIA_EVENTS: [&str; 13] = [
    "loadstart",
    "loadedmetadata",
    "durationchange",
    "canplay",
    "play",
    "playing",
    "pause",
    "ended",
    "waiting",
    "seeking",
    "seeked",
    "timeupdate",
    "volumechange",
];

/// Read a native event into a [`MediaEvent`], sampling the element's
/// current properties
pub(crate) fn media_event(name: &str, video: &HtmlVideoElement) -> Option<MediaEvent> {
    let event = match name {
        "loadstart" => MediaEvent::LoadStart,
        "loadedmetadata" | "durationchange" => MediaEvent::DurationChange {
            duration: video.duration(),
        },
        "canplay" => MediaEvent::CanPlay,
        "play" => MediaEvent::Play,
        "playing" => MediaEvent::Playing,
        "pause" => MediaEvent::Pause,
        "ended" => MediaEvent::Ended,
        "waiting" => MediaEvent::Waiting,
        "seeking" => MediaEvent::Seeking,
        "seeked" => MediaEvent::Seeked,
        "timeupdate" => MediaEvent::TimeUpdate {
            current_time: video.current_time(),
        },
        "volumechange" => MediaEvent::VolumeChange {
            volume: video.volume(),
            muted: video.muted(),
        },
        _ => return None,
    };
    Some(event)
}

pub(crate) fn describe(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}

pub struct VideoElement {
    video: HtmlVideoElement,
    document: Document,
    mailbox: Mailbox,
}

impl VideoElement {
    pub(crate) fn new(video: HtmlVideoElement, document: Document, mailbox: Mailbox) -> Self {
        Self {
            video,
            document,
            mailbox,
        }
    }
}

impl MediaElement for VideoElement {
    fn play(&mut self) -> Result<()> {
        let promise = self
            .video
            .play()
            .map_err(|e| Error::PlaybackRejected(describe(&e)))?;

        // Autoplay policies reject asynchronously
        let mailbox = self.mailbox.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = JsFuture::from(promise).await {
                mailbox.post(Input::PlayRejected(describe(&e)));
            }
        });
        Ok(())
    }

    fn pause(&mut self) {
        if let Err(e) = self.video.pause() {
            web_sys::console::warn_1(&e);
        }
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.video.set_current_time(seconds);
    }

    fn set_volume(&mut self, volume: f64) {
        self.video.set_volume(volume);
    }

    fn set_muted(&mut self, muted: bool) {
        self.video.set_muted(muted);
    }

    fn capture_frame(&mut self) -> Result<String> {
        let (width, height) = (self.video.video_width(), self.video.video_height());
        if width == 0 || height == 0 {
            return Err(Error::FrameCapture("no decoded frame".to_string()));
        }

        let canvas: HtmlCanvasElement = self
            .document
            .create_element("canvas")
            .and_then(|el| el.dyn_into::<HtmlCanvasElement>().map_err(JsValue::from))
            .map_err(|e| Error::FrameCapture(describe(&e)))?;
        canvas.set_width(width);
        canvas.set_height(height);

        let context: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .map_err(|e| Error::FrameCapture(describe(&e)))?
            .and_then(|ctx| ctx.dyn_into().ok())
            .ok_or_else(|| Error::FrameCapture("2d context unavailable".to_string()))?;

        context
            .draw_image_with_html_video_element(&self.video, 0.0, 0.0)
            .map_err(|e| Error::FrameCapture(describe(&e)))?;

        // Tainted (cross-origin) canvases throw a SecurityError here
        canvas
            .to_data_url_with_type("image/jpeg")
            .map_err(|e| Error::FrameCapture(describe(&e)))
    }
}

/// The player container; fullscreen is requested on it so the custom
/// controls stay visible
pub struct ContainerSurface {
    container: HtmlElement,
    document: Document,
}

impl ContainerSurface {
    pub(crate) fn new(container: HtmlElement, document: Document) -> Self {
        Self { container, document }
    }

    /// Whether the document's fullscreen element is this container
    pub(crate) fn is_fullscreen(container: &HtmlElement, document: &Document) -> bool {
        let node: &web_sys::Node = container;
        document
            .fullscreen_element()
            .is_some_and(|el| el.is_same_node(Some(node)))
    }
}

impl FullscreenSurface for ContainerSurface {
    fn request_fullscreen(&mut self) -> Result<()> {
        self.container
            .request_fullscreen()
            .map_err(|e| Error::Fullscreen(describe(&e)))
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        self.document.exit_fullscreen();
        Ok(())
    }
}

/// `performance.now()`, falling back to wall time
pub struct PerformanceClock {
    performance: Option<web_sys::Performance>,
}

impl PerformanceClock {
    pub(crate) fn new(window: &web_sys::Window) -> Self {
        Self {
            performance: window.performance(),
        }
    }
}

impl Clock for PerformanceClock {
    fn now(&self) -> Duration {
        let millis = match &self.performance {
            Some(performance) => performance.now(),
            None => js_sys::Date::now(),
        };
        Duration::from_secs_f64(millis.max(0.0) / 1000.0)
    }
}
