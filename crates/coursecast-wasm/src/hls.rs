//! hls.js adapter
//!
//! Drives an hls.js instance through `js_sys::Reflect`, so the binding only
//! needs the `Hls` constructor from the host page.

use crate::media::describe;
use crate::{Input, Mailbox};
use coursecast_core::{
    EngineConfig, EngineErrorKind, EngineEvent, EngineFactory, Error, QualityRendition,
    QualitySelection, Result, SessionId, StreamingEngine,
};
use js_sys::{Array, Function, Object, Reflect};
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlVideoElement;

const MANIFEST_PARSED: &str = "hlsManifestParsed";
const LEVEL_SWITCHED: &str = "hlsLevelSwitched";
const ERROR: &str = "hlsError";

type Handler = Closure<dyn FnMut(JsValue, JsValue)>;

fn get(target: &JsValue, key: &str) -> JsValue {
    Reflect::get(target, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

fn call(target: &JsValue, method: &str, args: &Array) -> std::result::Result<JsValue, JsValue> {
    let function: Function = Reflect::get(target, &JsValue::from_str(method))?.dyn_into()?;
    function.apply(target, args)
}

fn levels_from(data: &JsValue) -> Vec<QualityRendition> {
    let levels = get(data, "levels");
    if !Array::is_array(&levels) {
        return Vec::new();
    }
    Array::from(&levels)
        .iter()
        .map(|level| QualityRendition {
            width: get(&level, "width").as_f64().unwrap_or(0.0) as u32,
            height: get(&level, "height").as_f64().unwrap_or(0.0) as u32,
            bitrate: get(&level, "bitrate").as_f64().unwrap_or(0.0) as u64,
            name: get(&level, "name").as_string(),
        })
        .collect()
}

fn error_kind(kind: Option<String>) -> EngineErrorKind {
    match kind.as_deref() {
        Some("networkError") => EngineErrorKind::Network,
        Some("mediaError") => EngineErrorKind::Media,
        Some("keySystemError") => EngineErrorKind::KeySystem,
        _ => EngineErrorKind::Other,
    }
}

/// Creates hls.js instances bound to one video element
pub struct JsEngineFactory {
    hls: Function,
    video: HtmlVideoElement,
    mailbox: Mailbox,
}

impl JsEngineFactory {
    pub(crate) fn new(hls: Function, video: HtmlVideoElement, mailbox: Mailbox) -> Self {
        Self {
            hls,
            video,
            mailbox,
        }
    }

    /// Wrap an hls.js callback; events are tagged with the owning session
    fn handler(&self, session: SessionId, convert: fn(&JsValue) -> Option<EngineEvent>) -> Handler {
        let mailbox = self.mailbox.clone();
        Closure::new(move |_event: JsValue, data: JsValue| {
            if let Some(event) = convert(&data) {
                mailbox.post(Input::Engine { session, event });
            }
        })
    }
}

impl EngineFactory for JsEngineFactory {
    fn is_supported(&self) -> bool {
        call(&self.hls, "isSupported", &Array::new())
            .ok()
            .and_then(|supported| supported.as_bool())
            .unwrap_or(false)
    }

    fn create(&mut self, config: &EngineConfig) -> Result<Box<dyn StreamingEngine>> {
        let options = Object::new();
        let construct_error = |e: JsValue| Error::engine(EngineErrorKind::Other, describe(&e), true);

        Reflect::set(
            &options,
            &"startLevel".into(),
            &config.start_level.index().into(),
        )
        .map_err(construct_error)?;

        let xhr_setup = config.with_credentials.then(|| {
            Closure::<dyn FnMut(JsValue)>::new(|xhr: JsValue| {
                let _ = Reflect::set(&xhr, &"withCredentials".into(), &JsValue::TRUE);
            })
        });
        if let Some(setup) = &xhr_setup {
            Reflect::set(&options, &"xhrSetup".into(), setup.as_ref()).map_err(construct_error)?;
        }

        let instance = Reflect::construct(&self.hls, &Array::of1(&options)).map_err(construct_error)?;
        let session = config.session;

        let handlers = vec![
            (
                MANIFEST_PARSED,
                self.handler(session, |data| {
                    Some(EngineEvent::ManifestParsed {
                        levels: levels_from(data),
                    })
                }),
            ),
            (
                LEVEL_SWITCHED,
                self.handler(session, |data| {
                    get(data, "level")
                        .as_f64()
                        .filter(|level| *level >= 0.0)
                        .map(|level| EngineEvent::LevelSwitched {
                            level: level as usize,
                        })
                }),
            ),
            (
                ERROR,
                self.handler(session, |data| {
                    Some(EngineEvent::Error {
                        kind: error_kind(get(data, "type").as_string()),
                        details: get(data, "details")
                            .as_string()
                            .unwrap_or_else(|| "unknown".to_string()),
                        fatal: get(data, "fatal").as_bool().unwrap_or(false),
                    })
                }),
            ),
        ];

        for (name, handler) in &handlers {
            call(&instance, "on", &Array::of2(&JsValue::from_str(name), handler.as_ref()))
                .map_err(construct_error)?;
        }

        Ok(Box::new(JsEngine {
            instance,
            video: self.video.clone(),
            _handlers: handlers.into_iter().map(|(_, handler)| handler).collect(),
            _xhr_setup: xhr_setup,
            destroyed: false,
        }))
    }
}

/// One hls.js instance. Handlers stay alive as long as the instance.
pub struct JsEngine {
    instance: JsValue,
    video: HtmlVideoElement,
    _handlers: Vec<Handler>,
    _xhr_setup: Option<Closure<dyn FnMut(JsValue)>>,
    destroyed: bool,
}

impl JsEngine {
    fn invoke(&self, method: &str, args: &Array) {
        if self.destroyed {
            return;
        }
        if let Err(e) = call(&self.instance, method, args) {
            web_sys::console::error_2(&format!("hls.{method} failed").into(), &e);
        }
    }
}

impl StreamingEngine for JsEngine {
    fn attach_media(&mut self) {
        self.invoke("attachMedia", &Array::of1(&self.video));
    }

    fn load_source(&mut self, url: &Url) {
        self.invoke("loadSource", &Array::of1(&JsValue::from_str(url.as_str())));
    }

    fn set_current_level(&mut self, selection: QualitySelection) {
        if self.destroyed {
            return;
        }
        let level = JsValue::from(selection.index());
        if let Err(e) = Reflect::set(&self.instance, &"currentLevel".into(), &level) {
            web_sys::console::error_1(&e);
        }
    }

    fn destroy(&mut self) {
        self.invoke("destroy", &Array::new());
        self.destroyed = true;
    }
}

impl Drop for JsEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}
