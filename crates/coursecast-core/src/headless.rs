//! Headless HLS engine
//!
//! A streaming engine for native hosts with no decoder: it fetches and
//! parses the master playlist, reports the rendition ladder, and confirms
//! level changes immediately. Events go back to the driver through a
//! [`WeakPlayerHandle`], tagged with the session the engine was built for.

use crate::{
    driver::{PlayerHandle, WeakPlayerHandle},
    engine::{EngineConfig, EngineEvent, EngineFactory, StreamingEngine},
    error::EngineErrorKind,
    manifest::{ManifestFetcher, ManifestSource},
    Error, PlayerConfig, QualitySelection, Result, SessionId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Manifest request timeout
pub const MANIFEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds [`HeadlessEngine`] instances sharing one manifest source
#[derive(Clone)]
pub struct HeadlessEngineFactory {
    source: Arc<dyn ManifestSource>,
    events: WeakPlayerHandle,
}

impl HeadlessEngineFactory {
    pub fn new(source: Arc<dyn ManifestSource>, events: &PlayerHandle) -> Self {
        Self {
            source,
            events: events.downgrade(),
        }
    }

    /// Factory fetching manifests over HTTP with the player's credentials
    /// policy
    pub fn http(config: &PlayerConfig, events: &PlayerHandle) -> Result<Self> {
        let fetcher = ManifestFetcher::new(config.with_credentials, MANIFEST_TIMEOUT)?;
        Ok(Self::new(Arc::new(fetcher), events))
    }
}

impl EngineFactory for HeadlessEngineFactory {
    fn is_supported(&self) -> bool {
        true
    }

    fn create(&mut self, config: &EngineConfig) -> Result<Box<dyn StreamingEngine>> {
        debug!(
            session_id = %config.session,
            with_credentials = config.with_credentials,
            "Creating headless engine"
        );
        Ok(Box::new(HeadlessEngine {
            session: config.session,
            source: Arc::clone(&self.source),
            events: self.events.clone(),
            fetch: None,
            destroyed: false,
        }))
    }
}

pub struct HeadlessEngine {
    session: SessionId,
    source: Arc<dyn ManifestSource>,
    events: WeakPlayerHandle,
    fetch: Option<JoinHandle<()>>,
    destroyed: bool,
}

impl HeadlessEngine {
    fn abort_fetch(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            fetch.abort();
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.events.engine_event(self.session, event) {
            debug!(error = %e, "Engine event dropped");
        }
    }
}

impl StreamingEngine for HeadlessEngine {
    fn attach_media(&mut self) {
        debug!("Headless engine has no media element to attach");
    }

    fn load_source(&mut self, url: &Url) {
        if self.destroyed {
            return;
        }
        self.abort_fetch();

        let source = Arc::clone(&self.source);
        let events = self.events.clone();
        let session = self.session;
        let url = url.clone();
        self.fetch = Some(tokio::spawn(async move {
            let event = match source.load(&url).await {
                Ok(levels) => {
                    info!(url = %url, levels = levels.len(), "Manifest loaded");
                    EngineEvent::ManifestParsed { levels }
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Manifest load failed");
                    EngineEvent::Error {
                        kind: error_kind(&e),
                        details: e.to_string(),
                        fatal: true,
                    }
                }
            };
            if let Err(e) = events.engine_event(session, event) {
                debug!(error = %e, "Manifest result dropped");
            }
        }));
    }

    fn set_current_level(&mut self, selection: QualitySelection) {
        if self.destroyed {
            return;
        }
        if let QualitySelection::Level(level) = selection {
            // Nothing to buffer, so the switch completes at once
            self.emit(EngineEvent::LevelSwitched { level });
        }
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.abort_fetch();
        debug!("Headless engine destroyed");
    }
}

impl Drop for HeadlessEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn error_kind(error: &Error) -> EngineErrorKind {
    match error {
        Error::ManifestParse(_) => EngineErrorKind::Media,
        _ => EngineErrorKind::Network,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::PlayerDriver;
    use crate::testing::{FakeMedia, FakeSurface};
    use crate::QualityRendition;
    use async_trait::async_trait;

    struct StaticSource(Vec<QualityRendition>);

    #[async_trait]
    impl ManifestSource for StaticSource {
        async fn load(&self, _url: &Url) -> Result<Vec<QualityRendition>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_manifest_reported_as_event() {
        let (handle, mut inbox) = PlayerDriver::<FakeMedia, FakeSurface>::channel();
        let source = StaticSource(vec![QualityRendition::new(1280, 720, 2_500_000)]);
        let mut factory = HeadlessEngineFactory::new(Arc::new(source), &handle);

        let session = SessionId::new();
        let mut engine = factory
            .create(&EngineConfig::new(&PlayerConfig::default(), session))
            .unwrap();
        engine.load_source(&Url::parse("http://localhost:5000/api/hls/stream/abc").unwrap());

        match inbox.recv().await {
            Some(crate::PlayerMessage::Engine {
                session: from,
                event: EngineEvent::ManifestParsed { levels },
            }) => {
                assert_eq!(from, session);
                assert_eq!(levels.len(), 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
