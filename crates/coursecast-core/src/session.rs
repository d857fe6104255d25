//! Playback Session - one viewing of one lesson
//!
//! Owns the single engine instance bound to the player surface. A new
//! lesson always gets a new session; sessions are never re-pointed.

use crate::{
    engine::{EngineConfig, EngineFactory, StreamingEngine},
    manifest::manifest_url,
    Error, LessonId, PlayerConfig, QualitySelection, Result, SessionId,
};
use tracing::{debug, info, instrument};
use url::Url;

/// Player session for a single lesson
pub struct PlaybackSession {
    /// Unique session ID
    id: SessionId,
    /// Lesson being played
    lesson_id: LessonId,
    /// Manifest URL derived from the lesson
    manifest_url: Url,
    /// Engine instance; `None` once disposed
    engine: Option<Box<dyn StreamingEngine>>,
}

impl PlaybackSession {
    /// Build the manifest URL, construct an engine and start loading.
    ///
    /// Fails before any engine is created when the platform cannot stream.
    #[instrument(skip_all, fields(lesson_id = %lesson_id))]
    pub fn open(
        lesson_id: LessonId,
        config: &PlayerConfig,
        factory: &mut dyn EngineFactory,
    ) -> Result<Self> {
        if !factory.is_supported() {
            return Err(Error::UnsupportedPlatform);
        }

        let manifest_url = manifest_url(&config.api_base, config.manifest_route, &lesson_id)?;
        let id = SessionId::new();
        let mut engine = factory.create(&EngineConfig::new(config, id))?;
        engine.attach_media();
        engine.load_source(&manifest_url);

        info!(session_id = %id, url = %manifest_url, "Session opened");

        Ok(Self {
            id,
            lesson_id,
            manifest_url,
            engine: Some(engine),
        })
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn lesson_id(&self) -> &LessonId {
        &self.lesson_id
    }

    pub fn manifest_url(&self) -> &Url {
        &self.manifest_url
    }

    /// Whether the engine is still alive
    pub fn is_active(&self) -> bool {
        self.engine.is_some()
    }

    /// Forward a level change to the engine
    pub fn set_level(&mut self, selection: QualitySelection) {
        match self.engine.as_mut() {
            Some(engine) => {
                debug!(session_id = %self.id, level = selection.index(), "Setting engine level");
                engine.set_current_level(selection);
            }
            None => debug!(session_id = %self.id, "Level change on disposed session"),
        }
    }

    /// Destroy the engine. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
            info!(session_id = %self.id, lesson_id = %self.lesson_id, "Session disposed");
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("lesson_id", &self.lesson_id)
            .field("manifest_url", &self.manifest_url.as_str())
            .field("active", &self.is_active())
            .finish()
    }
}
