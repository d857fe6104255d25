//! Async driver for native hosts
//!
//! Owns a [`LessonPlayer`] on a single task, serializes every command and
//! event through one channel, fires the controls countdown with
//! `sleep_until`, and publishes a fresh [`PlayerView`] after each step.

use crate::{
    controls::Clock,
    engine::{EngineEvent, EngineFactory},
    fullscreen::FullscreenSurface,
    media::{MediaElement, MediaEvent},
    player::{LessonPlayer, PlayerView},
    EmbedOptions, Error, PlayerConfig, QualitySelection, Result, SessionId,
};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Everything a host or engine can tell the player
#[derive(Debug, Clone)]
pub enum PlayerMessage {
    Load {
        lesson_id: String,
        options: EmbedOptions,
    },
    Retry,
    Unmount,
    Play,
    Pause,
    TogglePlay,
    PlayRejected(String),
    Seek(f64),
    SetVolume(f64),
    ToggleMute,
    SelectQuality(QualitySelection),
    ToggleFullscreen,
    FullscreenChanged(bool),
    FullscreenRejected(String),
    PointerMoved,
    Hover(bool),
    VolumePopover(bool),
    SeekDragStarted,
    VolumeDragStarted,
    Engine {
        session: SessionId,
        event: EngineEvent,
    },
    Media(MediaEvent),
    Shutdown,
}

/// Cloneable sender into a running driver
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<PlayerMessage>,
}

impl PlayerHandle {
    pub fn send(&self, message: PlayerMessage) -> Result<()> {
        self.tx.send(message).map_err(|_| Error::DriverClosed)
    }

    pub fn load(&self, lesson_id: impl Into<String>, options: EmbedOptions) -> Result<()> {
        self.send(PlayerMessage::Load {
            lesson_id: lesson_id.into(),
            options,
        })
    }

    pub fn engine_event(&self, session: SessionId, event: EngineEvent) -> Result<()> {
        self.send(PlayerMessage::Engine { session, event })
    }

    pub fn media_event(&self, event: MediaEvent) -> Result<()> {
        self.send(PlayerMessage::Media(event))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(PlayerMessage::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Sender that does not keep the driver running
    pub fn downgrade(&self) -> WeakPlayerHandle {
        WeakPlayerHandle {
            tx: self.tx.downgrade(),
        }
    }
}

/// Handle held by engines. Once every [`PlayerHandle`] is gone the driver
/// stops and sends through this fail with [`Error::DriverClosed`].
#[derive(Debug, Clone)]
pub struct WeakPlayerHandle {
    tx: mpsc::WeakUnboundedSender<PlayerMessage>,
}

impl WeakPlayerHandle {
    pub fn upgrade(&self) -> Option<PlayerHandle> {
        self.tx.upgrade().map(|tx| PlayerHandle { tx })
    }

    pub fn engine_event(&self, session: SessionId, event: EngineEvent) -> Result<()> {
        self.upgrade()
            .ok_or(Error::DriverClosed)?
            .engine_event(session, event)
    }
}

/// Receiving half created by [`PlayerDriver::channel`]
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<PlayerMessage>,
}

impl Inbox {
    pub async fn recv(&mut self) -> Option<PlayerMessage> {
        self.rx.recv().await
    }
}

/// Clock on tokio's time source, so paused test time applies
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Instant corresponding to `offset` on this clock
    pub fn instant_at(&self, offset: Duration) -> Instant {
        self.origin + offset
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

pub struct PlayerDriver<M, S> {
    player: LessonPlayer<M, S>,
    inbox: Inbox,
    clock: TokioClock,
    view_tx: watch::Sender<PlayerView>,
}

impl<M: MediaElement, S: FullscreenSurface> PlayerDriver<M, S> {
    /// Create the message channel. The handle can be given to engine
    /// factories before the driver exists.
    pub fn channel() -> (PlayerHandle, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PlayerHandle { tx }, Inbox { rx })
    }

    pub fn new(
        config: PlayerConfig,
        engines: Box<dyn EngineFactory>,
        media: M,
        surface: S,
        inbox: Inbox,
    ) -> Self {
        let clock = TokioClock::new();
        let player = LessonPlayer::new(config, engines, media, surface, Box::new(clock));
        let (view_tx, _) = watch::channel(player.view());
        Self {
            player,
            inbox,
            clock,
            view_tx,
        }
    }

    /// Subscribe to view updates
    pub fn subscribe(&self) -> watch::Receiver<PlayerView> {
        self.view_tx.subscribe()
    }

    pub fn player(&self) -> &LessonPlayer<M, S> {
        &self.player
    }

    /// Process messages until shutdown or until every [`PlayerHandle`] is
    /// dropped. Engines only hold a [`WeakPlayerHandle`], so they never keep
    /// the loop alive. The engine is disposed on the way out.
    pub async fn run(mut self) {
        info!("Player driver started");
        self.publish();

        loop {
            let deadline = self
                .player
                .controls_deadline()
                .map(|offset| self.clock.instant_at(offset));

            tokio::select! {
                message = self.inbox.recv() => match message {
                    Some(PlayerMessage::Shutdown) | None => break,
                    Some(message) => self.dispatch(message),
                },
                _ = sleep_until_deadline(deadline) => {
                    self.player.tick();
                }
            }

            self.publish();
        }

        self.player.unmount();
        self.publish();
        info!("Player driver stopped");
    }

    fn dispatch(&mut self, message: PlayerMessage) {
        debug!(?message, "Dispatching");
        let result = match message {
            PlayerMessage::Load { lesson_id, options } => {
                self.player.load_lesson(&lesson_id, options)
            }
            PlayerMessage::Retry => self.player.retry(),
            PlayerMessage::Unmount => {
                self.player.unmount();
                Ok(())
            }
            PlayerMessage::Play => {
                self.player.play();
                Ok(())
            }
            PlayerMessage::Pause => {
                self.player.pause();
                Ok(())
            }
            PlayerMessage::TogglePlay => {
                self.player.toggle_play();
                Ok(())
            }
            PlayerMessage::PlayRejected(reason) => {
                self.player.report_play_rejected(&reason);
                Ok(())
            }
            PlayerMessage::Seek(percent) => {
                self.player.seek_to_percent(percent);
                Ok(())
            }
            PlayerMessage::SetVolume(volume) => {
                self.player.set_volume(volume);
                Ok(())
            }
            PlayerMessage::ToggleMute => {
                self.player.toggle_mute();
                Ok(())
            }
            PlayerMessage::SelectQuality(selection) => self.player.select_quality(selection),
            PlayerMessage::ToggleFullscreen => {
                self.player.toggle_fullscreen();
                Ok(())
            }
            PlayerMessage::FullscreenChanged(active) => {
                self.player.handle_fullscreen_change(active);
                Ok(())
            }
            PlayerMessage::FullscreenRejected(reason) => {
                self.player.handle_fullscreen_rejected(&reason);
                Ok(())
            }
            PlayerMessage::PointerMoved => {
                self.player.pointer_moved();
                Ok(())
            }
            PlayerMessage::Hover(hovering) => {
                self.player.set_hovering(hovering);
                Ok(())
            }
            PlayerMessage::VolumePopover(open) => {
                self.player.set_volume_popover(open);
                Ok(())
            }
            PlayerMessage::SeekDragStarted => {
                self.player.begin_seek_drag();
                Ok(())
            }
            PlayerMessage::VolumeDragStarted => {
                self.player.begin_volume_drag();
                Ok(())
            }
            PlayerMessage::Engine { session, event } => {
                self.player.handle_engine_event(session, event);
                Ok(())
            }
            PlayerMessage::Media(event) => {
                self.player.handle_media_event(event);
                Ok(())
            }
            PlayerMessage::Shutdown => Ok(()),
        };

        if let Err(e) = result {
            warn!(code = e.error_code(), error = %e, "Player command failed");
        }
    }

    fn publish(&self) {
        let view = self.player.view();
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
