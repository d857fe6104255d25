//! Fullscreen lifecycle

use crate::Result;
use tracing::debug;

/// The player's container element. Fullscreen is requested here rather than
/// on the media element so the custom controls stay on screen.
pub trait FullscreenSurface {
    fn request_fullscreen(&mut self) -> Result<()>;

    fn exit_fullscreen(&mut self) -> Result<()>;
}

/// Displayed fullscreen flag.
///
/// A successful request sets it, but the platform's change notification
/// always has the last word: users can leave fullscreen through browser UI.
/// Browsers may also refuse a request after accepting the call, which
/// [`FullscreenState::on_rejected`] rolls back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullscreenState {
    active: bool,
    /// Flag before the last request, until the platform settles it
    before_request: Option<bool>,
}

impl FullscreenState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Enter or leave fullscreen. On failure the flag is left untouched and
    /// the error is returned for the caller to log.
    pub fn toggle<S: FullscreenSurface + ?Sized>(&mut self, surface: &mut S) -> Result<bool> {
        let before = self.active;
        if self.active {
            surface.exit_fullscreen()?;
            self.active = false;
        } else {
            surface.request_fullscreen()?;
            self.active = true;
        }
        self.before_request = Some(before);
        debug!(active = self.active, "Fullscreen toggled");
        Ok(self.active)
    }

    /// Platform `fullscreenchange` notification
    pub fn on_change(&mut self, active: bool) {
        if self.active != active {
            debug!(active, "Fullscreen changed by platform");
        }
        self.active = active;
        self.before_request = None;
    }

    /// Platform `fullscreenerror` notification: the last request was
    /// refused, so the flag goes back to what it was before it
    pub fn on_rejected(&mut self) {
        if let Some(before) = self.before_request.take() {
            debug!(active = before, "Fullscreen request rejected by platform");
            self.active = before;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct Surface {
        allow: bool,
    }

    impl FullscreenSurface for Surface {
        fn request_fullscreen(&mut self) -> Result<()> {
            if self.allow {
                Ok(())
            } else {
                Err(Error::Fullscreen("permission denied".into()))
            }
        }

        fn exit_fullscreen(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_toggle_and_platform_exit() {
        let mut state = FullscreenState::default();
        let mut surface = Surface { allow: true };
        assert!(state.toggle(&mut surface).unwrap());
        assert!(state.is_active());

        // Esc pressed: only the platform notification arrives
        state.on_change(false);
        assert!(!state.is_active());
    }

    #[test]
    fn test_failed_request_keeps_state() {
        let mut state = FullscreenState::default();
        let mut surface = Surface { allow: false };
        assert!(state.toggle(&mut surface).is_err());
        assert!(!state.is_active());
    }

    #[test]
    fn test_late_rejection_restores_flag() {
        let mut state = FullscreenState::default();
        let mut surface = Surface { allow: true };
        assert!(state.toggle(&mut surface).unwrap());

        state.on_rejected();
        assert!(!state.is_active());

        // Nothing pending: a stray rejection changes nothing
        state.on_change(true);
        state.on_rejected();
        assert!(state.is_active());
    }
}
