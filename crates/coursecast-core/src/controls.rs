//! Controls visibility timer
//!
//! A single re-armable countdown decides when the control overlay hides.
//! The timer only reads playback/hover/popover state and only writes
//! visibility; hosts call [`ControlsTimer::poll`] when the deadline passes.

use std::time::Duration;
use tracing::debug;

/// Monotonic time source, measured from an arbitrary origin
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Clock backed by `std::time::Instant`
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// State the visibility rules depend on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityInputs {
    pub playing: bool,
    pub hovering: bool,
    pub popover_open: bool,
}

impl VisibilityInputs {
    /// Controls must stay up regardless of the countdown
    pub fn forces_visible(&self) -> bool {
        !self.playing || self.hovering || self.popover_open
    }
}

#[derive(Debug, Clone)]
pub struct ControlsTimer {
    grace: Duration,
    deadline: Option<Duration>,
    visible: bool,
}

impl ControlsTimer {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            deadline: None,
            visible: true,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// When the pending hide fires, if one is armed
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Replace any pending countdown with a fresh one
    fn arm(&mut self, now: Duration) {
        self.deadline = Some(now + self.grace);
    }

    /// Drop the pending countdown without touching visibility
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Re-evaluate after a state change (play/pause, hover, popover)
    pub fn reconcile(&mut self, inputs: VisibilityInputs, now: Duration) {
        if inputs.forces_visible() {
            self.visible = true;
            self.deadline = None;
        } else if self.visible && self.deadline.is_none() {
            self.arm(now);
        }
    }

    /// A qualifying interaction: pointer movement, drag start, button press
    pub fn interact(&mut self, inputs: VisibilityInputs, now: Duration) {
        self.visible = true;
        self.deadline = None;
        if !inputs.forces_visible() {
            self.arm(now);
        }
    }

    /// Hide the controls if the countdown has elapsed. Returns true when
    /// visibility changed.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.visible = false;
                debug!("Controls hidden");
                true
            }
            _ => false,
        }
    }

    /// Back to the initial state: visible, nothing armed
    pub fn reset(&mut self) {
        self.visible = true;
        self.deadline = None;
    }
}
