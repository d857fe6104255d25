//! Adaptive quality controller
//!
//! Holds the rendition ladder and reconciles user selections with what the
//! engine actually switched to. The displayed level is always the confirmed
//! one, never the requested one.

use crate::{Error, QualityRendition, QualitySelection, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One entry of the quality selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityOption {
    /// Engine level index, `-1` for automatic
    pub index: i32,
    pub label: String,
    pub selected: bool,
}

/// How a selection has to be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchRequest {
    /// Applied immediately; no confirmation event is expected
    Immediate,
    /// Wait for the engine's `level-switched` to confirm
    AwaitConfirmation,
}

#[derive(Debug, Clone, Default)]
pub struct QualityController {
    renditions: Vec<QualityRendition>,
    /// Displayed selection: `Auto`, or the last confirmed manual level
    current: QualitySelection,
    /// Level the engine last reported switching to
    active_level: Option<usize>,
    /// Manual request awaiting confirmation
    pending: Option<usize>,
}

impl QualityController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the ladder from a parsed manifest and return to automatic mode
    pub fn set_renditions(&mut self, renditions: Vec<QualityRendition>) {
        debug!(count = renditions.len(), "Renditions available");
        self.renditions = renditions;
        self.current = QualitySelection::Auto;
        self.active_level = None;
        self.pending = None;
    }

    pub fn renditions(&self) -> &[QualityRendition] {
        &self.renditions
    }

    /// Displayed level index, `-1` in automatic mode
    pub fn current_level_index(&self) -> i32 {
        self.current.index()
    }

    pub fn current(&self) -> QualitySelection {
        self.current
    }

    pub fn active_level(&self) -> Option<usize> {
        self.active_level
    }

    pub fn active_rendition(&self) -> Option<&QualityRendition> {
        self.active_level.and_then(|level| self.renditions.get(level))
    }

    pub fn is_switching(&self) -> bool {
        self.pending.is_some()
    }

    /// A selector with one or zero options is not worth showing
    pub fn show_selector(&self) -> bool {
        self.renditions.len() > 1
    }

    /// Record a user selection and tell the caller how to apply it
    pub fn request(&mut self, selection: QualitySelection) -> Result<SwitchRequest> {
        match selection {
            QualitySelection::Auto => {
                self.current = QualitySelection::Auto;
                self.pending = None;
                Ok(SwitchRequest::Immediate)
            }
            QualitySelection::Level(level) => {
                if level >= self.renditions.len() {
                    return Err(Error::InvalidQualityLevel {
                        index: level,
                        available: self.renditions.len(),
                    });
                }
                if self.pending.is_none() && self.active_level == Some(level) {
                    self.current = selection;
                    return Ok(SwitchRequest::Immediate);
                }
                self.pending = Some(level);
                Ok(SwitchRequest::AwaitConfirmation)
            }
        }
    }

    /// Engine reported a completed switch. Returns true when this resolved a
    /// pending manual request.
    pub fn confirm(&mut self, level: usize) -> bool {
        if level >= self.renditions.len() {
            warn!(level, available = self.renditions.len(), "Engine switched to unknown level");
        }
        self.active_level = Some(level);

        match self.pending.take() {
            Some(requested) => {
                if requested != level {
                    debug!(requested, confirmed = level, "Engine confirmed a different level");
                }
                self.current = QualitySelection::Level(level);
                true
            }
            None => {
                if !self.current.is_auto() {
                    self.current = QualitySelection::Level(level);
                }
                false
            }
        }
    }

    /// Selector entries: `Auto` followed by every rendition
    pub fn options(&self) -> Vec<QualityOption> {
        let auto_label = match self.active_rendition() {
            Some(active) if self.current.is_auto() => format!("Auto ({}p)", active.height),
            _ => "Auto".to_string(),
        };

        std::iter::once(QualityOption {
            index: QualitySelection::AUTO_INDEX,
            label: auto_label,
            selected: self.current.is_auto(),
        })
        .chain(self.renditions.iter().enumerate().map(|(i, rendition)| QualityOption {
            index: i as i32,
            label: rendition.label(),
            selected: self.current == QualitySelection::Level(i),
        }))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> Vec<QualityRendition> {
        vec![
            QualityRendition::new(640, 360, 800_000),
            QualityRendition::new(854, 480, 1_400_000),
            QualityRendition::new(1280, 720, 2_800_000),
        ]
    }

    fn controller() -> QualityController {
        let mut controller = QualityController::new();
        controller.set_renditions(ladder());
        controller
    }

    #[test]
    fn test_defaults_to_auto() {
        let controller = controller();
        assert_eq!(controller.current_level_index(), -1);
        let options = controller.options();
        assert_eq!(options.len(), 4);
        assert_eq!(options[0].label, "Auto");
        assert!(options[0].selected);
        assert_eq!(options[3].label, "720p • 2.8 Mbps");
    }

    #[test]
    fn test_displayed_level_is_confirmed_level() {
        let mut controller = controller();
        assert_eq!(
            controller.request(QualitySelection::Level(2)).unwrap(),
            SwitchRequest::AwaitConfirmation
        );
        assert!(controller.is_switching());
        assert_eq!(controller.current_level_index(), -1);

        // Engine downgrades for buffering reasons
        assert!(controller.confirm(1));
        assert_eq!(controller.current_level_index(), 1);
        assert!(!controller.is_switching());
    }

    #[test]
    fn test_auto_switches_stay_in_auto() {
        let mut controller = controller();
        assert!(!controller.confirm(2));
        assert_eq!(controller.current_level_index(), -1);
        assert_eq!(controller.active_level(), Some(2));
        assert_eq!(controller.options()[0].label, "Auto (720p)");
    }

    #[test]
    fn test_auto_selectable_after_manual() {
        let mut controller = controller();
        controller.request(QualitySelection::Level(0)).unwrap();
        controller.confirm(0);
        assert_eq!(controller.current_level_index(), 0);

        assert_eq!(
            controller.request(QualitySelection::Auto).unwrap(),
            SwitchRequest::Immediate
        );
        assert_eq!(controller.current_level_index(), -1);
    }

    #[test]
    fn test_selecting_active_level_is_immediate() {
        let mut controller = controller();
        controller.confirm(1);
        assert_eq!(
            controller.request(QualitySelection::Level(1)).unwrap(),
            SwitchRequest::Immediate
        );
        assert_eq!(controller.current_level_index(), 1);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut controller = controller();
        assert!(matches!(
            controller.request(QualitySelection::Level(3)),
            Err(Error::InvalidQualityLevel { index: 3, available: 3 })
        ));
        assert!(!controller.is_switching());
    }

    #[test]
    fn test_selector_hidden_for_single_rendition() {
        let mut controller = QualityController::new();
        assert!(!controller.show_selector());
        controller.set_renditions(vec![QualityRendition::new(1280, 720, 2_000_000)]);
        assert!(!controller.show_selector());
        controller.set_renditions(ladder());
        assert!(controller.show_selector());
    }
}
