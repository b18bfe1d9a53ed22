//! Secondary view mode of an open local task.

use serde::{Deserialize, Serialize};

use crate::error::TaskboardError;

use super::selection::Selection;

/// Query value still found in old addresses; it now means `diffs`
pub const LEGACY_LOGS_VIEW: &str = "logs";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Closed,
    Preview,
    Diffs,
    Spike,
}

enum_display_fromstr!(
    ViewMode,
    TaskboardError::InvalidViewMode,
    {
        Closed => "closed",
        Preview => "preview",
        Diffs => "diffs",
        Spike => "spike",
    }
);

/// Direction of a view-mode cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleDirection {
    Forward,
    Backward,
}

impl ViewMode {
    /// Cycle order
    pub const ORDER: [ViewMode; 4] = [
        ViewMode::Closed,
        ViewMode::Preview,
        ViewMode::Diffs,
        ViewMode::Spike,
    ];

    fn position(self) -> usize {
        match self {
            ViewMode::Closed => 0,
            ViewMode::Preview => 1,
            ViewMode::Diffs => 2,
            ViewMode::Spike => 3,
        }
    }

    pub fn cycled(self, direction: CycleDirection) -> ViewMode {
        let len = Self::ORDER.len();
        let idx = match direction {
            CycleDirection::Forward => (self.position() + 1) % len,
            CycleDirection::Backward => (self.position() + len - 1) % len,
        };
        Self::ORDER[idx]
    }

    /// Value of the `view` query key; `Closed` has none
    pub fn query_value(self) -> Option<&'static str> {
        match self {
            ViewMode::Closed => None,
            ViewMode::Preview => Some("preview"),
            ViewMode::Diffs => Some("diffs"),
            ViewMode::Spike => Some("spike"),
        }
    }

    /// Read the `view` query value. Anything unrecognized is `Closed`.
    pub fn from_query(value: Option<&str>) -> ViewMode {
        match value {
            Some("preview") => ViewMode::Preview,
            Some("diffs") => ViewMode::Diffs,
            Some("spike") => ViewMode::Spike,
            _ => ViewMode::Closed,
        }
    }

    /// Analytics event name announcing a switch to this mode
    pub fn navigated_event(self) -> Option<&'static str> {
        match self {
            ViewMode::Closed => None,
            ViewMode::Preview => Some("preview_navigated"),
            ViewMode::Diffs => Some("diffs_navigated"),
            ViewMode::Spike => Some("spike_navigated"),
        }
    }
}

/// Stored mode plus the guard that derives the effective one.
///
/// The stored mode survives selecting a shared task, so switching back to a
/// local task shows the same mode again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewModeState {
    stored: ViewMode,
}

impl ViewModeState {
    pub fn new(stored: ViewMode) -> Self {
        Self { stored }
    }

    pub fn stored(&self) -> ViewMode {
        self.stored
    }

    pub fn set(&mut self, mode: ViewMode) {
        self.stored = mode;
    }

    /// Mode actually rendered. Only a local selection has mode surfaces.
    pub fn effective(&self, selection: &Selection) -> ViewMode {
        match selection {
            Selection::Local(_) => self.stored,
            Selection::Idle | Selection::Shared(_) => ViewMode::Closed,
        }
    }

    /// Next mode when cycling from what is currently rendered
    pub fn cycle_target(&self, selection: &Selection, direction: CycleDirection) -> ViewMode {
        self.effective(selection).cycled(direction)
    }
}
