//! Side effects the controller asks its runtime to perform.
//!
//! The controller never talks to the store or the user directly. It returns
//! [`Effect`]s and receives their outcomes back as events.

use jiff::Timestamp;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::types::{AttemptId, TaskId, TaskUpdate};

use super::prompts::{PromptId, PromptKind};
use super::view_mode::CycleDirection;

/// Identifier correlating a mutation with its outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RequestId(pub u64);

/// Identifier of one latest-attempt or attempt lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(pub u64);

#[derive(Debug, Clone)]
pub enum Effect {
    UpdateTaskStatus {
        request: RequestId,
        task: TaskId,
        update: TaskUpdate,
    },
    UpdateTaskDescription {
        request: RequestId,
        task: TaskId,
        description: String,
    },
    ResolveLatestAttempt {
        generation: Generation,
        task: TaskId,
    },
    LoadAttempt {
        generation: Generation,
        attempt: AttemptId,
    },
    CountWorkspaces,
    ShowPrompt {
        id: PromptId,
        kind: PromptKind,
        token: CancellationToken,
    },
    Analytics(AnalyticsEvent),
    OpenCreateTask,
    FocusSearch,
    DeleteTask(TaskId),
}

impl Effect {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Effect::UpdateTaskStatus { .. } => "update_task_status",
            Effect::UpdateTaskDescription { .. } => "update_task_description",
            Effect::ResolveLatestAttempt { .. } => "resolve_latest_attempt",
            Effect::LoadAttempt { .. } => "load_attempt",
            Effect::CountWorkspaces => "count_workspaces",
            Effect::ShowPrompt { .. } => "show_prompt",
            Effect::Analytics(_) => "analytics",
            Effect::OpenCreateTask => "open_create_task",
            Effect::FocusSearch => "focus_search",
            Effect::DeleteTask(_) => "delete_task",
        }
    }
}

/// How an analytics event was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Keyboard,
}

/// An observability event naming a view-mode switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub trigger: Trigger,
    pub direction: CycleDirection,
    pub timestamp: Timestamp,
    pub source: String,
}

impl AnalyticsEvent {
    pub const SOURCE: &'static str = "taskboard";

    pub fn keyboard(name: &str, direction: CycleDirection, timestamp: Timestamp) -> Self {
        Self {
            name: name.to_string(),
            trigger: Trigger::Keyboard,
            direction,
            timestamp,
            source: Self::SOURCE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analytics_event_serializes_flat() {
        let event = AnalyticsEvent::keyboard(
            "diffs_navigated",
            CycleDirection::Backward,
            Timestamp::UNIX_EPOCH,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], "diffs_navigated");
        assert_eq!(json["trigger"], "keyboard");
        assert_eq!(json["direction"], "backward");
        assert_eq!(json["source"], "taskboard");
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");
    }
}
