//! Drag-and-drop status changes.

use serde::{Deserialize, Serialize};

use crate::types::{StatusKey, TaskId, TaskStatus, TaskUpdate};

use super::sources::TaskSources;

/// A completed drag gesture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragEnd {
    /// Id of the dragged board item
    pub item_id: String,
    /// Status key of the column the item was dropped on, if any
    pub destination: Option<String>,
}

impl DragEnd {
    pub fn new(item_id: impl Into<String>, destination: Option<&str>) -> Self {
        Self {
            item_id: item_id.into(),
            destination: destination.map(str::to_string),
        }
    }
}

/// What a drag resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// Nothing to do
    Ignored(DragIgnored),
    /// Move the task to `status`, carrying the full update payload
    Move {
        task: TaskId,
        status: TaskStatus,
        update: TaskUpdate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragIgnored {
    /// Dropped outside any column
    NoDestination,
    /// Dropped on something that is not one of the fixed columns
    UnknownDestination,
    /// The item is not an owned task (shared-only or gone)
    UnknownTask,
    /// Dropped on the column it already sits in
    SameStatus,
}

/// Resolve a drag against the current sources. Pure.
pub fn resolve_drag(drag: &DragEnd, sources: &TaskSources) -> DragOutcome {
    let Some(destination) = drag.destination.as_deref() else {
        return DragOutcome::Ignored(DragIgnored::NoDestination);
    };
    let Some(status) = StatusKey::parse(destination).known() else {
        return DragOutcome::Ignored(DragIgnored::UnknownDestination);
    };
    let Some(task) = sources.task(&drag.item_id) else {
        return DragOutcome::Ignored(DragIgnored::UnknownTask);
    };
    if task.status == status {
        return DragOutcome::Ignored(DragIgnored::SameStatus);
    }

    DragOutcome::Move {
        task: task.id.clone(),
        status,
        update: TaskUpdate {
            title: Some(task.title.clone()),
            description: task.description.clone(),
            status: Some(status),
            parent_workspace_id: task.parent_workspace_id.clone(),
        },
    }
}
