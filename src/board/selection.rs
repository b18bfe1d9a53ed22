//! Selection state machine and keyboard navigation over visible columns.

use serde::Serialize;

use crate::types::{SharedTaskId, StatusKey, TaskId, TaskStatus, UserId};

use super::partition::Columns;
use super::sources::TaskSources;

/// What is open. Local and shared selections exclude each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Selection {
    #[default]
    Idle,
    Local(TaskId),
    Shared(SharedTaskId),
}

impl Selection {
    pub fn local(&self) -> Option<&TaskId> {
        match self {
            Selection::Local(id) => Some(id),
            _ => None,
        }
    }

    pub fn shared(&self) -> Option<&SharedTaskId> {
        match self {
            Selection::Shared(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Selection::Idle)
    }
}

/// Arrow-key direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Resolve a navigation keypress to the local task that should be selected.
///
/// Only local items take part. Without a resolvable local selection the
/// first task of the first non-empty fixed column is chosen, whatever the
/// direction. Returns `None` when nothing should change.
pub fn navigation_target(
    selection: &Selection,
    sources: &TaskSources,
    columns: &Columns,
    direction: NavDirection,
) -> Option<TaskId> {
    let Some(current) = selection.local().and_then(|id| sources.task(id)) else {
        return first_local_task(columns, &TaskStatus::ALL);
    };

    match direction {
        NavDirection::Up | NavDirection::Down => {
            let column = columns.get(&current.status)?;
            let tasks: Vec<&TaskId> = column.local_tasks().map(|t| &t.id).collect();
            let idx = tasks.iter().position(|id| **id == current.id)?;
            let target = match direction {
                NavDirection::Up => idx.checked_sub(1)?,
                _ => idx + 1,
            };
            tasks.get(target).map(|id| (*id).clone())
        }
        NavDirection::Left | NavDirection::Right => {
            let order = scan_order(&current.status, direction);
            first_local_task(columns, &order)
        }
    }
}

/// Fixed statuses to scan from the current one, nearest first
fn scan_order(current: &StatusKey, direction: NavDirection) -> Vec<TaskStatus> {
    match (current.known(), direction) {
        (Some(status), NavDirection::Right) => TaskStatus::ALL[status.index() + 1..].to_vec(),
        (Some(status), _) => TaskStatus::ALL[..status.index()]
            .iter()
            .rev()
            .copied()
            .collect(),
        // Outside the fixed order: everything is to the right, nothing to the left
        (None, NavDirection::Right) => TaskStatus::ALL.to_vec(),
        (None, _) => Vec::new(),
    }
}

fn first_local_task(columns: &Columns, order: &[TaskStatus]) -> Option<TaskId> {
    order
        .iter()
        .find_map(|status| columns.fixed(*status).local_tasks().next())
        .map(|task| task.id.clone())
}

/// Whether an open shared selection must be dropped.
///
/// With assigned-elsewhere shared tasks hidden, only a shared task assigned
/// to the current user may stay selected.
pub fn should_clear_shared(
    selection: &Selection,
    show_shared: bool,
    sources: &TaskSources,
    current_user: Option<&UserId>,
) -> bool {
    if show_shared {
        return false;
    }
    let Some(id) = selection.shared() else {
        return false;
    };
    !sources
        .shared_task(id)
        .is_some_and(|shared| shared.is_assigned_to(current_user))
}
