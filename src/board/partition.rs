//! Column partitioning: sources + search + visibility policy -> columns.

use std::cmp::Ordering;

use jiff::Timestamp;
use serde::Serialize;

use crate::types::{SharedTask, StatusKey, Task, TaskStatus, UserId};

use super::sources::TaskSources;

/// A unit displayed in a kanban column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BoardItem {
    /// An owned task, with its shared counterpart attached when linked
    Local {
        task: Task,
        #[serde(skip_serializing_if = "Option::is_none")]
        linked_shared: Option<SharedTask>,
    },
    /// A shared task with no local counterpart
    Shared { task: SharedTask },
}

impl BoardItem {
    pub fn id(&self) -> &str {
        match self {
            BoardItem::Local { task, .. } => task.id.as_str(),
            BoardItem::Shared { task } => task.id.as_str(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            BoardItem::Local { task, .. } => &task.title,
            BoardItem::Shared { task } => &task.title,
        }
    }

    pub fn created_at(&self) -> Timestamp {
        match self {
            BoardItem::Local { task, .. } => task.created_at,
            BoardItem::Shared { task } => task.created_at,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            BoardItem::Local { task, .. } => task.description.as_deref(),
            BoardItem::Shared { task } => task.description.as_deref(),
        }
    }

    pub fn as_local(&self) -> Option<&Task> {
        match self {
            BoardItem::Local { task, .. } => Some(task),
            BoardItem::Shared { .. } => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, BoardItem::Local { .. })
    }

    /// Whether the item carries any shared-task data
    pub fn has_shared_data(&self) -> bool {
        match self {
            BoardItem::Local { linked_shared, .. } => linked_shared.is_some(),
            BoardItem::Shared { .. } => true,
        }
    }
}

/// One status column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub status: StatusKey,
    pub items: Vec<BoardItem>,
}

impl Column {
    fn new(status: StatusKey) -> Self {
        Self {
            status,
            items: Vec::new(),
        }
    }

    /// Heading for the column
    pub fn name(&self) -> String {
        match &self.status {
            StatusKey::Known(status) => status.column_name().to_string(),
            StatusKey::Other(raw) => raw.to_uppercase(),
        }
    }

    /// Local tasks of the column, in display order
    pub fn local_tasks(&self) -> impl Iterator<Item = &Task> {
        self.items.iter().filter_map(BoardItem::as_local)
    }
}

/// The partitioned board.
///
/// The five fixed columns always come first, in board order. Columns for
/// statuses outside the fixed set follow, created on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Columns {
    columns: Vec<Column>,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            columns: TaskStatus::ALL
                .iter()
                .map(|status| Column::new(StatusKey::Known(*status)))
                .collect(),
        }
    }
}

impl Columns {
    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// One of the five fixed columns
    pub fn fixed(&self, status: TaskStatus) -> &Column {
        &self.columns[status.index()]
    }

    pub fn get(&self, status: &StatusKey) -> Option<&Column> {
        match status {
            StatusKey::Known(status) => Some(self.fixed(*status)),
            StatusKey::Other(_) => self.columns.iter().find(|c| &c.status == status),
        }
    }

    fn column_mut(&mut self, status: &StatusKey) -> &mut Column {
        let idx = match status {
            StatusKey::Known(status) => status.index(),
            StatusKey::Other(_) => match self.columns.iter().position(|c| &c.status == status) {
                Some(idx) => idx,
                None => {
                    self.columns.push(Column::new(status.clone()));
                    self.columns.len() - 1
                }
            },
        };
        &mut self.columns[idx]
    }

    pub fn total_items(&self) -> usize {
        self.columns.iter().map(|c| c.items.len()).sum()
    }

    pub fn has_visible_local(&self) -> bool {
        self.columns.iter().any(|c| c.items.iter().any(BoardItem::is_local))
    }

    pub fn has_visible_shared(&self) -> bool {
        self.columns
            .iter()
            .any(|c| c.items.iter().any(|item| !item.is_local()))
    }

    /// Whether any visible item carries shared data
    pub fn has_shared_data(&self) -> bool {
        self.columns
            .iter()
            .any(|c| c.items.iter().any(BoardItem::has_shared_data))
    }

    /// Find the column and row of an item
    pub fn position_of(&self, id: &str) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(col, column)| {
            column
                .items
                .iter()
                .position(|item| item.id() == id)
                .map(|row| (col, row))
        })
    }
}

/// Normalized search predicate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    needle: Option<String>,
}

impl SearchFilter {
    /// Surrounding whitespace is ignored; a blank query matches everything
    pub fn new(query: &str) -> Self {
        let trimmed = query.trim();
        Self {
            needle: (!trimmed.is_empty()).then(|| trimmed.to_lowercase()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_none()
    }

    pub fn matches(&self, title: &str, description: Option<&str>) -> bool {
        let Some(needle) = &self.needle else {
            return true;
        };
        title.to_lowercase().contains(needle.as_str())
            || description.is_some_and(|d| d.to_lowercase().contains(needle.as_str()))
    }
}

/// Everything the partition depends on
#[derive(Debug, Clone, Copy)]
pub struct PartitionInput<'a> {
    pub sources: &'a TaskSources,
    pub search: &'a SearchFilter,
    /// Show shared tasks assigned to other users
    pub show_shared: bool,
    pub current_user: Option<&'a UserId>,
}

/// Partition the sources into columns. Pure: equal inputs give equal output.
pub fn partition(input: PartitionInput<'_>) -> Columns {
    let PartitionInput {
        sources,
        search,
        show_shared,
        current_user,
    } = input;
    let mut columns = Columns::default();

    for task in sources.tasks_by_id.values() {
        if !search.matches(&task.title, task.description.as_deref()) {
            continue;
        }
        let linked_shared = sources.linked_shared(task);
        if !show_shared && linked_shared.is_some_and(|s| s.is_assigned_elsewhere(current_user)) {
            continue;
        }
        columns.column_mut(&task.status).items.push(BoardItem::Local {
            task: task.clone(),
            linked_shared: linked_shared.cloned(),
        });
    }

    for (status, items) in &sources.shared_only_by_status {
        for shared in items {
            if !search.matches(&shared.title, shared.description.as_deref()) {
                continue;
            }
            if !show_shared && !shared.is_assigned_to(current_user) {
                continue;
            }
            columns.column_mut(status).items.push(BoardItem::Shared {
                task: shared.clone(),
            });
        }
    }

    for column in &mut columns.columns {
        column.items.sort_by(compare_items);
    }
    columns
}

/// Newest first; equal timestamps order by ascending id
pub fn compare_items(a: &BoardItem, b: &BoardItem) -> Ordering {
    b.created_at()
        .cmp(&a.created_at())
        .then_with(|| a.id().cmp(b.id()))
}
