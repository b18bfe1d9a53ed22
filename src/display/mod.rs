//! Text rendering of a board view model for the CLI.

use owo_colors::OwoColorize;

use crate::board::{
    BoardItem, BoardViewModel, Column, EmptyState, PanelView, ProjectState, Selection,
    StreamStatus,
};
use crate::types::{StatusKey, TaskStatus};

/// Widest title printed on a card
pub const CARD_TITLE_WIDTH: usize = 48;

/// Rendering switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub color: bool,
}

impl RenderOptions {
    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn colored() -> Self {
        Self { color: true }
    }

    fn paint(self, text: &str, style: fn(&str) -> String) -> String {
        if self.color {
            style(text)
        } else {
            text.to_string()
        }
    }
}

/// Shorten a title to at most `max_len` characters, cutting at the last word
/// boundary when there is one. Blank titles render as `Task`.
pub fn truncate_title(title: &str, max_len: usize) -> String {
    let title = title.trim();
    if title.is_empty() {
        return "Task".to_string();
    }
    if title.chars().count() <= max_len {
        return title.to_string();
    }

    let keep: String = title.chars().take(max_len.saturating_sub(3)).collect();
    let cut = match keep.rfind(' ') {
        Some(pos) if pos > 0 => keep[..pos].trim_end(),
        _ => keep.as_str(),
    };
    format!("{cut}...")
}

/// Column heading, colored by status
pub fn format_column_heading(column: &Column, options: RenderOptions) -> String {
    let heading = format!("{} ({})", column.name(), column.items.len());
    let style: fn(&str) -> String = match column.status {
        StatusKey::Known(TaskStatus::Todo) => |s| s.yellow().bold().to_string(),
        StatusKey::Known(TaskStatus::InProgress) => |s| s.cyan().bold().to_string(),
        StatusKey::Known(TaskStatus::InReview) => |s| s.magenta().bold().to_string(),
        StatusKey::Known(TaskStatus::Done) => |s| s.green().bold().to_string(),
        StatusKey::Known(TaskStatus::Cancelled) => |s| s.dimmed().to_string(),
        StatusKey::Other(_) => |s| s.bold().to_string(),
    };
    options.paint(&heading, style)
}

fn format_card(item: &BoardItem, view: &BoardViewModel, options: RenderOptions) -> String {
    let selected = match (&view.selection, item) {
        (Selection::Local(id), BoardItem::Local { task, .. }) => *id == task.id,
        (Selection::Shared(id), BoardItem::Shared { task }) => *id == task.id,
        _ => false,
    };
    let marker = if selected { ">" } else { " " };
    let id = format!("{:8}", item.id());
    let title = truncate_title(item.title(), CARD_TITLE_WIDTH);

    let mut tags = Vec::new();
    match item {
        BoardItem::Local { task, linked_shared } => {
            if let Some(shared) = linked_shared {
                tags.push(options.paint(&format!("[linked {}]", shared.id), |s| s.blue().to_string()));
            }
            if view.saving.contains(&task.id) {
                tags.push(options.paint("[saving]", |s| s.dimmed().to_string()));
            }
            if let Some(message) = view.errors.get(&task.id) {
                tags.push(options.paint(&format!("[error: {message}]"), |s| s.red().to_string()));
            }
        }
        BoardItem::Shared { task } => {
            let shared = match &task.assignee_user_id {
                Some(user) => format!("[shared @{user}]"),
                None => "[shared]".to_string(),
            };
            tags.push(options.paint(&shared, |s| s.blue().to_string()));
        }
    }

    let mut line = format!("{marker} {} {title}", options.paint(&id, |s| s.cyan().to_string()));
    for tag in tags {
        line.push(' ');
        line.push_str(&tag);
    }
    line
}

fn format_panel(panel: &PanelView) -> String {
    match panel {
        PanelView::Task {
            task,
            attempt,
            task_view,
            auxiliary,
            ..
        } => {
            let mut line = format!("Open: {} ({})", truncate_title(&task.title, CARD_TITLE_WIDTH), task.id);
            match attempt {
                Some(attempt) => {
                    let state = if attempt.is_running { "running" } else { "idle" };
                    line.push_str(&format!(" on {} [{state}]", attempt.branch));
                }
                None if *task_view => line.push_str(" [task view]"),
                None => {}
            }
            if let Some(mode) = auxiliary {
                line.push_str(&format!(" view={mode}"));
            }
            line
        }
        PanelView::Shared { task } => {
            format!("Open: {} ({}) [shared]", truncate_title(&task.title, CARD_TITLE_WIDTH), task.id)
        }
    }
}

/// Render the whole board as text
pub fn render_board(view: &BoardViewModel, options: RenderOptions) -> String {
    let mut lines = Vec::new();

    match &view.project {
        ProjectState::Failed(message) => {
            return options.paint(&format!("Failed to load project: {message}"), |s| {
                s.red().to_string()
            });
        }
        ProjectState::Loading => lines.push("Loading project...".to_string()),
        ProjectState::Loaded(project) => {
            lines.push(options.paint(&project.name, |s| s.bold().to_string()));
        }
    }

    if let StreamStatus::Reconnecting(message) = &view.stream {
        lines.push(options.paint(&format!("Reconnecting: {message}"), |s| s.yellow().to_string()));
    }

    match view.empty_state {
        Some(EmptyState::Loading) => {
            lines.push("Loading tasks...".to_string());
            return lines.join("\n");
        }
        Some(EmptyState::NoTasks) => {
            lines.push("No tasks yet. Press c to create one.".to_string());
            return lines.join("\n");
        }
        Some(EmptyState::NoSearchResults) => {
            lines.push(format!("No tasks match \"{}\".", view.search.trim()));
        }
        None => {}
    }

    for column in view.columns.iter() {
        lines.push(String::new());
        lines.push(format_column_heading(column, options));
        for item in &column.items {
            lines.push(format_card(item, view, options));
        }
    }

    if let Some(panel) = &view.panel {
        lines.push(String::new());
        lines.push(format_panel(panel));
    }

    lines.join("\n")
}
