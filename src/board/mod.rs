//! Kanban board view-state: source normalization, column partitioning,
//! selection, view mode, drag handling, keyboard routing, and the controller
//! and runtime composing them.

pub mod address;
pub mod controller;
pub mod drag;
pub mod effects;
pub mod keyboard;
pub mod partition;
pub mod prompts;
pub mod runtime;
pub mod selection;
pub mod sources;
pub mod view_mode;

pub use address::{Address, AttemptRef, History, Route};
pub use controller::{
    BoardController, BoardEvent, BoardViewModel, EmptyState, PanelView, ProjectState,
    StreamStatus,
};
pub use drag::{DragEnd, DragOutcome, resolve_drag};
pub use effects::{AnalyticsEvent, Effect};
pub use keyboard::{KeyAction, KeyPress, Scope, ScopeSet, key_to_action, parse_key_script};
pub use partition::{BoardItem, Column, Columns, PartitionInput, SearchFilter, partition};
pub use prompts::{PromptAnswer, PromptKind};
pub use runtime::{
    AnalyticsSink, BoardHost, BoardRuntime, HeadlessHost, HostCall, RecordingSink, TracingSink,
};
pub use selection::{NavDirection, Selection};
pub use sources::{LinkPolicy, SourceIndex, TaskSources};
pub use view_mode::{CycleDirection, ViewMode};
