//! The board view-state controller.
//!
//! [`BoardController`] owns the raw state of one project board: the latest
//! task snapshots, the navigable address, the in-memory shared selection and
//! stored view mode, and bookkeeping for in-flight requests. Every input is a
//! [`BoardEvent`]; [`BoardController::handle`] reduces it into the state and
//! returns the [`Effect`]s the runtime must perform. Rendering reads the
//! derived [`BoardViewModel`] from [`BoardController::view_model`].

use std::collections::BTreeMap;
use std::sync::Arc;

use jiff::Timestamp;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::UserSystem;
use crate::store::FeedUpdate;
use crate::types::{
    Attempt, AttemptId, Project, ProjectId, SharedTask, SharedTaskId, Task, TaskId, TaskStatus,
    UserId,
};

use super::address::{Address, AttemptRef, History, Route, SHARED_KEY, VIEW_KEY};
use super::drag::{DragEnd, DragOutcome, resolve_drag};
use super::effects::{AnalyticsEvent, Effect, Generation, RequestId};
use super::keyboard::{HandleResult, KeyAction, KeyPress, Scope, ScopeSet};
use super::partition::{BoardItem, Columns, PartitionInput, SearchFilter, partition};
use super::prompts::{
    BETA_INVITATION_THRESHOLD, PromptAnswer, PromptId, PromptKind, PromptTracker,
    TASK_PANEL_SHOWCASE,
};
use super::selection::{NavDirection, Selection, navigation_target, should_clear_shared};
use super::sources::{SourceIndex, TaskSources};
use super::view_mode::{CycleDirection, LEGACY_LOGS_VIEW, ViewMode, ViewModeState};

/// Everything the controller reacts to
#[derive(Debug, Clone)]
pub enum BoardEvent {
    ProjectLoaded(Result<Project, String>),
    TasksUpdated(FeedUpdate<Task>),
    SharedTasksUpdated(FeedUpdate<SharedTask>),

    Key(KeyPress),
    SetScope { scope: Scope, enabled: bool },

    SelectLocal {
        task: TaskId,
        attempt: Option<AttemptId>,
    },
    SelectShared(SharedTaskId),
    ClosePanel,
    SetViewMode(ViewMode),
    SetSearch(String),
    SetShowShared(bool),
    Drag(DragEnd),
    SaveDescription {
        task: TaskId,
        description: String,
    },

    /// Navigation initiated outside the board (address bar, links)
    Navigate(Address),
    Back,
    Forward,

    LatestAttemptResolved {
        generation: Generation,
        result: Result<Option<AttemptId>, String>,
    },
    AttemptLoaded {
        generation: Generation,
        result: Result<Attempt, String>,
    },
    StatusUpdateFinished {
        request: RequestId,
        result: Result<(), String>,
    },
    DescriptionSaveFinished {
        request: RequestId,
        result: Result<(), String>,
    },
    WorkspacesCounted(Result<usize, String>),
    PromptSettled {
        id: PromptId,
        answer: PromptAnswer,
    },
}

/// Project metadata load state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ProjectState {
    Loading,
    Loaded(Project),
    Failed(String),
}

/// Health of the live task streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum StreamStatus {
    Live,
    Reconnecting(String),
}

/// What to show instead of columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyState {
    Loading,
    NoTasks,
    NoSearchResults,
}

/// The open detail panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum PanelView {
    Task {
        task: Task,
        #[serde(skip_serializing_if = "Option::is_none")]
        linked_shared: Option<SharedTask>,
        #[serde(skip_serializing_if = "Option::is_none")]
        attempt: Option<Attempt>,
        /// Task view rather than attempt view
        task_view: bool,
        /// Mode of the auxiliary panel, when one is rendered
        #[serde(skip_serializing_if = "Option::is_none")]
        auxiliary: Option<ViewMode>,
    },
    Shared {
        task: SharedTask,
    },
}

/// Computed view model for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardViewModel {
    pub project: ProjectState,
    pub address: String,
    pub columns: Columns,
    pub selection: Selection,
    pub effective_mode: ViewMode,
    pub stored_mode: ViewMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel: Option<PanelView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_state: Option<EmptyState>,
    pub stream: StreamStatus,
    pub search: String,
    pub show_shared: bool,
    /// Tasks with a status change or description save in flight
    pub saving: Vec<TaskId>,
    /// Latest mutation failure per task
    pub errors: BTreeMap<TaskId, String>,
}

#[derive(Debug, Clone)]
struct PendingMove {
    request: RequestId,
    status: TaskStatus,
    settled: bool,
}

/// Controller for one project board
#[derive(Debug)]
pub struct BoardController {
    project_id: ProjectId,
    users: UserSystem,
    project: ProjectState,
    history: History,

    tasks: Option<Arc<Vec<Task>>>,
    shared: Option<Arc<Vec<SharedTask>>>,
    tasks_error: Option<String>,
    shared_error: Option<String>,
    index: SourceIndex,
    sources: Arc<TaskSources>,

    shared_selection: Option<SharedTaskId>,
    view_mode: ViewModeState,
    search: String,
    scopes: ScopeSet,

    next_request: u64,
    pending_moves: BTreeMap<TaskId, PendingMove>,
    /// In-flight mutations, status changes and description saves alike
    pending_requests: BTreeMap<RequestId, TaskId>,
    errors: BTreeMap<TaskId, String>,

    next_generation: u64,
    latest_lookup: Option<(Generation, TaskId)>,
    attempt_lookup: Option<(Generation, AttemptId)>,
    active_attempt: Option<Attempt>,

    prompts: PromptTracker,
    workspaces_requested: bool,
    on_board: bool,
    torn_down: bool,

    outbox: Vec<Effect>,
}

impl BoardController {
    pub fn new(project_id: ProjectId, users: UserSystem, address: Address) -> Self {
        let policy = users.snapshot().link_policy;
        let index = SourceIndex::new(policy);
        let sources = index.current();
        Self {
            project_id,
            users,
            project: ProjectState::Loading,
            history: History::new(address),
            tasks: None,
            shared: None,
            tasks_error: None,
            shared_error: None,
            index,
            sources,
            shared_selection: None,
            view_mode: ViewModeState::default(),
            search: String::new(),
            scopes: ScopeSet::kanban(),
            next_request: 1,
            pending_moves: BTreeMap::new(),
            pending_requests: BTreeMap::new(),
            errors: BTreeMap::new(),
            next_generation: 1,
            latest_lookup: None,
            attempt_lookup: None,
            active_attempt: None,
            prompts: PromptTracker::new(),
            workspaces_requested: false,
            on_board: true,
            torn_down: false,
            outbox: Vec::new(),
        }
    }

    /// Read the initial address and issue the first requests
    pub fn start(&mut self) -> Vec<Effect> {
        self.sync_from_address();
        self.reconcile();
        std::mem::take(&mut self.outbox)
    }

    /// Reduce one event into the state and return the effects it produced
    pub fn handle(&mut self, event: BoardEvent) -> Vec<Effect> {
        if self.torn_down {
            debug!("board torn down, dropping event");
            return Vec::new();
        }

        match event {
            BoardEvent::ProjectLoaded(result) => self.on_project_loaded(result),
            BoardEvent::TasksUpdated(update) => self.on_tasks(update),
            BoardEvent::SharedTasksUpdated(update) => self.on_shared_tasks(update),

            BoardEvent::Key(press) => {
                if !self.on_key(press).is_handled() {
                    debug!(?press, "unbound key");
                }
            }
            BoardEvent::SetScope { scope, enabled } => {
                if enabled {
                    self.scopes.enable(scope);
                } else {
                    self.scopes.disable(scope);
                }
            }

            BoardEvent::SelectLocal { task, attempt } => self.select_local(&task, attempt),
            BoardEvent::SelectShared(id) => self.select_shared(id),
            BoardEvent::ClosePanel => self.close_panel(),
            BoardEvent::SetViewMode(mode) => self.set_mode(mode),
            BoardEvent::SetSearch(query) => self.search = query,
            BoardEvent::SetShowShared(show) => self.set_show_shared(show),
            BoardEvent::Drag(drag) => self.on_drag(&drag),
            BoardEvent::SaveDescription { task, description } => {
                self.save_description(task, description)
            }

            BoardEvent::Navigate(address) => {
                self.history.push(address);
                self.sync_from_address();
            }
            BoardEvent::Back => {
                if self.history.back() {
                    self.sync_from_address();
                }
            }
            BoardEvent::Forward => {
                if self.history.forward() {
                    self.sync_from_address();
                }
            }

            BoardEvent::LatestAttemptResolved { generation, result } => {
                self.on_latest_attempt(generation, result)
            }
            BoardEvent::AttemptLoaded { generation, result } => {
                self.on_attempt_loaded(generation, result)
            }
            BoardEvent::StatusUpdateFinished { request, result } => {
                self.on_status_update_finished(request, result)
            }
            BoardEvent::DescriptionSaveFinished { request, result } => {
                self.on_description_saved(request, result)
            }
            BoardEvent::WorkspacesCounted(result) => self.on_workspaces_counted(result),
            BoardEvent::PromptSettled { id, answer } => self.on_prompt_settled(id, answer),
        }

        self.reconcile();
        std::mem::take(&mut self.outbox)
    }

    /// Cancel outstanding prompts and stop reacting to events
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        info!(project = %self.project_id, "tearing down board");
        self.prompts.cancel_all();
        self.torn_down = true;
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn address(&self) -> &Address {
        self.history.current()
    }

    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    pub fn sources(&self) -> Arc<TaskSources> {
        Arc::clone(&self.sources)
    }

    /// Whether the current address still shows this project's board
    pub fn is_on_board(&self) -> bool {
        self.address().route.is_board_of(&self.project_id)
    }

    fn current_user(&self) -> Option<UserId> {
        self.users.current_user()
    }

    fn show_shared(&self) -> bool {
        self.address().show_shared()
    }

    /// The visible columns, computed fresh from the current inputs
    pub fn columns(&self) -> Columns {
        let user = self.current_user();
        let search = SearchFilter::new(&self.search);
        partition(PartitionInput {
            sources: &self.sources,
            search: &search,
            show_shared: self.show_shared(),
            current_user: user.as_ref(),
        })
    }

    /// The owned task the address opens, when it is known
    fn selected_task(&self) -> Option<&Task> {
        let route = &self.address().route;
        if !route.is_board_of(&self.project_id) {
            return None;
        }
        route.task().and_then(|id| self.sources.task(id))
    }

    fn selected_shared_task(&self) -> Option<&SharedTask> {
        self.shared_selection
            .as_ref()
            .and_then(|id| self.sources.shared_task(id))
    }

    pub fn selection(&self) -> Selection {
        if let Some(task) = self.selected_task() {
            return Selection::Local(task.id.clone());
        }
        match self.selected_shared_task() {
            Some(shared) => Selection::Shared(shared.id.clone()),
            None => Selection::Idle,
        }
    }

    pub fn is_panel_open(&self) -> bool {
        !self.selection().is_idle()
    }

    pub fn effective_mode(&self) -> ViewMode {
        self.view_mode.effective(&self.selection())
    }

    pub fn stored_mode(&self) -> ViewMode {
        self.view_mode.stored()
    }

    // ---------------------------------------------------------------------
    // Streams

    fn on_project_loaded(&mut self, result: Result<Project, String>) {
        self.project = match result {
            Ok(project) => ProjectState::Loaded(project),
            Err(message) => {
                warn!(project = %self.project_id, error = %message, "failed to load project");
                ProjectState::Failed(message)
            }
        };
    }

    fn on_tasks(&mut self, update: FeedUpdate<Task>) {
        match update {
            FeedUpdate::Snapshot(tasks) => {
                if self.tasks_error.take().is_some() {
                    info!(project = %self.project_id, "task stream recovered");
                }
                self.settle_pending_moves(&tasks);
                self.tasks = Some(tasks);
            }
            FeedUpdate::Error(message) => {
                warn!(project = %self.project_id, error = %message, "task stream error");
                self.tasks_error = Some(message);
            }
        }
    }

    fn on_shared_tasks(&mut self, update: FeedUpdate<SharedTask>) {
        match update {
            FeedUpdate::Snapshot(shared) => {
                if self.shared_error.take().is_some() {
                    info!(project = %self.project_id, "shared task stream recovered");
                }
                self.shared = Some(shared);
            }
            FeedUpdate::Error(message) => {
                warn!(project = %self.project_id, error = %message, "shared task stream error");
                self.shared_error = Some(message);
            }
        }
    }

    /// Drop optimistic placements the authoritative snapshot has caught up
    /// with, and those whose request already finished
    fn settle_pending_moves(&mut self, tasks: &[Task]) {
        self.pending_moves.retain(|id, pending| {
            let confirmed = tasks
                .iter()
                .find(|task| &task.id == id)
                .is_none_or(|task| task.status == pending.status);
            !(pending.settled || confirmed)
        });
    }

    fn streams_loaded(&self) -> bool {
        self.tasks.is_some() && self.shared.is_some()
    }

    fn refresh_sources(&mut self) {
        let policy = self.users.snapshot().link_policy;
        let shared = self.shared.clone().unwrap_or_default();
        let tasks = match &self.tasks {
            Some(tasks) if self.pending_moves.is_empty() => Arc::clone(tasks),
            Some(tasks) => Arc::new(
                tasks
                    .iter()
                    .map(|task| {
                        let mut task = task.clone();
                        if let Some(pending) = self.pending_moves.get(&task.id) {
                            task.status = pending.status.into();
                        }
                        task
                    })
                    .collect(),
            ),
            None => Arc::default(),
        };
        self.sources = self.index.update(&tasks, &shared, policy);
    }

    // ---------------------------------------------------------------------
    // Keyboard

    fn on_key(&mut self, press: KeyPress) -> HandleResult {
        let Some(action) = press.action(&self.scopes) else {
            return HandleResult::NotHandled;
        };
        debug!(?action, "key action");

        match action {
            KeyAction::Create => self.outbox.push(Effect::OpenCreateTask),
            KeyAction::FocusSearch => self.outbox.push(Effect::FocusSearch),
            KeyAction::Exit => {
                if self.is_panel_open() {
                    self.close_panel();
                } else {
                    self.history.push(Address::new(Route::Projects));
                }
            }
            KeyAction::Navigate(direction) => self.navigate(direction),
            KeyAction::OpenDetails => {
                if self.is_panel_open() {
                    self.cycle_from_keyboard(CycleDirection::Forward);
                } else if let Some(task) = self.address().route.task().cloned() {
                    self.select_local(&task, None);
                }
            }
            KeyAction::CycleBackward => {
                if self.is_panel_open() {
                    self.cycle_from_keyboard(CycleDirection::Backward);
                }
            }
            KeyAction::Delete => {
                if let Selection::Local(task) = self.selection() {
                    self.outbox.push(Effect::DeleteTask(task));
                }
            }
        }
        HandleResult::Handled
    }

    fn navigate(&mut self, direction: NavDirection) {
        let columns = self.columns();
        if let Some(target) =
            navigation_target(&self.selection(), &self.sources, &columns, direction)
        {
            self.select_local(&target, None);
        }
    }

    fn cycle_from_keyboard(&mut self, direction: CycleDirection) {
        let target = self.view_mode.cycle_target(&self.selection(), direction);
        if let Some(name) = target.navigated_event() {
            self.outbox.push(Effect::Analytics(AnalyticsEvent::keyboard(
                name,
                direction,
                Timestamp::now(),
            )));
        }
        self.set_mode(target);
    }

    // ---------------------------------------------------------------------
    // Selection

    fn select_local(&mut self, task: &TaskId, attempt: Option<AttemptId>) {
        if self.sources.task(task).is_none() {
            debug!(task = %task, "ignoring selection of unknown task");
            return;
        }
        self.shared_selection = None;

        let project = self.project_id.clone();
        let route = if self.users.snapshot().beta_workspaces {
            Route::Task {
                project,
                task: task.clone(),
            }
        } else {
            Route::Attempt {
                project,
                task: task.clone(),
                attempt: attempt.map_or(AttemptRef::Latest, AttemptRef::Id),
            }
        };

        let mut address = self.address().with_route(route);
        match self.view_mode.stored().query_value() {
            Some(value) => address.set(VIEW_KEY, value),
            None => address.remove(VIEW_KEY),
        }
        self.history.replace(address);
    }

    fn select_shared(&mut self, id: SharedTaskId) {
        if self.sources.shared_task(&id).is_none() {
            debug!(shared_task = %id, "ignoring selection of unknown shared task");
            return;
        }
        self.shared_selection = Some(id);
        let mut address = self.address().with_route(Route::ProjectTasks {
            project: self.project_id.clone(),
        });
        address.remove(VIEW_KEY);
        self.history.replace(address);
    }

    fn close_panel(&mut self) {
        self.shared_selection = None;
        let mut address = self.address().with_route(Route::ProjectTasks {
            project: self.project_id.clone(),
        });
        address.remove(VIEW_KEY);
        self.history.replace(address);
    }

    fn set_mode(&mut self, mode: ViewMode) {
        self.view_mode.set(mode);
        if !matches!(self.selection(), Selection::Local(_)) {
            return;
        }
        let mut address = self.address().clone();
        match mode.query_value() {
            Some(value) => address.set(VIEW_KEY, value),
            None => address.remove(VIEW_KEY),
        }
        self.history.replace(address);
    }

    fn set_show_shared(&mut self, show: bool) {
        let mut address = self.address().clone();
        if show {
            address.remove(SHARED_KEY);
        } else {
            address.set(SHARED_KEY, "off");
        }
        self.history.replace(address);
    }

    /// Pick up state carried by an externally changed address.
    ///
    /// The legacy view alias is rewritten first so the mode is never read
    /// from it.
    fn sync_from_address(&mut self) {
        if self.address().get(VIEW_KEY) == Some(LEGACY_LOGS_VIEW) {
            let mut address = self.address().clone();
            address.set(VIEW_KEY, &ViewMode::Diffs.to_string());
            debug!(address = %address, "rewriting legacy view alias");
            self.history.replace(address);
        }
        self.view_mode
            .set(ViewMode::from_query(self.address().get(VIEW_KEY)));
    }

    // ---------------------------------------------------------------------
    // Mutations

    fn next_request(&mut self) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        id
    }

    fn on_drag(&mut self, drag: &DragEnd) {
        match resolve_drag(drag, &self.sources) {
            DragOutcome::Ignored(reason) => {
                debug!(item = %drag.item_id, ?reason, "drag ignored");
            }
            DragOutcome::Move {
                task,
                status,
                update,
            } => {
                let request = self.next_request();
                info!(task = %task, %status, "moving task");
                self.errors.remove(&task);
                self.pending_requests.insert(request, task.clone());
                self.pending_moves.insert(
                    task.clone(),
                    PendingMove {
                        request,
                        status,
                        settled: false,
                    },
                );
                self.outbox.push(Effect::UpdateTaskStatus {
                    request,
                    task,
                    update,
                });
            }
        }
    }

    fn on_status_update_finished(&mut self, request: RequestId, result: Result<(), String>) {
        let Some(task) = self.pending_requests.remove(&request) else {
            return;
        };
        if let Some(pending) = self.pending_moves.get_mut(&task)
            && pending.request == request
        {
            pending.settled = true;
        }
        if let Err(message) = result {
            warn!(task = %task, error = %message, "failed to update task status");
            self.errors.insert(task, message);
        }
    }

    fn save_description(&mut self, task: TaskId, description: String) {
        if self.sources.task(&task).is_none() {
            debug!(task = %task, "ignoring description save for unknown task");
            return;
        }
        let request = self.next_request();
        self.errors.remove(&task);
        self.pending_requests.insert(request, task.clone());
        self.outbox.push(Effect::UpdateTaskDescription {
            request,
            task,
            description,
        });
    }

    fn on_description_saved(&mut self, request: RequestId, result: Result<(), String>) {
        let Some(task) = self.pending_requests.remove(&request) else {
            return;
        };
        if let Err(message) = result {
            warn!(task = %task, error = %message, "failed to save task description");
            self.errors.insert(task, message);
        }
    }

    // ---------------------------------------------------------------------
    // Attempts

    fn next_generation(&mut self) -> Generation {
        let generation = Generation(self.next_generation);
        self.next_generation += 1;
        generation
    }

    fn on_latest_attempt(&mut self, generation: Generation, result: Result<Option<AttemptId>, String>) {
        let Some((expected, task)) = self.latest_lookup.clone() else {
            debug!(?generation, "discarding stale latest-attempt result");
            return;
        };
        if expected != generation {
            debug!(?generation, "discarding stale latest-attempt result");
            return;
        }
        self.latest_lookup = None;

        let attempt = match result {
            Ok(attempt) => attempt,
            Err(message) => {
                warn!(task = %task, error = %message, "failed to resolve latest attempt");
                None
            }
        };
        let project = self.project_id.clone();
        let route = match attempt {
            Some(attempt) => Route::Attempt {
                project,
                task,
                attempt: AttemptRef::Id(attempt),
            },
            None => Route::Task { project, task },
        };
        let address = self.address().with_route(route);
        info!(address = %address, "resolved latest attempt");
        self.history.replace(address);
    }

    fn on_attempt_loaded(&mut self, generation: Generation, result: Result<Attempt, String>) {
        match &self.attempt_lookup {
            Some((expected, _)) if *expected == generation => {}
            _ => {
                debug!(?generation, "discarding stale attempt");
                return;
            }
        }
        match result {
            Ok(attempt) => self.active_attempt = Some(attempt),
            Err(message) => {
                warn!(error = %message, "failed to load attempt");
                self.active_attempt = None;
            }
        }
    }

    // ---------------------------------------------------------------------
    // Prompts

    fn on_workspaces_counted(&mut self, result: Result<usize, String>) {
        let count = match result {
            Ok(count) => count,
            Err(message) => {
                warn!(error = %message, "failed to count workspaces");
                return;
            }
        };
        if !self.on_board
            || self.users.snapshot().beta_workspaces_invitation_sent
            || count <= BETA_INVITATION_THRESHOLD
        {
            return;
        }
        self.show_prompt(PromptKind::BetaInvitation);
    }

    fn show_prompt(&mut self, kind: PromptKind) {
        if let Some((id, token)) = self.prompts.open(kind.clone()) {
            debug!(?kind, "showing prompt");
            self.outbox.push(Effect::ShowPrompt { id, kind, token });
        }
    }

    fn on_prompt_settled(&mut self, id: PromptId, answer: PromptAnswer) {
        let Some(kind) = self.prompts.settle(id) else {
            return;
        };
        match kind {
            PromptKind::FeatureShowcase { feature } => {
                if let Err(e) = self.users.update_and_save(|cfg| cfg.mark_feature_seen(&feature)) {
                    warn!(error = %e, "failed to save showcase state");
                }
            }
            PromptKind::BetaInvitation => {
                let join = answer == PromptAnswer::Accepted;
                if let Err(e) = self.users.update_and_save(|cfg| {
                    cfg.beta_workspaces_invitation_sent = true;
                    cfg.beta_workspaces = join;
                }) {
                    warn!(error = %e, "failed to save beta invitation answer");
                }
                if join {
                    self.history.push(Address::new(Route::Workspaces { attempt: None }));
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Reconciliation

    /// Bring derived state and address in line after any change
    fn reconcile(&mut self) {
        self.refresh_sources();
        let config = self.users.snapshot();

        if self.is_on_board() {
            self.redirect_beta_attempt(config.beta_workspaces);
        }

        let on_board = self.is_on_board();
        if self.on_board && !on_board {
            // Leaving the board cancels whatever it was asking the user
            self.prompts.cancel_all();
            self.prompts = PromptTracker::new();
            self.workspaces_requested = false;
            self.shared_selection = None;
        }
        self.on_board = on_board;
        if !on_board {
            self.latest_lookup = None;
            self.attempt_lookup = None;
            self.active_attempt = None;
            return;
        }

        if self.address().route.task().is_some() {
            self.shared_selection = None;
        }

        self.redirect_missing_task();
        self.request_latest_attempt();
        self.request_active_attempt();

        let user = self.current_user();
        if let Some(id) = &self.shared_selection
            && should_clear_shared(
                &Selection::Shared(id.clone()),
                self.show_shared(),
                &self.sources,
                user.as_ref(),
            )
        {
            debug!(shared_task = %id, "clearing hidden shared selection");
            self.shared_selection = None;
        }

        if self.is_panel_open() && !config.showcases.has_seen(TASK_PANEL_SHOWCASE) {
            self.show_prompt(PromptKind::FeatureShowcase {
                feature: TASK_PANEL_SHOWCASE.to_string(),
            });
        }

        if !config.beta_workspaces_invitation_sent && !self.workspaces_requested {
            self.workspaces_requested = true;
            self.outbox.push(Effect::CountWorkspaces);
        }
    }

    fn redirect_beta_attempt(&mut self, beta_workspaces: bool) {
        if !beta_workspaces {
            return;
        }
        let Some(AttemptRef::Id(attempt)) = self.address().route.attempt() else {
            return;
        };
        let address = Address::new(Route::Workspaces {
            attempt: Some(attempt.clone()),
        });
        info!(address = %address, "redirecting attempt to workspaces");
        self.history.replace(address);
    }

    /// Once both streams have loaded, an address naming an unknown task falls
    /// back to the task list
    fn redirect_missing_task(&mut self) {
        if !self.streams_loaded() {
            return;
        }
        let Some(task) = self.address().route.task() else {
            return;
        };
        if self.sources.task(task).is_some() {
            return;
        }
        info!(task = %task, "task no longer exists, returning to task list");
        let mut address = self.address().with_route(Route::ProjectTasks {
            project: self.project_id.clone(),
        });
        address.remove(VIEW_KEY);
        self.history.replace(address);
    }

    fn request_latest_attempt(&mut self) {
        let task = match &self.address().route {
            Route::Attempt {
                task,
                attempt: AttemptRef::Latest,
                ..
            } => task.clone(),
            _ => {
                self.latest_lookup = None;
                return;
            }
        };
        if self
            .latest_lookup
            .as_ref()
            .is_some_and(|(_, pending)| *pending == task)
        {
            return;
        }
        let generation = self.next_generation();
        self.latest_lookup = Some((generation, task.clone()));
        self.outbox
            .push(Effect::ResolveLatestAttempt { generation, task });
    }

    fn request_active_attempt(&mut self) {
        let Some(AttemptRef::Id(attempt)) = self.address().route.attempt().cloned() else {
            self.attempt_lookup = None;
            self.active_attempt = None;
            return;
        };
        if self
            .attempt_lookup
            .as_ref()
            .is_some_and(|(_, pending)| *pending == attempt)
        {
            return;
        }
        let generation = self.next_generation();
        self.attempt_lookup = Some((generation, attempt.clone()));
        self.active_attempt = None;
        self.outbox.push(Effect::LoadAttempt {
            generation,
            attempt,
        });
    }

    // ---------------------------------------------------------------------
    // View model

    fn empty_state(&self, columns: &Columns) -> Option<EmptyState> {
        let Some(tasks) = &self.tasks else {
            return Some(EmptyState::Loading);
        };
        if tasks.is_empty() && !columns.has_shared_data() {
            return Some(EmptyState::NoTasks);
        }
        if !columns.has_visible_local() && !columns.has_visible_shared() {
            return Some(EmptyState::NoSearchResults);
        }
        None
    }

    fn stream_status(&self) -> StreamStatus {
        match self.tasks_error.as_ref().or(self.shared_error.as_ref()) {
            Some(message) => StreamStatus::Reconnecting(message.clone()),
            None => StreamStatus::Live,
        }
    }

    fn panel(&self, selection: &Selection, effective: ViewMode) -> Option<PanelView> {
        match selection {
            Selection::Idle => None,
            Selection::Shared(_) => self
                .selected_shared_task()
                .map(|task| PanelView::Shared { task: task.clone() }),
            Selection::Local(_) => {
                let task = self.selected_task()?;
                let task_view = matches!(self.address().route, Route::Task { .. });
                let attempt = if task_view {
                    None
                } else {
                    self.active_attempt.clone()
                };
                let auxiliary = (attempt.is_some() && effective != ViewMode::Closed).then_some(effective);
                Some(PanelView::Task {
                    task: task.clone(),
                    linked_shared: self.sources.linked_shared(task).cloned(),
                    attempt,
                    task_view,
                    auxiliary,
                })
            }
        }
    }

    pub fn view_model(&self) -> BoardViewModel {
        let columns = self.columns();
        let selection = self.selection();
        let effective_mode = self.view_mode.effective(&selection);

        let mut saving: Vec<TaskId> = self.pending_requests.values().cloned().collect();
        saving.sort();
        saving.dedup();

        BoardViewModel {
            project: self.project.clone(),
            address: self.address().to_string(),
            empty_state: self.empty_state(&columns),
            panel: self.panel(&selection, effective_mode),
            columns,
            selection,
            effective_mode,
            stored_mode: self.view_mode.stored(),
            stream: self.stream_status(),
            search: self.search.clone(),
            show_shared: self.show_shared(),
            saving,
            errors: self.errors.clone(),
        }
    }

    /// The board item with the given id, if visible
    pub fn visible_item(&self, id: &str) -> Option<BoardItem> {
        self.columns()
            .iter()
            .flat_map(|column| column.items.iter())
            .find(|item| item.id() == id)
            .cloned()
    }
}

impl Drop for BoardController {
    fn drop(&mut self) {
        self.prompts.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::keyboard::parse_key;
    use crate::config::Config;
    use crate::types::StatusKey;

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_second(secs).unwrap()
    }

    fn task(id: &str, status: &str, secs: i64) -> Task {
        Task {
            id: TaskId::new(id),
            title: format!("Task {id}"),
            description: None,
            status: StatusKey::parse(status),
            parent_workspace_id: None,
            shared_task_id: None,
            created_at: ts(secs),
        }
    }

    fn shared(id: &str, assignee: Option<&str>) -> SharedTask {
        SharedTask {
            id: SharedTaskId::new(id),
            title: format!("Shared {id}"),
            description: None,
            status: StatusKey::Known(TaskStatus::Todo),
            assignee_user_id: assignee.map(UserId::new),
            created_at: ts(50),
        }
    }

    /// Config with every prompt already dealt with
    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.set_user(UserId::new("u1"));
        config.mark_feature_seen(TASK_PANEL_SHOWCASE);
        config.beta_workspaces_invitation_sent = true;
        config
    }

    fn board_with(config: Config, address: &str) -> (BoardController, Vec<Effect>) {
        let mut board = BoardController::new(
            ProjectId::new("p1"),
            UserSystem::in_memory(config),
            Address::parse(address).unwrap(),
        );
        let effects = board.start();
        (board, effects)
    }

    fn board(address: &str) -> BoardController {
        board_with(quiet_config(), address).0
    }

    fn load(board: &mut BoardController, tasks: Vec<Task>, shared_items: Vec<SharedTask>) {
        board.handle(BoardEvent::TasksUpdated(FeedUpdate::Snapshot(Arc::new(tasks))));
        board.handle(BoardEvent::SharedTasksUpdated(FeedUpdate::Snapshot(Arc::new(
            shared_items,
        ))));
    }

    fn key(board: &mut BoardController, token: &str) -> Vec<Effect> {
        board.handle(BoardEvent::Key(parse_key(token).unwrap()))
    }

    fn analytics(effects: &[Effect]) -> Vec<(String, CycleDirection)> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Analytics(event) => Some((event.name.clone(), event.direction)),
                _ => None,
            })
            .collect()
    }

    fn latest_request(effects: &[Effect]) -> Option<(Generation, TaskId)> {
        effects.iter().find_map(|effect| match effect {
            Effect::ResolveLatestAttempt { generation, task } => Some((*generation, task.clone())),
            _ => None,
        })
    }

    #[test]
    fn test_select_local_resolves_latest_attempt() {
        let mut board = board("/projects/p1/tasks");
        load(&mut board, vec![task("t1", "todo", 1)], vec![]);

        let effects = board.handle(BoardEvent::SelectLocal {
            task: TaskId::new("t1"),
            attempt: None,
        });
        assert_eq!(board.address().to_string(), "/projects/p1/tasks/t1/attempts/latest");
        let (generation, requested) = latest_request(&effects).unwrap();
        assert_eq!(requested.as_str(), "t1");

        let effects = board.handle(BoardEvent::LatestAttemptResolved {
            generation,
            result: Ok(Some(AttemptId::new("a1"))),
        });
        assert_eq!(board.address().to_string(), "/projects/p1/tasks/t1/attempts/a1");
        assert!(
            effects
                .iter()
                .any(|e| matches!(e, Effect::LoadAttempt { attempt, .. } if attempt.as_str() == "a1"))
        );
        assert_eq!(board.selection(), Selection::Local(TaskId::new("t1")));
    }

    #[test]
    fn test_latest_without_attempts_falls_back_to_task_view() {
        let mut board = board("/projects/p1/tasks");
        load(&mut board, vec![task("t1", "todo", 1)], vec![]);
        let effects = board.handle(BoardEvent::SelectLocal {
            task: TaskId::new("t1"),
            attempt: None,
        });
        let (generation, _) = latest_request(&effects).unwrap();

        board.handle(BoardEvent::LatestAttemptResolved {
            generation,
            result: Ok(None),
        });
        assert_eq!(board.address().to_string(), "/projects/p1/tasks/t1");
        let Some(PanelView::Task { task_view, .. }) = board.view_model().panel else {
            panic!("expected a task panel");
        };
        assert!(task_view);
    }

    #[test]
    fn test_stale_latest_attempt_result_is_discarded() {
        let mut board = board("/projects/p1/tasks");
        load(&mut board, vec![task("t1", "todo", 1), task("t2", "todo", 2)], vec![]);

        let first = board.handle(BoardEvent::SelectLocal {
            task: TaskId::new("t1"),
            attempt: None,
        });
        let (stale, _) = latest_request(&first).unwrap();
        let second = board.handle(BoardEvent::SelectLocal {
            task: TaskId::new("t2"),
            attempt: None,
        });
        let (current, _) = latest_request(&second).unwrap();
        assert_ne!(stale, current);

        board.handle(BoardEvent::LatestAttemptResolved {
            generation: stale,
            result: Ok(Some(AttemptId::new("a1"))),
        });
        assert_eq!(board.address().to_string(), "/projects/p1/tasks/t2/attempts/latest");

        board.handle(BoardEvent::LatestAttemptResolved {
            generation: current,
            result: Ok(Some(AttemptId::new("a2"))),
        });
        assert_eq!(board.address().to_string(), "/projects/p1/tasks/t2/attempts/a2");
    }

    #[test]
    fn test_shared_selection_forces_closed_and_local_restores_mode() {
        let mut board = board("/projects/p1/tasks/t1/attempts/a1?view=diffs");
        load(&mut board, vec![task("t1", "todo", 1)], vec![shared("s1", None)]);
        assert_eq!(board.effective_mode(), ViewMode::Diffs);

        board.handle(BoardEvent::SelectShared(SharedTaskId::new("s1")));
        assert_eq!(board.selection(), Selection::Shared(SharedTaskId::new("s1")));
        assert_eq!(board.effective_mode(), ViewMode::Closed);
        assert_eq!(board.stored_mode(), ViewMode::Diffs);
        assert_eq!(board.address().to_string(), "/projects/p1/tasks");

        board.handle(BoardEvent::SelectLocal {
            task: TaskId::new("t1"),
            attempt: Some(AttemptId::new("a1")),
        });
        assert_eq!(board.selection(), Selection::Local(TaskId::new("t1")));
        assert_eq!(board.effective_mode(), ViewMode::Diffs);
        assert_eq!(
            board.address().to_string(),
            "/projects/p1/tasks/t1/attempts/a1?view=diffs"
        );
    }

    #[test]
    fn test_legacy_view_is_rewritten_before_mode_is_read() {
        let board = board("/projects/p1/tasks/t1/attempts/a1?view=logs&shared=off");
        assert_eq!(board.stored_mode(), ViewMode::Diffs);
        let address = board.address().to_string();
        assert!(!address.contains("logs"));
        assert_eq!(address, "/projects/p1/tasks/t1/attempts/a1?view=diffs&shared=off");
    }

    #[test]
    fn test_missing_task_redirects_only_after_both_streams_load() {
        let mut board = board("/projects/p1/tasks/gone?shared=off");
        board.handle(BoardEvent::TasksUpdated(FeedUpdate::Snapshot(Arc::new(vec![task(
            "t1", "todo", 1,
        )]))));
        assert_eq!(board.address().to_string(), "/projects/p1/tasks/gone?shared=off");

        board.handle(BoardEvent::SharedTasksUpdated(FeedUpdate::Snapshot(Arc::new(vec![]))));
        assert_eq!(board.address().to_string(), "/projects/p1/tasks?shared=off");
    }

    #[test]
    fn test_drag_onto_same_status_issues_no_mutation() {
        let mut board = board("/projects/p1/tasks");
        load(&mut board, vec![task("t1", "todo", 1)], vec![]);
        let effects = board.handle(BoardEvent::Drag(DragEnd::new("t1", Some("todo"))));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_drag_is_optimistic_and_heals_from_stream() {
        let mut board = board("/projects/p1/tasks");
        load(&mut board, vec![task("t1", "todo", 1)], vec![]);

        let effects = board.handle(BoardEvent::Drag(DragEnd::new("t1", Some("done"))));
        let [Effect::UpdateTaskStatus { request, task: moved, update }] = effects.as_slice() else {
            panic!("expected one status update, got {effects:?}");
        };
        assert_eq!(moved.as_str(), "t1");
        assert_eq!(update.status, Some(TaskStatus::Done));
        assert_eq!(update.title.as_deref(), Some("Task t1"));

        let view = board.view_model();
        assert_eq!(view.columns.fixed(TaskStatus::Done).items.len(), 1);
        assert_eq!(view.saving, vec![TaskId::new("t1")]);

        board.handle(BoardEvent::StatusUpdateFinished {
            request: *request,
            result: Err("backend unavailable".to_string()),
        });
        let view = board.view_model();
        assert_eq!(view.errors[&TaskId::new("t1")], "backend unavailable");
        assert!(view.saving.is_empty());
        // Placement stays until the stream says otherwise
        assert_eq!(view.columns.fixed(TaskStatus::Done).items.len(), 1);

        board.handle(BoardEvent::TasksUpdated(FeedUpdate::Snapshot(Arc::new(vec![task(
            "t1", "todo", 1,
        )]))));
        let view = board.view_model();
        assert_eq!(view.columns.fixed(TaskStatus::Todo).items.len(), 1);
        assert!(view.columns.fixed(TaskStatus::Done).items.is_empty());
    }

    #[test]
    fn test_exit_closes_panel_then_leaves_board() {
        let mut board = board("/projects/p1/tasks/t1?shared=off");
        load(&mut board, vec![task("t1", "todo", 1)], vec![]);
        assert!(board.is_panel_open());

        key(&mut board, "esc");
        assert_eq!(board.address().to_string(), "/projects/p1/tasks?shared=off");
        assert!(!board.is_panel_open());

        key(&mut board, "esc");
        assert_eq!(board.address().to_string(), "/projects");
        assert!(!board.is_on_board());
    }

    #[test]
    fn test_open_details_cycles_and_reports_destination() {
        let mut board = board("/projects/p1/tasks/t1/attempts/a1");
        load(&mut board, vec![task("t1", "todo", 1)], vec![]);

        let effects = key(&mut board, "enter");
        assert_eq!(
            analytics(&effects),
            vec![("preview_navigated".to_string(), CycleDirection::Forward)]
        );
        assert_eq!(board.address().get(VIEW_KEY), Some("preview"));

        key(&mut board, "enter");
        key(&mut board, "ctrl+enter");
        assert_eq!(board.effective_mode(), ViewMode::Spike);

        // Wrapping to closed is not reported
        let effects = key(&mut board, "enter");
        assert!(analytics(&effects).is_empty());
        assert_eq!(board.address().get(VIEW_KEY), None);

        let effects = key(&mut board, "ctrl+shift+enter");
        assert_eq!(
            analytics(&effects),
            vec![("spike_navigated".to_string(), CycleDirection::Backward)]
        );
    }

    #[test]
    fn test_follow_up_scope_suppresses_bindings() {
        let mut board = board("/projects/p1/tasks");
        load(&mut board, vec![task("t1", "todo", 1)], vec![]);
        board.handle(BoardEvent::SetScope {
            scope: Scope::FollowUpReady,
            enabled: true,
        });

        key(&mut board, "j");
        assert_eq!(board.selection(), Selection::Idle);

        board.handle(BoardEvent::SetScope {
            scope: Scope::FollowUpReady,
            enabled: false,
        });
        key(&mut board, "j");
        assert_eq!(board.selection(), Selection::Local(TaskId::new("t1")));
    }

    #[test]
    fn test_keyboard_navigation_across_columns() {
        let mut board = board("/projects/p1/tasks");
        load(
            &mut board,
            vec![task("t1", "todo", 1), task("t2", "inreview", 1)],
            vec![shared("s1", None)],
        );

        key(&mut board, "right");
        assert_eq!(board.selection(), Selection::Local(TaskId::new("t1")));
        key(&mut board, "l");
        assert_eq!(board.selection(), Selection::Local(TaskId::new("t2")));
        key(&mut board, "l");
        assert_eq!(board.selection(), Selection::Local(TaskId::new("t2")));
        key(&mut board, "j");
        assert_eq!(board.selection(), Selection::Local(TaskId::new("t2")));
        key(&mut board, "h");
        assert_eq!(board.selection(), Selection::Local(TaskId::new("t1")));
    }

    #[test]
    fn test_selection_is_exclusive() {
        let mut board = board("/projects/p1/tasks");
        load(&mut board, vec![task("t1", "todo", 1)], vec![shared("s1", None)]);

        board.handle(BoardEvent::SelectLocal {
            task: TaskId::new("t1"),
            attempt: Some(AttemptId::new("a1")),
        });
        board.handle(BoardEvent::SelectShared(SharedTaskId::new("s1")));
        assert_eq!(board.selection(), Selection::Shared(SharedTaskId::new("s1")));
        assert_eq!(board.address().route.task(), None);

        board.handle(BoardEvent::SelectLocal {
            task: TaskId::new("t1"),
            attempt: Some(AttemptId::new("a1")),
        });
        assert_eq!(board.selection(), Selection::Local(TaskId::new("t1")));
        assert!(board.shared_selection.is_none());
    }

    #[test]
    fn test_hiding_shared_clears_selection_assigned_elsewhere() {
        let mut board = board("/projects/p1/tasks");
        load(&mut board, vec![], vec![shared("s1", Some("u2")), shared("s2", Some("u1"))]);

        board.handle(BoardEvent::SelectShared(SharedTaskId::new("s1")));
        assert!(board.is_panel_open());
        board.handle(BoardEvent::SetShowShared(false));
        assert_eq!(board.selection(), Selection::Idle);
        assert_eq!(board.address().to_string(), "/projects/p1/tasks?shared=off");

        board.handle(BoardEvent::SelectShared(SharedTaskId::new("s2")));
        assert_eq!(board.selection(), Selection::Shared(SharedTaskId::new("s2")));
    }

    #[test]
    fn test_stream_error_keeps_stale_data() {
        let mut board = board("/projects/p1/tasks");
        load(&mut board, vec![task("t1", "todo", 1)], vec![]);

        board.handle(BoardEvent::TasksUpdated(FeedUpdate::Error("offline".to_string())));
        let view = board.view_model();
        assert_eq!(view.stream, StreamStatus::Reconnecting("offline".to_string()));
        assert_eq!(view.columns.total_items(), 1);

        board.handle(BoardEvent::TasksUpdated(FeedUpdate::Snapshot(Arc::new(vec![]))));
        assert_eq!(board.view_model().stream, StreamStatus::Live);
    }

    #[test]
    fn test_project_failure_is_reported() {
        let mut board = board("/projects/p1/tasks");
        board.handle(BoardEvent::ProjectLoaded(Err("no such project".to_string())));
        assert_eq!(
            board.view_model().project,
            ProjectState::Failed("no such project".to_string())
        );
    }

    #[test]
    fn test_empty_states() {
        let mut board = board("/projects/p1/tasks");
        assert_eq!(board.view_model().empty_state, Some(EmptyState::Loading));

        load(&mut board, vec![], vec![]);
        assert_eq!(board.view_model().empty_state, Some(EmptyState::NoTasks));

        load(&mut board, vec![task("t1", "todo", 1)], vec![]);
        assert_eq!(board.view_model().empty_state, None);

        board.handle(BoardEvent::SetSearch("zzz".to_string()));
        assert_eq!(board.view_model().empty_state, Some(EmptyState::NoSearchResults));
    }

    #[test]
    fn test_beta_workspaces_target_task_view_and_redirect_attempts() {
        let mut config = quiet_config();
        config.beta_workspaces = true;

        let (board, _) = board_with(config.clone(), "/projects/p1/tasks/t1/attempts/a1");
        assert_eq!(board.address().to_string(), "/workspaces/a1");
        assert!(!board.is_on_board());

        let (mut board, _) = board_with(config, "/projects/p1/tasks");
        load(&mut board, vec![task("t1", "todo", 1)], vec![]);
        board.handle(BoardEvent::SelectLocal {
            task: TaskId::new("t1"),
            attempt: Some(AttemptId::new("a1")),
        });
        assert_eq!(board.address().to_string(), "/projects/p1/tasks/t1");
    }

    fn prompt(effects: &[Effect]) -> Option<(PromptId, PromptKind, tokio_util::sync::CancellationToken)> {
        effects.iter().find_map(|effect| match effect {
            Effect::ShowPrompt { id, kind, token } => Some((*id, kind.clone(), token.clone())),
            _ => None,
        })
    }

    #[test]
    fn test_showcase_shown_on_first_panel_and_marked_seen() {
        let mut config = quiet_config();
        config.showcases.seen_features.clear();
        let users = UserSystem::in_memory(config);
        let mut board = BoardController::new(
            ProjectId::new("p1"),
            users.clone(),
            Address::parse("/projects/p1/tasks").unwrap(),
        );
        board.start();
        load(&mut board, vec![task("t1", "todo", 1)], vec![]);

        let effects = board.handle(BoardEvent::SelectLocal {
            task: TaskId::new("t1"),
            attempt: Some(AttemptId::new("a1")),
        });
        let (id, kind, _) = prompt(&effects).unwrap();
        assert_eq!(
            kind,
            PromptKind::FeatureShowcase {
                feature: TASK_PANEL_SHOWCASE.to_string()
            }
        );

        // Still open: not shown twice
        let effects = key(&mut board, "enter");
        assert!(prompt(&effects).is_none());

        board.handle(BoardEvent::PromptSettled {
            id,
            answer: PromptAnswer::Dismissed,
        });
        assert!(users.snapshot().showcases.has_seen(TASK_PANEL_SHOWCASE));
    }

    #[test]
    fn test_teardown_cancels_prompts_and_ignores_late_answers() {
        let mut config = quiet_config();
        config.showcases.seen_features.clear();
        let users = UserSystem::in_memory(config);
        let mut board = BoardController::new(
            ProjectId::new("p1"),
            users.clone(),
            Address::parse("/projects/p1/tasks/t1/attempts/a1").unwrap(),
        );
        board.start();
        // The panel opens as soon as the addressed task is known
        let effects = board.handle(BoardEvent::TasksUpdated(FeedUpdate::Snapshot(Arc::new(
            vec![task("t1", "todo", 1)],
        ))));
        let (id, _, token) = prompt(&effects).unwrap();

        board.teardown();
        assert!(token.is_cancelled());
        assert!(
            board
                .handle(BoardEvent::PromptSettled {
                    id,
                    answer: PromptAnswer::Dismissed,
                })
                .is_empty()
        );
        assert!(!users.snapshot().showcases.has_seen(TASK_PANEL_SHOWCASE));
    }

    #[test]
    fn test_leaving_board_cancels_prompts() {
        let mut config = quiet_config();
        config.beta_workspaces_invitation_sent = false;
        let (mut board, effects) = board_with(config, "/projects/p1/tasks");
        assert!(effects.iter().any(|e| matches!(e, Effect::CountWorkspaces)));

        let effects = board.handle(BoardEvent::WorkspacesCounted(Ok(51)));
        let (_, kind, token) = prompt(&effects).unwrap();
        assert_eq!(kind, PromptKind::BetaInvitation);

        board.handle(BoardEvent::Navigate(Address::parse("/projects").unwrap()));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_beta_invitation_offered_again_after_return() {
        let mut config = quiet_config();
        config.beta_workspaces_invitation_sent = false;
        let (mut board, _) = board_with(config, "/projects/p1/tasks");
        let effects = board.handle(BoardEvent::WorkspacesCounted(Ok(51)));
        assert!(prompt(&effects).is_some());

        board.handle(BoardEvent::Navigate(Address::parse("/projects").unwrap()));
        // A count that lands off the board never opens a prompt
        assert!(prompt(&board.handle(BoardEvent::WorkspacesCounted(Ok(51)))).is_none());

        let effects = board.handle(BoardEvent::Back);
        assert!(effects.iter().any(|e| matches!(e, Effect::CountWorkspaces)));
        let effects = board.handle(BoardEvent::WorkspacesCounted(Ok(51)));
        let (_, kind, token) = prompt(&effects).unwrap();
        assert_eq!(kind, PromptKind::BetaInvitation);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_beta_invitation_answer_is_saved() {
        let mut config = quiet_config();
        config.beta_workspaces_invitation_sent = false;
        let users = UserSystem::in_memory(config);
        let mut board = BoardController::new(
            ProjectId::new("p1"),
            users.clone(),
            Address::parse("/projects/p1/tasks").unwrap(),
        );
        board.start();

        assert!(prompt(&board.handle(BoardEvent::WorkspacesCounted(Ok(50)))).is_none());

        let effects = board.handle(BoardEvent::WorkspacesCounted(Ok(51)));
        let (id, _, _) = prompt(&effects).unwrap();
        board.handle(BoardEvent::PromptSettled {
            id,
            answer: PromptAnswer::Accepted,
        });

        let config = users.snapshot();
        assert!(config.beta_workspaces_invitation_sent);
        assert!(config.beta_workspaces);
        assert_eq!(board.address().to_string(), "/workspaces");
    }

    #[test]
    fn test_description_save_failure_is_inline() {
        let mut board = board("/projects/p1/tasks/t1");
        load(&mut board, vec![task("t1", "todo", 1)], vec![]);

        let effects = board.handle(BoardEvent::SaveDescription {
            task: TaskId::new("t1"),
            description: "new text".to_string(),
        });
        let [Effect::UpdateTaskDescription { request, .. }] = effects.as_slice() else {
            panic!("expected one description save, got {effects:?}");
        };
        assert_eq!(board.view_model().saving, vec![TaskId::new("t1")]);

        board.handle(BoardEvent::DescriptionSaveFinished {
            request: *request,
            result: Err("conflict".to_string()),
        });
        let view = board.view_model();
        assert!(view.saving.is_empty());
        assert_eq!(view.errors[&TaskId::new("t1")], "conflict");
    }

    #[test]
    fn test_back_restores_mode_from_address() {
        let mut board = board("/projects/p1/tasks/t1/attempts/a1?view=spike");
        load(&mut board, vec![task("t1", "todo", 1)], vec![]);
        board.handle(BoardEvent::Navigate(Address::parse("/projects/p1/tasks").unwrap()));
        assert_eq!(board.stored_mode(), ViewMode::Closed);

        board.handle(BoardEvent::Back);
        assert_eq!(board.effective_mode(), ViewMode::Spike);
        board.handle(BoardEvent::Forward);
        assert_eq!(board.selection(), Selection::Idle);
    }
}
