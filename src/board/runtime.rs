//! Tokio runtime for a [`BoardController`].
//!
//! The runtime owns the controller, subscribes to the store's live feeds and
//! executes the effects the controller returns, feeding their outcomes back
//! as events. Two drivers are provided: [`BoardRuntime::dispatch`] processes
//! one event to quiescence (deterministic, used for scripted input), and
//! [`BoardRuntime::run`] multiplexes external events, feeds and effect
//! results concurrently until cancelled.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::{Feed, FeedUpdate, TaskStore};
use crate::types::{SharedTask, Task, TaskId};

use super::controller::{BoardController, BoardEvent, BoardViewModel};
use super::effects::{AnalyticsEvent, Effect};
use super::prompts::{PromptAnswer, PromptKind};

/// The user-facing surface the board drives: dialogs and focus changes
#[async_trait]
pub trait BoardHost: Send + Sync + 'static {
    /// Show a prompt and wait for the user's answer
    async fn show_prompt(&self, kind: &PromptKind) -> PromptAnswer;

    fn open_create_task(&self);

    fn focus_search(&self);

    fn delete_task(&self, task: &TaskId);
}

/// Receiver of observability events
pub trait AnalyticsSink: Send + Sync + 'static {
    fn capture(&self, event: &AnalyticsEvent);
}

/// Logs analytics events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn capture(&self, event: &AnalyticsEvent) {
        info!(
            event = %event.name,
            direction = ?event.direction,
            trigger = ?event.trigger,
            source = %event.source,
            "analytics"
        );
    }
}

/// Keeps every captured event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().clone()
    }
}

impl AnalyticsSink for RecordingSink {
    fn capture(&self, event: &AnalyticsEvent) {
        self.events.lock().push(event.clone());
    }
}

/// A call made on a [`HeadlessHost`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", content = "value", rename_all = "snake_case")]
pub enum HostCall {
    Prompt(PromptKind),
    CreateTask,
    FocusSearch,
    DeleteTask(TaskId),
}

/// Host without a user: answers prompts from fixed answers and records calls
#[derive(Debug)]
pub struct HeadlessHost {
    showcase_answer: PromptAnswer,
    beta_answer: PromptAnswer,
    calls: Mutex<Vec<HostCall>>,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self {
            showcase_answer: PromptAnswer::Dismissed,
            beta_answer: PromptAnswer::Declined,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_beta_answer(mut self, answer: PromptAnswer) -> Self {
        self.beta_answer = answer;
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl BoardHost for HeadlessHost {
    async fn show_prompt(&self, kind: &PromptKind) -> PromptAnswer {
        self.calls.lock().push(HostCall::Prompt(kind.clone()));
        match kind {
            PromptKind::FeatureShowcase { .. } => self.showcase_answer,
            PromptKind::BetaInvitation => self.beta_answer,
        }
    }

    fn open_create_task(&self) {
        self.calls.lock().push(HostCall::CreateTask);
    }

    fn focus_search(&self) {
        self.calls.lock().push(HostCall::FocusSearch);
    }

    fn delete_task(&self, task: &TaskId) {
        self.calls.lock().push(HostCall::DeleteTask(task.clone()));
    }
}

/// Collaborators an effect may touch
#[derive(Clone)]
struct Collaborators {
    store: Arc<dyn TaskStore>,
    host: Arc<dyn BoardHost>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl Collaborators {
    /// Execute one effect; the returned event carries its outcome, if any
    async fn perform(&self, effect: Effect) -> Option<BoardEvent> {
        debug!(effect = effect.name(), "performing effect");
        match effect {
            Effect::UpdateTaskStatus {
                request,
                task,
                update,
            } => {
                let result = self
                    .store
                    .update_task(&task, update)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string());
                Some(BoardEvent::StatusUpdateFinished { request, result })
            }
            Effect::UpdateTaskDescription {
                request,
                task,
                description,
            } => {
                let result = self
                    .store
                    .update_task_description(&task, description)
                    .await
                    .map_err(|e| e.to_string());
                Some(BoardEvent::DescriptionSaveFinished { request, result })
            }
            Effect::ResolveLatestAttempt { generation, task } => {
                let result = self
                    .store
                    .resolve_latest_attempt(&task)
                    .await
                    .map_err(|e| e.to_string());
                Some(BoardEvent::LatestAttemptResolved { generation, result })
            }
            Effect::LoadAttempt {
                generation,
                attempt,
            } => {
                let result = self
                    .store
                    .get_attempt(&attempt)
                    .await
                    .map_err(|e| e.to_string());
                Some(BoardEvent::AttemptLoaded { generation, result })
            }
            Effect::CountWorkspaces => {
                let result = self.store.count_workspaces().await.map_err(|e| e.to_string());
                Some(BoardEvent::WorkspacesCounted(result))
            }
            Effect::ShowPrompt { id, kind, token } => {
                tokio::select! {
                    answer = self.host.show_prompt(&kind) => {
                        Some(BoardEvent::PromptSettled { id, answer })
                    }
                    _ = token.cancelled() => {
                        debug!(?kind, "prompt cancelled");
                        None
                    }
                }
            }
            Effect::Analytics(event) => {
                self.analytics.capture(&event);
                None
            }
            Effect::OpenCreateTask => {
                self.host.open_create_task();
                None
            }
            Effect::FocusSearch => {
                self.host.focus_search();
                None
            }
            Effect::DeleteTask(task) => {
                self.host.delete_task(&task);
                None
            }
        }
    }
}

/// Drives a [`BoardController`] against a store and a host
pub struct BoardRuntime {
    controller: BoardController,
    collaborators: Collaborators,
    tasks: Option<Feed<Task>>,
    shared: Option<Feed<SharedTask>>,
    view: watch::Sender<Arc<BoardViewModel>>,
}

impl BoardRuntime {
    pub fn new(
        controller: BoardController,
        store: Arc<dyn TaskStore>,
        host: Arc<dyn BoardHost>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        let (view, _) = watch::channel(Arc::new(controller.view_model()));
        Self {
            controller,
            collaborators: Collaborators {
                store,
                host,
                analytics,
            },
            tasks: None,
            shared: None,
            view,
        }
    }

    /// Subscribe to the feeds, load the project and settle the initial
    /// requests
    pub async fn start(&mut self) {
        let project = self.controller.project_id().clone();
        let store = Arc::clone(&self.collaborators.store);
        let mut queue = VecDeque::new();

        match store.watch_tasks(&project) {
            Ok(feed) => self.tasks = Some(feed),
            Err(e) => queue.push_back(BoardEvent::TasksUpdated(FeedUpdate::Error(e.to_string()))),
        }
        match store.watch_shared_tasks(&project) {
            Ok(feed) => self.shared = Some(feed),
            Err(e) => queue.push_back(BoardEvent::SharedTasksUpdated(FeedUpdate::Error(
                e.to_string(),
            ))),
        }

        let loaded = store.get_project(&project).await.map_err(|e| e.to_string());
        queue.push_back(BoardEvent::ProjectLoaded(loaded));

        let effects = self.controller.start();
        self.settle(queue, effects).await;
    }

    /// Process one event, every effect it causes, and every feed update that
    /// is already available, before returning
    pub async fn dispatch(&mut self, event: BoardEvent) {
        self.settle(VecDeque::from([event]), Vec::new()).await;
    }

    async fn settle(&mut self, mut queue: VecDeque<BoardEvent>, initial: Vec<Effect>) {
        for effect in initial {
            if let Some(event) = self.collaborators.perform(effect).await {
                queue.push_back(event);
            }
        }
        self.drain_feeds(&mut queue);

        while let Some(event) = queue.pop_front() {
            let effects = self.controller.handle(event);
            for effect in effects {
                if let Some(event) = self.collaborators.perform(effect).await {
                    queue.push_back(event);
                }
            }
            self.drain_feeds(&mut queue);
        }
        self.publish();
    }

    /// Queue every feed update that is ready without waiting
    fn drain_feeds(&mut self, queue: &mut VecDeque<BoardEvent>) {
        while let Some(update) = poll_ready(&mut self.tasks, "tasks") {
            queue.push_back(BoardEvent::TasksUpdated(update));
        }
        while let Some(update) = poll_ready(&mut self.shared, "shared tasks") {
            queue.push_back(BoardEvent::SharedTasksUpdated(update));
        }
    }

    fn publish(&self) {
        self.view.send_replace(Arc::new(self.controller.view_model()));
    }

    pub fn controller(&self) -> &BoardController {
        &self.controller
    }

    pub fn view_model(&self) -> BoardViewModel {
        self.controller.view_model()
    }

    /// Receive a fresh view model after every processed batch of events
    pub fn subscribe(&self) -> watch::Receiver<Arc<BoardViewModel>> {
        self.view.subscribe()
    }

    /// Run until `cancel` fires, performing effects concurrently. Closed
    /// inputs are dropped from the loop rather than ending it. Returns the
    /// torn-down controller.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<BoardEvent>,
        cancel: CancellationToken,
    ) -> BoardController {
        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<BoardEvent>();

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                Some(event) = events.recv() => event,
                Some(event) = results_rx.recv() => event,
                update = next_update(&mut self.tasks) => match update {
                    Some(update) => BoardEvent::TasksUpdated(update),
                    None => {
                        self.tasks = None;
                        BoardEvent::TasksUpdated(FeedUpdate::Error("task stream closed".to_string()))
                    }
                },
                update = next_update(&mut self.shared) => match update {
                    Some(update) => BoardEvent::SharedTasksUpdated(update),
                    None => {
                        self.shared = None;
                        BoardEvent::SharedTasksUpdated(FeedUpdate::Error(
                            "shared task stream closed".to_string(),
                        ))
                    }
                },
            };

            for effect in self.controller.handle(event) {
                let collaborators = self.collaborators.clone();
                let results_tx = results_tx.clone();
                tokio::spawn(async move {
                    if let Some(event) = collaborators.perform(effect).await {
                        // The loop may already have stopped
                        let _ = results_tx.send(event);
                    }
                });
            }
            self.publish();
        }

        self.controller.teardown();
        self.publish();
        self.controller
    }
}

/// Next item of an optional feed; pending forever once the feed is gone
async fn next_update<T>(feed: &mut Option<Feed<T>>) -> Option<FeedUpdate<T>> {
    match feed {
        Some(feed) => feed.next().await,
        None => std::future::pending().await,
    }
}

fn poll_ready<T>(feed: &mut Option<Feed<T>>, name: &str) -> Option<FeedUpdate<T>> {
    let stream = feed.as_mut()?;
    match stream.next().now_or_never() {
        Some(Some(update)) => Some(update),
        Some(None) => {
            warn!(feed = name, "feed closed");
            *feed = None;
            Some(FeedUpdate::Error(format!("{name} stream closed")))
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        use super::super::view_mode::CycleDirection;
        use jiff::Timestamp;

        let sink = RecordingSink::new();
        sink.capture(&AnalyticsEvent::keyboard(
            "preview_navigated",
            CycleDirection::Forward,
            Timestamp::UNIX_EPOCH,
        ));
        sink.capture(&AnalyticsEvent::keyboard(
            "diffs_navigated",
            CycleDirection::Forward,
            Timestamp::UNIX_EPOCH,
        ));
        let names: Vec<String> = sink.events().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["preview_navigated", "diffs_navigated"]);
    }

    #[tokio::test]
    async fn test_headless_host_answers_from_fixed_answers() {
        let host = HeadlessHost::new().with_beta_answer(PromptAnswer::Accepted);
        assert_eq!(
            host.show_prompt(&PromptKind::BetaInvitation).await,
            PromptAnswer::Accepted
        );
        host.delete_task(&TaskId::new("t-1"));
        assert_eq!(
            host.calls(),
            vec![
                HostCall::Prompt(PromptKind::BetaInvitation),
                HostCall::DeleteTask(TaskId::new("t-1")),
            ]
        );
    }
}
