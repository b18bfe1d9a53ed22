use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{Result, TaskboardError};
use crate::types::{
    Attempt, AttemptId, Project, ProjectId, SharedTask, Task, TaskId, TaskUpdate,
};

use super::{Feed, FeedUpdate, TaskStore, feed_from_watch, latest_attempt};

/// Live channels and last known data of one project
struct ProjectEntry {
    project: Project,
    tasks: watch::Sender<FeedUpdate<Task>>,
    shared: watch::Sender<FeedUpdate<SharedTask>>,
    /// Last good task snapshot, kept while the stream is in an error state
    task_data: Arc<Vec<Task>>,
    shared_data: Arc<Vec<SharedTask>>,
}

impl ProjectEntry {
    fn new(project: Project) -> Self {
        let (tasks, _) = watch::channel(FeedUpdate::Snapshot(Arc::new(Vec::new())));
        let (shared, _) = watch::channel(FeedUpdate::Snapshot(Arc::new(Vec::new())));
        Self {
            project,
            tasks,
            shared,
            task_data: Arc::new(Vec::new()),
            shared_data: Arc::new(Vec::new()),
        }
    }

    fn publish_tasks(&mut self, tasks: Vec<Task>) {
        self.task_data = Arc::new(tasks);
        self.tasks
            .send_replace(FeedUpdate::Snapshot(Arc::clone(&self.task_data)));
    }

    fn publish_shared(&mut self, shared: Vec<SharedTask>) {
        self.shared_data = Arc::new(shared);
        self.shared
            .send_replace(FeedUpdate::Snapshot(Arc::clone(&self.shared_data)));
    }
}

/// In-memory task backend with concurrent access.
///
/// Projects live in a `DashMap`; every project owns two `watch` channels that
/// always hold the latest snapshot, so late subscribers start from current
/// data. Mutations publish a fresh snapshot to all subscribers.
#[derive(Default)]
pub struct MemoryStore {
    projects: DashMap<ProjectId, ProjectEntry>,
    attempts: DashMap<AttemptId, Attempt>,
    /// Error returned by the next mutation, for exercising failure paths
    fail_next_update: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a project and its data, notifying subscribers
    pub fn load_project(
        &self,
        project: Project,
        tasks: Vec<Task>,
        shared: Vec<SharedTask>,
        attempts: Vec<Attempt>,
    ) {
        let id = project.id.clone();
        {
            let mut entry = self
                .projects
                .entry(id)
                .or_insert_with(|| ProjectEntry::new(project.clone()));
            entry.project = project;
            entry.publish_tasks(tasks);
            entry.publish_shared(shared);
        }

        for attempt in attempts {
            self.attempts.insert(attempt.id.clone(), attempt);
        }
    }

    pub fn insert_task(&self, project: &ProjectId, task: Task) -> Result<()> {
        let mut entry = self.project_entry_mut(project)?;
        let mut tasks: Vec<Task> = entry.task_data.as_ref().clone();
        tasks.retain(|t| t.id != task.id);
        tasks.push(task);
        entry.publish_tasks(tasks);
        Ok(())
    }

    pub fn remove_task(&self, project: &ProjectId, task: &TaskId) -> Result<Option<Task>> {
        let mut entry = self.project_entry_mut(project)?;
        let mut tasks: Vec<Task> = entry.task_data.as_ref().clone();
        let removed = tasks
            .iter()
            .position(|t| &t.id == task)
            .map(|idx| tasks.remove(idx));
        entry.publish_tasks(tasks);
        Ok(removed)
    }

    pub fn insert_shared_task(&self, project: &ProjectId, shared: SharedTask) -> Result<()> {
        let mut entry = self.project_entry_mut(project)?;
        let mut items: Vec<SharedTask> = entry.shared_data.as_ref().clone();
        items.retain(|s| s.id != shared.id);
        items.push(shared);
        entry.publish_shared(items);
        Ok(())
    }

    pub fn insert_attempt(&self, attempt: Attempt) {
        self.attempts.insert(attempt.id.clone(), attempt);
    }

    pub fn clear_attempts(&self) {
        self.attempts.clear();
    }

    /// Put the project's task stream into an error state; the last snapshot
    /// is kept and republished by the next successful mutation
    pub fn fail_stream(&self, project: &ProjectId, message: impl Into<String>) -> Result<()> {
        let entry = self.project_entry_mut(project)?;
        entry.tasks.send_replace(FeedUpdate::Error(message.into()));
        Ok(())
    }

    /// Republish the last good snapshot after a stream failure
    pub fn recover_stream(&self, project: &ProjectId) -> Result<()> {
        let entry = self.project_entry_mut(project)?;
        entry
            .tasks
            .send_replace(FeedUpdate::Snapshot(Arc::clone(&entry.task_data)));
        Ok(())
    }

    /// Make the next mutation fail with the given message
    pub fn fail_next_update(&self, message: impl Into<String>) {
        *self.fail_next_update.lock() = Some(message.into());
    }

    /// Current tasks of a project
    pub fn tasks(&self, project: &ProjectId) -> Result<Arc<Vec<Task>>> {
        let entry = self
            .projects
            .get(project)
            .ok_or_else(|| TaskboardError::ProjectNotFound(project.to_string()))?;
        Ok(Arc::clone(&entry.task_data))
    }

    pub fn shared_tasks(&self, project: &ProjectId) -> Result<Arc<Vec<SharedTask>>> {
        let entry = self
            .projects
            .get(project)
            .ok_or_else(|| TaskboardError::ProjectNotFound(project.to_string()))?;
        Ok(Arc::clone(&entry.shared_data))
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        let mut attempts: Vec<Attempt> = self.attempts.iter().map(|e| e.value().clone()).collect();
        attempts.sort_by(|a, b| a.id.cmp(&b.id));
        attempts
    }

    fn project_entry_mut(
        &self,
        project: &ProjectId,
    ) -> Result<dashmap::mapref::one::RefMut<'_, ProjectId, ProjectEntry>> {
        self.projects
            .get_mut(project)
            .ok_or_else(|| TaskboardError::ProjectNotFound(project.to_string()))
    }

    fn take_injected_failure(&self) -> Option<String> {
        self.fail_next_update.lock().take()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get_project(&self, project: &ProjectId) -> Result<Project> {
        self.projects
            .get(project)
            .map(|entry| entry.project.clone())
            .ok_or_else(|| TaskboardError::ProjectNotFound(project.to_string()))
    }

    fn watch_tasks(&self, project: &ProjectId) -> Result<Feed<Task>> {
        let entry = self
            .projects
            .get(project)
            .ok_or_else(|| TaskboardError::ProjectNotFound(project.to_string()))?;
        Ok(feed_from_watch(entry.tasks.subscribe()))
    }

    fn watch_shared_tasks(&self, project: &ProjectId) -> Result<Feed<SharedTask>> {
        let entry = self
            .projects
            .get(project)
            .ok_or_else(|| TaskboardError::ProjectNotFound(project.to_string()))?;
        Ok(feed_from_watch(entry.shared.subscribe()))
    }

    async fn update_task(&self, task: &TaskId, update: TaskUpdate) -> Result<Task> {
        if let Some(message) = self.take_injected_failure() {
            return Err(TaskboardError::Store(message));
        }

        for mut entry in self.projects.iter_mut() {
            let Some(idx) = entry.task_data.iter().position(|t| &t.id == task) else {
                continue;
            };
            let mut tasks: Vec<Task> = entry.task_data.as_ref().clone();
            update.apply_to(&mut tasks[idx]);
            let updated = tasks[idx].clone();
            entry.publish_tasks(tasks);
            tracing::debug!(task = %task, "task updated");
            return Ok(updated);
        }

        Err(TaskboardError::TaskNotFound(task.to_string()))
    }

    async fn resolve_latest_attempt(&self, task: &TaskId) -> Result<Option<AttemptId>> {
        let attempts: Vec<Attempt> = self
            .attempts
            .iter()
            .filter(|e| &e.value().task_id == task)
            .map(|e| e.value().clone())
            .collect();
        Ok(latest_attempt(&attempts).map(|a| a.id.clone()))
    }

    async fn get_attempt(&self, attempt: &AttemptId) -> Result<Attempt> {
        self.attempts
            .get(attempt)
            .map(|e| e.value().clone())
            .ok_or_else(|| TaskboardError::AttemptNotFound(attempt.to_string()))
    }

    async fn count_workspaces(&self) -> Result<usize> {
        Ok(self.attempts.len())
    }
}
