//! Backing-store contract consumed by the board controller.
//!
//! The controller never owns task data. It reads live snapshots through
//! [`TaskStore::watch_tasks`] / [`TaskStore::watch_shared_tasks`] and requests
//! mutations through the async methods. Two implementations ship with the
//! crate: [`MemoryStore`] (concurrent maps with `watch`-channel streams) and
//! [`FileStore`] (a board document on disk, reloaded on change).

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;

use crate::error::Result;
use crate::types::{
    Attempt, AttemptId, Project, ProjectId, SharedTask, Task, TaskId, TaskUpdate,
};

pub mod file;
pub mod memory;
pub mod watcher;

pub use file::{BoardDocument, FileStore};
pub use memory::MemoryStore;
pub use watcher::{DocumentWatcher, StoreEvent};

/// One item of a live task stream
#[derive(Debug)]
pub enum FeedUpdate<T> {
    /// The complete current set of items
    Snapshot(Arc<Vec<T>>),
    /// The stream failed; consumers keep their last snapshot
    Error(String),
}

impl<T> Clone for FeedUpdate<T> {
    fn clone(&self) -> Self {
        match self {
            FeedUpdate::Snapshot(items) => FeedUpdate::Snapshot(Arc::clone(items)),
            FeedUpdate::Error(message) => FeedUpdate::Error(message.clone()),
        }
    }
}

impl<T> FeedUpdate<T> {
    pub fn is_error(&self) -> bool {
        matches!(self, FeedUpdate::Error(_))
    }
}

/// A push-based live stream of task snapshots
pub type Feed<T> = BoxStream<'static, FeedUpdate<T>>;

/// The narrow interface the board needs from the task backend
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Load project metadata; failure is fatal to the board view
    async fn get_project(&self, project: &ProjectId) -> Result<Project>;

    /// Live stream of the project's owned tasks
    fn watch_tasks(&self, project: &ProjectId) -> Result<Feed<Task>>;

    /// Live stream of the project's shared tasks
    fn watch_shared_tasks(&self, project: &ProjectId) -> Result<Feed<SharedTask>>;

    /// Apply a partial update to a task
    async fn update_task(&self, task: &TaskId, update: TaskUpdate) -> Result<Task>;

    /// Replace a task's description
    async fn update_task_description(&self, task: &TaskId, description: String) -> Result<()> {
        self.update_task(
            task,
            TaskUpdate {
                description: Some(description),
                ..Default::default()
            },
        )
        .await
        .map(|_| ())
    }

    /// The newest attempt of a task, if it has any
    async fn resolve_latest_attempt(&self, task: &TaskId) -> Result<Option<AttemptId>>;

    async fn get_attempt(&self, attempt: &AttemptId) -> Result<Attempt>;

    /// Total number of workspaces (attempts) known to the backend
    async fn count_workspaces(&self) -> Result<usize>;
}

/// Turn a `watch` receiver into a feed that yields the current value first
/// and then every subsequent change. The feed ends when the sender is dropped.
pub(crate) fn feed_from_watch<T>(rx: watch::Receiver<FeedUpdate<T>>) -> Feed<T>
where
    T: Send + Sync + 'static,
{
    futures::stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let update = rx.borrow_and_update().clone();
        Some((update, (rx, false)))
    })
    .boxed()
}

/// Pick the newest attempt: latest creation time first, ties by ascending id
pub fn latest_attempt<'a>(attempts: impl IntoIterator<Item = &'a Attempt>) -> Option<&'a Attempt> {
    attempts.into_iter().min_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::Timestamp;

    fn attempt(id: &str, secs: i64) -> Attempt {
        Attempt {
            id: AttemptId::new(id),
            task_id: TaskId::new("t-1"),
            branch: format!("branch/{id}"),
            is_running: false,
            session_id: None,
            created_at: Timestamp::from_second(secs).unwrap(),
        }
    }

    #[test]
    fn test_latest_attempt_prefers_newest() {
        let attempts = [attempt("a", 10), attempt("b", 30), attempt("c", 20)];
        assert_eq!(latest_attempt(&attempts).unwrap().id.as_str(), "b");
    }

    #[test]
    fn test_latest_attempt_breaks_ties_by_id() {
        let attempts = [attempt("z", 10), attempt("m", 10)];
        assert_eq!(latest_attempt(&attempts).unwrap().id.as_str(), "m");
    }

    #[test]
    fn test_latest_attempt_empty() {
        let attempts: [Attempt; 0] = [];
        assert!(latest_attempt(&attempts).is_none());
    }

    #[tokio::test]
    async fn test_feed_from_watch_yields_current_then_changes() {
        let (tx, rx) = watch::channel(FeedUpdate::Snapshot(Arc::new(vec![1u32])));
        let mut feed = feed_from_watch(rx);

        match feed.next().await {
            Some(FeedUpdate::Snapshot(items)) => assert_eq!(*items, vec![1]),
            other => panic!("unexpected {other:?}"),
        }

        tx.send_replace(FeedUpdate::Error("offline".to_string()));
        assert!(feed.next().await.unwrap().is_error());

        drop(tx);
        assert!(feed.next().await.is_none());
    }
}
