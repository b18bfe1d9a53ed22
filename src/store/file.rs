//! File-backed store: a single board document on disk.
//!
//! The document holds one project with its tasks, shared tasks and attempts.
//! It is parsed into a [`MemoryStore`] which serves the live streams; updates
//! are applied in memory and written back atomically. A
//! [`DocumentWatcher`](super::DocumentWatcher) calls [`FileStore::reload`] when
//! the file changes on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskboardError};
use crate::types::{
    Attempt, AttemptId, Project, ProjectId, SharedTask, Task, TaskId, TaskUpdate,
};

use super::{Feed, MemoryStore, TaskStore};

/// On-disk board document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDocument {
    pub project: Project,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub shared_tasks: Vec<SharedTask>,
    #[serde(default)]
    pub attempts: Vec<Attempt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

impl BoardDocument {
    fn parse(content: &str, format: DocumentFormat) -> Result<Self> {
        let doc = match format {
            DocumentFormat::Json => serde_json::from_str(content)?,
            DocumentFormat::Yaml => serde_yaml_ng::from_str(content)?,
        };
        Ok(doc)
    }

    fn render(&self, format: DocumentFormat) -> Result<String> {
        let content = match format {
            DocumentFormat::Json => serde_json::to_string_pretty(self)?,
            DocumentFormat::Yaml => serde_yaml_ng::to_string(self)?,
        };
        Ok(content)
    }

    /// Read and parse a document, picking the format from the file extension
    pub async fn read(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            TaskboardError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read board document {}: {}", path.display(), e),
            ))
        })?;
        Self::parse(&content, DocumentFormat::for_path(path)).map_err(|e| {
            TaskboardError::InvalidDocument(path.display().to_string(), e.to_string())
        })
    }

    /// Write the document atomically (temp file + rename)
    pub async fn write(&self, path: &Path) -> Result<()> {
        let content = self.render(DocumentFormat::for_path(path))?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

/// Board document on disk served through an in-memory store
pub struct FileStore {
    path: PathBuf,
    project: ProjectId,
    memory: MemoryStore,
    /// Serializes reloads and write-backs
    io_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Load the document at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let path = path.into();
        let doc = BoardDocument::read(&path).await?;
        let project = doc.project.id.clone();

        let memory = MemoryStore::new();
        memory.load_project(doc.project, doc.tasks, doc.shared_tasks, doc.attempts);

        Ok(Arc::new(Self {
            path,
            project,
            memory,
            io_lock: tokio::sync::Mutex::new(()),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Id of the project held by the document
    pub fn project_id(&self) -> &ProjectId {
        &self.project
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Current in-memory contents as a document
    pub async fn document(&self) -> Result<BoardDocument> {
        Ok(BoardDocument {
            project: self.memory.get_project(&self.project).await?,
            tasks: self.memory.tasks(&self.project)?.as_ref().clone(),
            shared_tasks: self.memory.shared_tasks(&self.project)?.as_ref().clone(),
            attempts: self.memory.attempts(),
        })
    }

    /// Re-read the document from disk.
    ///
    /// Returns `Ok(false)` when the file content matches what is already
    /// loaded; nothing is published in that case. On a parse failure the
    /// store keeps its last good state.
    pub async fn reload(&self) -> Result<bool> {
        let _guard = self.io_lock.lock().await;
        let mut doc = BoardDocument::read(&self.path).await?;
        // Attempts are held in a map; compare them in the order `document` yields
        doc.attempts.sort_by(|a, b| a.id.cmp(&b.id));

        if doc.project.id != self.project {
            return Err(TaskboardError::InvalidDocument(
                self.path.display().to_string(),
                format!(
                    "project changed from '{}' to '{}'",
                    self.project, doc.project.id
                ),
            ));
        }

        if doc == self.document().await? {
            return Ok(false);
        }

        self.memory.clear_attempts();
        self.memory
            .load_project(doc.project, doc.tasks, doc.shared_tasks, doc.attempts);
        tracing::debug!(path = %self.path.display(), "board document reloaded");
        Ok(true)
    }

    /// Write the document with `update` applied, then publish it.
    ///
    /// Memory is only touched after the write succeeds, so a failed write
    /// leaves the live streams and the file in agreement.
    async fn persist_update(&self, task: &TaskId, update: TaskUpdate) -> Result<Task> {
        let _guard = self.io_lock.lock().await;
        let mut doc = self.document().await?;
        let entry = doc
            .tasks
            .iter_mut()
            .find(|t| &t.id == task)
            .ok_or_else(|| TaskboardError::TaskNotFound(task.to_string()))?;
        update.apply_to(entry);

        if let Err(e) = doc.write(&self.path).await {
            tracing::warn!(path = %self.path.display(), "failed to write board document: {e}");
            return Err(e);
        }
        self.memory.update_task(task, update).await
    }
}

#[async_trait]
impl TaskStore for FileStore {
    async fn get_project(&self, project: &ProjectId) -> Result<Project> {
        self.memory.get_project(project).await
    }

    fn watch_tasks(&self, project: &ProjectId) -> Result<Feed<Task>> {
        self.memory.watch_tasks(project)
    }

    fn watch_shared_tasks(&self, project: &ProjectId) -> Result<Feed<SharedTask>> {
        self.memory.watch_shared_tasks(project)
    }

    async fn update_task(&self, task: &TaskId, update: TaskUpdate) -> Result<Task> {
        self.persist_update(task, update).await
    }

    async fn resolve_latest_attempt(&self, task: &TaskId) -> Result<Option<AttemptId>> {
        self.memory.resolve_latest_attempt(task).await
    }

    async fn get_attempt(&self, attempt: &AttemptId) -> Result<Attempt> {
        self.memory.get_attempt(attempt).await
    }

    async fn count_workspaces(&self) -> Result<usize> {
        self.memory.count_workspaces().await
    }
}
