//! Filesystem watcher for a board document.
//!
//! Watches the directory containing the document (so editors that save via
//! rename are still seen) and reloads the [`FileStore`] when the document
//! changes. Uses `notify::RecommendedWatcher` with a tokio channel bridge and
//! custom debouncing.

use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TaskboardError};

use super::FileStore;

/// Duration to wait for additional events before reloading.
const DEBOUNCE_DURATION: Duration = Duration::from_millis(150);

/// Capacity of the bounded channel bridging `notify` events to tokio.
const CHANNEL_CAPACITY: usize = 64;

/// Delay before retrying a document that failed to parse (likely mid-write).
const RETRY_DELAY: Duration = Duration::from_millis(300);

/// Maximum number of reload attempts per batch of changes.
const MAX_RETRY_ATTEMPTS: u8 = 3;

/// Notification sent after the watcher processed a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The document changed and the store published new snapshots.
    Reloaded,
    /// The document could not be reloaded; the store kept its last good state.
    ReloadFailed(String),
}

/// Watches a board document and keeps a [`FileStore`] in sync with it.
///
/// The watcher must be kept alive; dropping it stops watching.
pub struct DocumentWatcher {
    sender: broadcast::Sender<StoreEvent>,
    cancel: CancellationToken,
    _watcher: notify::RecommendedWatcher,
}

impl DocumentWatcher {
    /// Start watching the store's document.
    ///
    /// Must be called from within a tokio runtime; the debounce loop runs on a
    /// spawned task.
    pub fn start(store: Arc<FileStore>) -> Result<(Self, broadcast::Receiver<StoreEvent>)> {
        let (broadcast_tx, broadcast_rx) = broadcast::channel(16);
        let (bridge_tx, bridge_rx) = mpsc::channel::<()>(CHANNEL_CAPACITY);

        let path = store.path().to_path_buf();
        let target = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| {
                TaskboardError::Config(format!("'{}' is not a file path", path.display()))
            })?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };

        let mut watcher = notify::RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if is_document_event(&event, &target) {
                        // A full channel already guarantees a pending reload
                        let _ = bridge_tx.try_send(());
                    }
                }
                Err(e) => {
                    tracing::warn!("filesystem watcher error: {e}");
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let cancel = CancellationToken::new();
        let task_tx = broadcast_tx.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            run_event_loop(bridge_rx, store, task_tx, task_cancel).await;
        });

        Ok((
            DocumentWatcher {
                sender: broadcast_tx,
                cancel,
                _watcher: watcher,
            },
            broadcast_rx,
        ))
    }

    /// Subscribe to store change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }
}

impl Drop for DocumentWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Background loop: waits for a change, drains further changes within the
/// debounce window, then reloads once.
async fn run_event_loop(
    mut bridge_rx: mpsc::Receiver<()>,
    store: Arc<FileStore>,
    broadcast_tx: broadcast::Sender<StoreEvent>,
    cancel: CancellationToken,
) {
    loop {
        let first = tokio::select! {
            _ = cancel.cancelled() => return,
            event = bridge_rx.recv() => event,
        };
        if first.is_none() {
            return;
        }

        loop {
            match tokio::time::timeout(DEBOUNCE_DURATION, bridge_rx.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => {
                    reload_with_retry(&store, &broadcast_tx, &cancel).await;
                    return;
                }
                Err(_) => break,
            }
        }

        reload_with_retry(&store, &broadcast_tx, &cancel).await;
    }
}

/// Reload the document, retrying a bounded number of times when it cannot be
/// parsed. Only the first failure and the final give-up are logged.
async fn reload_with_retry(
    store: &FileStore,
    broadcast_tx: &broadcast::Sender<StoreEvent>,
    cancel: &CancellationToken,
) {
    for attempt in 1..=MAX_RETRY_ATTEMPTS {
        match store.reload().await {
            Ok(true) => {
                let _ = broadcast_tx.send(StoreEvent::Reloaded);
                return;
            }
            Ok(false) => return,
            Err(e) => {
                if attempt == MAX_RETRY_ATTEMPTS {
                    tracing::warn!(
                        path = %store.path().display(),
                        "giving up on reloading board document after {MAX_RETRY_ATTEMPTS} attempts: {e}"
                    );
                    let _ = broadcast_tx.send(StoreEvent::ReloadFailed(e.to_string()));
                    return;
                }
                if attempt == 1 {
                    tracing::warn!(
                        path = %store.path().display(),
                        "failed to reload board document (will retry): {e}"
                    );
                }
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }
}

/// Whether a notify event touches the watched document
fn is_document_event(event: &notify::Event, target: &OsString) -> bool {
    let relevant_kind = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    relevant_kind
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(target.as_os_str()))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;
    use tokio::time::timeout;

    use super::*;

    const DOC: &str = r#"
project:
  id: p-1
  name: Demo
tasks:
  - id: t-1
    title: First
    status: todo
    created_at: 2024-01-01T00:00:00Z
"#;

    fn event(kind: EventKind, path: &str) -> notify::Event {
        notify::Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_is_document_event() {
        let target = OsString::from("board.yaml");
        assert!(is_document_event(
            &event(
                EventKind::Modify(notify::event::ModifyKind::Any),
                "/tmp/x/board.yaml"
            ),
            &target
        ));
        assert!(is_document_event(
            &event(
                EventKind::Create(notify::event::CreateKind::File),
                "/tmp/x/board.yaml"
            ),
            &target
        ));
        assert!(!is_document_event(
            &event(
                EventKind::Modify(notify::event::ModifyKind::Any),
                "/tmp/x/board.tmp"
            ),
            &target
        ));
        assert!(!is_document_event(
            &event(
                EventKind::Access(notify::event::AccessKind::Read),
                "/tmp/x/board.yaml"
            ),
            &target
        ));
    }

    #[tokio::test]
    async fn test_reload_with_retry_reports_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("board.yaml");
        fs::write(&path, DOC).unwrap();
        let store = FileStore::open(&path).await.unwrap();

        fs::write(&path, "project: [").unwrap();
        let (tx, mut rx) = broadcast::channel(4);
        reload_with_retry(&store, &tx, &CancellationToken::new()).await;

        assert!(matches!(rx.try_recv(), Ok(StoreEvent::ReloadFailed(_))));
    }

    #[tokio::test]
    async fn test_reload_with_retry_reports_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("board.yaml");
        fs::write(&path, DOC).unwrap();
        let store = FileStore::open(&path).await.unwrap();

        fs::write(&path, DOC.replace("First", "Renamed")).unwrap();
        let (tx, mut rx) = broadcast::channel(4);
        reload_with_retry(&store, &tx, &CancellationToken::new()).await;

        assert_eq!(rx.try_recv().unwrap(), StoreEvent::Reloaded);
    }

    #[tokio::test]
    async fn test_watcher_reloads_on_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("board.yaml");
        fs::write(&path, DOC).unwrap();
        let store = FileStore::open(&path).await.unwrap();

        let (_watcher, mut rx) = DocumentWatcher::start(Arc::clone(&store)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&path, DOC.replace("First", "Edited on disk")).unwrap();

        let received = timeout(Duration::from_secs(3), rx.recv()).await;
        assert!(matches!(received, Ok(Ok(StoreEvent::Reloaded))));
        let tasks = store.memory().tasks(store.project_id()).unwrap();
        assert_eq!(tasks[0].title, "Edited on disk");
    }
}
