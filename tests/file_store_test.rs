//! End-to-end tests of a board backed by a document on disk.

mod common;

use std::sync::Arc;

use common::quiet_config;
use taskboard::board::keyboard::parse_key_script;
use taskboard::board::{
    Address, AnalyticsSink, BoardEvent, DragEnd, HeadlessHost, RecordingSink, Selection, ViewMode,
};
use futures::{FutureExt, StreamExt};
use taskboard::store::{BoardDocument, FeedUpdate};
use taskboard::{
    BoardController, BoardRuntime, FileStore, StatusKey, TaskId, TaskStatus, TaskStore,
    TaskUpdate, UserSystem,
};
use tempfile::TempDir;

const DOC: &str = r#"
project:
  id: web
  name: Website
tasks:
  - id: home
    title: Redesign home page
    status: inprogress
    created_at: 2024-03-01T09:00:00Z
  - id: auth
    title: Fix login redirect
    status: todo
    created_at: 2024-03-02T09:00:00Z
shared_tasks:
  - id: seo
    title: SEO audit
    status: todo
    assignee_user_id: u2
    created_at: 2024-03-03T09:00:00Z
attempts:
  - id: run-1
    task_id: auth
    branch: tb/auth-1
    created_at: 2024-03-04T09:00:00Z
"#;

async fn open(dir: &TempDir) -> Arc<FileStore> {
    let path = dir.path().join("board.yaml");
    std::fs::write(&path, DOC).unwrap();
    FileStore::open(path).await.unwrap()
}

fn runtime(store: &Arc<FileStore>, address: &str) -> (BoardRuntime, Arc<RecordingSink>) {
    let analytics = Arc::new(RecordingSink::new());
    let controller = BoardController::new(
        store.project_id().clone(),
        UserSystem::in_memory(quiet_config()),
        Address::parse(address).unwrap(),
    );
    let runtime = BoardRuntime::new(
        controller,
        Arc::clone(store) as Arc<dyn TaskStore>,
        Arc::new(HeadlessHost::new()),
        Arc::clone(&analytics) as Arc<dyn AnalyticsSink>,
    );
    (runtime, analytics)
}

#[tokio::test]
async fn test_key_script_against_document() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let (mut runtime, analytics) = runtime(&store, "/projects/web/tasks");
    runtime.start().await;

    for press in parse_key_script("j enter enter").unwrap() {
        runtime.dispatch(BoardEvent::Key(press)).await;
    }

    let board = runtime.controller();
    assert_eq!(board.selection(), Selection::Local(TaskId::new("auth")));
    assert_eq!(board.effective_mode(), ViewMode::Diffs);
    assert_eq!(
        board.address().to_string(),
        "/projects/web/tasks/auth/attempts/run-1?view=diffs"
    );
    assert_eq!(analytics.events().len(), 2);
}

#[tokio::test]
async fn test_drag_writes_document() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let (mut runtime, _) = runtime(&store, "/projects/web/tasks");
    runtime.start().await;

    runtime
        .dispatch(BoardEvent::Drag(DragEnd::new("home", Some("inreview"))))
        .await;

    let doc = BoardDocument::read(store.path()).await.unwrap();
    let home = doc.tasks.iter().find(|t| t.id.as_str() == "home").unwrap();
    assert_eq!(home.status, StatusKey::Known(TaskStatus::InReview));
    assert_eq!(home.title, "Redesign home page");
    assert_eq!(doc.shared_tasks.len(), 1);
}

#[tokio::test]
async fn test_reload_publishes_to_board() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let (mut runtime, _) = runtime(&store, "/projects/web/tasks");
    runtime.start().await;
    assert_eq!(runtime.view_model().columns.fixed(TaskStatus::Done).items.len(), 0);

    let edited = DOC.replace("status: inprogress", "status: done");
    std::fs::write(store.path(), edited).unwrap();
    assert!(store.reload().await.unwrap());

    runtime.dispatch(BoardEvent::SetSearch(String::new())).await;
    assert_eq!(runtime.view_model().columns.fixed(TaskStatus::Done).items.len(), 1);
}

#[tokio::test]
async fn test_failed_write_leaves_stream_untouched() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let mut feed = store.watch_tasks(store.project_id()).unwrap();
    assert!(matches!(feed.next().await, Some(FeedUpdate::Snapshot(_))));

    // A directory where the temp file goes makes the atomic write fail
    std::fs::create_dir(store.path().with_extension("tmp")).unwrap();
    let result = store
        .update_task(
            &TaskId::new("home"),
            TaskUpdate {
                status: Some(TaskStatus::Done),
                ..Default::default()
            },
        )
        .await;
    assert!(result.is_err());

    assert!(feed.next().now_or_never().is_none());
    let tasks = store.memory().tasks(store.project_id()).unwrap();
    let home = tasks.iter().find(|t| t.id.as_str() == "home").unwrap();
    assert_eq!(home.status, StatusKey::Known(TaskStatus::InProgress));
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), DOC);
}
