//! Shared builders for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use jiff::Timestamp;
use taskboard::board::prompts::TASK_PANEL_SHOWCASE;
use taskboard::board::{
    Address, AnalyticsSink, BoardController, BoardHost, BoardRuntime, HeadlessHost,
    RecordingSink,
};
use taskboard::{
    Attempt, AttemptId, Config, MemoryStore, Project, ProjectId, SharedTask, SharedTaskId,
    StatusKey, Task, TaskId, UserId, UserSystem,
};

pub const PROJECT: &str = "p1";

pub fn ts(secs: i64) -> Timestamp {
    Timestamp::from_second(secs).unwrap()
}

pub fn project_id() -> ProjectId {
    ProjectId::new(PROJECT)
}

/// Builder for owned tasks
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            task: Task {
                id: TaskId::new(id),
                title: format!("Task {id}"),
                description: None,
                status: StatusKey::parse("todo"),
                parent_workspace_id: None,
                shared_task_id: None,
                created_at: ts(0),
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.task.title = title.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.task.description = Some(description.to_string());
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.task.status = StatusKey::parse(status);
        self
    }

    pub fn created(mut self, secs: i64) -> Self {
        self.task.created_at = ts(secs);
        self
    }

    pub fn shared(mut self, shared: &str) -> Self {
        self.task.shared_task_id = Some(SharedTaskId::new(shared));
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

pub fn task(id: &str, status: &str, secs: i64) -> Task {
    TaskBuilder::new(id).status(status).created(secs).build()
}

pub fn shared_task(id: &str, status: &str, assignee: Option<&str>, secs: i64) -> SharedTask {
    SharedTask {
        id: SharedTaskId::new(id),
        title: format!("Shared {id}"),
        description: None,
        status: StatusKey::parse(status),
        assignee_user_id: assignee.map(UserId::new),
        created_at: ts(secs),
    }
}

pub fn attempt(id: &str, task: &str, secs: i64) -> Attempt {
    Attempt {
        id: AttemptId::new(id),
        task_id: TaskId::new(task),
        branch: format!("tb/{id}"),
        is_running: false,
        session_id: None,
        created_at: ts(secs),
    }
}

/// Config for user `u1` with every prompt already answered
pub fn quiet_config() -> Config {
    let mut config = Config::default();
    config.set_user(UserId::new("u1"));
    config.mark_feature_seen(TASK_PANEL_SHOWCASE);
    config.beta_workspaces_invitation_sent = true;
    config
}

pub fn memory_store(tasks: Vec<Task>, shared: Vec<SharedTask>, attempts: Vec<Attempt>) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.load_project(
        Project {
            id: project_id(),
            name: "Demo".to_string(),
        },
        tasks,
        shared,
        attempts,
    );
    Arc::new(store)
}

/// A runtime wired to a store, a headless host and a recording sink
pub struct Harness {
    pub runtime: BoardRuntime,
    pub users: UserSystem,
    pub host: Arc<HeadlessHost>,
    pub analytics: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(store: Arc<MemoryStore>, config: Config, address: &str) -> Self {
        Self::with_host(store, config, address, HeadlessHost::new())
    }

    pub fn with_host(store: Arc<MemoryStore>, config: Config, address: &str, host: HeadlessHost) -> Self {
        let users = UserSystem::in_memory(config);
        let host = Arc::new(host);
        let analytics = Arc::new(RecordingSink::new());
        let controller = BoardController::new(project_id(), users.clone(), Address::parse(address).unwrap());
        let runtime = BoardRuntime::new(
            controller,
            store,
            Arc::clone(&host) as Arc<dyn BoardHost>,
            Arc::clone(&analytics) as Arc<dyn AnalyticsSink>,
        );
        Self {
            runtime,
            users,
            host,
            analytics,
        }
    }
}
