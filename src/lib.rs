#[macro_use]
mod macros;

pub mod board;
pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod store;
pub mod types;

pub use board::{BoardController, BoardEvent, BoardRuntime, BoardViewModel};
pub use config::{Config, UserSystem};
pub use error::{Result, TaskboardError};
pub use store::{FileStore, MemoryStore, TaskStore};
pub use types::{
    Attempt, AttemptId, Project, ProjectId, SharedTask, SharedTaskId, StatusKey, Task, TaskId,
    TaskStatus, TaskUpdate, UserId,
};
