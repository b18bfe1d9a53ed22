use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskboardError {
    #[error("task '{0}' not found")]
    TaskNotFound(String),

    #[error("attempt '{0}' not found")]
    AttemptNotFound(String),

    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    #[error("invalid status '{0}'")]
    InvalidStatus(String),

    #[error("invalid view mode '{0}'")]
    InvalidViewMode(String),

    #[error("invalid address '{0}': {1}")]
    InvalidAddress(String, String),

    #[error("invalid key '{0}'")]
    InvalidKey(String),

    #[error("invalid board document '{0}': {1}")]
    InvalidDocument(String, String),

    // Backing store errors
    #[error("store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TaskboardError>;
