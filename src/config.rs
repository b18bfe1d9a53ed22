//! Top-level application configuration.
//!
//! Configuration is stored in `<config dir>/taskboard/config.yaml` and includes:
//! - The current user identity
//! - Feature-showcase "seen" flags
//! - Beta workspace opt-in state
//! - The shared-task link policy
//!
//! The live configuration is owned by a [`UserSystem`], created once at startup
//! and handed to every consumer explicitly.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::board::sources::LinkPolicy;
use crate::error::{Result, TaskboardError};
use crate::types::UserId;

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "TASKBOARD_CONFIG";

/// Environment variable overriding the configured user
pub const USER_ENV: &str = "TASKBOARD_USER";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Identity of the current user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// Feature showcase state
    #[serde(default, skip_serializing_if = "ShowcaseConfig::is_default")]
    pub showcases: ShowcaseConfig,

    /// Whether the user opted into the workspaces beta
    #[serde(default)]
    pub beta_workspaces: bool,

    /// Whether the workspaces beta invitation has been answered
    #[serde(default)]
    pub beta_workspaces_invitation_sent: bool,

    /// How local tasks are matched to shared tasks
    #[serde(default)]
    pub link_policy: LinkPolicy,
}

/// Feature showcase configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowcaseConfig {
    /// Ids of showcases the user has already dismissed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seen_features: Vec<String>,
}

impl ShowcaseConfig {
    /// Check if this config has default values
    pub fn is_default(&self) -> bool {
        self.seen_features.is_empty()
    }

    pub fn has_seen(&self, feature: &str) -> bool {
        self.seen_features.iter().any(|f| f == feature)
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        directories::ProjectDirs::from("", "", "taskboard")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
            .ok_or_else(|| TaskboardError::Config("no home directory available".to_string()))
    }

    /// Load configuration from file, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path()?)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            TaskboardError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config at {}: {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_yaml_ng::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TaskboardError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create directory for config at {}: {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;
        }

        let content = serde_yaml_ng::to_string(self)?;
        fs::write(&path, content).map_err(|e| {
            TaskboardError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write config at {}: {}", path.display(), e),
            ))
        })?;

        // Set restrictive permissions on Unix (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, permissions).map_err(|e| {
                TaskboardError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to set permissions on config at {}: {}",
                        path.display(),
                        e
                    ),
                ))
            })?;
        }

        Ok(())
    }

    /// Get the current user from the environment or the config file
    pub fn current_user(&self) -> Option<UserId> {
        resolve_user(env::var(USER_ENV).ok(), self.user_id.as_ref())
    }

    pub fn set_user(&mut self, user: UserId) {
        self.user_id = Some(user);
    }

    /// Record a showcase as seen; returns false if it already was
    pub fn mark_feature_seen(&mut self, feature: &str) -> bool {
        if self.showcases.has_seen(feature) {
            return false;
        }
        self.showcases.seen_features.push(feature.to_string());
        true
    }
}

fn resolve_user(from_env: Option<String>, configured: Option<&UserId>) -> Option<UserId> {
    match from_env {
        Some(user) if !user.is_empty() => Some(UserId::new(user)),
        _ => configured.cloned(),
    }
}

/// Shared, explicitly injected handle to the live configuration.
///
/// Cloning the handle shares the same configuration. Updates made through one
/// clone are visible to all others. `update_and_save` persists to the path the
/// system was created with; systems created with [`UserSystem::in_memory`]
/// never touch the filesystem.
#[derive(Debug, Clone)]
pub struct UserSystem {
    config: Arc<RwLock<Config>>,
    path: Option<PathBuf>,
}

impl UserSystem {
    /// Load the configuration from the default location
    pub fn load() -> Result<Self> {
        let path = Config::config_path()?;
        let config = Config::load_from(path.clone())?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            path: Some(path),
        })
    }

    /// Load the configuration from an explicit path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        let config = Config::load_from(path.clone())?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            path: Some(path),
        })
    }

    pub fn in_memory(config: Config) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    /// A copy of the current configuration
    pub fn snapshot(&self) -> Config {
        self.config.read().clone()
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.config.read().current_user()
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// Apply a change to the live configuration without persisting it
    pub fn update<R>(&self, f: impl FnOnce(&mut Config) -> R) -> R {
        f(&mut self.config.write())
    }

    /// Apply a change and persist the result
    pub fn update_and_save<R>(&self, f: impl FnOnce(&mut Config) -> R) -> Result<R> {
        let (result, snapshot) = {
            let mut guard = self.config.write();
            let result = f(&mut guard);
            (result, guard.clone())
        };

        if let Some(path) = &self.path {
            snapshot.save_to(path.clone())?;
        }
        Ok(result)
    }
}
