//! The navigable address: route path plus query parameters, and the
//! history that records it.

use std::fmt;

use serde::Serialize;
use url::Url;

use crate::error::{Result, TaskboardError};
use crate::types::{AttemptId, ProjectId, TaskId};

/// Base used to resolve relative addresses
const BASE_URL: &str = "http://taskboard.local/";

/// Query key carrying the view mode
pub const VIEW_KEY: &str = "view";
/// Query key carrying the shared-task visibility toggle
pub const SHARED_KEY: &str = "shared";
/// Literal attempt segment asking for the newest attempt
pub const LATEST_ATTEMPT: &str = "latest";

/// Which attempt an attempt route points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptRef {
    Latest,
    Id(AttemptId),
}

impl AttemptRef {
    pub fn id(&self) -> Option<&AttemptId> {
        match self {
            AttemptRef::Latest => None,
            AttemptRef::Id(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    Projects,
    ProjectTasks {
        project: ProjectId,
    },
    Task {
        project: ProjectId,
        task: TaskId,
    },
    Attempt {
        project: ProjectId,
        task: TaskId,
        attempt: AttemptRef,
    },
    Workspaces {
        attempt: Option<AttemptId>,
    },
}

impl Route {
    pub fn project(&self) -> Option<&ProjectId> {
        match self {
            Route::ProjectTasks { project }
            | Route::Task { project, .. }
            | Route::Attempt { project, .. } => Some(project),
            Route::Projects | Route::Workspaces { .. } => None,
        }
    }

    /// Task the route opens, if any
    pub fn task(&self) -> Option<&TaskId> {
        match self {
            Route::Task { task, .. } | Route::Attempt { task, .. } => Some(task),
            _ => None,
        }
    }

    pub fn attempt(&self) -> Option<&AttemptRef> {
        match self {
            Route::Attempt { attempt, .. } => Some(attempt),
            _ => None,
        }
    }

    /// Whether this route belongs to the board of `project`
    pub fn is_board_of(&self, project: &ProjectId) -> bool {
        self.project() == Some(project)
    }

    pub fn path(&self) -> String {
        match self {
            Route::Projects => "/projects".to_string(),
            Route::ProjectTasks { project } => format!("/projects/{project}/tasks"),
            Route::Task { project, task } => format!("/projects/{project}/tasks/{task}"),
            Route::Attempt {
                project,
                task,
                attempt,
            } => {
                let attempt = match attempt {
                    AttemptRef::Latest => LATEST_ATTEMPT,
                    AttemptRef::Id(id) => id.as_str(),
                };
                format!("/projects/{project}/tasks/{task}/attempts/{attempt}")
            }
            Route::Workspaces { attempt: None } => "/workspaces".to_string(),
            Route::Workspaces { attempt: Some(id) } => format!("/workspaces/{id}"),
        }
    }

    fn from_segments(segments: &[&str]) -> Option<Route> {
        let route = match segments {
            ["projects"] => Route::Projects,
            ["projects", project, "tasks"] => Route::ProjectTasks {
                project: ProjectId::new(*project),
            },
            ["projects", project, "tasks", task] => Route::Task {
                project: ProjectId::new(*project),
                task: TaskId::new(*task),
            },
            ["projects", project, "tasks", task, "attempts", attempt] => Route::Attempt {
                project: ProjectId::new(*project),
                task: TaskId::new(*task),
                attempt: if *attempt == LATEST_ATTEMPT {
                    AttemptRef::Latest
                } else {
                    AttemptRef::Id(AttemptId::new(*attempt))
                },
            },
            ["workspaces"] => Route::Workspaces { attempt: None },
            ["workspaces", attempt] => Route::Workspaces {
                attempt: Some(AttemptId::new(*attempt)),
            },
            _ => return None,
        };
        Some(route)
    }
}

/// A route plus ordered query parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub route: Route,
    pub query: Vec<(String, String)>,
}

impl Address {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            query: Vec::new(),
        }
    }

    /// Parse an absolute URL or an absolute path such as
    /// `/projects/p1/tasks/t1?view=diffs`
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(BASE_URL)?.join(input.trim())?;
        let invalid = |reason: &str| TaskboardError::InvalidAddress(input.to_string(), reason.to_string());

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let route = Route::from_segments(&segments).ok_or_else(|| invalid("unknown route"))?;

        let query = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self { route, query })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a query value, replacing the first occurrence and dropping repeats
    pub fn set(&mut self, key: &str, value: &str) {
        match self.query.iter().position(|(k, _)| k == key) {
            Some(idx) => {
                self.query[idx].1 = value.to_string();
                let mut seen = false;
                self.query.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.query.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.query.retain(|(k, _)| k != key);
    }

    /// Same query, different route
    pub fn with_route(&self, route: Route) -> Self {
        Self {
            route,
            query: self.query.clone(),
        }
    }

    /// `shared=off` hides shared tasks assigned to other users
    pub fn show_shared(&self) -> bool {
        self.get(SHARED_KEY) != Some("off")
    }

    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.route.path())?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query_string())?;
        }
        Ok(())
    }
}

/// How an address change enters the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationKind {
    Push,
    Replace,
}

/// Linear back/forward history of addresses
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Address>,
    index: usize,
}

impl History {
    pub fn new(initial: Address) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
        }
    }

    pub fn current(&self) -> &Address {
        &self.entries[self.index]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn navigate(&mut self, address: Address, kind: NavigationKind) {
        match kind {
            NavigationKind::Push => self.push(address),
            NavigationKind::Replace => self.replace(address),
        }
    }

    /// Add an entry, discarding anything forward of the current one
    pub fn push(&mut self, address: Address) {
        self.entries.truncate(self.index + 1);
        self.entries.push(address);
        self.index = self.entries.len() - 1;
    }

    pub fn replace(&mut self, address: Address) {
        self.entries[self.index] = address;
    }

    /// Step back; returns false at the oldest entry
    pub fn back(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    pub fn forward(&mut self) -> bool {
        if self.index + 1 >= self.entries.len() {
            return false;
        }
        self.index += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_routes() {
        assert_eq!(Address::parse("/projects").unwrap().route, Route::Projects);
        assert_eq!(
            Address::parse("/projects/p1/tasks/").unwrap().route,
            Route::ProjectTasks {
                project: ProjectId::new("p1")
            }
        );
        assert_eq!(
            Address::parse("/projects/p1/tasks/t1/attempts/latest")
                .unwrap()
                .route,
            Route::Attempt {
                project: ProjectId::new("p1"),
                task: TaskId::new("t1"),
                attempt: AttemptRef::Latest,
            }
        );
        assert_eq!(
            Address::parse("http://example.com/workspaces/a1").unwrap().route,
            Route::Workspaces {
                attempt: Some(AttemptId::new("a1"))
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_routes() {
        assert!(matches!(
            Address::parse("/settings"),
            Err(TaskboardError::InvalidAddress(_, _))
        ));
    }

    #[test]
    fn test_query_round_trip_preserves_order() {
        let address = Address::parse("/projects/p1/tasks?shared=off&view=diffs&q=a%20b").unwrap();
        assert_eq!(address.get("view"), Some("diffs"));
        assert_eq!(address.get("q"), Some("a b"));
        assert!(!address.show_shared());
        assert_eq!(address.to_string(), "/projects/p1/tasks?shared=off&view=diffs&q=a+b");
    }

    #[test]
    fn test_set_and_remove() {
        let mut address = Address::parse("/projects/p1/tasks?view=logs&view=spike").unwrap();
        address.set(VIEW_KEY, "diffs");
        assert_eq!(address.query, vec![("view".to_string(), "diffs".to_string())]);

        address.set(SHARED_KEY, "on");
        assert!(address.show_shared());
        address.remove(VIEW_KEY);
        assert_eq!(address.to_string(), "/projects/p1/tasks?shared=on");
    }

    #[test]
    fn test_history_push_replace_back_forward() {
        let first = Address::parse("/projects").unwrap();
        let second = Address::parse("/projects/p1/tasks").unwrap();
        let third = Address::parse("/projects/p1/tasks/t1").unwrap();

        let mut history = History::new(first.clone());
        history.push(second.clone());
        history.replace(third.clone());
        assert_eq!(history.len(), 2);
        assert_eq!(history.current(), &third);

        assert!(history.back());
        assert_eq!(history.current(), &first);
        assert!(!history.back());
        assert!(history.forward());
        assert!(!history.forward());

        history.back();
        history.push(second.clone());
        assert_eq!(history.len(), 2);
        assert_eq!(history.current(), &second);
    }
}
