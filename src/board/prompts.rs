//! Cancellable asynchronous prompts (feature showcase, beta invitation).

use std::collections::BTreeMap;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Showcase id of the task panel
pub const TASK_PANEL_SHOWCASE: &str = "task-panel-onboarding";

/// Workspace count above which the beta invitation is offered
pub const BETA_INVITATION_THRESHOLD: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "prompt", rename_all = "snake_case")]
pub enum PromptKind {
    FeatureShowcase { feature: String },
    BetaInvitation,
}

/// Identifier of one shown prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PromptId(pub u64);

/// Answer a prompt settles with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptAnswer {
    Dismissed,
    Accepted,
    Declined,
}

/// Tracks open prompts and the tokens that cancel them.
///
/// Every prompt token is a child of one root token, so tearing the tracker
/// down cancels all of them at once.
#[derive(Debug)]
pub struct PromptTracker {
    root: CancellationToken,
    next_id: u64,
    open: BTreeMap<PromptId, (PromptKind, CancellationToken)>,
}

impl Default for PromptTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptTracker {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            next_id: 1,
            open: BTreeMap::new(),
        }
    }

    /// Register a new prompt; `None` when one of the same kind is already open
    /// or the tracker was torn down
    pub fn open(&mut self, kind: PromptKind) -> Option<(PromptId, CancellationToken)> {
        if self.root.is_cancelled() || self.is_open(&kind) {
            return None;
        }
        let id = PromptId(self.next_id);
        self.next_id += 1;
        let token = self.root.child_token();
        self.open.insert(id, (kind, token.clone()));
        Some((id, token))
    }

    pub fn is_open(&self, kind: &PromptKind) -> bool {
        self.open.values().any(|(open, _)| open == kind)
    }

    /// Close a prompt and return its kind, unless it was cancelled or unknown
    pub fn settle(&mut self, id: PromptId) -> Option<PromptKind> {
        let (kind, token) = self.open.remove(&id)?;
        if token.is_cancelled() {
            debug!(prompt = id.0, "ignoring answer of cancelled prompt");
            return None;
        }
        Some(kind)
    }

    /// Cancel every open prompt and refuse new ones
    pub fn cancel_all(&mut self) {
        if !self.open.is_empty() {
            debug!(count = self.open.len(), "cancelling open prompts");
        }
        self.root.cancel();
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
