//! Keyboard routing for the board.
//!
//! Key events are mapped to [`KeyAction`]s by a pure function so the bindings
//! can be tested without a terminal. Whether the board listens at all is
//! decided by the explicitly passed [`ScopeSet`].

use std::collections::BTreeSet;

use iocraft::prelude::{KeyCode, KeyModifiers};
use serde::Serialize;

use crate::error::{Result, TaskboardError};

use super::selection::NavDirection;

/// Named input scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The board's own bindings
    Kanban,
    /// A follow-up message is being composed; it owns the keyboard
    FollowUpReady,
    /// A modal dialog is open
    Dialog,
}

/// The set of currently enabled scopes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet {
    enabled: BTreeSet<Scope>,
}

impl ScopeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set with only the board scope enabled
    pub fn kanban() -> Self {
        let mut scopes = Self::new();
        scopes.enable(Scope::Kanban);
        scopes
    }

    pub fn enable(&mut self, scope: Scope) {
        self.enabled.insert(scope);
    }

    pub fn disable(&mut self, scope: Scope) {
        self.enabled.remove(&scope);
    }

    pub fn is_enabled(&self, scope: Scope) -> bool {
        self.enabled.contains(&scope)
    }

    /// Board bindings fire only with the board scope on and no competing scope
    pub fn board_active(&self) -> bool {
        self.is_enabled(Scope::Kanban)
            && !self.is_enabled(Scope::FollowUpReady)
            && !self.is_enabled(Scope::Dialog)
    }
}

/// Result from handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandleResult {
    /// Event was handled, stop processing
    Handled,
    /// Event was not handled, continue to next handler
    #[default]
    NotHandled,
}

impl HandleResult {
    pub fn is_handled(self) -> bool {
        matches!(self, HandleResult::Handled)
    }
}

/// Actions the board binds keys to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Create,
    FocusSearch,
    /// Close the open panel, or leave the board when none is open
    Exit,
    Navigate(NavDirection),
    /// Open the selected task, or cycle the view mode forward when a panel is open
    OpenDetails,
    CycleBackward,
    Delete,
}

/// Map a key event to a board action (pure function)
///
/// Returns `None` when the board is not the active scope or the key is unbound.
pub fn key_to_action(code: KeyCode, modifiers: KeyModifiers, scopes: &ScopeSet) -> Option<KeyAction> {
    if !scopes.board_active() {
        return None;
    }

    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    let shift = modifiers.contains(KeyModifiers::SHIFT);

    match code {
        KeyCode::Enter if ctrl && shift => Some(KeyAction::CycleBackward),
        KeyCode::Enter => Some(KeyAction::OpenDetails),
        KeyCode::BackTab => Some(KeyAction::CycleBackward),

        // Letter bindings never fire with Ctrl held
        _ if ctrl => None,

        KeyCode::Char('k') | KeyCode::Up => Some(KeyAction::Navigate(NavDirection::Up)),
        KeyCode::Char('j') | KeyCode::Down => Some(KeyAction::Navigate(NavDirection::Down)),
        KeyCode::Char('h') | KeyCode::Left => Some(KeyAction::Navigate(NavDirection::Left)),
        KeyCode::Char('l') | KeyCode::Right => Some(KeyAction::Navigate(NavDirection::Right)),

        KeyCode::Char('c') => Some(KeyAction::Create),
        KeyCode::Char('/') => Some(KeyAction::FocusSearch),
        KeyCode::Esc => Some(KeyAction::Exit),
        KeyCode::Char('d') | KeyCode::Delete => Some(KeyAction::Delete),

        _ => None,
    }
}

/// A single key event, as parsed from a key script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyPress {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub fn action(&self, scopes: &ScopeSet) -> Option<KeyAction> {
        key_to_action(self.code, self.modifiers, scopes)
    }
}

/// Parse one key token such as `j`, `enter`, `ctrl+enter` or `shift+tab`
pub fn parse_key(token: &str) -> Result<KeyPress> {
    let invalid = || TaskboardError::InvalidKey(token.to_string());

    let mut parts: Vec<&str> = token.split('+').collect();
    let key = parts.pop().filter(|k| !k.is_empty()).ok_or_else(invalid)?;

    let mut modifiers = KeyModifiers::NONE;
    for part in parts {
        modifiers |= match part.to_ascii_lowercase().as_str() {
            "ctrl" | "control" | "cmd" | "meta" => KeyModifiers::CONTROL,
            "shift" => KeyModifiers::SHIFT,
            "alt" => KeyModifiers::ALT,
            _ => return Err(invalid()),
        };
    }

    let code = match key.to_ascii_lowercase().as_str() {
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "delete" | "del" => KeyCode::Delete,
        "backtab" => KeyCode::BackTab,
        "tab" if modifiers.contains(KeyModifiers::SHIFT) => {
            modifiers.remove(KeyModifiers::SHIFT);
            KeyCode::BackTab
        }
        "tab" => KeyCode::Tab,
        "space" => KeyCode::Char(' '),
        _ => {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return Err(invalid()),
            }
        }
    };

    Ok(KeyPress::new(code, modifiers))
}

/// Parse a whitespace-separated key script
pub fn parse_key_script(script: &str) -> Result<Vec<KeyPress>> {
    script.split_whitespace().map(parse_key).collect()
}
