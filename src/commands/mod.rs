//! CLI command implementations.

mod config;
mod play;
mod show;
mod watch;

pub use config::{cmd_config_path, cmd_config_set_user, cmd_config_show};
pub use play::{PlayOptions, cmd_play};
pub use show::cmd_show;
pub use watch::cmd_watch;

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use crate::board::address::SHARED_KEY;
use crate::board::{
    Address, AnalyticsSink, BoardController, BoardHost, BoardRuntime, BoardViewModel, Route,
};
use crate::config::UserSystem;
use crate::display::{RenderOptions, render_board};
use crate::error::Result;
use crate::store::FileStore;
use crate::types::UserId;

/// Board filters shared by `show` and `watch`
#[derive(Debug, Clone, Default)]
pub struct BoardFilters {
    pub search: Option<String>,
    pub user: Option<String>,
    pub hide_shared: bool,
}

impl BoardFilters {
    /// The board address these filters describe
    fn address(&self, store: &FileStore) -> Address {
        let mut address = Address::new(Route::ProjectTasks {
            project: store.project_id().clone(),
        });
        if self.hide_shared {
            address.set(SHARED_KEY, "off");
        }
        address
    }
}

/// The user configuration as seen by one command run.
///
/// Commands work on an in-memory copy so that prompts answered without a user
/// never rewrite the config file.
fn session_users(user: Option<&str>) -> Result<UserSystem> {
    let users = UserSystem::in_memory(UserSystem::load()?.snapshot());
    if let Some(user) = user {
        users.update(|config| config.set_user(UserId::new(user)));
    }
    Ok(users)
}

/// Build a runtime for the document's board at `address`
fn board_runtime(
    store: &Arc<FileStore>,
    users: UserSystem,
    address: Address,
    host: Arc<dyn BoardHost>,
    analytics: Arc<dyn AnalyticsSink>,
) -> BoardRuntime {
    let controller = BoardController::new(store.project_id().clone(), users, address);
    BoardRuntime::new(controller, Arc::clone(store) as _, host, analytics)
}

async fn open_store(file: &Path) -> Result<Arc<FileStore>> {
    FileStore::open(file).await
}

fn stdout_options() -> RenderOptions {
    if std::io::stdout().is_terminal() {
        RenderOptions::colored()
    } else {
        RenderOptions::plain()
    }
}

fn print_board(view: &BoardViewModel) {
    println!("{}", render_board(view, stdout_options()));
}
