use std::path::Path;
use std::sync::Arc;

use owo_colors::OwoColorize;
use serde_json::json;

use crate::board::{
    Address, BoardEvent, HeadlessHost, RecordingSink, Selection, parse_key_script,
};
use crate::error::Result;

use super::{BoardFilters, board_runtime, open_store, session_users};

/// Options of the `play` command
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    /// Whitespace-separated key script, e.g. `j j enter esc`
    pub keys: String,
    /// Starting address; the project's task list when absent
    pub address: Option<String>,
    pub user: Option<String>,
    pub json: bool,
}

fn describe_selection(selection: &Selection) -> String {
    match selection {
        Selection::Idle => "none".to_string(),
        Selection::Local(id) => format!("task {id}"),
        Selection::Shared(id) => format!("shared task {id}"),
    }
}

/// Replay a key script against a document's board
pub async fn cmd_play(file: &Path, options: &PlayOptions) -> Result<()> {
    let presses = parse_key_script(&options.keys)?;
    let store = open_store(file).await?;
    let users = session_users(options.user.as_deref())?;
    let address = match &options.address {
        Some(address) => Address::parse(address)?,
        None => BoardFilters::default().address(&store),
    };

    let host = Arc::new(HeadlessHost::new());
    let analytics = Arc::new(RecordingSink::new());
    let mut runtime = board_runtime(
        &store,
        users,
        address,
        Arc::clone(&host) as _,
        Arc::clone(&analytics) as _,
    );
    runtime.start().await;
    for press in presses {
        runtime.dispatch(BoardEvent::Key(press)).await;
    }

    let board = runtime.controller();
    let events = analytics.events();
    let calls = host.calls();

    if options.json {
        let output = json!({
            "address": board.address().to_string(),
            "selection": board.selection(),
            "effective_mode": board.effective_mode(),
            "analytics": events,
            "host_calls": calls,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} {}", "Address:".bold(), board.address());
    println!("{} {}", "Selection:".bold(), describe_selection(&board.selection()));
    println!("{} {}", "View mode:".bold(), board.effective_mode());
    if events.is_empty() {
        println!("{} none", "Analytics:".bold());
    } else {
        println!("{}", "Analytics:".bold());
        for event in &events {
            println!("  {} ({:?})", event.name.cyan(), event.direction);
        }
    }
    for call in &calls {
        println!("{} {:?}", "Host:".dimmed(), call);
    }
    Ok(())
}
