use std::path::Path;
use std::sync::Arc;

use crate::board::{BoardEvent, HeadlessHost, TracingSink};
use crate::error::Result;

use super::{BoardFilters, board_runtime, open_store, print_board, session_users};

/// Print the partitioned board of a document
pub async fn cmd_show(file: &Path, filters: &BoardFilters, json: bool) -> Result<()> {
    let store = open_store(file).await?;
    let users = session_users(filters.user.as_deref())?;
    let address = filters.address(&store);

    let mut runtime = board_runtime(
        &store,
        users,
        address,
        Arc::new(HeadlessHost::new()),
        Arc::new(TracingSink),
    );
    runtime.start().await;
    if let Some(search) = &filters.search {
        runtime.dispatch(BoardEvent::SetSearch(search.clone())).await;
    }

    let view = runtime.view_model();
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_board(&view);
    }
    Ok(())
}
