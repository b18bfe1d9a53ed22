use std::path::Path;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::board::{BoardEvent, HeadlessHost, TracingSink};
use crate::error::{Result, TaskboardError};
use crate::store::{DocumentWatcher, StoreEvent};

use super::{BoardFilters, board_runtime, open_store, print_board, session_users};

/// Reprint the board whenever the document changes, until Ctrl-C
pub async fn cmd_watch(file: &Path, filters: &BoardFilters) -> Result<()> {
    let store = open_store(file).await?;
    let (_watcher, mut store_events) = DocumentWatcher::start(Arc::clone(&store))?;
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

    let mut views = runtime.subscribe();
    print_board(&views.borrow_and_update());

    let (_events_tx, events_rx) = mpsc::channel::<BoardEvent>(16);
    let cancel = CancellationToken::new();
    let board = tokio::spawn(runtime.run(events_rx, cancel.clone()));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = Arc::clone(&views.borrow_and_update());
                println!();
                print_board(&view);
            }
            event = store_events.recv() => match event {
                Ok(StoreEvent::Reloaded) => debug!(file = %file.display(), "document reloaded"),
                Ok(StoreEvent::ReloadFailed(message)) => {
                    warn!(file = %file.display(), error = %message, "keeping last good board");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "store events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    cancel.cancel();
    board
        .await
        .map_err(|e| TaskboardError::Other(format!("board task failed: {e}")))?;
    Ok(())
}
