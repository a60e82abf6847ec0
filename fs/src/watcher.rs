use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use todo_tracker_core::TodoIndex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::discovery::PathFilter;

pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

/// Watches `root` and turns every create/change/delete of an eligible file
/// into a rescan request. Events arriving within `settle` of the first one
/// are folded into the same request.
pub async fn background_watcher(
    root: PathBuf,
    filter: PathFilter,
    index: Arc<TodoIndex>,
    settle: Duration,
) -> notify::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher: RecommendedWatcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    debug!("watcher: watching {}", root.display());

    while let Some(res) = rx.recv().await {
        if !is_relevant(res, &filter) {
            continue;
        }

        tokio::time::sleep(settle).await;
        let mut folded = 0usize;
        while rx.try_recv().is_ok() {
            folded += 1;
        }
        debug!("watcher: change detected, {folded} queued event(s) folded into one rescan");
        index.request_rescan();
    }

    Ok(())
}

fn is_relevant(res: notify::Result<Event>, filter: &PathFilter) -> bool {
    let event = match res {
        Ok(event) => event,
        Err(err) => {
            warn!("file watcher error: {err}");
            return false;
        }
    };

    match event.kind {
        // Directory events carry only the directory path, so files that moved
        // or vanished with it are never named.
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
            event
                .paths
                .iter()
                .any(|path| filter.is_candidate(path) || filter.may_hold_candidates(path))
        }
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            event.paths.iter().any(|path| filter.is_candidate(path))
        }
        _ => false,
    }
}
