use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Args;
use todo_tracker_core::{Notice, Snapshot, TodoIndex};
use todo_tracker_fs::{FileRules, PathFilter, WorkspaceFiles, background_watcher};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task;
use tracing::{error, info, warn};

use crate::render::{render_json, render_text};

/// Options shared by every subcommand that scans a tree.
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Project root (defaults to the current directory)
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Glob of files to scan, gitignore syntax; repeatable, replaces the defaults
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,
    /// Glob to skip, gitignore syntax; repeatable, replaces the defaults
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,
    /// Also scan files ignored by .gitignore
    #[arg(long = "no-gitignore")]
    pub no_gitignore: bool,
}

impl ScanArgs {
    pub fn root(&self) -> Option<PathBuf> {
        self.root
            .clone()
            .or_else(|| std::env::current_dir().ok())
    }

    pub fn rules(&self) -> FileRules {
        let mut rules = FileRules::default();
        if !self.include.is_empty() {
            rules.include = self.include.clone();
        }
        if !self.exclude.is_empty() {
            rules.exclude = self.exclude.clone();
        }
        rules.respect_gitignore = !self.no_gitignore;
        rules
    }

    fn index(&self) -> (Option<PathBuf>, FileRules, Arc<TodoIndex>) {
        let root = self.root();
        let rules = self.rules();
        let source = WorkspaceFiles::new(root.clone(), rules.clone());
        (root, rules, Arc::new(TodoIndex::new(Arc::new(source))))
    }
}

/// Initialize tracing for CLI commands (list/watch).
///
/// Logs go to stderr, and respect RUST_LOG or default to `info`.
pub fn init_tracing_cli() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize tracing for MCP server.
///
/// - Never logs to stdout (to keep stdio clean for JSON-RPC).
/// - If `TODO_TRACKER_LOG_PATH` is set, append logs to that file.
/// - If not set or file cannot be opened, logging is effectively disabled.
pub fn init_tracing_server() {
    use std::fs::OpenOptions;
    use tracing_subscriber::{EnvFilter, fmt};

    let path = match std::env::var("TODO_TRACKER_LOG_PATH") {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => return,
    };

    if OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .is_err()
    {
        return;
    }

    let make_writer = move || {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .expect("failed to open TODO_TRACKER_LOG_PATH for logging")
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(make_writer)
        .init();
}

fn print_snapshot(snapshot: &Snapshot, json: bool) {
    if !json {
        print!("{}", render_text(snapshot));
        return;
    }

    match render_json(snapshot) {
        Ok(text) => println!("{text}"),
        Err(err) => warn!("failed to encode snapshot as JSON: {err}"),
    }
}

/// Scans once, prints the tree and exits.
pub async fn run_list(scan: ScanArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (root, _, index) = scan.index();
    if let Some(root) = &root {
        info!("Scanning {}", root.display());
    }

    let notices: Arc<Mutex<Vec<Notice>>> = Arc::new(Mutex::new(Vec::new()));
    let notices_for_listener = Arc::clone(&notices);
    let _notices = index.subscribe_notices(move |notice| {
        eprintln!("{notice}");
        if let Ok(mut seen) = notices_for_listener.lock() {
            seen.push(notice.clone());
        }
    });

    let index_for_scan = Arc::clone(&index);
    task::spawn_blocking(move || -> Result<(), todo_tracker_core::TodoError> {
        index_for_scan.start()?;
        index_for_scan.flush()?;
        index_for_scan.stop();
        Ok(())
    })
    .await??;

    let failed = notices
        .lock()
        .map(|seen| seen.iter().any(|n| matches!(n, Notice::DiscoveryFailed(_))))
        .unwrap_or(false);
    if failed {
        error!("Scan failed; no results to show");
        std::process::exit(1);
    }

    print_snapshot(&index.snapshot(), json);
    Ok(())
}

/// Keeps the index live: prints the tree after every rescan, rescans on file
/// changes and whenever a line is entered on stdin, stops on Ctrl-C.
pub async fn run_watch(
    scan: ScanArgs,
    settle: Duration,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (root, rules, index) = scan.index();

    let filter = match &root {
        Some(root) => match PathFilter::new(root, &rules) {
            Ok(filter) => Some(filter),
            Err(err) => {
                error!("Invalid file rules: {err}");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let _render = index.subscribe(move |snapshot| print_snapshot(snapshot, json));
    let _notices = index.subscribe_notices(|notice| eprintln!("{notice}"));

    eprintln!("Refreshing TODOs...");
    index.start()?;

    let watch_task = filter.map(|filter| {
        let index_for_watcher = Arc::clone(&index);
        task::spawn(async move {
            let root = filter.root().to_path_buf();
            if let Err(err) = background_watcher(root, filter, index_for_watcher, settle).await {
                error!("file watcher stopped: {err}");
            }
        })
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => {
                    eprintln!("Refreshing TODOs...");
                    index.request_rescan();
                }
                Ok(None) => stdin_open = false,
                Err(err) => {
                    warn!("stdin closed: {err}");
                    stdin_open = false;
                }
            },
        }
    }

    if let Some(handle) = watch_task {
        handle.abort();
    }

    let index_for_stop = Arc::clone(&index);
    task::spawn_blocking(move || index_for_stop.stop()).await?;
    info!("watch stopped");
    Ok(())
}
