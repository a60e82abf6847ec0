use std::error::Error;
use std::sync::{Arc, Mutex, PoisonError};

use regex::Regex;
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    tool, tool_handler, tool_router,
    transport::stdio,
};
use schemars::JsonSchema;
use serde::Deserialize;
use todo_tracker_core::{Notice, Snapshot, TodoIndex};
use todo_tracker_fs::{DEFAULT_SETTLE, PathFilter, WorkspaceFiles, background_watcher};
use tokio::task;
use tracing::{error, info};

use crate::cli::ScanArgs;
use crate::render::render_text;

const BUILDING_WARNING: &str =
    "Index is still building; the list below may be incomplete. Try again shortly.";

#[derive(Clone)]
pub struct TodoServer {
    index: Arc<TodoIndex>,
    /// Set when a rescan is skipped or fails, cleared by the next good one.
    last_notice: Arc<Mutex<Option<Notice>>>,
    tool_router: ToolRouter<TodoServer>,
}

impl TodoServer {
    fn internal_error(code: &str, message: impl Into<String>) -> McpError {
        let full = format!("{code}: {}", message.into());
        McpError::internal_error(full, None)
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct ListTodosArgs {
    /// Only files whose root-relative path matches this regex
    #[serde(default)]
    pub file_regex: Option<String>,
}

/// Text blocks of a `list_todos` answer: a status line when the list cannot
/// be trusted yet, then the rendered tree.
fn list_contents(snapshot: &Snapshot, filtered: &Snapshot, notice: Option<&Notice>) -> Vec<String> {
    let mut contents = Vec::new();
    match notice {
        Some(notice) => contents.push(notice.to_string()),
        None if snapshot.generation == 0 => contents.push(BUILDING_WARNING.to_string()),
        None => {}
    }
    contents.push(render_text(filtered));
    contents
}

/// Keeps only groups whose display name matches `file_regex`.
fn filter_snapshot(snapshot: &Snapshot, file_regex: Option<&Regex>) -> Snapshot {
    let Some(re) = file_regex else {
        return snapshot.clone();
    };

    let groups = snapshot
        .groups
        .iter()
        .filter(|group| re.is_match(&group.display_name))
        .cloned()
        .collect();
    Snapshot::from_groups(groups, snapshot.generation)
}

#[tool_router]
impl TodoServer {
    /// Must be created before the index starts, or the first notice is missed.
    pub fn new(index: Arc<TodoIndex>) -> Self {
        let last_notice: Arc<Mutex<Option<Notice>>> = Arc::new(Mutex::new(None));

        let notice_slot = Arc::clone(&last_notice);
        let _notices = index.subscribe_notices(move |notice| {
            info!("notice: {notice}");
            *notice_slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(notice.clone());
        });
        let notice_slot = Arc::clone(&last_notice);
        let _snapshots = index.subscribe(move |_| {
            *notice_slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        });

        Self {
            index,
            last_notice,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "List every `// TODO:` comment in the workspace, grouped by file, with line numbers. The list is kept up to date with file changes."
    )]
    pub async fn list_todos(
        &self,
        Parameters(args): Parameters<ListTodosArgs>,
    ) -> Result<CallToolResult, McpError> {
        let file_regex = args
            .file_regex
            .as_ref()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| Self::internal_error("invalid_file_regex", e.to_string()))
            })
            .transpose()?;

        let snapshot = self.index.snapshot();
        let filtered = filter_snapshot(&snapshot, file_regex.as_ref());
        let notice = self
            .last_notice
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let contents = list_contents(&snapshot, &filtered, notice.as_ref())
            .into_iter()
            .map(Content::text)
            .collect();
        Ok(CallToolResult::success(contents))
    }

    #[tool(description = "Request a full rescan of the workspace for TODO comments.")]
    pub async fn refresh_todos(&self) -> Result<CallToolResult, McpError> {
        self.index.request_rescan();
        Ok(CallToolResult::success(vec![Content::text(
            "Refreshing TODOs...",
        )]))
    }
}

#[tool_handler]
impl ServerHandler for TodoServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Live list of `// TODO:` comments in the current workspace, grouped by file. Use `list_todos` to read it and `refresh_todos` to force a rescan."
                    .to_string(),
            ),
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
        }
    }
}

pub async fn run_server(scan: ScanArgs) -> Result<(), Box<dyn Error>> {
    let root = scan.root();
    let rules = scan.rules();

    info!("todo_tracker MCP server starting");
    if let Some(root) = &root {
        info!("root: {}", root.display());
    }

    let source = WorkspaceFiles::new(root.clone(), rules.clone());
    let index = Arc::new(TodoIndex::new(Arc::new(source)));
    let server = TodoServer::new(Arc::clone(&index));
    index.start()?;

    // Keep the index in sync with file changes.
    if let Some(root) = root {
        let filter = PathFilter::new(&root, &rules)?;
        let index_for_watcher = Arc::clone(&index);
        task::spawn(async move {
            let root = filter.root().to_path_buf();
            if let Err(err) =
                background_watcher(root, filter, index_for_watcher, DEFAULT_SETTLE).await
            {
                error!("file watcher stopped: {err}");
            }
        });
    }

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| error!("todo_tracker MCP serve error: {e:?}"))?;

    service.waiting().await?;

    let index_for_stop = Arc::clone(&index);
    task::spawn_blocking(move || index_for_stop.stop()).await?;
    Ok(())
}
