pub mod discovery;
pub mod watcher;

pub use discovery::{
    DEFAULT_EXCLUDE, DEFAULT_INCLUDE, FileRules, PathFilter, WorkspaceFiles, normalize_root,
};
pub use watcher::{DEFAULT_SETTLE, background_watcher};
