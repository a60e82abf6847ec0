use std::fmt;
use std::path::Path;

use crate::error::TodoResult;
use crate::model::FileId;

/// The file-system collaborators the index needs: discovery, reading and
/// display names. Discovery rules (which files are eligible) belong to the
/// implementation.
pub trait FileSource: Send + Sync {
    /// Project root, or `None` when no workspace is open.
    fn root(&self) -> Option<&Path>;

    fn find_files(&self) -> TodoResult<Vec<FileId>>;

    fn read_text(&self, file_id: &FileId) -> TodoResult<String>;

    fn display_name(&self, file_id: &FileId) -> String;
}

/// Informational messages for the presentation layer. None of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NoWorkspace,
    DiscoveryFailed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoWorkspace => write!(f, "No workspace folder found."),
            Notice::DiscoveryFailed(reason) => write!(f, "Could not list files: {reason}"),
        }
    }
}
