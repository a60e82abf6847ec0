use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TodoError {
    #[error("no workspace root configured")]
    NoWorkspace,

    #[error("failed to read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("file discovery failed: {0}")]
    Discovery(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("index worker is not running")]
    IndexStopped,

    #[error("flush called from an index listener")]
    FlushFromListener,
}

impl TodoError {
    pub fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TodoError::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type TodoResult<T> = Result<T, TodoError>;
