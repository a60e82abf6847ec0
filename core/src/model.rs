use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Opaque handle for a source file. The file source decides what the path
/// means; the index only compares and displays it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FileId(PathBuf);

impl FileId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for FileId {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&str> for FileId {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// One matched line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoEntry {
    pub text: String,
    pub file_id: FileId,
    /// 1-based.
    pub line_number: usize,
}

impl TodoEntry {
    pub fn description(&self, display_name: &str) -> String {
        format!("{display_name} - Line {}", self.line_number)
    }

    pub fn tooltip(&self, display_name: &str) -> String {
        format!("{} - {}", self.text, self.description(display_name))
    }

    pub fn open_target(&self) -> OpenTarget {
        OpenTarget {
            file_id: self.file_id.clone(),
            line_number: self.line_number,
        }
    }
}

/// Where a presentation layer should jump to when an entry is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenTarget {
    pub file_id: FileId,
    pub line_number: usize,
}

impl OpenTarget {
    /// `path#L<line>`, the fragment form editors accept for open-at-line.
    pub fn uri_fragment(&self) -> String {
        format!("{}#L{}", self.file_id, self.line_number)
    }
}

impl fmt::Display for OpenTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_id, self.line_number)
    }
}

/// All entries of one file, in line order. Never empty inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileGroup {
    pub file_id: FileId,
    pub display_name: String,
    pub entries: Vec<TodoEntry>,
}

impl FileGroup {
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

/// Immutable view of every known entry, grouped by file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub groups: Vec<FileGroup>,
    pub total_count: usize,
    /// Number of completed rescans; 0 means nothing has been scanned yet.
    pub generation: u64,
}

impl Snapshot {
    /// Builds a snapshot from scanner output. Empty groups are dropped and
    /// `total_count` is derived from what remains.
    pub fn from_groups(groups: Vec<FileGroup>, generation: u64) -> Self {
        let groups: Vec<FileGroup> = groups.into_iter().filter(|g| !g.entries.is_empty()).collect();
        let total_count = groups.iter().map(FileGroup::count).sum();
        Self {
            groups,
            total_count,
            generation,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Badge text for the total count.
    pub fn badge(&self) -> String {
        format!("{} TODO(s) found", self.total_count)
    }

    pub fn tree(&self) -> Vec<TreeNode> {
        self.groups
            .iter()
            .map(|group| TreeNode::File {
                file_id: group.file_id.clone(),
                display_name: group.display_name.clone(),
                count: group.count(),
                children: group
                    .entries
                    .iter()
                    .map(|entry| {
                        let location = entry.open_target();
                        TreeNode::Entry {
                            text: entry.text.clone(),
                            description: entry.description(&group.display_name),
                            tooltip: entry.tooltip(&group.display_name),
                            uri: location.uri_fragment(),
                            location,
                        }
                    })
                    .collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    File {
        file_id: FileId,
        display_name: String,
        count: usize,
        children: Vec<TreeNode>,
    },
    Entry {
        text: String,
        description: String,
        tooltip: String,
        /// `path#L<line>` form of `location`.
        uri: String,
        location: OpenTarget,
    },
}
