use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;

use crate::model::{FileId, TodoEntry};

const TODO_PATTERN: &str = r"//\s*TODO:(.*)";

static MATCHER: LazyLock<TodoMatcher> = LazyLock::new(TodoMatcher::new);

/// Line matcher for `// TODO:` comments.
///
/// The marker may appear anywhere in the line; whatever follows `TODO:` up to
/// the end of the line is the entry text, trimmed.
#[derive(Debug, Clone)]
pub struct TodoMatcher {
    pattern: Regex,
}

impl TodoMatcher {
    pub fn new() -> Self {
        let pattern = Regex::new(TODO_PATTERN).expect("TODO pattern is a valid regex");
        Self { pattern }
    }

    /// Returns the trimmed text after the first marker in `line`.
    pub fn match_line<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
    }

    pub fn scan_text(&self, file_id: &FileId, text: &str) -> Vec<TodoEntry> {
        text.split('\n')
            .enumerate()
            .filter_map(|(idx, line)| {
                self.match_line(line).map(|found| TodoEntry {
                    text: found.to_string(),
                    file_id: file_id.clone(),
                    line_number: idx + 1,
                })
            })
            .collect()
    }
}

impl Default for TodoMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Entries for a single file's text, in line order.
pub fn scan_text(file_id: &FileId, text: &str) -> Vec<TodoEntry> {
    MATCHER.scan_text(file_id, text)
}

/// Scans every file and keeps only the ones with at least one entry.
///
/// Files are processed in parallel; the output keeps the input order.
pub fn scan(files: &[(FileId, String)]) -> Vec<(FileId, Vec<TodoEntry>)> {
    files
        .par_iter()
        .map(|(file_id, text)| (file_id.clone(), scan_text(file_id, text)))
        .filter(|(_, entries)| !entries.is_empty())
        .collect()
}
