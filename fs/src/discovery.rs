use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use todo_tracker_core::{
    FileId, FileSource, TodoError, TodoResult, read_text_file, relative_display_name,
};
use tracing::{debug, warn};

pub const DEFAULT_INCLUDE: &[&str] = &["*.{js,ts,jsx,tsx,html,css}"];
pub const DEFAULT_EXCLUDE: &[&str] = &["node_modules/", ".git/", "dist/", "out/"];

/// Which files under the root are eligible for scanning.
///
/// Globs use gitignore syntax relative to the root. A pattern ending in `/`
/// only matches directories, which are then skipped entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRules {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub respect_gitignore: bool,
}

impl Default for FileRules {
    fn default() -> Self {
        Self {
            include: DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect(),
            exclude: DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect(),
            respect_gitignore: true,
        }
    }
}

impl FileRules {
    fn overrides(&self, root: &Path) -> TodoResult<Override> {
        let mut builder = OverrideBuilder::new(root);
        for glob in &self.include {
            builder
                .add(glob)
                .map_err(|e| TodoError::Discovery(format!("invalid include glob {glob:?}: {e}")))?;
        }
        for glob in &self.exclude {
            builder
                .add(&format!("!{glob}"))
                .map_err(|e| TodoError::Discovery(format!("invalid exclude glob {glob:?}: {e}")))?;
        }
        builder
            .build()
            .map_err(|e| TodoError::Discovery(format!("failed to build glob set: {e}")))
    }
}

/// Canonical form of a root so that paths reported by the OS watcher and
/// paths produced by the walker share a prefix.
pub fn normalize_root(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}

/// Decides whether a path is covered by the rules, without touching the disk.
///
/// Exclusions apply to directories (anything below an excluded directory is
/// out); inclusions apply to file paths relative to the root.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    overrides: Override,
}

impl PathFilter {
    pub fn new(root: &Path, rules: &FileRules) -> TodoResult<Self> {
        let root = normalize_root(root);
        let overrides = rules.overrides(&root)?;
        Ok(Self { root, overrides })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_excluded_dir(&self, rel_dir: &Path) -> bool {
        rel_dir.file_name().is_some_and(|name| name == ".git")
            || self.overrides.matched(rel_dir, true).is_ignore()
    }

    fn is_included_file(&self, rel: &Path) -> bool {
        self.overrides.matched(rel, false).is_whitelist()
    }

    /// Root-relative form of `path`, if it lies strictly below the root and
    /// none of its parent directories is excluded.
    fn visible_rel<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        let rel = path.strip_prefix(&self.root).ok()?;

        let components: Vec<_> = rel.components().collect();
        let (_, parents) = components.split_last()?;

        let mut dir = PathBuf::new();
        for component in parents {
            dir.push(component);
            if self.is_excluded_dir(&dir) {
                return None;
            }
        }

        Some(rel)
    }

    pub fn is_candidate(&self, path: &Path) -> bool {
        self.visible_rel(path)
            .is_some_and(|rel| self.is_included_file(rel))
    }

    /// Whether `path` may be a directory holding candidates, e.g. one side of
    /// a directory rename. A path that no longer exists is judged by its
    /// name: no extension means directory.
    pub fn may_hold_candidates(&self, path: &Path) -> bool {
        self.visible_rel(path).is_some() && (path.is_dir() || path.extension().is_none())
    }
}

/// File source backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct WorkspaceFiles {
    root: Option<PathBuf>,
    rules: FileRules,
}

impl WorkspaceFiles {
    pub fn new(root: Option<PathBuf>, rules: FileRules) -> Self {
        Self {
            root: root.map(|r| normalize_root(&r)),
            rules,
        }
    }
}

impl FileSource for WorkspaceFiles {
    fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn find_files(&self) -> TodoResult<Vec<FileId>> {
        let root = self.root.as_deref().ok_or(TodoError::NoWorkspace)?;
        if !root.is_dir() {
            return Err(TodoError::Discovery(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        // Globs are applied here rather than as walker overrides: overrides
        // take precedence over .gitignore, which would re-include ignored files.
        let filter = PathFilter::new(root, &self.rules)?;
        let dir_filter = filter.clone();
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .ignore(self.rules.respect_gitignore)
            .git_ignore(self.rules.respect_gitignore)
            .git_exclude(self.rules.respect_gitignore)
            .require_git(false)
            .parents(true)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                    return true;
                }
                match entry.path().strip_prefix(dir_filter.root()) {
                    Ok(rel) => !dir_filter.is_excluded_dir(rel),
                    Err(_) => true,
                }
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!("find_files: failed to read entry: {err}");
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            let included = entry
                .path()
                .strip_prefix(filter.root())
                .is_ok_and(|rel| filter.is_included_file(rel));
            if included {
                files.push(FileId::new(entry.into_path()));
            }
        }

        debug!("find_files: {} eligible files under {}", files.len(), root.display());
        Ok(files)
    }

    fn read_text(&self, file_id: &FileId) -> TodoResult<String> {
        match read_text_file(file_id.path()) {
            Ok(Some(text)) => Ok(text),
            Ok(None) => Err(TodoError::read(file_id.path(), "binary or non-UTF-8 content")),
            Err(err) => Err(TodoError::read(file_id.path(), err)),
        }
    }

    fn display_name(&self, file_id: &FileId) -> String {
        match self.root.as_deref() {
            Some(root) => relative_display_name(root, file_id.path()),
            None => file_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &[u8]) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn names(source: &WorkspaceFiles) -> Vec<String> {
        source
            .find_files()
            .unwrap()
            .iter()
            .map(|id| source.display_name(id))
            .collect()
    }

    #[test]
    fn test_default_rules_match_web_sources() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.js", b"");
        write(temp_dir.path(), "b.ts", b"");
        write(temp_dir.path(), "c.tsx", b"");
        write(temp_dir.path(), "style.css", b"");
        write(temp_dir.path(), "index.html", b"");
        write(temp_dir.path(), "main.rs", b"");
        write(temp_dir.path(), "README.md", b"");

        let source = WorkspaceFiles::new(Some(temp_dir.path().to_path_buf()), FileRules::default());
        assert_eq!(
            names(&source),
            vec!["a.js", "b.ts", "c.tsx", "index.html", "style.css"]
        );
    }

    #[test]
    fn test_default_excludes_skip_build_dirs() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "src/app.js", b"");
        write(temp_dir.path(), "node_modules/lib/index.js", b"");
        write(temp_dir.path(), "dist/bundle.js", b"");
        write(temp_dir.path(), "out/main.js", b"");
        write(temp_dir.path(), ".git/hooks/pre-commit.js", b"");

        let source = WorkspaceFiles::new(Some(temp_dir.path().to_path_buf()), FileRules::default());
        assert_eq!(names(&source), vec!["src/app.js"]);
    }

    #[test]
    fn test_respects_gitignore_unless_disabled() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), ".gitignore", b"generated.js\n");
        write(temp_dir.path(), "generated.js", b"");
        write(temp_dir.path(), "kept.js", b"");

        let root = Some(temp_dir.path().to_path_buf());
        let source = WorkspaceFiles::new(root.clone(), FileRules::default());
        assert_eq!(names(&source), vec!["kept.js"]);

        let rules = FileRules {
            respect_gitignore: false,
            ..FileRules::default()
        };
        let source = WorkspaceFiles::new(root, rules);
        assert_eq!(names(&source), vec!["generated.js", "kept.js"]);
    }

    #[test]
    fn test_custom_rules() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "lib.rs", b"");
        write(temp_dir.path(), "vendor/dep.rs", b"");
        write(temp_dir.path(), "app.js", b"");

        let rules = FileRules {
            include: vec!["*.rs".to_string()],
            exclude: vec!["vendor/".to_string()],
            respect_gitignore: true,
        };
        let source = WorkspaceFiles::new(Some(temp_dir.path().to_path_buf()), rules);
        assert_eq!(names(&source), vec!["lib.rs"]);
    }

    #[test]
    fn test_nested_display_names_use_slashes() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a/b/c/deep.ts", b"");

        let source = WorkspaceFiles::new(Some(temp_dir.path().to_path_buf()), FileRules::default());
        assert_eq!(names(&source), vec!["a/b/c/deep.ts"]);
    }

    #[test]
    fn test_no_root_is_no_workspace() {
        let source = WorkspaceFiles::new(None, FileRules::default());
        assert!(source.root().is_none());
        assert!(matches!(source.find_files(), Err(TodoError::NoWorkspace)));
    }

    #[test]
    fn test_missing_root_is_discovery_error() {
        let temp_dir = TempDir::new().unwrap();
        let source = WorkspaceFiles::new(
            Some(temp_dir.path().join("does-not-exist")),
            FileRules::default(),
        );
        assert!(matches!(source.find_files(), Err(TodoError::Discovery(_))));
    }

    #[test]
    fn test_invalid_glob_is_discovery_error() {
        let temp_dir = TempDir::new().unwrap();
        let rules = FileRules {
            include: vec!["src/{a,b".to_string()],
            ..FileRules::default()
        };
        let source = WorkspaceFiles::new(Some(temp_dir.path().to_path_buf()), rules.clone());
        assert!(matches!(source.find_files(), Err(TodoError::Discovery(_))));
        assert!(PathFilter::new(temp_dir.path(), &rules).is_err());
    }

    #[test]
    fn test_read_text_rejects_binary() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "text.js", b"// TODO: ok\n");
        write(temp_dir.path(), "blob.js", b"\x00\x01\x02// TODO: hidden");

        let source = WorkspaceFiles::new(Some(temp_dir.path().to_path_buf()), FileRules::default());
        let files = source.find_files().unwrap();
        assert_eq!(files.len(), 2);

        let blob = files.iter().find(|f| f.path().ends_with("blob.js")).unwrap();
        let text = files.iter().find(|f| f.path().ends_with("text.js")).unwrap();
        assert!(matches!(source.read_text(blob), Err(TodoError::Read { .. })));
        assert_eq!(source.read_text(text).unwrap(), "// TODO: ok\n");
    }

    #[test]
    fn test_read_text_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = WorkspaceFiles::new(Some(temp_dir.path().to_path_buf()), FileRules::default());
        let gone = FileId::new(temp_dir.path().join("gone.js"));
        assert!(matches!(source.read_text(&gone), Err(TodoError::Read { .. })));
    }

    #[test]
    fn test_path_filter() {
        let temp_dir = TempDir::new().unwrap();
        let filter = PathFilter::new(temp_dir.path(), &FileRules::default()).unwrap();
        let root = filter.root().to_path_buf();

        assert!(filter.is_candidate(&root.join("a.js")));
        assert!(filter.is_candidate(&root.join("src/deep/b.tsx")));
        assert!(!filter.is_candidate(&root.join("main.rs")));
        assert!(!filter.is_candidate(&root.join("node_modules/x/index.js")));
        assert!(!filter.is_candidate(&root.join("packages/web/dist/out.js")));
        assert!(!filter.is_candidate(&root.join(".git/index.js")));
        assert!(!filter.is_candidate(Path::new("/somewhere/else/a.js")));
        assert!(!filter.is_candidate(&root));
    }

    #[test]
    fn test_path_filter_directories() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "lib/v1.2/a.js", b"");
        let filter = PathFilter::new(temp_dir.path(), &FileRules::default()).unwrap();
        let root = filter.root().to_path_buf();

        assert!(filter.may_hold_candidates(&root.join("src")));
        assert!(filter.may_hold_candidates(&root.join("gone/deeper")));
        assert!(filter.may_hold_candidates(&root.join("lib/v1.2")));
        // Renaming a directory into an excluded name must still be noticed.
        assert!(filter.may_hold_candidates(&root.join("node_modules")));
        assert!(!filter.may_hold_candidates(&root.join("node_modules/pkg")));
        assert!(!filter.may_hold_candidates(&root.join("notes.txt")));
        assert!(!filter.may_hold_candidates(&root));
        assert!(!filter.may_hold_candidates(Path::new("/somewhere/else/src")));
    }
}
