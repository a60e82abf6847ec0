use serde::Serialize;
use todo_tracker_core::{Snapshot, TreeNode};

#[derive(Serialize)]
struct JsonReport {
    total_count: usize,
    generation: u64,
    badge: String,
    files: Vec<TreeNode>,
}

/// Plain-text tree: badge line, then one line per file and one indented line
/// per entry ending with its `path:line` location.
pub fn render_text(snapshot: &Snapshot) -> String {
    let mut out = format!("{}\n", snapshot.badge());

    for node in snapshot.tree() {
        let TreeNode::File {
            display_name,
            count,
            children,
            ..
        } = node
        else {
            continue;
        };

        out.push_str(&format!("{display_name} ({count})\n"));
        for child in children {
            if let TreeNode::Entry { text, location, .. } = child {
                let line = location.line_number;
                out.push_str(&format!("  L{line}: {text}  [{display_name}:{line}]\n"));
            }
        }
    }

    out
}

pub fn render_json(snapshot: &Snapshot) -> serde_json::Result<String> {
    let report = JsonReport {
        total_count: snapshot.total_count,
        generation: snapshot.generation,
        badge: snapshot.badge(),
        files: snapshot.tree(),
    };
    serde_json::to_string_pretty(&report)
}
