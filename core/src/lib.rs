pub mod error;
pub mod index;
pub mod model;
pub mod scanner;
pub mod source;
pub mod subscribers;
pub mod text;

pub use error::{TodoError, TodoResult};
pub use index::{IndexState, TodoIndex};
pub use model::{FileGroup, FileId, OpenTarget, Snapshot, TodoEntry, TreeNode};
pub use scanner::{TodoMatcher, scan, scan_text};
pub use source::{FileSource, Notice};
pub use subscribers::{ListenerSet, Subscription};
pub use text::{read_text_file, relative_display_name};
