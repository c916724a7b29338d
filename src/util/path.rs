//! Lexical path handling, no filesystem access.

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components and drop trailing slashes.
pub fn normalize(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !matches!(components.last(), Some(Component::RootDir) | None) {
                    components.pop();
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Whether `path` lies inside `root` once both are normalized.
pub fn is_within(path: &Path, root: &Path) -> bool {
    normalize(path).starts_with(normalize(root))
}
