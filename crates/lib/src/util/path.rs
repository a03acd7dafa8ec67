//! Path normalization for matching module locations.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by resolving `.` and `..` components without requiring
/// the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
  let mut components = Vec::new();

  for component in path.components() {
    match component {
      Component::ParentDir => {
        match components.last() {
          Some(Component::Normal(_)) => {
            components.pop();
          }
          Some(Component::RootDir | Component::Prefix(_)) => {}
          _ => components.push(component),
        }
      }
      Component::CurDir => {}
      other => components.push(other),
    }
  }

  components.iter().collect()
}

/// Canonical form used as a lookup key.
///
/// Existing paths are canonicalized (symlinks resolved, no UNC prefix on
/// Windows); paths that do not exist are normalized lexically.
pub fn canonical(path: &Path) -> PathBuf {
  dunce::canonicalize(path).unwrap_or_else(|_| normalize(path))
}
