//! Module descriptor stores.
//!
//! A store supplies the complete universe of candidate modules for one
//! resolution run. Descriptors are produced by an external parser; the
//! stores here only hold them ([`InMemoryDescriptorStore`]) or load a JSON
//! snapshot of them ([`FileDescriptorStore`]).

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::project::ModuleDescriptor;
use crate::types::ResolveError;

/// Source of already-parsed module descriptors.
pub trait DescriptorStore {
  /// Every descriptor in the repository.
  ///
  /// Fails with [`ResolveError::NoModulesFound`] when the repository holds no
  /// module descriptor.
  fn all_descriptors(&self) -> Result<Vec<ModuleDescriptor>, ResolveError>;
}

/// Store holding descriptors handed over by the caller.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDescriptorStore {
  root: PathBuf,
  descriptors: Vec<ModuleDescriptor>,
}

impl InMemoryDescriptorStore {
  pub fn new(root: impl Into<PathBuf>, descriptors: Vec<ModuleDescriptor>) -> Self {
    Self {
      root: root.into(),
      descriptors,
    }
  }

  pub fn push(&mut self, descriptor: ModuleDescriptor) {
    self.descriptors.push(descriptor);
  }

  pub fn len(&self) -> usize {
    self.descriptors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.descriptors.is_empty()
  }
}

impl DescriptorStore for InMemoryDescriptorStore {
  fn all_descriptors(&self) -> Result<Vec<ModuleDescriptor>, ResolveError> {
    if self.descriptors.is_empty() {
      return Err(ResolveError::NoModulesFound { root: self.root.clone() });
    }
    Ok(self.descriptors.clone())
  }
}

/// Store reading a JSON array of descriptors from disk.
///
/// The snapshot is read on every call; nothing is cached between runs.
#[derive(Debug, Clone)]
pub struct FileDescriptorStore {
  path: PathBuf,
}

impl FileDescriptorStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Write a snapshot that [`FileDescriptorStore`] can load.
  pub fn write(path: &Path, descriptors: &[ModuleDescriptor]) -> Result<(), ResolveError> {
    let json = serde_json::to_string_pretty(descriptors).map_err(|source| ResolveError::StoreFormat {
      path: path.to_path_buf(),
      source,
    })?;
    std::fs::write(path, json).map_err(|source| ResolveError::StoreIo {
      path: path.to_path_buf(),
      source,
    })
  }
}

impl DescriptorStore for FileDescriptorStore {
  fn all_descriptors(&self) -> Result<Vec<ModuleDescriptor>, ResolveError> {
    let content = std::fs::read_to_string(&self.path).map_err(|source| ResolveError::StoreIo {
      path: self.path.clone(),
      source,
    })?;

    if content.trim().is_empty() {
      return Err(ResolveError::NoModulesFound { root: self.path.clone() });
    }

    let descriptors: Vec<ModuleDescriptor> =
      serde_json::from_str(&content).map_err(|source| ResolveError::StoreFormat {
        path: self.path.clone(),
        source,
      })?;

    debug!(path = %self.path.display(), count = descriptors.len(), "loaded descriptor snapshot");

    if descriptors.is_empty() {
      return Err(ResolveError::NoModulesFound { root: self.path.clone() });
    }

    Ok(descriptors)
  }
}
