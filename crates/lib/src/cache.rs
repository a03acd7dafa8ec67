//! Shared type cache handles.
//!
//! Downstream analysis keeps parsed type information in a cache that can be
//! shared along a dependency chain. The resolver only decides which modules
//! share a cache; it never reads the cached types. Cache identity is an
//! optimization and does not affect any classpath.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::project::ProjectId;

#[derive(Debug, Default)]
struct TypeCacheState {
  modules: Vec<ProjectId>,
  entries: HashSet<PathBuf>,
}

/// Cache of type information for classpath locations.
#[derive(Debug)]
pub struct TypeCache {
  state: RwLock<TypeCacheState>,
}

impl TypeCache {
  fn new() -> Self {
    Self {
      state: RwLock::new(TypeCacheState::default()),
    }
  }

  // A panic while holding the lock leaves the sets intact, so keep using them.
  fn read(&self) -> RwLockReadGuard<'_, TypeCacheState> {
    self.state.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, TypeCacheState> {
    self.state.write().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Cheaply cloneable reference to a [`TypeCache`].
#[derive(Debug, Clone)]
pub struct TypeCacheHandle(Arc<TypeCache>);

impl TypeCacheHandle {
  /// Create a handle to a new, empty cache.
  pub fn fresh() -> Self {
    Self(Arc::new(TypeCache::new()))
  }

  /// Identifier of the underlying cache, unique while the cache is alive.
  pub fn id(&self) -> usize {
    Arc::as_ptr(&self.0) as usize
  }

  /// Number of classpath locations known to the cache.
  pub fn len(&self) -> usize {
    self.0.read().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Modules that registered with this cache, in registration order.
  pub fn modules(&self) -> Vec<ProjectId> {
    self.0.read().modules.clone()
  }

  /// Record that `module` analyzes against `entries` using this cache.
  pub fn register(&self, module: &ProjectId, entries: impl IntoIterator<Item = PathBuf>) {
    let mut state = self.0.write();
    state.modules.push(module.clone());
    state.entries.extend(entries);
  }

  /// Whether two handles refer to the same cache.
  pub fn same_cache(&self, other: &TypeCacheHandle) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  /// Pick the cache to reuse from a module's direct dependencies.
  ///
  /// The largest cache wins; ties go to the earliest candidate. Without
  /// candidates a fresh cache is created.
  pub fn reuse_largest<'a>(candidates: impl IntoIterator<Item = &'a TypeCacheHandle>) -> Self {
    let mut best: Option<(&TypeCacheHandle, usize)> = None;
    for candidate in candidates {
      let size = candidate.len();
      if best.is_none_or(|(_, best_size)| size > best_size) {
        best = Some((candidate, size));
      }
    }

    best.map(|(handle, _)| handle.clone()).unwrap_or_else(Self::fresh)
  }
}
