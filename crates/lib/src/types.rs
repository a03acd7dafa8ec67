//! Error types and configuration for reactor resolution.
//!
//! Run-fatal errors ([`ResolveError`]) abort the whole resolution before or
//! during propagation. Per-module failures ([`ModuleError`]) are isolated to
//! the failing module and its dependents and are reported alongside the
//! successfully built units.

use std::path::PathBuf;

use thiserror::Error;

use crate::materialize::ArtifactError;
use crate::project::ProjectId;

/// Errors that abort an entire resolution run.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// The descriptor store holds no module at all.
  #[error("no module descriptors found for {root}")]
  NoModulesFound { root: PathBuf },

  /// Two descriptors share the same project id.
  #[error("duplicate module id {id}: declared in {first} and {second}")]
  DuplicateModuleId {
    id: ProjectId,
    first: PathBuf,
    second: PathBuf,
  },

  /// Two descriptors with different ids live in the same directory.
  #[error("modules {first} and {second} share the base path {path}")]
  SharedModulePath {
    path: PathBuf,
    first: ProjectId,
    second: ProjectId,
  },

  /// No descriptor lives at the requested root path.
  #[error("root module not found at {root}")]
  RootModuleNotFound { root: PathBuf },

  /// An aggregator declares a sub-module path with no descriptor behind it.
  #[error("module {parent} declares sub-module {path} but no module descriptor exists there")]
  DanglingModuleReference { parent: ProjectId, path: PathBuf },

  /// A module declares a dependency on itself.
  #[error("module {0} declares a dependency on itself")]
  SelfDependency(ProjectId),

  /// No valid build order exists.
  ///
  /// `involved` lists every module that could not be ordered; `cycles` lists
  /// the strongly connected groups among them.
  #[error("dependency cycle detected among modules: {}", join_ids(involved))]
  CyclicDependency {
    involved: Vec<ProjectId>,
    cycles: Vec<Vec<ProjectId>>,
  },

  /// The run was cancelled through its cancellation token.
  #[error("resolution cancelled")]
  Cancelled,

  /// A descriptor snapshot could not be read.
  #[error("failed to read descriptor snapshot {path}: {source}")]
  StoreIo {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// A descriptor snapshot could not be decoded.
  #[error("invalid descriptor snapshot {path}: {source}")]
  StoreFormat {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

fn join_ids(ids: &[ProjectId]) -> String {
  ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Why a single module's build unit could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
  /// An external artifact of this module could not be materialized.
  #[error(transparent)]
  Artifact(#[from] ArtifactError),

  /// A reactor dependency of this module has no build unit.
  ///
  /// `origin` is the module whose own materialization failed; `via` is the
  /// direct dependency through which the failure reached this module.
  #[error("dependency {via} has no build unit (originally failed: {origin})")]
  PropagatedDependencyFailure { origin: ProjectId, via: ProjectId },

  /// The materialization task ended without producing a result.
  #[error("artifact resolution interrupted: {message}")]
  Interrupted { message: String },
}

/// A module whose build unit failed to materialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFailure {
  pub id: ProjectId,
  pub error: ModuleError,
}

impl ModuleFailure {
  /// The module whose materialization originally failed.
  ///
  /// This is the module itself unless the failure was propagated.
  pub fn origin(&self) -> &ProjectId {
    match &self.error {
      ModuleError::Artifact(_) | ModuleError::Interrupted { .. } => &self.id,
      ModuleError::PropagatedDependencyFailure { origin, .. } => origin,
    }
  }
}

impl std::fmt::Display for ModuleFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.id, self.error)
  }
}

/// Configuration for a resolution run.
#[derive(Debug, Clone)]
pub struct ResolveConfig {
  /// Maximum number of concurrent external artifact resolutions.
  pub parallelism: usize,

  /// File name of a module's build descriptor, used to match root and
  /// sub-module paths that point at the descriptor file itself.
  pub descriptor_file_name: String,

  /// Whether dependencies' own main classpaths are inherited by dependents.
  pub transitive: bool,
}

impl Default for ResolveConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      descriptor_file_name: "pom.xml".to_string(),
      transitive: true,
    }
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
