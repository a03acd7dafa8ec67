//! Top-level reactor resolution.
//!
//! Ties the pipeline together: read descriptors, build the reactor graph,
//! order it, then propagate classpaths along the order.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::graph::ProjectGraphBuilder;
use crate::materialize::ArtifactMaterializer;
use crate::project::ProjectId;
use crate::propagate::{ClasspathPropagationEngine, ModuleBuildUnit};
use crate::sort::{BuildOrder, TopologicalSorter};
use crate::store::DescriptorStore;
use crate::types::{ModuleFailure, ResolveConfig, ResolveError};

/// Outcome of a resolution run that was not aborted.
#[derive(Debug, Clone)]
pub struct ReactorResolution {
  /// Every reached module, dependencies first.
  pub order: BuildOrder,
  /// Successfully built units, in build order.
  pub units: Vec<ModuleBuildUnit>,
  /// Modules without a unit, in build order.
  pub failures: Vec<ModuleFailure>,
}

impl ReactorResolution {
  /// Returns true if every module produced a unit.
  pub fn is_success(&self) -> bool {
    self.failures.is_empty()
  }

  pub fn unit(&self, id: &ProjectId) -> Option<&ModuleBuildUnit> {
    self.units.iter().find(|u| &u.id == id)
  }

  pub fn failure(&self, id: &ProjectId) -> Option<&ModuleFailure> {
    self.failures.iter().find(|f| &f.id == id)
  }
}

/// Resolve the reactor rooted at `root`.
///
/// Structural errors (duplicates, dangling sub-modules, cycles) and
/// cancellation abort the run. Artifact failures do not; they are isolated
/// to the failing module and its dependents.
///
/// # Errors
///
/// Returns a [`ResolveError`] for any run-fatal condition.
pub async fn resolve_reactor<S, M>(
  root: &Path,
  store: &S,
  materializer: Arc<M>,
  cancel: &CancellationToken,
  config: &ResolveConfig,
) -> Result<ReactorResolution, ResolveError>
where
  S: DescriptorStore,
  M: ArtifactMaterializer + 'static,
{
  if cancel.is_cancelled() {
    return Err(ResolveError::Cancelled);
  }

  info!(root = %root.display(), "resolving reactor");

  let descriptors = store.all_descriptors()?;
  debug!(descriptors = descriptors.len(), "loaded module descriptors");

  let graph = ProjectGraphBuilder::new(&config.descriptor_file_name).build(root, descriptors)?;

  let order = TopologicalSorter::sort(&graph)?;

  if cancel.is_cancelled() {
    return Err(ResolveError::Cancelled);
  }

  let resolution = ClasspathPropagationEngine::new(materializer, config.clone())
    .propagate(&order, &graph, cancel)
    .await?;

  info!(
    units = resolution.units.len(),
    failures = resolution.failures.len(),
    "reactor resolved"
  );

  Ok(resolution)
}
