//! Classpath propagation across the build order.
//!
//! The engine walks the [`BuildOrder`] wave by wave. For every module it:
//! 1. Resolves external dependencies through the [`ArtifactMaterializer`]
//!    (concurrently for all modules of one wave)
//! 2. Substitutes already-built sibling units for reactor dependencies
//! 3. Merges both into ordered main and test classpaths
//! 4. Publishes the module's [`ModuleBuildUnit`] for later modules
//!
//! A module whose externals fail to materialize gets no unit; its
//! dependents are recorded as failed too, naming the original failure.
//! Independent modules are unaffected.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cache::TypeCacheHandle;
use crate::cancel::CancellationToken;
use crate::graph::{ReactorGraph, ReactorNode};
use crate::materialize::{ArtifactError, ArtifactMaterializer};
use crate::project::{Dependency, OutputDirs, Packaging, ProjectId, Scope};
use crate::resolve::ReactorResolution;
use crate::sort::BuildOrder;
use crate::types::{ModuleError, ModuleFailure, ResolveConfig, ResolveError};

/// Which part of a module a classpath entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitScope {
  Main,
  Test,
}

/// One location on a classpath.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ClasspathEntry {
  /// An externally published file.
  Artifact { path: PathBuf },

  /// An in-memory sibling unit built earlier in the same run.
  Module {
    id: ProjectId,
    scope: UnitScope,
    output_dir: PathBuf,
    sources: Vec<PathBuf>,
  },
}

impl ClasspathEntry {
  pub fn artifact(path: impl Into<PathBuf>) -> Self {
    ClasspathEntry::Artifact { path: path.into() }
  }

  /// The filesystem location of the entry.
  pub fn path(&self) -> &Path {
    match self {
      ClasspathEntry::Artifact { path } => path,
      ClasspathEntry::Module { output_dir, .. } => output_dir,
    }
  }

  /// The reactor module behind the entry, if any.
  pub fn module(&self) -> Option<&ProjectId> {
    match self {
      ClasspathEntry::Artifact { .. } => None,
      ClasspathEntry::Module { id, .. } => Some(id),
    }
  }

  pub fn is_module(&self) -> bool {
    matches!(self, ClasspathEntry::Module { .. })
  }
}

/// The resolved, ready-to-analyze form of one module.
#[derive(Debug, Clone)]
pub struct ModuleBuildUnit {
  pub id: ProjectId,
  pub version: String,
  pub packaging: Packaging,
  pub main_sources: Vec<PathBuf>,
  pub test_sources: Vec<PathBuf>,
  pub output_dirs: OutputDirs,
  pub main_classpath: Vec<ClasspathEntry>,
  pub test_classpath: Vec<ClasspathEntry>,
  pub type_cache: TypeCacheHandle,
}

impl ModuleBuildUnit {
  /// Main classpath as plain paths.
  pub fn main_paths(&self) -> Vec<PathBuf> {
    self.main_classpath.iter().map(|e| e.path().to_path_buf()).collect()
  }

  /// Test classpath as plain paths.
  pub fn test_paths(&self) -> Vec<PathBuf> {
    self.test_classpath.iter().map(|e| e.path().to_path_buf()).collect()
  }

  /// Whether dependents see this unit on their classpaths.
  pub fn produces_classpath(&self) -> bool {
    self.packaging != Packaging::Aggregator
  }

  /// Entry dependents use for this unit's main code.
  pub fn main_entry(&self) -> ClasspathEntry {
    ClasspathEntry::Module {
      id: self.id.clone(),
      scope: UnitScope::Main,
      output_dir: self.output_dirs.main.clone(),
      sources: self.main_sources.clone(),
    }
  }

  /// Entry dependents' tests use for this unit's test helpers, if it has any.
  pub fn test_entry(&self) -> Option<ClasspathEntry> {
    if self.test_sources.is_empty() {
      return None;
    }
    Some(ClasspathEntry::Module {
      id: self.id.clone(),
      scope: UnitScope::Test,
      output_dir: self.output_dirs.test.clone(),
      sources: self.test_sources.clone(),
    })
  }
}

/// Externally resolved part of a module's classpaths.
#[derive(Debug, Default)]
struct ExternalClasspath {
  main: Vec<PathBuf>,
  test: Vec<PathBuf>,
}

type WaveResults = HashMap<ProjectId, Result<ExternalClasspath, ModuleError>>;

/// Computes build units for every module of a build order.
pub struct ClasspathPropagationEngine<M> {
  materializer: Arc<M>,
  config: ResolveConfig,
}

impl<M> ClasspathPropagationEngine<M>
where
  M: ArtifactMaterializer + 'static,
{
  pub fn new(materializer: Arc<M>, config: ResolveConfig) -> Self {
    Self { materializer, config }
  }

  /// Build one unit per module in `order`.
  ///
  /// # Errors
  ///
  /// Only `Cancelled` aborts the run. Per-module failures are returned in
  /// [`ReactorResolution::failures`].
  pub async fn propagate(
    &self,
    order: &BuildOrder,
    graph: &ReactorGraph,
    cancel: &CancellationToken,
  ) -> Result<ReactorResolution, ResolveError> {
    info!(modules = order.len(), "starting classpath propagation");

    let waves = order.waves(graph);
    let positions = order.positions();
    info!(wave_count = waves.len(), "computed propagation waves");

    let mut built: HashMap<ProjectId, ModuleBuildUnit> = HashMap::new();
    let mut failures: HashMap<ProjectId, ModuleFailure> = HashMap::new();
    let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));

    for (wave_idx, wave) in waves.iter().enumerate() {
      if cancel.is_cancelled() {
        return Err(ResolveError::Cancelled);
      }
      debug!(wave = wave_idx, modules = wave.len(), "propagating wave");

      let mut ready: Vec<&ReactorNode> = Vec::new();
      for id in wave {
        let Some(node) = graph.get(id) else {
          continue;
        };

        if let Some((via, origin)) = find_failed_dependency(node, &failures) {
          warn!(
            module = %id,
            failed_dep = %via,
            origin = %origin,
            "skipping module due to failed dependency"
          );
          failures.insert(
            id.clone(),
            ModuleFailure {
              id: id.clone(),
              error: ModuleError::PropagatedDependencyFailure { origin, via },
            },
          );
        } else {
          ready.push(node);
        }
      }

      let mut externals = self.resolve_wave(&ready, graph, &semaphore, cancel).await?;

      // Assemble in build order so the result never depends on task timing.
      for node in ready {
        let id = node.id();
        let external = externals.remove(id).unwrap_or_else(|| {
          Err(ModuleError::Interrupted {
            message: "no materialization result".to_string(),
          })
        });

        match external {
          Ok(external) => {
            let unit = self.assemble(node, external, &built, &positions);
            info!(
              module = %id,
              main = unit.main_classpath.len(),
              test = unit.test_classpath.len(),
              "built module unit"
            );
            built.insert(id.clone(), unit);
          }
          Err(e) => {
            error!(module = %id, error = %e, "module unit failed");
            failures.insert(id.clone(), ModuleFailure { id: id.clone(), error: e });
          }
        }
      }
    }

    let mut units = Vec::with_capacity(built.len());
    let mut failed = Vec::with_capacity(failures.len());
    for id in order {
      if let Some(unit) = built.remove(id) {
        units.push(unit);
      } else if let Some(failure) = failures.remove(id) {
        failed.push(failure);
      }
    }

    info!(built = units.len(), failed = failed.len(), "classpath propagation complete");

    Ok(ReactorResolution {
      order: order.clone(),
      units,
      failures: failed,
    })
  }

  /// Resolve external classpaths for every module of a wave in parallel.
  async fn resolve_wave(
    &self,
    nodes: &[&ReactorNode],
    graph: &ReactorGraph,
    semaphore: &Arc<Semaphore>,
    cancel: &CancellationToken,
  ) -> Result<WaveResults, ResolveError> {
    let mut results = WaveResults::new();
    let mut join_set = JoinSet::new();
    let mut tasks = HashMap::new();

    for node in nodes {
      let id = node.id().clone();

      if node.descriptor.is_aggregator() {
        results.insert(id, Ok(ExternalClasspath::default()));
        continue;
      }

      let external: Vec<Dependency> = node
        .descriptor
        .dependencies
        .iter()
        .filter(|d| !graph.contains(&d.id))
        .cloned()
        .collect();

      let materializer = self.materializer.clone();
      let semaphore = semaphore.clone();
      let task_id = id.clone();

      let handle = join_set.spawn(async move {
        let _permit = semaphore.acquire_owned().await;
        let result = resolve_external(materializer.as_ref(), &external).await;
        (task_id, result)
      });
      tasks.insert(handle.id(), id);
    }

    loop {
      tokio::select! {
        biased;

        _ = cancel.cancelled() => {
          warn!(pending = join_set.len(), "cancellation requested, aborting artifact resolution");
          join_set.abort_all();
          return Err(ResolveError::Cancelled);
        }

        next = join_set.join_next_with_id() => match next {
          None => break,
          Some(Ok((_, (id, result)))) => {
            results.insert(id, result.map_err(ModuleError::from));
          }
          Some(Err(e)) => {
            error!(error = %e, "artifact resolution task failed");
            if let Some(id) = tasks.remove(&e.id()) {
              results.insert(id, Err(ModuleError::Interrupted { message: e.to_string() }));
            }
          }
        },
      }
    }

    Ok(results)
  }

  /// Merge a module's externals with its dependencies' units.
  fn assemble(
    &self,
    node: &ReactorNode,
    external: ExternalClasspath,
    built: &HashMap<ProjectId, ModuleBuildUnit>,
    positions: &HashMap<&ProjectId, usize>,
  ) -> ModuleBuildUnit {
    let descriptor = &node.descriptor;
    let deps: Vec<&ModuleBuildUnit> = node.dependencies.iter().filter_map(|dep| built.get(dep)).collect();

    let mut main = Classpath::with_externals(external.main);
    let mut test = Classpath::with_externals(external.test);

    if !descriptor.is_aggregator() {
      for dep in deps.iter().filter(|d| d.produces_classpath()) {
        let position = positions.get(&dep.id).copied().unwrap_or(usize::MAX);
        let scope = descriptor.declared_scope(&dep.id).unwrap_or(Scope::Compile);

        if scope.on_main_classpath() {
          main.add_module(position, dep.main_entry());
          if self.config.transitive {
            main.inherit(position, &dep.main_classpath, positions);
          }
        }

        test.add_module(position, dep.main_entry());
        if let Some(entry) = dep.test_entry() {
          test.add_module(position, entry);
        }
        if self.config.transitive {
          test.inherit(position, &dep.main_classpath, positions);
        }
      }
    }

    let type_cache = TypeCacheHandle::reuse_largest(deps.iter().map(|d| &d.type_cache));

    let unit = ModuleBuildUnit {
      id: descriptor.id.clone(),
      version: descriptor.version.clone(),
      packaging: descriptor.packaging,
      main_sources: descriptor.source_roots.main.clone(),
      test_sources: descriptor.source_roots.test.clone(),
      output_dirs: descriptor.output_dirs.clone(),
      main_classpath: main.finish(),
      test_classpath: test.finish(),
      type_cache,
    };
    unit.type_cache.register(&unit.id, unit.main_paths());
    unit
  }
}

/// Resolve every external dependency of one module.
async fn resolve_external<M: ArtifactMaterializer>(
  materializer: &M,
  dependencies: &[Dependency],
) -> Result<ExternalClasspath, ArtifactError> {
  let mut classpath = ExternalClasspath::default();

  for dependency in dependencies {
    let paths = materializer
      .resolve(&dependency.id, &dependency.version, dependency.scope)
      .await?;

    if dependency.scope.on_main_classpath() {
      classpath.main.extend(paths.iter().cloned());
    }
    classpath.test.extend(paths);
  }

  Ok(classpath)
}

/// Find the first failed reactor dependency of a node.
///
/// Returns the failed direct dependency and the module it originally failed
/// because of.
fn find_failed_dependency(
  node: &ReactorNode,
  failures: &HashMap<ProjectId, ModuleFailure>,
) -> Option<(ProjectId, ProjectId)> {
  node
    .dependencies
    .iter()
    .find_map(|dep| failures.get(dep).map(|f| (dep.clone(), f.origin().clone())))
}

/// Classpath under construction: own externals, then inherited externals,
/// then reactor modules ordered by build position.
struct Classpath {
  own: Vec<ClasspathEntry>,
  inherited: Vec<(usize, ClasspathEntry)>,
  modules: Vec<(usize, ClasspathEntry)>,
}

impl Classpath {
  fn with_externals(paths: Vec<PathBuf>) -> Self {
    Self {
      own: paths.into_iter().map(ClasspathEntry::artifact).collect(),
      inherited: Vec::new(),
      modules: Vec::new(),
    }
  }

  fn add_module(&mut self, position: usize, entry: ClasspathEntry) {
    self.modules.push((position, entry));
  }

  /// Take over a dependency's own main classpath.
  fn inherit(&mut self, position: usize, entries: &[ClasspathEntry], positions: &HashMap<&ProjectId, usize>) {
    for entry in entries {
      match entry.module() {
        Some(id) => {
          let module_position = positions.get(id).copied().unwrap_or(position);
          self.modules.push((module_position, entry.clone()));
        }
        None => self.inherited.push((position, entry.clone())),
      }
    }
  }

  fn finish(mut self) -> Vec<ClasspathEntry> {
    self.inherited.sort_by_key(|(position, _)| *position);
    self.modules.sort_by_key(|(position, entry)| (*position, unit_rank(entry)));

    let mut seen = HashSet::new();
    self
      .own
      .into_iter()
      .chain(self.inherited.into_iter().map(|(_, e)| e))
      .chain(self.modules.into_iter().map(|(_, e)| e))
      .filter(|entry| seen.insert(entry.clone()))
      .collect()
  }
}

fn unit_rank(entry: &ClasspathEntry) -> UnitScope {
  match entry {
    ClasspathEntry::Module { scope, .. } => *scope,
    ClasspathEntry::Artifact { .. } => UnitScope::Main,
  }
}
