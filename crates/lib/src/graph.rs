//! Reactor graph construction.
//!
//! This module handles:
//! - Indexing descriptors by project id and by location
//! - Walking structural ownership (aggregator -> sub-modules) from the root
//! - Turning declared dependencies on sibling modules into graph edges
//!
//! # Algorithm Overview
//!
//! 1. Index descriptors by [`ProjectId`], rejecting duplicates
//! 2. Locate the root module by its base path
//! 3. Walk declared sub-module paths depth-first from the root; every module
//!    reached becomes a node, every other descriptor is ignored
//! 4. For each reached module, add an edge for each declared dependency that
//!    names another reached module; anything else is external
//!
//! Structural nesting is recorded on the nodes (`parent`, `children`) but
//! never creates an ordering edge.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::project::{ModuleDescriptor, ProjectId};
use crate::types::ResolveError;
use crate::util::path::{canonical, normalize};

/// A module participating in the reactor.
#[derive(Debug, Clone)]
pub struct ReactorNode {
  pub descriptor: Arc<ModuleDescriptor>,

  /// Aggregator that declared this module, `None` for the root.
  pub parent: Option<ProjectId>,

  /// Sub-modules in declaration order (aggregators only).
  pub children: Vec<ProjectId>,

  /// Reactor modules this module depends on.
  pub dependencies: BTreeSet<ProjectId>,

  /// Reactor modules that depend on this module.
  pub dependents: BTreeSet<ProjectId>,
}

impl ReactorNode {
  fn new(descriptor: Arc<ModuleDescriptor>, parent: Option<ProjectId>) -> Self {
    Self {
      descriptor,
      parent,
      children: Vec::new(),
      dependencies: BTreeSet::new(),
      dependents: BTreeSet::new(),
    }
  }

  pub fn id(&self) -> &ProjectId {
    &self.descriptor.id
  }
}

/// Arena of reactor nodes keyed by project id.
///
/// Edges are stored as id sets on both endpoints, never as references
/// between nodes.
#[derive(Debug, Clone)]
pub struct ReactorGraph {
  root: ProjectId,
  nodes: BTreeMap<ProjectId, ReactorNode>,
}

impl ReactorGraph {
  /// Create a graph holding only the root module.
  pub fn new(root: ModuleDescriptor) -> Self {
    let id = root.id.clone();
    let mut nodes = BTreeMap::new();
    nodes.insert(id.clone(), ReactorNode::new(Arc::new(root), None));
    Self { root: id, nodes }
  }

  /// Insert a module. Returns `false` if the id is already present.
  pub fn insert(&mut self, descriptor: ModuleDescriptor, parent: Option<&ProjectId>) -> bool {
    if self.nodes.contains_key(&descriptor.id) {
      return false;
    }

    let id = descriptor.id.clone();
    if let Some(parent_id) = parent
      && let Some(parent_node) = self.nodes.get_mut(parent_id)
    {
      parent_node.children.push(id.clone());
    }

    self
      .nodes
      .insert(id, ReactorNode::new(Arc::new(descriptor), parent.cloned()));
    true
  }

  /// Add an edge: `dependent` depends on `dependency`.
  ///
  /// Edges to ids outside the graph are ignored and reported as `false`.
  pub fn add_dependency(&mut self, dependent: &ProjectId, dependency: &ProjectId) -> Result<bool, ResolveError> {
    if dependent == dependency {
      return Err(ResolveError::SelfDependency(dependent.clone()));
    }
    if !self.nodes.contains_key(dependent) || !self.nodes.contains_key(dependency) {
      return Ok(false);
    }

    if let Some(node) = self.nodes.get_mut(dependent) {
      node.dependencies.insert(dependency.clone());
    }
    if let Some(node) = self.nodes.get_mut(dependency) {
      node.dependents.insert(dependent.clone());
    }
    Ok(true)
  }

  pub fn root(&self) -> &ProjectId {
    &self.root
  }

  pub fn get(&self, id: &ProjectId) -> Option<&ReactorNode> {
    self.nodes.get(id)
  }

  pub fn contains(&self, id: &ProjectId) -> bool {
    self.nodes.contains_key(id)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// All module ids, sorted.
  pub fn ids(&self) -> impl Iterator<Item = &ProjectId> {
    self.nodes.keys()
  }

  pub fn nodes(&self) -> impl Iterator<Item = &ReactorNode> {
    self.nodes.values()
  }

  /// Direct reactor dependencies of a module.
  pub fn dependencies(&self, id: &ProjectId) -> Vec<&ProjectId> {
    self
      .nodes
      .get(id)
      .map(|n| n.dependencies.iter().collect())
      .unwrap_or_default()
  }

  /// Modules that directly depend on a module.
  pub fn dependents(&self, id: &ProjectId) -> Vec<&ProjectId> {
    self
      .nodes
      .get(id)
      .map(|n| n.dependents.iter().collect())
      .unwrap_or_default()
  }

  /// Number of dependency edges.
  pub fn edge_count(&self) -> usize {
    self.nodes.values().map(|n| n.dependencies.len()).sum()
  }

  /// All edges as `(dependent, dependency)` pairs.
  pub fn edges(&self) -> impl Iterator<Item = (&ProjectId, &ProjectId)> {
    self
      .nodes
      .iter()
      .flat_map(|(id, node)| node.dependencies.iter().map(move |dep| (id, dep)))
  }

  /// Structural descendants of a module (children, grandchildren, ...).
  pub fn descendants(&self, id: &ProjectId) -> BTreeSet<ProjectId> {
    let mut result = BTreeSet::new();
    let mut stack: Vec<&ProjectId> = self.nodes.get(id).map(|n| n.children.iter().collect()).unwrap_or_default();

    while let Some(child) = stack.pop() {
      if result.insert(child.clone())
        && let Some(node) = self.nodes.get(child)
      {
        stack.extend(node.children.iter());
      }
    }

    result
  }
}

/// Builds a [`ReactorGraph`] from the descriptors of one repository.
#[derive(Debug, Clone)]
pub struct ProjectGraphBuilder {
  descriptor_file_name: String,
}

impl Default for ProjectGraphBuilder {
  fn default() -> Self {
    Self::new("pom.xml")
  }
}

impl ProjectGraphBuilder {
  pub fn new(descriptor_file_name: impl Into<String>) -> Self {
    Self {
      descriptor_file_name: descriptor_file_name.into(),
    }
  }

  /// Build the reactor graph rooted at `root_path`.
  ///
  /// # Errors
  ///
  /// - `DuplicateModuleId` if two descriptors share an id
  /// - `SharedModulePath` if two descriptors share a base path
  /// - `RootModuleNotFound` if no descriptor lives at `root_path`
  /// - `DanglingModuleReference` if a declared sub-module has no descriptor
  /// - `SelfDependency` if a reached module depends on itself
  pub fn build(&self, root_path: &Path, descriptors: Vec<ModuleDescriptor>) -> Result<ReactorGraph, ResolveError> {
    let index = DescriptorIndex::new(descriptors, &self.descriptor_file_name)?;

    let root_idx = index.locate(root_path).ok_or_else(|| ResolveError::RootModuleNotFound {
      root: root_path.to_path_buf(),
    })?;

    let mut graph = ReactorGraph::new(index.descriptors[root_idx].clone());
    let mut visited = HashSet::from([root_idx]);
    let mut discovered = vec![root_idx];
    let mut stack = vec![root_idx];

    while let Some(idx) = stack.pop() {
      let descriptor = &index.descriptors[idx];

      if !descriptor.is_aggregator() {
        if !descriptor.submodules.is_empty() {
          warn!(module = %descriptor.id, "ignoring sub-modules declared by a non-aggregator module");
        }
        continue;
      }

      let mut children = Vec::with_capacity(descriptor.submodules.len());
      for submodule in &descriptor.submodules {
        let path = descriptor.base_path.join(submodule);
        let child_idx = index
          .locate(&path)
          .ok_or_else(|| ResolveError::DanglingModuleReference {
            parent: descriptor.id.clone(),
            path: normalize(&path),
          })?;

        if !visited.insert(child_idx) {
          warn!(
            parent = %descriptor.id,
            module = %index.descriptors[child_idx].id,
            "sub-module already reached through another declaration"
          );
          continue;
        }

        trace!(parent = %descriptor.id, module = %index.descriptors[child_idx].id, "discovered sub-module");
        graph.insert(index.descriptors[child_idx].clone(), Some(&descriptor.id));
        discovered.push(child_idx);
        children.push(child_idx);
      }

      // Reverse so the first declared sub-module is walked first.
      stack.extend(children.into_iter().rev());
    }

    let excluded = index.descriptors.len() - discovered.len();
    if excluded > 0 {
      debug!(excluded, "descriptors not reachable from the root are excluded");
    }

    for &idx in &discovered {
      let descriptor = &index.descriptors[idx];
      for dependency in &descriptor.dependencies {
        if graph.add_dependency(&descriptor.id, &dependency.id)? {
          trace!(module = %descriptor.id, dependency = %dependency.id, "reactor dependency");
        } else {
          trace!(module = %descriptor.id, dependency = %dependency.id, "external dependency");
        }
      }
    }

    debug!(
      root = %graph.root(),
      modules = graph.len(),
      edges = graph.edge_count(),
      "built reactor graph"
    );

    Ok(graph)
  }
}

/// Lookup tables over the store's descriptors.
struct DescriptorIndex<'a> {
  descriptors: Vec<ModuleDescriptor>,
  by_path: HashMap<PathBuf, usize>,
  descriptor_file_name: &'a str,
}

impl<'a> DescriptorIndex<'a> {
  fn new(descriptors: Vec<ModuleDescriptor>, descriptor_file_name: &'a str) -> Result<Self, ResolveError> {
    {
      let mut by_id: HashMap<&ProjectId, usize> = HashMap::new();
      for (idx, descriptor) in descriptors.iter().enumerate() {
        if let Some(&first) = by_id.get(&descriptor.id) {
          return Err(ResolveError::DuplicateModuleId {
            id: descriptor.id.clone(),
            first: descriptors[first].base_path.clone(),
            second: descriptor.base_path.clone(),
          });
        }
        by_id.insert(&descriptor.id, idx);
      }
    }

    let mut by_path: HashMap<PathBuf, usize> = HashMap::new();
    for (idx, descriptor) in descriptors.iter().enumerate() {
      let key = canonical(&descriptor.base_path);
      if let Some(&first) = by_path.get(&key) {
        return Err(ResolveError::SharedModulePath {
          path: descriptor.base_path.clone(),
          first: descriptors[first].id.clone(),
          second: descriptor.id.clone(),
        });
      }
      by_path.insert(key, idx);
    }

    Ok(Self {
      descriptors,
      by_path,
      descriptor_file_name,
    })
  }

  /// Find the descriptor at a module directory or at its descriptor file.
  fn locate(&self, path: &Path) -> Option<usize> {
    if let Some(&idx) = self.by_path.get(&canonical(path)) {
      return Some(idx);
    }

    let names_file = path.file_name().is_some_and(|name| name == self.descriptor_file_name)
      || path.extension().is_some_and(|ext| ext == "xml");
    if names_file {
      return path.parent().and_then(|parent| self.by_path.get(&canonical(parent)).copied());
    }

    None
  }
}
