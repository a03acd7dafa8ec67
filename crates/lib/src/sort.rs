//! Deterministic build ordering.
//!
//! [`TopologicalSorter`] runs Kahn's algorithm over a [`ReactorGraph`],
//! always emitting the ready module with the smallest artifact id next. The
//! resulting [`BuildOrder`] places every dependency before its dependents and
//! is identical across runs on an unchanged reactor.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::graph::ReactorGraph;
use crate::project::ProjectId;
use crate::types::ResolveError;

/// Total order over reactor modules, dependencies first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOrder(Vec<ProjectId>);

impl BuildOrder {
  pub fn as_slice(&self) -> &[ProjectId] {
    &self.0
  }

  pub fn iter(&self) -> std::slice::Iter<'_, ProjectId> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Index of a module in the order.
  pub fn position(&self, id: &ProjectId) -> Option<usize> {
    self.0.iter().position(|p| p == id)
  }

  /// Map from module to its index in the order.
  pub fn positions(&self) -> HashMap<&ProjectId, usize> {
    self.0.iter().enumerate().map(|(idx, id)| (id, idx)).collect()
  }

  pub fn into_vec(self) -> Vec<ProjectId> {
    self.0
  }

  /// Group the order into waves of mutually independent modules.
  ///
  /// A module's wave is one past the highest wave among its dependencies, so
  /// every module of a wave only depends on modules of earlier waves. Within
  /// a wave, modules keep their relative build order.
  pub fn waves(&self, graph: &ReactorGraph) -> Vec<Vec<ProjectId>> {
    let mut level: HashMap<&ProjectId, usize> = HashMap::new();
    let mut waves: Vec<Vec<ProjectId>> = Vec::new();

    for id in &self.0 {
      let wave = graph
        .dependencies(id)
        .into_iter()
        .filter_map(|dep| level.get(dep))
        .map(|l| l + 1)
        .max()
        .unwrap_or(0);

      level.insert(id, wave);
      if waves.len() <= wave {
        waves.resize_with(wave + 1, Vec::new);
      }
      waves[wave].push(id.clone());
    }

    waves
  }
}

impl<'a> IntoIterator for &'a BuildOrder {
  type Item = &'a ProjectId;
  type IntoIter = std::slice::Iter<'a, ProjectId>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.iter()
  }
}

/// Sorts a reactor graph into a [`BuildOrder`].
pub struct TopologicalSorter;

impl TopologicalSorter {
  /// Sort the graph so that every module follows all of its dependencies.
  ///
  /// Ties among ready modules are broken by artifact id only. Two modules
  /// sharing an artifact id under different groups fall back to the id's own
  /// ordering (group first).
  ///
  /// # Errors
  ///
  /// Returns `CyclicDependency` with every module that could not be emitted
  /// if the graph contains a cycle. No partial order is returned.
  pub fn sort(graph: &ReactorGraph) -> Result<BuildOrder, ResolveError> {
    warn_shared_artifact_ids(graph);

    let mut unresolved: BTreeMap<&ProjectId, usize> = BTreeMap::new();
    let mut ready = BinaryHeap::new();

    for node in graph.nodes() {
      let count = node.dependencies.len();
      if count == 0 {
        ready.push(Reverse((node.id().artifact.as_str(), node.id())));
      }
      unresolved.insert(node.id(), count);
    }

    let mut order = Vec::with_capacity(graph.len());

    while let Some(Reverse((_, id))) = ready.pop() {
      order.push(id.clone());

      for dependent in graph.dependents(id) {
        if let Some(count) = unresolved.get_mut(dependent) {
          *count = count.saturating_sub(1);
          if *count == 0 {
            ready.push(Reverse((dependent.artifact.as_str(), dependent)));
          }
        }
      }
    }

    if order.len() < graph.len() {
      let involved: Vec<&ProjectId> = unresolved
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(id, _)| id)
        .collect();
      let cycles = strongly_connected(graph, &involved);

      warn!(
        modules = involved.len(),
        cycles = cycles.len(),
        "dependency cycle prevents a build order"
      );

      return Err(ResolveError::CyclicDependency {
        involved: involved.into_iter().cloned().collect(),
        cycles,
      });
    }

    debug!(modules = order.len(), "computed build order");
    Ok(BuildOrder(order))
  }
}

/// Strongly connected groups of two or more modules among `ids`.
fn strongly_connected(graph: &ReactorGraph, ids: &[&ProjectId]) -> Vec<Vec<ProjectId>> {
  let mut sub: DiGraph<&ProjectId, ()> = DiGraph::new();
  let indices: HashMap<&ProjectId, _> = ids.iter().map(|id| (*id, sub.add_node(*id))).collect();

  for id in ids {
    for dep in graph.dependencies(id) {
      if let Some(&to) = indices.get(dep) {
        sub.add_edge(indices[id], to, ());
      }
    }
  }

  let mut cycles: Vec<Vec<ProjectId>> = tarjan_scc(&sub)
    .into_iter()
    .filter(|component| component.len() > 1)
    .map(|component| {
      let mut members: Vec<ProjectId> = component.into_iter().map(|idx| sub[idx].clone()).collect();
      members.sort();
      members
    })
    .collect();
  cycles.sort();
  cycles
}

fn warn_shared_artifact_ids(graph: &ReactorGraph) {
  let mut groups: HashMap<&str, Vec<&str>> = HashMap::new();
  for id in graph.ids() {
    groups.entry(id.artifact.as_str()).or_default().push(id.group.as_str());
  }

  for (artifact, groups) in groups {
    if groups.len() > 1 {
      warn!(
        artifact,
        groups = ?groups,
        "modules share an artifact id; build order between them follows group id"
      );
    }
  }
}
