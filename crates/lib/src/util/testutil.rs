//! Test utilities for modgraph-lib.
//!
//! Shorthand constructors for descriptors and graphs so tests can describe a
//! reactor in a few lines.

use std::path::Path;

use crate::graph::ReactorGraph;
use crate::project::{Dependency, ModuleDescriptor, ProjectId};

pub const GROUP: &str = "org.example";

/// Project id in the shared test group.
pub fn id(artifact: &str) -> ProjectId {
  ProjectId::new(GROUP, artifact)
}

/// Library module at `base`.
pub fn lib(artifact: &str, base: &str) -> ModuleDescriptor {
  ModuleDescriptor::library(id(artifact), "1.0.0", base)
}

/// Aggregator module at `base` declaring `submodules`.
pub fn parent(artifact: &str, base: &str, submodules: &[&str]) -> ModuleDescriptor {
  ModuleDescriptor::aggregator(id(artifact), "1.0.0", base, submodules.iter().copied())
}

/// Compile dependency on a reactor sibling.
pub fn on(artifact: &str) -> Dependency {
  Dependency::compile(id(artifact), "1.0.0")
}

/// Build a graph directly: an aggregator root `/repo` owning one library
/// per artifact, with `edges` as `(dependent, dependency)` pairs.
///
/// Modules and edges are inserted in the given order, which lets tests
/// check that the insertion order never leaks into sorting.
pub fn graph_of(artifacts: &[&str], edges: &[(&str, &str)]) -> ReactorGraph {
  let mut graph = ReactorGraph::new(parent("root", "/repo", artifacts));
  for artifact in artifacts {
    let base = Path::new("/repo").join(artifact);
    graph.insert(
      ModuleDescriptor::library(id(artifact), "1.0.0", base),
      Some(&id("root")),
    );
  }
  for (dependent, dependency) in edges {
    graph
      .add_dependency(&id(dependent), &id(dependency))
      .expect("test edges are not self-dependencies");
  }
  graph
}
