//! Shared fixtures for the integration tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use modgraph_lib::{ArtifactError, ArtifactMaterializer, Dependency, ModuleDescriptor, ProjectId, Scope};

pub const GROUP: &str = "com.acme";

pub fn id(artifact: &str) -> ProjectId {
  ProjectId::new(GROUP, artifact)
}

pub fn lib(artifact: &str, base: &str) -> ModuleDescriptor {
  ModuleDescriptor::library(id(artifact), "2.1.0", base)
}

pub fn parent(artifact: &str, base: &str, submodules: &[&str]) -> ModuleDescriptor {
  ModuleDescriptor::aggregator(id(artifact), "2.1.0", base, submodules.iter().copied())
}

pub fn on(artifact: &str) -> Dependency {
  Dependency::compile(id(artifact), "2.1.0")
}

pub fn external(group: &str, artifact: &str, scope: Scope) -> Dependency {
  Dependency::new(ProjectId::new(group, artifact), "1.0", scope)
}

pub fn artifacts<'a>(ids: impl IntoIterator<Item = &'a ProjectId>) -> Vec<&'a str> {
  ids.into_iter().map(|id| id.artifact.as_str()).collect()
}

/// Materializer that serves `/m2/<artifact>.jar` for known artifacts and
/// records every request.
#[derive(Default)]
pub struct RecordingMaterializer {
  known: BTreeMap<ProjectId, PathBuf>,
  requests: Mutex<Vec<ProjectId>>,
}

impl RecordingMaterializer {
  pub fn knowing(ids: &[ProjectId]) -> Self {
    Self {
      known: ids
        .iter()
        .map(|id| (id.clone(), PathBuf::from(format!("/m2/{}.jar", id.artifact))))
        .collect(),
      requests: Mutex::new(Vec::new()),
    }
  }

  pub fn requests(&self) -> Vec<ProjectId> {
    self.requests.lock().unwrap().clone()
  }
}

impl ArtifactMaterializer for RecordingMaterializer {
  async fn resolve(&self, id: &ProjectId, version: &str, _scope: Scope) -> Result<Vec<PathBuf>, ArtifactError> {
    self.requests.lock().unwrap().push(id.clone());
    match self.known.get(id) {
      Some(path) => Ok(vec![path.clone()]),
      None => Err(ArtifactError::NotFound {
        id: id.clone(),
        version: version.to_string(),
      }),
    }
  }
}

/// Materializer whose requests never complete.
pub struct StalledMaterializer;

impl ArtifactMaterializer for StalledMaterializer {
  async fn resolve(&self, _id: &ProjectId, _version: &str, _scope: Scope) -> Result<Vec<PathBuf>, ArtifactError> {
    std::future::pending().await
  }
}
