//! External artifact materialization.
//!
//! The propagation engine asks an [`ArtifactMaterializer`] for the files of
//! every dependency that is not produced inside the reactor. The engine never
//! inspects those files; it only places their paths on classpaths.

use std::future::Future;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::trace;

use crate::project::{ProjectId, Scope};

/// Errors reported through the materializer's own channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
  /// The artifact does not exist in the repository.
  #[error("artifact not found: {id}:{version}")]
  NotFound { id: ProjectId, version: String },

  /// The artifact could not be fetched.
  #[error("network error resolving {id}:{version}: {message}")]
  Network {
    id: ProjectId,
    version: String,
    message: String,
  },

  /// The repository could not be read.
  #[error("io error resolving {id}:{version}: {message}")]
  Io {
    id: ProjectId,
    version: String,
    message: String,
  },
}

impl ArtifactError {
  /// The artifact the error refers to.
  pub fn id(&self) -> &ProjectId {
    match self {
      ArtifactError::NotFound { id, .. } | ArtifactError::Network { id, .. } | ArtifactError::Io { id, .. } => id,
    }
  }
}

/// Supplies file paths for externally published dependencies.
///
/// Implementations may block on disk or network I/O. Calls for independent
/// modules run concurrently, and an in-flight call is dropped when the run
/// is cancelled.
pub trait ArtifactMaterializer: Send + Sync {
  fn resolve(
    &self,
    id: &ProjectId,
    version: &str,
    scope: Scope,
  ) -> impl Future<Output = Result<Vec<PathBuf>, ArtifactError>> + Send;
}

/// Materializer backed by a local repository directory laid out as
/// `<root>/<group as dirs>/<artifact>/<version>/<artifact>-<version>.jar`.
///
/// The root is fixed at construction; separate resolution runs may use
/// separate repositories side by side.
#[derive(Debug, Clone)]
pub struct LocalRepository {
  root: PathBuf,
}

impl LocalRepository {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Location of an artifact's jar, optionally with a classifier.
  pub fn artifact_path(&self, id: &ProjectId, version: &str, classifier: Option<&str>) -> PathBuf {
    let mut dir = self.root.clone();
    for segment in id.group.split('.') {
      dir.push(segment);
    }
    dir.push(&id.artifact);
    dir.push(version);

    let file = match classifier {
      Some(classifier) => format!("{}-{}-{}.jar", id.artifact, version, classifier),
      None => format!("{}-{}.jar", id.artifact, version),
    };
    dir.join(file)
  }

  async fn exists(&self, path: &Path, id: &ProjectId, version: &str) -> Result<bool, ArtifactError> {
    tokio::fs::try_exists(path).await.map_err(|e| ArtifactError::Io {
      id: id.clone(),
      version: version.to_string(),
      message: e.to_string(),
    })
  }
}

impl ArtifactMaterializer for LocalRepository {
  async fn resolve(&self, id: &ProjectId, version: &str, scope: Scope) -> Result<Vec<PathBuf>, ArtifactError> {
    let jar = self.artifact_path(id, version, None);
    if !self.exists(&jar, id, version).await? {
      return Err(ArtifactError::NotFound {
        id: id.clone(),
        version: version.to_string(),
      });
    }

    let mut paths = vec![jar];

    if scope == Scope::Test {
      let tests_jar = self.artifact_path(id, version, Some("tests"));
      if self.exists(&tests_jar, id, version).await? {
        paths.push(tests_jar);
      }
    }

    trace!(artifact = %id, version, count = paths.len(), "materialized from local repository");
    Ok(paths)
  }
}
