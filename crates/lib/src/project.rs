//! Module identity and declared build metadata.
//!
//! A [`ModuleDescriptor`] is the already-parsed form of one module's build
//! descriptor. Descriptors are produced outside this crate and are read-only
//! here: the resolver only indexes, walks and orders them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Identifies a module across the whole reactor, independent of version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId {
  pub group: String,
  pub artifact: String,
}

impl ProjectId {
  pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
    Self {
      group: group.into(),
      artifact: artifact.into(),
    }
  }
}

impl std::fmt::Display for ProjectId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.group, self.artifact)
  }
}

/// Scope a dependency is declared with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
  #[default]
  Compile,
  Provided,
  Runtime,
  Test,
}

impl Scope {
  /// Whether a dependency in this scope is visible when compiling main sources.
  pub fn on_main_classpath(self) -> bool {
    matches!(self, Scope::Compile | Scope::Provided)
  }

  /// Parse a scope name. Unknown names fall back to `Compile`.
  pub fn parse(name: &str) -> Self {
    match name.trim().to_ascii_lowercase().as_str() {
      "provided" => Scope::Provided,
      "runtime" => Scope::Runtime,
      "test" => Scope::Test,
      _ => Scope::Compile,
    }
  }
}

impl std::fmt::Display for Scope {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Scope::Compile => "compile",
      Scope::Provided => "provided",
      Scope::Runtime => "runtime",
      Scope::Test => "test",
    };
    f.write_str(name)
  }
}

/// A declared library dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
  pub id: ProjectId,
  pub version: String,
  #[serde(default)]
  pub scope: Scope,
}

impl Dependency {
  pub fn new(id: ProjectId, version: impl Into<String>, scope: Scope) -> Self {
    Self {
      id,
      version: version.into(),
      scope,
    }
  }

  pub fn compile(id: ProjectId, version: impl Into<String>) -> Self {
    Self::new(id, version, Scope::Compile)
  }

  pub fn test(id: ProjectId, version: impl Into<String>) -> Self {
    Self::new(id, version, Scope::Test)
  }
}

/// Packaging kind of a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Packaging {
  /// Produces a classpath-bearing artifact.
  #[default]
  Library,
  /// Only groups sub-modules; produces no artifact of its own.
  Aggregator,
}

/// Main and test source directories of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRoots {
  #[serde(default)]
  pub main: Vec<PathBuf>,
  #[serde(default)]
  pub test: Vec<PathBuf>,
}

impl SourceRoots {
  /// The conventional `src/main/java` and `src/test/java` layout.
  pub fn conventional(base: &Path) -> Self {
    Self {
      main: vec![base.join("src").join("main").join("java")],
      test: vec![base.join("src").join("test").join("java")],
    }
  }
}

/// Compiled output locations of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDirs {
  pub main: PathBuf,
  pub test: PathBuf,
}

impl OutputDirs {
  /// The conventional `target/classes` and `target/test-classes` layout.
  pub fn conventional(base: &Path) -> Self {
    Self {
      main: base.join("target").join("classes"),
      test: base.join("target").join("test-classes"),
    }
  }
}

/// One module's declared build metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
  pub id: ProjectId,
  pub version: String,
  #[serde(default)]
  pub packaging: Packaging,
  /// Relative paths of declared sub-modules (aggregators only).
  #[serde(default)]
  pub submodules: Vec<PathBuf>,
  #[serde(default)]
  pub dependencies: Vec<Dependency>,
  /// Absolute directory containing the module's build descriptor.
  pub base_path: PathBuf,
  #[serde(default)]
  pub source_roots: SourceRoots,
  #[serde(default)]
  pub output_dirs: OutputDirs,
}

impl ModuleDescriptor {
  /// Create a library module with the conventional source layout.
  pub fn library(id: ProjectId, version: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
    let base_path = base_path.into();
    Self {
      id,
      version: version.into(),
      packaging: Packaging::Library,
      submodules: Vec::new(),
      dependencies: Vec::new(),
      source_roots: SourceRoots::conventional(&base_path),
      output_dirs: OutputDirs::conventional(&base_path),
      base_path,
    }
  }

  /// Create an aggregator module declaring the given sub-module paths.
  pub fn aggregator<P: Into<PathBuf>>(
    id: ProjectId,
    version: impl Into<String>,
    base_path: impl Into<PathBuf>,
    submodules: impl IntoIterator<Item = P>,
  ) -> Self {
    let base_path = base_path.into();
    Self {
      id,
      version: version.into(),
      packaging: Packaging::Aggregator,
      submodules: submodules.into_iter().map(Into::into).collect(),
      dependencies: Vec::new(),
      source_roots: SourceRoots::default(),
      output_dirs: OutputDirs::conventional(&base_path),
      base_path,
    }
  }

  /// Append a declared dependency.
  pub fn with_dependency(mut self, dependency: Dependency) -> Self {
    self.dependencies.push(dependency);
    self
  }

  pub fn is_aggregator(&self) -> bool {
    self.packaging == Packaging::Aggregator
  }

  /// Path of the module's build descriptor file.
  pub fn descriptor_path(&self, file_name: &str) -> PathBuf {
    self.base_path.join(file_name)
  }

  /// Strongest scope this module declares on `target`, if any.
  ///
  /// A target declared several times (e.g. once for main and once as a test
  /// helper) is visible on the main classpath if any declaration is.
  pub fn declared_scope(&self, target: &ProjectId) -> Option<Scope> {
    self
      .dependencies
      .iter()
      .filter(|d| &d.id == target)
      .map(|d| d.scope)
      .min_by_key(|scope| !scope.on_main_classpath())
  }
}
