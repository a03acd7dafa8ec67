//! modgraph-lib: reactor build-graph resolution and classpath propagation
//!
//! Given the module descriptors of a multi-module repository, this crate:
//! - `graph`: discovers the reactor by walking aggregator sub-modules
//! - `sort`: orders modules so every dependency precedes its dependents
//! - `propagate`: builds per-module classpaths, substituting sibling build
//!   units for reactor dependencies and materializing everything else
//! - `resolve`: runs the whole pipeline with cancellation support

pub mod cache;
pub mod cancel;
pub mod graph;
pub mod materialize;
pub mod project;
pub mod propagate;
pub mod resolve;
pub mod sort;
pub mod store;
pub mod types;
pub mod util;

pub use cancel::CancellationToken;
pub use graph::{ProjectGraphBuilder, ReactorGraph};
pub use materialize::{ArtifactError, ArtifactMaterializer, LocalRepository};
pub use project::{Dependency, ModuleDescriptor, ProjectId, Scope};
pub use propagate::{ClasspathEntry, ClasspathPropagationEngine, ModuleBuildUnit};
pub use resolve::{ReactorResolution, resolve_reactor};
pub use sort::{BuildOrder, TopologicalSorter};
pub use store::{DescriptorStore, FileDescriptorStore, InMemoryDescriptorStore};
pub use types::{ModuleError, ModuleFailure, ResolveConfig, ResolveError};
