//! Tests for resolve_reactor over in-memory reactors.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use modgraph_lib::{
  CancellationToken, ClasspathEntry, InMemoryDescriptorStore, LocalRepository, ModuleDescriptor, ModuleError,
  ProjectId, ReactorResolution, ResolveConfig, ResolveError, Scope, resolve_reactor,
};
use tempfile::TempDir;

use super::common::{RecordingMaterializer, StalledMaterializer, artifacts, external, id, lib, on, parent};

async fn resolve_with(
  descriptors: Vec<ModuleDescriptor>,
  materializer: Arc<RecordingMaterializer>,
) -> Result<ReactorResolution, ResolveError> {
  let store = InMemoryDescriptorStore::new("/repo", descriptors);
  resolve_reactor(
    Path::new("/repo"),
    &store,
    materializer,
    &CancellationToken::new(),
    &ResolveConfig::default(),
  )
  .await
}

mod scenarios {
  use super::*;

  #[tokio::test]
  async fn single_module_uses_external_entries_only() {
    let junit = ProjectId::new("org.junit", "junit");
    let materializer = Arc::new(RecordingMaterializer::knowing(&[junit]));
    let descriptors = vec![lib("solo", "/repo").with_dependency(external("org.junit", "junit", Scope::Test))];

    let result = resolve_with(descriptors, materializer).await.unwrap();

    assert_eq!(artifacts(&result.order), vec!["solo"]);
    let unit = result.unit(&id("solo")).unwrap();
    assert!(unit.main_classpath.is_empty());
    assert_eq!(unit.test_paths(), vec![PathBuf::from("/m2/junit.jar")]);
  }

  #[tokio::test]
  async fn parent_with_two_children() {
    let materializer = Arc::new(RecordingMaterializer::default());
    let descriptors = vec![
      parent("p", "/repo", &["a", "b"]),
      lib("a", "/repo/a").with_dependency(on("b")),
      lib("b", "/repo/b"),
    ];

    let result = resolve_with(descriptors, materializer).await.unwrap();

    assert_eq!(artifacts(&result.order), vec!["b", "a", "p"]);
    let p = result.unit(&id("p")).unwrap();
    assert!(p.main_classpath.is_empty() && p.test_classpath.is_empty());
  }

  #[tokio::test]
  async fn three_cycle_is_rejected() {
    let materializer = Arc::new(RecordingMaterializer::default());
    let descriptors = vec![
      parent("p", "/repo", &["a", "b", "c"]),
      lib("a", "/repo/a").with_dependency(on("b")),
      lib("b", "/repo/b").with_dependency(on("c")),
      lib("c", "/repo/c").with_dependency(on("a")),
    ];

    let err = resolve_with(descriptors, materializer.clone()).await.unwrap_err();

    match err {
      ResolveError::CyclicDependency { involved, cycles } => {
        assert_eq!(involved, vec![id("a"), id("b"), id("c")]);
        assert_eq!(cycles, vec![vec![id("a"), id("b"), id("c")]]);
      }
      other => panic!("expected a cycle error, got {other}"),
    }
    assert!(materializer.requests().is_empty());
  }

  #[tokio::test]
  async fn order_is_reproducible() {
    let descriptors = vec![
      parent("p", "/repo", &["a", "b", "c", "d"]),
      lib("a", "/repo/a").with_dependency(on("c")),
      lib("b", "/repo/b"),
      lib("c", "/repo/c").with_dependency(on("b")),
      lib("d", "/repo/d"),
    ];
    let mut reversed = descriptors.clone();
    reversed.reverse();

    let first = resolve_with(descriptors, Arc::new(RecordingMaterializer::default()))
      .await
      .unwrap();
    let second = resolve_with(reversed, Arc::new(RecordingMaterializer::default()))
      .await
      .unwrap();

    assert_eq!(artifacts(&first.order), vec!["b", "c", "a", "d", "p"]);
    assert_eq!(first.order, second.order);
  }

  #[tokio::test]
  async fn unknown_module_dependency_goes_to_materializer() {
    let lost = ProjectId::new("com.acme", "lost");
    let materializer = Arc::new(RecordingMaterializer::knowing(&[lost.clone()]));
    let descriptors = vec![
      parent("p", "/repo", &["app"]),
      lib("app", "/repo/app").with_dependency(on("lost")),
    ];

    let result = resolve_with(descriptors, materializer.clone()).await.unwrap();

    assert_eq!(materializer.requests(), vec![lost]);
    let app = result.unit(&id("app")).unwrap();
    assert_eq!(app.main_classpath, vec![ClasspathEntry::artifact("/m2/lost.jar")]);
  }

  #[tokio::test]
  async fn self_dependency_is_rejected() {
    let materializer = Arc::new(RecordingMaterializer::default());
    let descriptors = vec![
      parent("p", "/repo", &["a"]),
      lib("a", "/repo/a").with_dependency(on("a")),
    ];

    let err = resolve_with(descriptors, materializer).await.unwrap_err();
    assert!(matches!(err, ResolveError::SelfDependency(ref module) if module == &id("a")));
  }
}

mod properties {
  use super::*;

  #[tokio::test]
  async fn unreachable_descriptor_is_excluded() {
    // "orphan" is in the store but no aggregator declares it.
    let orphan = id("orphan");
    let materializer = Arc::new(RecordingMaterializer::knowing(&[orphan.clone()]));
    let descriptors = vec![
      parent("p", "/repo", &["app"]),
      lib("app", "/repo/app").with_dependency(on("orphan")),
      lib("orphan", "/elsewhere/orphan"),
    ];

    let result = resolve_with(descriptors, materializer.clone()).await.unwrap();

    assert!(result.order.position(&orphan).is_none());
    assert!(result.unit(&orphan).is_none());
    assert_eq!(materializer.requests(), vec![orphan]);
  }

  #[tokio::test]
  async fn reactor_module_beats_published_artifact() {
    // The materializer could serve "core" as a jar; the sibling unit must win.
    let materializer = Arc::new(RecordingMaterializer::knowing(&[id("core")]));
    let descriptors = vec![
      parent("p", "/repo", &["core", "app"]),
      lib("core", "/repo/core"),
      lib("app", "/repo/app").with_dependency(on("core")),
    ];

    let result = resolve_with(descriptors, materializer.clone()).await.unwrap();

    let app = result.unit(&id("app")).unwrap();
    assert_eq!(app.main_paths(), vec![PathBuf::from("/repo/core/target/classes")]);
    assert!(!app.test_paths().contains(&PathBuf::from("/m2/core.jar")));
    assert!(materializer.requests().is_empty());
  }

  #[tokio::test]
  async fn independent_subtree_survives_failure() {
    let materializer = Arc::new(RecordingMaterializer::default());
    let descriptors = vec![
      parent("p", "/repo", &["broken", "user", "fine"]),
      lib("broken", "/repo/broken").with_dependency(external("org.gone", "gone", Scope::Compile)),
      lib("user", "/repo/user").with_dependency(on("broken")),
      lib("fine", "/repo/fine"),
    ];

    let result = resolve_with(descriptors, materializer).await.unwrap();

    assert!(!result.is_success());
    assert!(result.unit(&id("fine")).is_some());
    assert_eq!(artifacts(result.failures.iter().map(|f| &f.id)), vec!["broken", "user"]);
    assert_eq!(
      result.failure(&id("user")).unwrap().error,
      ModuleError::PropagatedDependencyFailure {
        origin: id("broken"),
        via: id("broken"),
      }
    );
  }
}

mod structure {
  use super::*;

  #[tokio::test]
  async fn empty_store_fails() {
    let err = resolve_with(Vec::new(), Arc::new(RecordingMaterializer::default()))
      .await
      .unwrap_err();
    assert!(matches!(err, ResolveError::NoModulesFound { .. }));
  }

  #[tokio::test]
  async fn duplicate_ids_fail() {
    let descriptors = vec![
      parent("p", "/repo", &["a", "b"]),
      lib("a", "/repo/a"),
      lib("a", "/repo/b"),
    ];
    let err = resolve_with(descriptors, Arc::new(RecordingMaterializer::default()))
      .await
      .unwrap_err();
    assert!(matches!(err, ResolveError::DuplicateModuleId { ref id, .. } if id.artifact == "a"));
  }

  #[tokio::test]
  async fn missing_root_fails() {
    let descriptors = vec![lib("a", "/other")];
    let err = resolve_with(descriptors, Arc::new(RecordingMaterializer::default()))
      .await
      .unwrap_err();
    assert!(matches!(err, ResolveError::RootModuleNotFound { .. }));
  }

  #[tokio::test]
  async fn dangling_submodule_fails() {
    let descriptors = vec![parent("p", "/repo", &["a", "ghost"]), lib("a", "/repo/a")];
    let err = resolve_with(descriptors, Arc::new(RecordingMaterializer::default()))
      .await
      .unwrap_err();
    match err {
      ResolveError::DanglingModuleReference { parent, path } => {
        assert_eq!(parent, id("p"));
        assert_eq!(path, PathBuf::from("/repo/ghost"));
      }
      other => panic!("expected a dangling reference, got {other}"),
    }
  }
}

mod cancellation {
  use super::*;

  #[tokio::test]
  async fn cancelled_before_start() {
    let store = InMemoryDescriptorStore::new("/repo", vec![lib("solo", "/repo")]);
    let token = CancellationToken::new();
    token.cancel();

    let err = resolve_reactor(
      Path::new("/repo"),
      &store,
      Arc::new(RecordingMaterializer::default()),
      &token,
      &ResolveConfig::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ResolveError::Cancelled));
  }

  #[tokio::test]
  async fn cancel_aborts_inflight_resolution() {
    let store = InMemoryDescriptorStore::new(
      "/repo",
      vec![lib("solo", "/repo").with_dependency(external("org.slow", "slow", Scope::Compile))],
    );
    let token = CancellationToken::new();

    let canceller = {
      let token = token.clone();
      tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
      })
    };

    let result = tokio::time::timeout(
      Duration::from_secs(5),
      resolve_reactor(
        Path::new("/repo"),
        &store,
        Arc::new(StalledMaterializer),
        &token,
        &ResolveConfig::default(),
      ),
    )
    .await
    .expect("cancellation should end the run");

    canceller.await.unwrap();
    assert!(matches!(result, Err(ResolveError::Cancelled)));
  }
}

mod local_repository {
  use super::*;

  fn publish(repo: &LocalRepository, id: &ProjectId, version: &str) -> PathBuf {
    let jar = repo.artifact_path(id, version, None);
    std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
    std::fs::write(&jar, b"").unwrap();
    jar
  }

  #[tokio::test]
  async fn resolves_from_local_repository() {
    let temp = TempDir::new().unwrap();
    let repo = LocalRepository::new(temp.path().join("m2"));
    let slf4j = ProjectId::new("org.slf4j", "slf4j-api");
    let jar = publish(&repo, &slf4j, "1.0");

    let descriptors = vec![
      parent("p", "/repo", &["core", "app"]),
      lib("core", "/repo/core").with_dependency(external("org.slf4j", "slf4j-api", Scope::Compile)),
      lib("app", "/repo/app").with_dependency(on("core")),
    ];
    let store = InMemoryDescriptorStore::new("/repo", descriptors);

    let result = resolve_reactor(
      Path::new("/repo"),
      &store,
      Arc::new(repo),
      &CancellationToken::new(),
      &ResolveConfig::default(),
    )
    .await
    .unwrap();

    assert!(result.is_success());
    let app = result.unit(&id("app")).unwrap();
    assert_eq!(app.main_paths(), vec![jar, PathBuf::from("/repo/core/target/classes")]);
  }
}
