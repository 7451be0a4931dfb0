//! One sync-then-publish pass for a configured source

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{SourceConfig, DEFAULT_CONCURRENCY};
use crate::discovery::{resolve_root, FileDiscovery};
use crate::emit::{EmitReport, NodeEmitter};
use crate::git::{GitClient, RepoMirror, SyncOutcome};
use crate::graph::{ContentGraph, FileNodeFactory, FileNodeOptions, FsFileNodeFactory, NodeId};
use crate::remote::{RemoteDescriptor, SyncedRemote};
use crate::Result;

/// Outcome of a completed pass
#[derive(Debug)]
pub struct PassReport {
    /// The remote as synchronized
    pub remote: SyncedRemote,
    /// ID of the `GitRemote` node
    pub remote_id: NodeId,
    /// What synchronization did
    pub sync: SyncOutcome,
    /// File node results
    pub files: EmitReport,
}

impl PassReport {
    pub fn source_name(&self) -> &str {
        &self.remote.descriptor.source_name
    }
}

/// Mirrors git repositories and publishes their files into a content graph
pub struct GitSource {
    git: Arc<dyn GitClient>,
    graph: Arc<dyn ContentGraph>,
    factory: Arc<dyn FileNodeFactory>,
    mirror_root: PathBuf,
    concurrency: usize,
}

impl std::fmt::Debug for GitSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitSource")
            .field("mirror_root", &self.mirror_root)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl GitSource {
    /// Create a source publishing into `graph`, with mirrors under `mirror_root`
    pub fn new(
        git: Arc<dyn GitClient>,
        graph: Arc<dyn ContentGraph>,
        mirror_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            git,
            graph,
            factory: Arc::new(FsFileNodeFactory),
            mirror_root: mirror_root.into(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Use a custom file node factory
    pub fn with_file_node_factory(mut self, factory: Arc<dyn FileNodeFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Limit concurrent file node creation
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Run one pass for `source`
    ///
    /// Fatal errors (invalid remote, mismatched mirror, failed clone, invalid
    /// patterns) return before any node is created. Per-file failures are
    /// collected in the report.
    pub async fn source_nodes(&self, source: &SourceConfig) -> Result<PassReport> {
        let mut descriptor = RemoteDescriptor::new(
            &source.remote,
            source.name.as_deref(),
            source.branch.as_deref(),
            &self.mirror_root,
        )?;
        if let Some(local) = &source.local {
            descriptor = descriptor.with_local_path(local);
        }

        let mirror = RepoMirror::new(&descriptor.local_path, self.git.clone());
        let sync = mirror
            .ensure_synced(
                descriptor.remote(),
                descriptor.branch.as_deref(),
                &source.fetch_options,
            )
            .await?;

        let remote = SyncedRemote {
            descriptor,
            resolved_ref: sync.resolved_ref,
        };
        let mirror_path = remote.descriptor.local_path.clone();

        let files = FileDiscovery::new(resolve_root(&mirror_path, source.root_dir.as_deref()))
            .patterns(source.patterns.to_vec())
            .include_dotfiles(source.include_dotfiles)
            .discover_async()
            .await?;

        let emitter = NodeEmitter::new(self.graph.clone(), self.factory.clone())
            .with_concurrency(self.concurrency);
        let remote_id = emitter.emit_remote(&remote).await?;

        let options = FileNodeOptions {
            name: remote.descriptor.source_name.clone(),
            base_path: mirror_path,
        };
        let report = emitter.emit_files(&remote_id, files, &options).await;

        tracing::info!(
            source = %remote.descriptor.source_name,
            git_ref = %remote.resolved_ref,
            degraded = sync.outcome.is_degraded(),
            created = report.created,
            failed = report.failures.len(),
            "Source pass complete"
        );

        Ok(PassReport {
            remote,
            remote_id,
            sync: sync.outcome,
            files: report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fake::FakeGit;
    use crate::graph::{MemoryGraph, Node, NodeData, FILE_KIND, GIT_REMOTE_KIND};
    use crate::Error;
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    const REMOTE: &str = "https://example.com/acme/widgets.git";

    fn source_with(git: &Arc<FakeGit>, graph: &Arc<MemoryGraph>, root: &TempDir) -> GitSource {
        GitSource::new(git.clone(), graph.clone(), root.path().join("mirrors"))
    }

    #[tokio::test]
    async fn test_fresh_clone_publishes_remote() {
        let temp = TempDir::new().unwrap();
        let git = Arc::new(FakeGit::new("main"));
        let graph = Arc::new(MemoryGraph::new());

        let report = source_with(&git, &graph, &temp)
            .source_nodes(&SourceConfig::new(REMOTE))
            .await
            .unwrap();

        assert_eq!(report.sync, SyncOutcome::Cloned);
        assert_eq!(report.source_name(), "widgets");
        assert_eq!(report.remote.resolved_ref, "main");
        assert_eq!(
            report.remote.descriptor.local_path,
            temp.path().join("mirrors/acme/widgets/widgets")
        );

        let remotes = graph.nodes_of_kind(GIT_REMOTE_KIND).await;
        assert_eq!(remotes.len(), 1);
        let NodeData::GitRemote(data) = &remotes[0].data else {
            panic!("expected a remote node");
        };
        assert_eq!(data.web_link, "https://example.com/acme/widgets");
        assert_eq!(data.ref_name, "main");
        assert_eq!(report.files.created, 1);
    }

    #[tokio::test]
    async fn test_existing_mirror_refreshes_branch() {
        let temp = TempDir::new().unwrap();
        let git = Arc::new(FakeGit::new("main"));
        let graph = Arc::new(MemoryGraph::new());
        let local = temp.path().join("checkout");
        git.seed_mirror(&local, REMOTE, "release");

        let mut config = SourceConfig::new(REMOTE);
        config.branch = Some("release".to_string());
        config.local = Some(local);

        let report = source_with(&git, &graph, &temp)
            .source_nodes(&config)
            .await
            .unwrap();

        assert_eq!(
            report.sync,
            SyncOutcome::Refreshed {
                target: "origin/release".to_string()
            }
        );
        assert_eq!(report.remote.resolved_ref, "release");
        assert!(git.calls().contains(&"reset_hard release origin/release".to_string()));
    }

    #[tokio::test]
    async fn test_mismatch_emits_nothing() {
        let temp = TempDir::new().unwrap();
        let git = Arc::new(FakeGit::new("main"));
        let graph = Arc::new(MemoryGraph::new());
        let local = temp.path().join("checkout");
        git.seed_mirror(&local, "https://example.com/acme/gadgets.git", "main");

        let mut config = SourceConfig::new(REMOTE);
        config.local = Some(local);

        let err = source_with(&git, &graph, &temp)
            .source_nodes(&config)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RemoteMismatch { .. }));
        assert!(graph.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_remote_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let git = Arc::new(FakeGit::new("main"));
        let graph = Arc::new(MemoryGraph::new());

        let err = source_with(&git, &graph, &temp)
            .source_nodes(&SourceConfig::new("not a remote"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidRemoteUrl { .. }));
        assert!(git.calls().is_empty());
        assert!(!temp.path().join("mirrors").exists());
    }

    #[tokio::test]
    async fn test_pattern_scoped_files_link_to_remote() {
        let temp = TempDir::new().unwrap();
        let git = Arc::new(FakeGit::new("main").with_files(&[
            ("docs/intro.md", "a"),
            ("docs/guide/setup.md", "b"),
            ("docs/guide/deep/advanced.md", "c"),
            ("docs/logo.png", "d"),
            ("README.md", "e"),
        ]));
        let graph = Arc::new(MemoryGraph::new());

        let mut config = SourceConfig::new(REMOTE);
        config.patterns = vec!["docs/**/*.md".to_string()].into();

        let report = source_with(&git, &graph, &temp)
            .source_nodes(&config)
            .await
            .unwrap();

        assert_eq!(report.files.created, 3);
        let files = graph.nodes_of_kind(FILE_KIND).await;
        assert_eq!(files.len(), 3);
        assert_eq!(graph.linked_to(&report.remote_id).await.len(), 3);
        for node in files {
            let NodeData::File(data) = &node.data else {
                panic!("expected a file node");
            };
            assert_eq!(data.git_remote.as_ref(), Some(&report.remote_id));
            assert!(data.relative_path.starts_with("docs/"));
        }
    }

    #[tokio::test]
    async fn test_root_dir_keeps_mirror_relative_paths() {
        let temp = TempDir::new().unwrap();
        let git = Arc::new(
            FakeGit::new("main").with_files(&[("site/content/a.md", "a"), ("other/b.md", "b")]),
        );
        let graph = Arc::new(MemoryGraph::new());

        let mut config = SourceConfig::new(REMOTE);
        config.name = Some("site".to_string());
        config.root_dir = Some(PathBuf::from("site"));

        let report = source_with(&git, &graph, &temp)
            .source_nodes(&config)
            .await
            .unwrap();

        assert_eq!(report.files.created, 1);
        let files = graph.nodes_of_kind(FILE_KIND).await;
        let NodeData::File(data) = &files[0].data else {
            panic!("expected a file node");
        };
        assert_eq!(data.relative_path, "site/content/a.md");
        assert_eq!(data.source_instance_name, "site");
    }

    #[tokio::test]
    async fn test_degraded_refresh_still_publishes() {
        let temp = TempDir::new().unwrap();
        let git = Arc::new(FakeGit::new("main"));
        let graph = Arc::new(MemoryGraph::new());
        let local = temp.path().join("checkout");
        git.seed_mirror(&local, REMOTE, "main");
        git.fail_fetch();

        let mut config = SourceConfig::new(REMOTE);
        config.local = Some(local);

        let report = source_with(&git, &graph, &temp)
            .source_nodes(&config)
            .await
            .unwrap();

        assert!(report.sync.is_degraded());
        assert_eq!(report.files.created, 1);
        assert_eq!(graph.nodes_of_kind(GIT_REMOTE_KIND).await.len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_passes_update_same_nodes() {
        let temp = TempDir::new().unwrap();
        let git = Arc::new(FakeGit::new("main"));
        let graph = Arc::new(MemoryGraph::new());
        let source = source_with(&git, &graph, &temp);
        let config = SourceConfig::new(REMOTE);

        let first = source.source_nodes(&config).await.unwrap();
        let second = source.source_nodes(&config).await.unwrap();

        assert_eq!(first.remote_id, second.remote_id);
        assert_eq!(first.remote.resolved_ref, second.remote.resolved_ref);
        assert_eq!(graph.len().await, 2);
    }

    /// Refuses images and records every path it was asked about
    #[derive(Default)]
    struct NoImages {
        seen: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FileNodeFactory for NoImages {
        async fn create_file_node(
            &self,
            path: &Path,
            graph: &dyn ContentGraph,
            options: &FileNodeOptions,
        ) -> Result<Node> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            self.seen.lock().unwrap().push(name.clone());
            if name.ends_with(".png") {
                return Err(Error::Graph(format!("{} is an image", name)));
            }
            FsFileNodeFactory.create_file_node(path, graph, options).await
        }
    }

    #[tokio::test]
    async fn test_custom_file_node_factory() {
        let temp = TempDir::new().unwrap();
        let git = Arc::new(
            FakeGit::new("main").with_files(&[("a.md", "a"), ("logo.png", "p"), ("b.md", "b")]),
        );
        let graph = Arc::new(MemoryGraph::new());
        let factory = Arc::new(NoImages::default());

        let report = source_with(&git, &graph, &temp)
            .with_file_node_factory(factory.clone())
            .source_nodes(&SourceConfig::new(REMOTE))
            .await
            .unwrap();

        let mut seen = factory.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["a.md", "b.md", "logo.png"]);
        assert_eq!(report.files.created, 2);
        assert_eq!(report.files.failures.len(), 1);
        assert!(report.files.failures[0].path.ends_with("logo.png"));
        assert!(matches!(
            report.files.failures[0].error,
            Error::FileNode { .. }
        ));
        assert_eq!(graph.nodes_of_kind(FILE_KIND).await.len(), 2);
    }
}
