//! Sync command - run source passes into the node store

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use gitsource_core::remote::redact_url;
use gitsource_core::{
    Config, ContentGraph, GitSource, MemoryGraph, PassReport, RemoteUrl, SourceConfig,
    SyncOutcome, SystemGit,
};
use gitsource_db::{Database, DatabaseConfig};

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Only sync configured sources with this name (repeatable)
    #[arg(short, long = "source", conflicts_with = "remote")]
    pub sources: Vec<String>,

    /// Sync this remote instead of the configured sources
    #[arg(long)]
    pub remote: Option<String>,

    /// Source instance name for --remote
    #[arg(long, requires = "remote")]
    pub name: Option<String>,

    /// Branch to check out for --remote
    #[arg(short, long, requires = "remote")]
    pub branch: Option<String>,

    /// Subdirectory of the mirror to scan for --remote
    #[arg(long, requires = "remote")]
    pub root_dir: Option<PathBuf>,

    /// Glob selecting files for --remote (repeatable, "!" excludes)
    #[arg(short, long = "pattern", requires = "remote")]
    pub patterns: Vec<String>,

    /// Mirror location for --remote
    #[arg(long, requires = "remote")]
    pub local: Option<PathBuf>,

    /// Include dot-prefixed files and directories for --remote
    #[arg(long, requires = "remote")]
    pub include_dotfiles: bool,

    /// Node database path (defaults to <cache_dir>/graph.db)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Publish into an in-memory graph instead of the database
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    /// Execute the sync command
    pub async fn execute(&self, verbose: bool, config: &Config) -> anyhow::Result<()> {
        let sources = self.selected_sources(config)?;

        let mut db = None;
        let graph: Arc<dyn ContentGraph> = if self.dry_run {
            Arc::new(MemoryGraph::new())
        } else {
            let path = match &self.db {
                Some(path) => path.clone(),
                None => config.database_path()?,
            };
            let opened = Database::open(DatabaseConfig::new(path))
                .await
                .map_err(|e| anyhow::anyhow!("Failed to open node database: {}", e))?;
            let store = Arc::new(opened.nodes());
            db = Some(opened);
            store
        };

        let git = Arc::new(SystemGit::from_config(&config.git));
        let source = GitSource::new(git, graph, config.mirror_root()?)
            .with_concurrency(config.concurrency);

        if self.dry_run {
            println!("[Dry run] Nodes are not persisted");
            println!();
        }

        let mut failed = 0;
        for source_config in &sources {
            let remote = redact_url(&source_config.remote);
            tracing::debug!(remote = %remote, "Starting source pass");
            match source.source_nodes(source_config).await {
                Ok(report) => print_report(&report, verbose),
                Err(e) => {
                    failed += 1;
                    tracing::error!(remote = %remote, error = %e, "Source pass failed");
                    println!("{}: failed: {}", remote, e);
                }
            }
        }

        if let Some(db) = db {
            db.close().await;
        }

        if failed > 0 {
            anyhow::bail!("{} of {} source(s) failed", failed, sources.len());
        }

        Ok(())
    }

    /// The sources this invocation runs, in order
    fn selected_sources(&self, config: &Config) -> anyhow::Result<Vec<SourceConfig>> {
        if let Some(remote) = &self.remote {
            let mut source = SourceConfig::new(remote.clone());
            source.name = self.name.clone();
            source.branch = self.branch.clone();
            source.root_dir = self.root_dir.clone();
            source.local = self.local.clone();
            source.include_dotfiles = self.include_dotfiles;
            if !self.patterns.is_empty() {
                source.patterns = self.patterns.clone().into();
            }
            return Ok(vec![source]);
        }

        if config.sources.is_empty() {
            anyhow::bail!("No sources configured; add [[sources]] to the config file or pass --remote");
        }

        if self.sources.is_empty() {
            return Ok(config.sources.clone());
        }

        let selected: Vec<SourceConfig> = config
            .sources
            .iter()
            .filter(|s| {
                let name = source_name(s);
                self.sources.iter().any(|wanted| Some(wanted) == name.as_ref())
            })
            .cloned()
            .collect();

        if let Some(missing) = self.sources.iter().find(|wanted| {
            !selected
                .iter()
                .any(|s| source_name(s).as_ref() == Some(*wanted))
        }) {
            anyhow::bail!("No configured source named '{}'", missing);
        }

        Ok(selected)
    }
}

/// Name a source is known by: its configured name, else the repository name
fn source_name(source: &SourceConfig) -> Option<String> {
    source
        .name
        .clone()
        .or_else(|| RemoteUrl::parse(&source.remote).ok().map(|url| url.name))
}

fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Cloned => "cloned".to_string(),
        SyncOutcome::Refreshed { target } => format!("refreshed to {}", target),
        SyncOutcome::Degraded { error, .. } => {
            format!("refresh failed ({}), using existing mirror", error)
        }
    }
}

fn print_report(report: &PassReport, verbose: bool) {
    println!(
        "{}: {} at {}, {} file node(s), {} failed",
        report.source_name(),
        describe(&report.sync),
        report.remote.resolved_ref,
        report.files.created,
        report.files.failures.len()
    );

    if verbose {
        println!("  remote: {}", report.remote.descriptor.url.redacted());
        println!("  mirror: {}", report.remote.descriptor.local_path.display());
        println!("  node: {}", report.remote_id);
        for failure in &report.files.failures {
            println!("  failed: {}: {}", failure.path.display(), failure.error);
        }
    }
}
