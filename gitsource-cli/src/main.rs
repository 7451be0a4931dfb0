//! gitsource CLI - mirror git repositories into a content graph

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gitsource_core::remote::redact_url;
use gitsource_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{NodesArgs, SyncArgs};

/// Mirror git repositories and publish their files as graph nodes
#[derive(Parser, Debug)]
#[command(name = "gitsource")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base cache directory for mirrors and the node database (overrides config and env)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Path to git executable (overrides config and env)
    #[arg(long, global = true)]
    git_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Synchronize mirrors and publish their nodes
    #[command(visible_alias = "s")]
    Sync(SyncArgs),

    /// List stored nodes
    #[command(visible_alias = "ls")]
    Nodes(NodesArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = Config::load_with_overrides(
        cli.config.as_deref(),
        cli.cache_dir.clone(),
        cli.git_path.clone(),
    )?;

    if cli.verbose {
        tracing::info!(
            git_path = %config.git.path,
            cache_dir = ?config.cache_dir,
            sources = config.sources.len(),
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("gitsource {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Sync(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Nodes(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Config) => {
            print_config(&config, cli.config.as_deref())?;
        }
        None => {
            println!("gitsource - mirror git repositories into a content graph");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn print_config(config: &Config, explicit_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    println!("gitsource Configuration");
    println!("=======================");
    println!();
    println!("Cache:");
    println!("  cache_dir: {}", config.cache_dir()?.display());
    println!("  mirrors: {}", config.mirror_root()?.display());
    println!("  database: {}", config.database_path()?.display());
    println!("  concurrency: {}", config.concurrency);
    println!();
    println!("Git Settings:");
    println!("  path: {}", config.git.path);
    println!(
        "  timeout: {}",
        humantime::format_duration(config.git.timeout)
    );
    println!();

    if config.sources.is_empty() {
        println!("Sources: (none)");
    } else {
        println!("Sources:");
        for source in &config.sources {
            println!("  - remote: {}", redact_url(&source.remote));
            if let Some(name) = &source.name {
                println!("    name: {}", name);
            }
            println!(
                "    branch: {}",
                source.branch.as_deref().unwrap_or("(remote default)")
            );
            if let Some(local) = &source.local {
                println!("    local: {}", local.display());
            }
            if let Some(root_dir) = &source.root_dir {
                println!("    root_dir: {}", root_dir.display());
            }
            println!("    patterns: {}", source.patterns.to_vec().join(", "));
        }
    }
    println!();

    let path = explicit_path
        .map(std::path::Path::to_path_buf)
        .or_else(Config::default_config_path);
    if let Some(path) = path {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }

    Ok(())
}
