//! revd CLI - pull request review daemon
//!
//! Polls GitHub for pull request updates and runs Claude Code reviews on them.

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use revd_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::ReviewArgs;

/// revd: automatic Claude reviews for GitHub pull requests
#[derive(Parser, Debug)]
#[command(name = "revd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(long, global = true, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the polling daemon
    Daemon,

    /// Review a single pull request and post the result
    Review(ReviewArgs),

    /// Show persisted review state
    Status,

    /// Show the effective configuration
    Config,

    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Locate, load and validate the config file, then apply env overrides
fn load_config(explicit: Option<&Path>) -> anyhow::Result<(PathBuf, Config)> {
    let path = Config::resolve_path(explicit).context(
        "No config file found. Pass --config, set CONFIG_FILE, or create ./config.toml",
    )?;
    let path = std::path::absolute(&path).unwrap_or(path);

    let config = Config::load_from_file(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?
        .with_env_overrides();
    config.validate()?;

    tracing::debug!(path = %path.display(), repos = config.repos.len(), "Configuration loaded");
    Ok((path, config))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Version) => {
            println!("revd {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Daemon) => {
            let (path, config) = load_config(cli.config.as_deref())?;
            commands::daemon::execute(&path, &config).await?;
        }
        Some(Commands::Review(args)) => {
            let (_, config) = load_config(cli.config.as_deref())?;
            let code = args.execute(&config).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Some(Commands::Status) => {
            let (_, config) = load_config(cli.config.as_deref())?;
            commands::status::execute(&config);
        }
        Some(Commands::Config) => {
            let (path, config) = load_config(cli.config.as_deref())?;
            println!("# Config file: {}", path.display());
            println!();
            print!("{}", commands::render_config(&config)?);
        }
        None => {
            println!("revd - automatic Claude reviews for GitHub pull requests");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
