//! Daemon command - poll GitHub and launch reviews until stopped

use std::path::Path;

use anyhow::Context;
use revd_core::review::ProcessLauncher;
use revd_core::{Config, Daemon, Shutdown, StateStore};
use revd_github::GitHubPoller;

use super::github_token;

pub async fn execute(config_path: &Path, config: &Config) -> anyhow::Result<()> {
    if config.enabled_repos().next().is_none() {
        tracing::warn!("No enabled repositories configured; the daemon will idle");
    }

    if let Some(ref dir) = config.paths.log_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    }

    let state = StateStore::load(&config.paths.state_file);
    let poller = GitHubPoller::new(github_token())?;
    let launcher =
        ProcessLauncher::current_exe(config_path)?.with_log_dir(config.paths.log_dir.clone());

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    let mut daemon = Daemon::new(config, state, poller, launcher, shutdown);
    daemon.run().await?;
    Ok(())
}
