//! Launching review jobs as independent processes
//!
//! Each review runs in its own OS process (the `review` subcommand of this
//! binary). The daemon never waits on a job; it keeps a [`ReviewJob`] handle
//! and polls it for an exit status between poll cycles.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use super::request::ReviewRequest;
use crate::{Error, Result};

/// Terminal state of a review job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobExit {
    Success,
    /// Nonzero exit; `None` when the process was killed by a signal
    Failure(Option<i32>),
}

impl JobExit {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => JobExit::Success,
            other => JobExit::Failure(other),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobExit::Success)
    }
}

/// Handle to a running review job
pub trait ReviewJob: Send {
    /// Non-blocking check for termination
    fn poll(&mut self) -> std::io::Result<Option<JobExit>>;
}

/// Something that can start review jobs
pub trait ReviewLauncher: Send {
    fn launch(&self, request: &ReviewRequest) -> Result<Box<dyn ReviewJob>>;
}

/// Review job backed by a child process
pub struct ProcessJob {
    child: Child,
}

impl std::fmt::Debug for ProcessJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessJob")
            .field("pid", &self.child.id())
            .finish()
    }
}

impl ReviewJob for ProcessJob {
    fn poll(&mut self) -> std::io::Result<Option<JobExit>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| JobExit::from_code(status.code())))
    }
}

/// Launches `<program> --config <path> review ...` in a new process group
///
/// The job gets its own process group so a signal delivered to the daemon's
/// group (Ctrl-C, service manager stop) does not reach running reviews.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    config_path: PathBuf,
    log_dir: Option<PathBuf>,
}

impl ProcessLauncher {
    /// Create a launcher for a specific program
    pub fn new(program: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            config_path: config_path.into(),
            log_dir: None,
        }
    }

    /// Create a launcher that re-invokes the running executable
    pub fn current_exe(config_path: impl Into<PathBuf>) -> Result<Self> {
        let program = std::env::current_exe()?;
        Ok(Self::new(program, config_path))
    }

    /// Append each job's output to a per-PR log file in `dir`
    pub fn with_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.log_dir = dir;
        self
    }

    /// Log file for a request, when a log directory is configured
    pub fn log_path(&self, request: &ReviewRequest) -> Option<PathBuf> {
        self.log_dir.as_ref().map(|dir| {
            dir.join(format!(
                "{}-pr-{}.log",
                request.repo.replace('/', "_"),
                request.pr_number
            ))
        })
    }

    /// Build the command for a request
    pub fn build_command(&self, request: &ReviewRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--config")
            .arg(&self.config_path)
            .args(request.to_args())
            .stdin(Stdio::null());

        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }

    fn output_streams(&self, request: &ReviewRequest) -> Result<(Stdio, Stdio)> {
        let Some(path) = self.log_path(request) else {
            return Ok((Stdio::null(), Stdio::null()));
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let stderr = file.try_clone()?;
        Ok((Stdio::from(file), Stdio::from(stderr)))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl ReviewLauncher for ProcessLauncher {
    fn launch(&self, request: &ReviewRequest) -> Result<Box<dyn ReviewJob>> {
        let (stdout, stderr) = self.output_streams(request)?;
        let mut cmd = self.build_command(request);
        cmd.stdout(stdout).stderr(stderr);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Agent(format!(
                    "Review executable not found at '{}'",
                    self.program.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        debug!(key = %request.key(), pid = ?child.id(), "Spawned review job");
        Ok(Box::new(ProcessJob { child }))
    }
}
