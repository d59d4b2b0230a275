//! Sequential clone execution with per-repository failure isolation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use repoharvest_shared::{
    CloneConfig, CloneOutcome, CloneStatus, ExistingPolicy, HarvestError, RepoId, Result,
    SelectionResult,
};

use crate::pipeline::ProgressReporter;

/// Why a single clone failed. Never escalated past its [`CloneOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    #[error("destination already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to launch git: {0}")]
    Spawn(std::io::Error),

    #[error("git clone exited with status {}: {stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    GitFailed { code: Option<i32>, stderr: String },

    #[error("git clone timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// The host clone protocol: materialize `url` at `dest`.
///
/// `dest` does not exist when this is called.
#[async_trait]
pub trait Cloner: Send + Sync {
    async fn clone_repo(&self, url: &str, dest: &Path) -> std::result::Result<(), CloneError>;
}

// ---------------------------------------------------------------------------
// GitCliCloner
// ---------------------------------------------------------------------------

/// [`Cloner`] that shells out to `git clone`.
#[derive(Debug, Clone)]
pub struct GitCliCloner {
    program: String,
    depth: Option<u32>,
    timeout: Option<Duration>,
}

impl GitCliCloner {
    pub fn new(config: &CloneConfig) -> Self {
        Self {
            program: "git".into(),
            depth: config.depth,
            timeout: config.timeout,
        }
    }

    /// Use a different git executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl Cloner for GitCliCloner {
    async fn clone_repo(&self, url: &str, dest: &Path) -> std::result::Result<(), CloneError> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.arg("clone").arg("--quiet");
        if let Some(depth) = self.depth {
            cmd.arg("--depth").arg(depth.to_string());
        }
        cmd.arg("--")
            .arg(url)
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    // The child is killed on drop; clear whatever it wrote.
                    let _ = tokio::fs::remove_dir_all(dest).await;
                    return Err(CloneError::TimedOut(limit));
                }
            },
            None => cmd.output().await,
        }
        .map_err(CloneError::Spawn)?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(CloneError::GitFailed {
            code: output.status.code(),
            stderr: stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("")
                .trim()
                .to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// CloneExecutor
// ---------------------------------------------------------------------------

/// Clones a selection one repository at a time into `<dir>/<owner>/<name>`.
pub struct CloneExecutor<C> {
    cloner: C,
    config: CloneConfig,
}

impl<C: Cloner> CloneExecutor<C> {
    pub fn new(cloner: C, config: CloneConfig) -> Self {
        Self { cloner, config }
    }

    pub fn cloner(&self) -> &C {
        &self.cloner
    }

    /// Local checkout path for `id`.
    pub fn destination(&self, id: &RepoId) -> PathBuf {
        self.config.directory.join(id.owner()).join(id.name())
    }

    /// Attempt every selected repository, in selection order.
    ///
    /// Only failing to create the target directory is fatal; every
    /// per-repository failure becomes a failed [`CloneOutcome`].
    #[instrument(skip_all, fields(dir = %self.config.directory.display(), count = selection.len()))]
    pub async fn execute(
        &self,
        selection: &SelectionResult,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<CloneOutcome>> {
        let dir = &self.config.directory;
        std::fs::create_dir_all(dir).map_err(|e| HarvestError::io(dir, e))?;

        let total = selection.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, record) in selection.selected.iter().enumerate() {
            let dest = self.destination(&record.id);
            let status = self.clone_one(&record.clone_url, &dest).await;

            let outcome = CloneOutcome {
                id: record.id.clone(),
                clone_url: record.clone_url.clone(),
                status,
            };

            match &outcome.status {
                CloneStatus::Cloned { path } => {
                    info!(id = %outcome.id, path = %path.display(), "cloned");
                }
                CloneStatus::AlreadyPresent { path } => {
                    info!(id = %outcome.id, path = %path.display(), "already present, skipped");
                }
                CloneStatus::Failed { error } => {
                    warn!(id = %outcome.id, %error, "clone failed, continuing");
                }
            }

            progress.repo_cloned(&outcome, i + 1, total);
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(attempted = total, failed, "clone stage complete");

        Ok(outcomes)
    }

    async fn clone_one(&self, url: &str, dest: &Path) -> CloneStatus {
        if dest.exists() {
            return match self.config.on_existing {
                ExistingPolicy::Skip => CloneStatus::AlreadyPresent {
                    path: dest.to_path_buf(),
                },
                ExistingPolicy::Fail => CloneStatus::Failed {
                    error: CloneError::AlreadyExists(dest.to_path_buf()).to_string(),
                },
            };
        }

        if let Some(parent) = dest.parent() {
            if let Err(source) = std::fs::create_dir_all(parent) {
                let err = CloneError::Io {
                    path: parent.to_path_buf(),
                    source,
                };
                return CloneStatus::Failed {
                    error: err.to_string(),
                };
            }
        }

        debug!(url, dest = %dest.display(), "cloning");
        match self.cloner.clone_repo(url, dest).await {
            Ok(()) => CloneStatus::Cloned {
                path: dest.to_path_buf(),
            },
            Err(e) => CloneStatus::Failed {
                error: e.to_string(),
            },
        }
    }
}
