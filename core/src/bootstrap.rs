//! Source checkout and hand-off to the E2E runner.
//!
//! An E2E run consists of:
//!
//! 1. Getting the code. When `REPO_OWNER` and `REPO_NAME` are unset the code
//!    must already be mounted at the layout destination, which is how a run
//!    against local changes works. Otherwise the repository is cloned and
//!    checked out at the revision under test.
//! 2. Invoking the runner from the checkout with `--src_dir` and `--sha`.

use std::path::PathBuf;

use crate::command::{CommandRunner, CommandSpec};
use crate::config::{BootstrapConfig, CheckoutSource};
use crate::error::{Error, Result};
use crate::started::Started;

/// The resolved source tree handed to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCheckout {
    /// Absolute path to the source tree.
    pub source_dir: PathBuf,
    /// Commit checked out; empty when none was resolved.
    pub revision: String,
}

/// Returns the HTTPS clone URL for a GitHub repository.
pub fn clone_url(owner: &str, name: &str) -> String {
    format!("https://github.com/{}/{}.git", owner, name)
}

/// Picks the revision under test.
///
/// Presubmits set the pull request head, postsubmits only the base.
pub fn resolve_revision(pull_sha: Option<&str>, base_sha: Option<&str>) -> Option<String> {
    pull_sha
        .filter(|sha| !sha.is_empty())
        .or(base_sha.filter(|sha| !sha.is_empty()))
        .map(str::to_string)
}

/// Drives the checkout and runner invocation.
pub struct Bootstrap<R> {
    config: BootstrapConfig,
    runner: R,
}

impl<R: CommandRunner> Bootstrap<R> {
    /// Creates a bootstrap for `config`, executing commands through `runner`.
    pub fn new(config: BootstrapConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Returns the command runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Prepares the source tree and runs the E2E runner against it.
    pub fn run(&self) -> Result<SourceCheckout> {
        let checkout = self.prepare_source()?;
        self.write_started(&checkout)?;
        self.run_delegate(&checkout)?;
        Ok(checkout)
    }

    /// Produces the source directory and revision, cloning if requested.
    pub fn prepare_source(&self) -> Result<SourceCheckout> {
        let dest = self.config.destination();

        match &self.config.source {
            CheckoutSource::PreCloned => {
                tracing::info!(
                    "Environment variables REPO_OWNER and REPO_NAME not set; not checking out code."
                );
                if !dest.exists() {
                    return Err(Error::MissingCode(dest));
                }
                Ok(SourceCheckout {
                    source_dir: dest,
                    revision: String::new(),
                })
            }
            CheckoutSource::CloneRequest { owner, name } => self.clone_source(owner, name, dest),
        }
    }

    fn clone_source(&self, owner: &str, name: &str, dest: PathBuf) -> Result<SourceCheckout> {
        let layout = &self.config.layout;
        let repo = clone_url(owner, name);
        tracing::info!(repo = %repo, dest = ?dest, "cloning repository");

        std::fs::create_dir_all(layout.parent_dir(&self.config.base_path))?;

        self.runner.run(
            &CommandSpec::new("git")
                .arg("clone")
                .arg(repo)
                .arg(dest.to_string_lossy()),
        )?;

        let revision = resolve_revision(
            self.config.pull_sha.as_deref(),
            self.config.base_sha.as_deref(),
        );

        match &revision {
            Some(sha) => {
                self.runner.run(
                    &CommandSpec::new("git")
                        .args(["checkout", sha.as_str()])
                        .current_dir(&dest),
                )?;
            }
            None => {
                tracing::warn!("no revision set; using the default branch as cloned");
            }
        }

        let install = CommandSpec::from_command_line(&layout.install_command)
            .ok_or_else(|| Error::Config("install_command cannot be empty".to_string()))?
            .current_dir(&dest);
        self.runner.run(&install)?;

        // Nested vendored copies of apimachinery clash with the top-level ones
        let prune = dest.join(&layout.prune_path);
        tracing::info!(path = ?prune, "removing nested vendor directory");
        std::fs::remove_dir_all(&prune)?;

        Ok(SourceCheckout {
            source_dir: dest,
            revision: revision.unwrap_or_default(),
        })
    }

    /// Builds the runner invocation for `checkout`.
    pub fn delegate_command(&self, checkout: &SourceCheckout) -> CommandSpec {
        let layout = &self.config.layout;
        let script = checkout.source_dir.join(&layout.runner_script);
        CommandSpec::new(layout.runner_program.as_str())
            .arg(script.to_string_lossy())
            .arg(format!("--src_dir={}", checkout.source_dir.display()))
            .arg(format!("--sha={}", checkout.revision))
    }

    /// Launches the runner against `checkout` and waits for it.
    pub fn run_delegate(&self, checkout: &SourceCheckout) -> Result<()> {
        self.runner.run(&self.delegate_command(checkout))
    }

    fn write_started(&self, checkout: &SourceCheckout) -> Result<()> {
        let Some(dir) = &self.config.artifacts_dir else {
            return Ok(());
        };
        let layout = &self.config.layout;
        let started = Started::new(
            format!("{}/{}", layout.owner, layout.name),
            checkout.revision.as_str(),
            self.config.pull_refs.as_deref(),
        );
        let path = started.write_to(dir)?;
        tracing::info!(path = ?path, "recorded run start");
        Ok(())
    }
}
