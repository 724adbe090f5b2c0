//! External command execution.
//!
//! Every step of the bootstrap that leaves the process goes through a
//! [`CommandRunner`], so the sequencing can be exercised without git or a
//! network.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute (looked up on `PATH` when not a path).
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory; inherits the current one when `None`.
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    /// Creates a command with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Appends a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Builds a command from a whitespace-separated command line.
    ///
    /// Returns `None` for an empty line. No quoting is interpreted.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).args(parts))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Trait for executing external commands.
pub trait CommandRunner {
    /// Runs the command to completion.
    ///
    /// Returns an error if the command cannot be started or exits unsuccessfully.
    fn run(&self, command: &CommandSpec) -> Result<()>;
}

/// Runs commands as child processes with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Creates a new system runner.
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandSpec) -> Result<()> {
        tracing::info!(cwd = ?command.cwd, "Running: {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        let status = cmd.status().map_err(|e| Error::Command {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

        if !status.success() {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                code: status.code(),
            });
        }

        Ok(())
    }
}
