//! Error types for the E2E bootstrap.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for bootstrap operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The environment or layout configuration is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// No clone was requested and no pre-existing checkout was found.
    #[error("no code found at {}", .0.display())]
    MissingCode(PathBuf),

    /// An external command could not be started.
    #[error("failed to run `{command}`: {reason}")]
    Command { command: String, reason: String },

    /// An external command ran but exited unsuccessfully.
    #[error("command `{command}` failed with {}", describe_code(.code))]
    CommandFailed { command: String, code: Option<i32> },

    /// IO error during filesystem operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The layout override file could not be parsed.
    #[error("invalid layout file: {0}")]
    InvalidLayout(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl Error {
    /// Process exit code to surface for this error.
    ///
    /// A failing child's own exit code is passed through so that CI sees the
    /// same status the delegate reported.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::CommandFailed {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}

/// Result type alias for bootstrap operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failure_passes_exit_code_through() {
        let err = Error::CommandFailed {
            command: "glide install".to_string(),
            code: Some(3),
        };
        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            err.to_string(),
            "command `glide install` failed with exit code 3"
        );
    }

    #[test]
    fn signal_termination_maps_to_generic_failure() {
        let err = Error::CommandFailed {
            command: "git clone".to_string(),
            code: None,
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn missing_code_names_the_path() {
        let err = Error::MissingCode(PathBuf::from("/go/src/github.com/jlewi/mlkube.io"));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "no code found at /go/src/github.com/jlewi/mlkube.io"
        );
    }
}
