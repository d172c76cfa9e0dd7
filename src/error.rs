use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Top-level error type for git-fat operations.
///
/// Mirrors the error kinds the filter and maintenance commands can raise, so
/// that `main` has a single place to turn a failure into an exit code and a
/// message instead of every call site formatting its own.
#[derive(Debug)]
pub enum GitFatError {
    /// git-fat has not been configured in this repository (`filter.fat.*` unset).
    NotInitialized,
    /// A byte string that was expected to be a placeholder did not decode as one.
    NotAPlaceholder(String),
    /// The object store does not have the blob a smudge needed.
    MissingBlob(String),
    /// A required configuration key was absent.
    MissingConfig(String),
    /// A spawned child process exited non-zero.
    ChildProcessFailure { command: String, status: i32 },
    /// `verify` found a digest whose recomputed hash does not match its name.
    CorruptBlob { expected: String, actual: String },
    /// Any other I/O failure.
    Io(io::Error),
}

impl fmt::Display for GitFatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitFatError::NotInitialized => write!(
                f,
                "git-fat is not yet configured in this repository.\nRun \"git fat init\" to configure."
            ),
            GitFatError::NotAPlaceholder(s) => write!(f, "could not decode {:?} as a git-fat placeholder", s),
            GitFatError::MissingBlob(digest) => write!(f, "fat object missing: {}", digest),
            GitFatError::MissingConfig(key) => write!(f, "missing required configuration: {}", key),
            GitFatError::ChildProcessFailure { command, status } => {
                write!(f, "'{}' failed with status {}", command, status)
            }
            GitFatError::CorruptBlob { expected, actual } => {
                write!(f, "{} data hash is {}", expected, actual)
            }
            GitFatError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for GitFatError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            GitFatError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for GitFatError {
    fn from(err: io::Error) -> Self {
        GitFatError::Io(err)
    }
}

impl From<GitFatError> for io::Error {
    fn from(err: GitFatError) -> Self {
        match err {
            GitFatError::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}

/// Convenience result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, GitFatError>;
