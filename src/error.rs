use std::path::PathBuf;
use thiserror::Error;

/// Broad category of an [`SgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or conflicting options, raised when the option is given.
    Configuration,
    /// The script is not in a state that allows the operation.
    State,
    /// The process is running somewhere the operation is not allowed.
    Environment,
    /// The accounting report could not be understood.
    Parse,
    /// A failed task has no matching line in the commands file.
    OutOfRange,
    /// Reading, writing or spawning failed.
    Io,
}

#[derive(Error, Debug)]
pub enum SgeError {
    #[error(
        "no argument given for 'user' and not running on the cluster, unable to detect the username"
    )]
    MissingUser,
    #[error("no argument given for 'user' and $USER is not set on the cluster")]
    UserNotDetected,
    #[error("cannot use both 'hold_jid' and 'hold_jid_ad'")]
    ConflictingDependency,
    #[error("script already depends on {0}")]
    DependencyAlreadySet(String),
    #[error("script is already an array job over {0}")]
    TasksAlreadySet(String),
    #[error("{option} must be a single line, got {value:?}")]
    MultilineValue { option: &'static str, value: String },
    #[error("'tasks' has to be either a range string, a task count or a pair of integers: {0}")]
    InvalidTaskRange(String),
    #[error("cannot use `{0}` without setting `tasks`")]
    NotAnArrayJob(&'static str),
    #[error("need to save script before submitting")]
    NotSaved,
    #[error("cannot submit job, not on a login node")]
    NotOnLoginNode,
    #[error("failed to parse accounting report: {0}")]
    Parse(String),
    #[error("failed task {task} is out of range, only {count} commands available")]
    TaskOutOfRange { task: u32, count: usize },
    #[error("failed to execute {command}: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SgeError::MissingUser
            | SgeError::UserNotDetected
            | SgeError::ConflictingDependency
            | SgeError::TasksAlreadySet(_)
            | SgeError::MultilineValue { .. }
            | SgeError::DependencyAlreadySet(_)
            | SgeError::InvalidTaskRange(_) => ErrorKind::Configuration,
            SgeError::NotAnArrayJob(_) | SgeError::NotSaved => ErrorKind::State,
            SgeError::NotOnLoginNode => ErrorKind::Environment,
            SgeError::Parse(_) => ErrorKind::Parse,
            SgeError::TaskOutOfRange { .. } => ErrorKind::OutOfRange,
            SgeError::Command { .. } | SgeError::CommandFailed { .. } | SgeError::Io { .. } => {
                ErrorKind::Io
            }
        }
    }

    /// Reject values that would spill onto a line of their own in the script.
    pub(crate) fn check_single_line(option: &'static str, value: &str) -> Result<(), SgeError> {
        if value.contains(['\n', '\r']) {
            return Err(SgeError::MultilineValue {
                option,
                value: value.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> SgeError {
        SgeError::Io {
            path: path.into(),
            source,
        }
    }
}
