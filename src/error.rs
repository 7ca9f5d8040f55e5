//! Error types for target parsing, controller transport and the deployment pipeline.

use crate::controller::OperatingMode;
use crate::session::SessionState;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to parse the canonical `robtarget` text form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The text is not wrapped in `[...]`.
    #[error("target text is not enclosed in brackets")]
    Unbracketed,

    /// Brackets do not pair up, or text follows the final group.
    #[error("malformed target text: {0}")]
    Malformed(String),

    /// A target has exactly four bracketed groups.
    #[error("expected 4 bracketed groups, found {found}")]
    GroupCount { found: usize },

    #[error("group `{group}` expects {expected} fields, found {found}")]
    FieldCount {
        group: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("invalid number `{text}` in group `{group}`")]
    InvalidNumber { group: &'static str, text: String },
}

/// Error reported by a transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("controller unreachable: {0}")]
    Unreachable(String),

    #[error("request rejected by controller: {0}")]
    Rejected(String),

    /// Another client currently holds mastership.
    #[error("mastership is held by another client")]
    MastershipHeld,

    #[error("no such object on controller: {0}")]
    NotFound(String),

    #[error("controller call timed out")]
    Timeout,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Error type for every fallible operation of the crate.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The network scan returned no usable controller.
    #[error("no controller found on the network")]
    NoControllerFound,

    #[error("failed to connect to {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    #[error("logon as `{user}` rejected: {source}")]
    Auth {
        user: String,
        #[source]
        source: TransportError,
    },

    /// Mastership contention. Callers retry with backoff.
    #[error("mastership is held by another client")]
    LockUnavailable,

    /// Safety gate: remote execution requires automatic mode.
    #[error("controller is in {mode} mode, automatic mode is required for remote execution")]
    Mode { mode: OperatingMode },

    /// Safety gate: the data item is not a `robtarget`.
    #[error("`{module}:{name}` is declared as `{found}`, expected `robtarget`")]
    TypeMismatch {
        module: String,
        name: String,
        found: String,
    },

    #[error("program file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Copying a file to controller storage failed. Nothing was loaded.
    #[error("copying {file} to the controller failed: {source}")]
    Transfer {
        file: String,
        #[source]
        source: TransportError,
    },

    /// Files were transferred but the controller refused to load them.
    #[error("controller rejected loading {file}: {source}")]
    Load {
        file: String,
        #[source]
        source: TransportError,
    },

    /// Program loaded but the task could not be reset or started.
    #[error("task {task} failed to start: {source}")]
    Start {
        task: String,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("session is {actual:?}, operation requires {required:?}")]
    SessionState {
        required: SessionState,
        actual: SessionState,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T, E = ControllerError> = std::result::Result<T, E>;
