//! Error types.
//!
//! Bangtag processing is permissive: unknown verbs and malformed arguments are
//! never errors.  What remains here are failures of the surrounding system
//! (a collaborator refusing a write, an unreadable var file) which abort the
//! pass and propagate to whoever invoked it.

use std::path::PathBuf;

use thiserror::Error;

/// A failure reported by one of the host collaborators (see [`crate::host`]).
#[derive(Debug, Error)]
pub enum HostError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid target {0:?}")]
    InvalidTarget(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed variable file {}: {source}", path.display())]
    VarFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A failure evaluating an `eval` expression.  These never abort a pass; the
/// message is rendered into the post instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("modulo by zero")]
    ModuloByZero,
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("{name}: expected at least {min} argument(s)")]
    Arity { name: String, min: usize },
    #[error("cannot assign reserved variable '{0}'")]
    Reserved(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
