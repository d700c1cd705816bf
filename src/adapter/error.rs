//! Registration and deployment errors.

use thiserror::Error;

use crate::routing::{PredicateError, RoutingError};

/// Errors raised while registering routes or building a deployment.
///
/// All of these surface at startup or redeploy time, never per request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// A registration carried injection specifiers but no handler function.
    #[error("handler function cannot be null")]
    MissingHandler,

    #[error("invalid injection specifier {specifier:?}: {reason}")]
    InvalidSpecifier { specifier: String, reason: String },

    #[error("invalid alias name {0:?}")]
    InvalidAlias(String),

    /// Alias resolution revisited a name; the chain lists every step.
    #[error("alias cycle: {}", .0.join(" -> "))]
    AliasCycle(Vec<String>),

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error(transparent)]
    Predicate(#[from] PredicateError),

    #[error(transparent)]
    Routing(#[from] RoutingError),
}
