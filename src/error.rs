//! Error types.

use thiserror::Error;

/// Invalid cover configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A travel time is not a positive, representable number of seconds.
    #[error("{field} must be a positive number of seconds, got {value}")]
    InvalidDuration {
        /// Offending field name.
        field: &'static str,
        /// Value as configured.
        value: f64,
    },
    /// A required switch id is blank.
    #[error("{0} must not be empty")]
    MissingSwitch(&'static str),
    /// Configuration text could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
}

/// Failure of a cover command.
#[derive(Debug, Error)]
pub enum CoverError {
    /// An external action failed; effects already executed are not rolled back.
    #[error("action {namespace}.{action} failed: {source}")]
    Action {
        /// Namespace of the failed action.
        namespace: String,
        /// Name of the failed action.
        action: String,
        /// Error reported by the invoker.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The cover task is no longer running.
    #[error("cover task has shut down")]
    Closed,
    /// An options update was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CoverError {
    /// Wrap an invoker error for the action `namespace.action`.
    pub fn action<E>(namespace: &str, action: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CoverError::Action {
            namespace: namespace.to_string(),
            action: action.to_string(),
            source: Box::new(source),
        }
    }
}
