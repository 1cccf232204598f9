// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error type shared by every logtree operation.
//!
//! Failures fall into a small taxonomy:
//!
//! * [`LogError::InvalidArgument`]: a value has the wrong shape (an empty logger name,
//!   a malformed regex, level `0` where a concrete level is required).
//! * [`LogError::UnknownIdentifier`]: a value has the right shape but names something
//!   that is not registered (a level, a file mode, a keyword mapping, a color).
//! * [`LogError::Unimplemented`]: a capability was invoked on a sink that does not provide it.
//! * [`LogError::Resource`]: the underlying sink failed (permissions, missing directory,
//!   writing after close).
//!
//! Errors are returned to the caller of the logging entry point. Nothing in the crate
//! retries, and nothing turns an error into a log message about itself.

/// Errors produced by logtree.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// A parameter has an invalid shape.
    #[error("invalid {what}: {reason}")]
    InvalidArgument {
        /// Which parameter was rejected.
        what: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A well-formed value that is not present in the relevant registry.
    #[error("unknown {kind} '{value}'")]
    UnknownIdentifier {
        /// Registry that was consulted (e.g. "level", "file mode").
        kind: &'static str,
        /// The value that was looked up.
        value: String,
    },

    /// The operation is not provided by this sink.
    #[error("operation '{0}' is not implemented")]
    Unimplemented(&'static str),

    /// The sink failed.
    #[error("resource error: {0}")]
    Resource(#[from] std::io::Error),

    /// Configuration could not be parsed or has the wrong shape.
    #[error("configuration error: {0}")]
    Config(String),

    /// Structured export failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LogError {
    pub(crate) fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        LogError::InvalidArgument {
            what,
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown(kind: &'static str, value: impl ToString) -> Self {
        LogError::UnknownIdentifier {
            kind,
            value: value.to_string(),
        }
    }

    /// True for [`LogError::InvalidArgument`].
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, LogError::InvalidArgument { .. })
    }

    /// True for [`LogError::UnknownIdentifier`].
    pub fn is_unknown_identifier(&self) -> bool {
        matches!(self, LogError::UnknownIdentifier { .. })
    }
}

impl From<toml::de::Error> for LogError {
    fn from(err: toml::de::Error) -> Self {
        LogError::Config(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_value() {
        let err = LogError::unknown("level", 90);
        assert_eq!(err.to_string(), "unknown level '90'");
        assert!(err.is_unknown_identifier());
        assert!(!err.is_invalid_argument());
    }

    #[test]
    fn io_errors_become_resource_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: LogError = io.into();
        assert!(matches!(err, LogError::Resource(_)));
    }
}
