/// Structured error types for orgctl-core.
///
/// Uses `thiserror` for better API surface and error composition.
/// The binary crate (orgctl-cli) can still use `anyhow` for convenience,
/// but library consumers get structured, composable errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for orgctl-core operations
#[derive(Error, Debug)]
pub enum OrgError {
    /// The wrapped platform CLI exited non-zero, failed to spawn, or
    /// exceeded the captured-output limit. The message carries the
    /// captured stderr if non-empty, otherwise stdout.
    #[error("{message}")]
    ExternalCommand { message: String },

    /// A status-polling loop exhausted its attempt budget
    #[error("gave up polling after {attempts} attempts ({waited_ms} ms)")]
    PollTimeout { attempts: u32, waited_ms: u64 },

    /// Bad flag combination or malformed input metadata
    #[error("{reason}")]
    Validation { reason: String },

    /// Referenced input files that do not exist
    #[error("Cannot find file/s [ {} ]", paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    MissingFiles { paths: Vec<PathBuf> },

    /// REST call rejected by the org
    #[error("REST request failed ({status}): {body}")]
    Rest { status: u16, body: String },

    /// HTTP transport failure
    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// The wrapped CLI emitted output that does not match its documented shape
    #[error("Unexpected output from {context}")]
    UnexpectedOutput { context: String },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for orgctl-core operations
pub type Result<T> = std::result::Result<T, OrgError>;

impl OrgError {
    /// Create an external-command error
    pub fn external_command(message: impl Into<String>) -> Self {
        Self::ExternalCommand {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Create a missing-files error
    pub fn missing_files(paths: Vec<PathBuf>) -> Self {
        Self::MissingFiles { paths }
    }

    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create an unexpected-output error
    pub fn unexpected_output(context: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            context: context.into(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrgError::external_command("Package install failed");
        assert_eq!(err.to_string(), "Package install failed");

        let err = OrgError::PollTimeout {
            attempts: 5,
            waited_ms: 5000,
        };
        assert!(err.to_string().contains("5 attempts"));

        let err = OrgError::missing_files(vec![
            PathBuf::from("data/Accounts.json"),
            PathBuf::from("data/Contacts.json"),
        ]);
        assert_eq!(
            err.to_string(),
            "Cannot find file/s [ data/Accounts.json, data/Contacts.json ]"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let org_err: OrgError = io_err.into();

        assert!(matches!(org_err, OrgError::Io { .. }));
    }
}
