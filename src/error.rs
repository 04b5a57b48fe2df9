//! Error types for media-dl
//!
//! This module provides the error taxonomy for the library:
//! - Spawn failures of the external fetcher (fatal to one start attempt only)
//! - Controller state errors (rejected with no side effect)
//! - Job status transition errors
//! - Machine-readable error codes for presentation layers

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{JobId, Status};

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// A failed job is never reported through this type while it runs: the
/// controller turns fetcher exits into `StatusChanged` events instead. These
/// variants cover the synchronous outcomes of public operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetcher_path")
        key: Option<String>,
    },

    /// The fetcher executable could not be located or launched
    #[error("failed to spawn {program}: {reason}")]
    Spawn {
        /// The program that was being launched
        program: PathBuf,
        /// The underlying OS error text
        reason: String,
    },

    /// The fetcher exited with a non-zero code
    #[error("fetcher exited with code {code}")]
    ProcessExit {
        /// Native exit code (-1 when terminated by a signal)
        code: i32,
    },

    /// Operation not allowed in the controller's current state
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// The operation that was attempted (e.g., "pause", "start")
        operation: String,
        /// The controller state that prevents it (e.g., "idle", "running")
        state: String,
    },

    /// Job status transition not allowed by the transition table
    #[error("job {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// The job whose status was being changed
        id: JobId,
        /// Current status
        from: Status,
        /// Requested status
        to: Status,
    },

    /// Job specification rejected at enqueue time
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// Job not found in the queue
    #[error("job {0} not found")]
    NotFound(JobId),

    /// External tool execution failed (metadata probes, format listing)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Machine-readable error code
    ///
    /// Stable identifiers a presentation layer can match on without parsing
    /// the display text.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Spawn { .. } => "spawn_failed",
            Error::ProcessExit { .. } => "process_exit",
            Error::InvalidState { .. } => "invalid_state",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::InvalidJob(_) => "invalid_job",
            Error::NotFound(_) => "not_found",
            Error::ExternalTool(_) => "external_tool_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the operation that produced this error left all state untouched
    ///
    /// State and validation errors are rejected up front; retrying after
    /// fixing the cause is always safe.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidState { .. }
                | Error::InvalidTransition { .. }
                | Error::InvalidJob(_)
                | Error::NotFound(_)
                | Error::Spawn { .. }
        )
    }

    pub(crate) fn invalid_state(operation: &str, state: impl std::fmt::Display) -> Self {
        Error::InvalidState {
            operation: operation.to_string(),
            state: state.to_string(),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "fetcher missing".into(),
                    key: Some("fetcher_path".into()),
                },
                "config_error",
            ),
            (
                Error::Spawn {
                    program: PathBuf::from("/usr/bin/yt-dlp"),
                    reason: "No such file or directory".into(),
                },
                "spawn_failed",
            ),
            (Error::ProcessExit { code: 2 }, "process_exit"),
            (
                Error::InvalidState {
                    operation: "pause".into(),
                    state: "idle".into(),
                },
                "invalid_state",
            ),
            (
                Error::InvalidTransition {
                    id: JobId::new(3),
                    from: Status::Completed,
                    to: Status::Downloading,
                },
                "invalid_transition",
            ),
            (Error::InvalidJob("empty url".into()), "invalid_job"),
            (Error::NotFound(JobId::new(9)), "not_found"),
            (
                Error::ExternalTool("dump-json failed".into()),
                "external_tool_error",
            ),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                "io_error",
            ),
        ]
    }

    #[test]
    fn every_variant_has_expected_error_code() {
        for (error, expected) in all_error_variants() {
            assert_eq!(
                error.error_code(),
                expected,
                "wrong error code for {error:?}"
            );
        }
    }

    #[test]
    fn spawn_error_display_names_program_and_reason() {
        let err = Error::Spawn {
            program: PathBuf::from("/opt/yt-dlp"),
            reason: "permission denied".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/opt/yt-dlp"), "got: {msg}");
        assert!(msg.contains("permission denied"), "got: {msg}");
    }

    #[test]
    fn process_exit_display_includes_native_code() {
        assert_eq!(
            Error::ProcessExit { code: 137 }.to_string(),
            "fetcher exited with code 137"
        );
    }

    #[test]
    fn invalid_state_helper_formats_operation_and_state() {
        let err = Error::invalid_state("resume", "idle");
        assert_eq!(err.to_string(), "cannot resume while idle");
        assert!(err.is_rejection());
    }

    #[test]
    fn io_and_serialization_errors_are_not_rejections() {
        let io = Error::Io(std::io::Error::other("disk"));
        assert!(!io.is_rejection());

        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!Error::from(serde_err).is_rejection());
    }

    #[test]
    fn io_error_converts_via_from() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.error_code(), "io_error");
    }
}
