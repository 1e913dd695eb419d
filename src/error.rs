//! Error taxonomy, exit codes and structured error output.
//!
//! Every component has its own `thiserror` enum; each exposes `kind()` so
//! callers can react by category without matching every variant.

use serde::Serialize;
use std::fmt;

/// Category of a failure, shared by all component errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Bad user input (empty name, invalid range). No state changed.
    Validation,
    /// A rename, delete or symlink failed on disk.
    Filesystem,
    /// The external database could not be re-keyed or persisted after a
    /// successful physical operation. In-memory paths still match disk.
    DatabaseSync,
    /// An artifact could not be read, parsed or written.
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Filesystem => "filesystem",
            Self::DatabaseSync => "database-sync",
            Self::Serialization => "serialization",
        };
        f.write_str(name)
    }
}

/// Exit codes for the dupekeep binary.
///
/// - 0: Success
/// - 1: General error (unexpected failure)
/// - 3: Partial success (some items failed or the database lagged behind)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the command completed.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// Partial success: completed with per-item failures or sync warnings.
    PartialSuccess = 3,
    /// Interrupted: batch was stopped by the user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DK000",
            Self::GeneralError => "DK001",
            Self::PartialSuccess => "DK003",
            Self::Interrupted => "DK130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DK001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message including the context chain
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
