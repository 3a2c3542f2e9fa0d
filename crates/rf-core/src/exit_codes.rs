//! Exit codes for the rf-core CLI.
//!
//! Exit codes communicate the outcome of a run without requiring output
//! parsing. They are stable: orchestration gates model training on them.

/// Exit codes for rf-core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Run completed
    Clean = 0,

    /// Configuration error
    ConfigError = 10,

    /// Snapshot/input error
    InputError = 11,

    /// Runner identity could not be reconciled unambiguously
    IdentityAmbiguity = 12,

    /// I/O error
    IoError = 13,

    /// A forbidden column survived leakage removal
    LeakageViolation = 14,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Map a unified error onto its exit code.
    pub fn for_error(err: &rf_common::Error) -> Self {
        use rf_common::Error;
        match err {
            Error::Config(_) | Error::InvalidCheckpointTable(_) | Error::SchemaValidation(_) => {
                ExitCode::ConfigError
            }
            Error::InvalidManifest(_) => ExitCode::ConfigError,
            Error::Snapshot(_) | Error::RaceNotFound { .. } | Error::MissingColumn { .. } => {
                ExitCode::InputError
            }
            Error::DuplicateIdentityMatch { .. } | Error::DuplicateTelemetryRow { .. } => {
                ExitCode::IdentityAmbiguity
            }
            Error::LeakageManifestViolation { .. } => ExitCode::LeakageViolation,
            Error::Io(_) | Error::Json(_) => ExitCode::IoError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
