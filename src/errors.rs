//! # Binding Errors
//!
//! Error taxonomy for the binding layer.
//!
//! Resolution-time categories (missing, invalid, invalid validator config)
//! are aggregated per key and never short-circuit a resolution pass; the
//! top-level failure policy decides what the aggregate becomes. Read- and
//! write-time errors (`AccessError`) are raised at the point of offense.

use serde::Serialize;
use thiserror::Error;

/// A single structured complaint from a leaf validator.
///
/// `path` addresses a location inside the raw value ("" for the value
/// itself); `message` is human-readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Location inside the raw value; empty for the value as a whole.
    pub path: String,
    /// Human-readable description of the complaint.
    pub message: String,
}

impl Issue {
    /// Create an issue at an explicit path.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an issue addressing the value as a whole.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new("", message)
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Resolution failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No raw value and no applicable default.
    Missing,
    /// Value present but rejected by the leaf validator.
    Invalid,
    /// Spec entry is not a recognized validator.
    InvalidConfig,
}

impl FailureKind {
    /// Stable string form used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Missing => "missing",
            FailureKind::Invalid => "invalid",
            FailureKind::InvalidConfig => "invalid_config",
        }
    }
}

/// One per-key resolution failure.
///
/// Failures are collected in spec declaration order; a single top-level
/// error reports everything at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// The spec key that failed.
    pub key: String,
    /// Failure category.
    pub kind: FailureKind,
    /// Structured complaints from the leaf validator, if any.
    pub issues: Vec<Issue>,
}

impl Failure {
    /// A missing-variable failure (no raw value, no applicable default).
    pub fn missing(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: FailureKind::Missing,
            issues: Vec::new(),
        }
    }

    /// An invalid-value failure carrying the leaf validator's complaints.
    pub fn invalid(key: impl Into<String>, issues: Vec<Issue>) -> Self {
        Self {
            key: key.into(),
            kind: FailureKind::Invalid,
            issues,
        }
    }

    /// A spec entry that is not a recognized validator.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: FailureKind::InvalidConfig,
            issues: vec![Issue::root(message)],
        }
    }

    /// One-line summary used by the default report.
    pub fn summary(&self) -> String {
        if self.issues.is_empty() {
            match self.kind {
                FailureKind::Missing => "required but not set".to_string(),
                _ => self.kind.as_str().to_string(),
            }
        } else {
            self.issues
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: [{}] {}", self.key, self.kind.as_str(), self.summary())
    }
}

/// Top-level binding error.
#[derive(Debug, Clone, Error)]
pub enum BindError {
    /// One or more spec keys failed to resolve. Carries every failure.
    #[error("environment validation failed for {} variable(s)", .0.len())]
    Validation(Vec<Failure>),
}

impl BindError {
    /// The aggregated per-key failures, in declaration order.
    pub fn failures(&self) -> &[Failure] {
        match self {
            BindError::Validation(failures) => failures,
        }
    }
}

/// Result type for reads and writes on a bound environment.
pub type AccessResult<T> = Result<T, AccessError>;

/// Read- and write-time errors on a bound environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Write or redefinition attempt on the read-only binding.
    /// Always fatal at the point of offense; there is no policy knob.
    #[error("environment binding is read-only: cannot assign '{key}'")]
    MutationRejected {
        /// The key named by the write attempt.
        key: String,
    },

    /// Front-end read of a key that is not exposed, under the throw policy.
    #[error("'{key}' is not exposed to the front-end")]
    ClientAccessViolation {
        /// The key that was read.
        key: String,
    },

    /// Strict-mode read of a key the spec never declared.
    #[error("no environment variable named '{key}' was declared")]
    VariableNotFound {
        /// The key that was read.
        key: String,
    },
}

impl AccessError {
    /// The key the error names.
    pub fn key(&self) -> &str {
        match self {
            AccessError::MutationRejected { key }
            | AccessError::ClientAccessViolation { key }
            | AccessError::VariableNotFound { key } => key,
        }
    }
}
