//! # Execution-Context Detection
//!
//! Derives the execution context (backend vs. front-end) and the execution
//! mode (development / test / production) the binding layer operates under,
//! and supplies the context-derived default policies.
//!
//! ## Invariants
//! - Queries are pure and uncached: every call re-derives its answer so a
//!   test harness can substitute behavior between reads.
//! - The mode variable is compared literally against the three known
//!   strings; an unrecognized value makes every mode predicate false.
//! - Mode defaults to production when the variable is absent or when running
//!   in the front-end context.
//!
//! Detection is modeled as an injected capability (`ContextProvider`) rather
//! than ambient global reads. `ProcessContext` is the production provider;
//! `StaticContext` pins both answers for tests and front-end harnesses.

use crate::bootstrap;

/// Conventional name of the mode variable in the backend source.
pub const MODE_VAR: &str = "APP_ENV";

/// Where the binding layer is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Privileged context with full raw-source access.
    Backend,
    /// Unprivileged context; access is exposure-gated.
    Frontend,
}

impl ExecutionContext {
    pub fn is_backend(&self) -> bool {
        matches!(self, ExecutionContext::Backend)
    }

    pub fn is_frontend(&self) -> bool {
        matches!(self, ExecutionContext::Frontend)
    }
}

/// The declared execution mode.
///
/// Only the three known strings are recognized; anything else is carried
/// verbatim in `Other` and answers false to every predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    Development,
    Test,
    Production,
    /// An unrecognized mode string, e.g. "staging".
    Other(String),
}

impl ExecutionMode {
    /// Parse a raw mode string. Absent means production.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None => ExecutionMode::Production,
            Some("development") => ExecutionMode::Development,
            Some("test") => ExecutionMode::Test,
            Some("production") => ExecutionMode::Production,
            Some(other) => ExecutionMode::Other(other.to_string()),
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, ExecutionMode::Development)
    }

    pub fn is_test(&self) -> bool {
        matches!(self, ExecutionMode::Test)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, ExecutionMode::Production)
    }

    /// The literal mode string.
    pub fn as_str(&self) -> &str {
        match self {
            ExecutionMode::Development => "development",
            ExecutionMode::Test => "test",
            ExecutionMode::Production => "production",
            ExecutionMode::Other(raw) => raw,
        }
    }
}

/// What to do when resolution reports failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Raise a composite error carrying the full failure list.
    Throw,
    /// Print the report and terminate with non-zero status (backend only;
    /// degrades to `Throw` on the front-end).
    Exit,
    /// Report, then hand back a partial result with failed keys absent.
    Return,
}

/// What to do when front-end code reads a non-exposed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessViolationPolicy {
    /// Raise an access error.
    Throw,
    /// Log a warning in development, then yield no value.
    Warn,
    /// Silently yield no value.
    Ignore,
}

/// Default failure policy for a context: terminate a misconfigured backend
/// process, raise in the front-end where exiting is not an option.
pub fn default_failure_policy(context: ExecutionContext) -> FailurePolicy {
    match context {
        ExecutionContext::Backend => FailurePolicy::Exit,
        ExecutionContext::Frontend => FailurePolicy::Throw,
    }
}

/// Default client-access-violation policy for a mode: warn during
/// development, stay silent everywhere else.
pub fn default_access_violation_policy(mode: &ExecutionMode) -> AccessViolationPolicy {
    if mode.is_development() {
        AccessViolationPolicy::Warn
    } else {
        AccessViolationPolicy::Ignore
    }
}

/// Injected context capability.
///
/// Both queries are re-evaluated on every call; implementations must not
/// cache, because mode and context are process-wide state that can change
/// between construction and read in long-lived processes.
pub trait ContextProvider: Send + Sync {
    /// The current execution context.
    fn context(&self) -> ExecutionContext;

    /// The current execution mode.
    fn mode(&self) -> ExecutionMode;
}

/// Production provider reading ambient process state.
///
/// The context is front-end when the injected bootstrap snapshot (the
/// front-end global) is present, backend otherwise. The mode comes from
/// [`MODE_VAR`] in the backend process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessContext;

impl ContextProvider for ProcessContext {
    fn context(&self) -> ExecutionContext {
        if bootstrap::is_injected() {
            ExecutionContext::Frontend
        } else {
            ExecutionContext::Backend
        }
    }

    fn mode(&self) -> ExecutionMode {
        match self.context() {
            ExecutionContext::Frontend => ExecutionMode::Production,
            ExecutionContext::Backend => {
                ExecutionMode::from_raw(std::env::var(MODE_VAR).ok().as_deref())
            }
        }
    }
}

/// Fixed provider for tests and front-end harnesses.
#[derive(Debug, Clone)]
pub struct StaticContext {
    context: ExecutionContext,
    mode: ExecutionMode,
}

impl StaticContext {
    pub fn new(context: ExecutionContext, mode: ExecutionMode) -> Self {
        Self { context, mode }
    }

    /// A pinned backend provider.
    pub fn backend(mode: ExecutionMode) -> Self {
        Self::new(ExecutionContext::Backend, mode)
    }

    /// A pinned front-end provider.
    pub fn frontend(mode: ExecutionMode) -> Self {
        Self::new(ExecutionContext::Frontend, mode)
    }
}

impl ContextProvider for StaticContext {
    fn context(&self) -> ExecutionContext {
        self.context
    }

    fn mode(&self) -> ExecutionMode {
        self.mode.clone()
    }
}
