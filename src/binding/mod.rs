//! # Access-Controlled Binding
//!
//! The read-only result handed to application code, plus the `bind` entry
//! point that ties resolution, reporting and the failure policy together.
//!
//! ## Invariants
//! - Exposure, mode and the violation policy are re-evaluated at every
//!   read, never cached: context and mode are process-wide state that can
//!   change between construction and read.
//! - Hiding happens per read, never by deletion; the backend-resolved key
//!   set is what enumeration returns in every context.
//! - Writes and redefinitions always fail naming the key; delete requests
//!   are accepted as no-ops for compatibility with generic probing code.

use std::io::Write;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::context::{
    default_access_violation_policy, default_failure_policy, AccessViolationPolicy,
    ContextProvider, ExecutionContext, ExecutionMode, FailurePolicy,
};
use crate::errors::{AccessError, AccessResult, BindError};
use crate::metadata::Tristate;
use crate::report::{FailureReporter, StderrReporter};
use crate::resolver::{self, Options, ResolutionResult, Spec};

/// The five mode-derived flag names readable through dynamic `get` but
/// excluded from enumeration.
pub const DERIVED_FLAGS: [&str; 5] = ["isDevelopment", "isDev", "isProduction", "isProd", "isTest"];

/// Read-only, access-controlled view over one resolution result.
pub struct BoundEnv {
    result: ResolutionResult,
    provider: Arc<dyn ContextProvider>,
    client_safe_prefixes: Vec<String>,
    strict: bool,
    on_client_access_error: Option<AccessViolationPolicy>,
}

/// Bind a spec against the effective source and return the
/// access-controlled result.
///
/// On failure the configured reporter always runs, then exactly one policy
/// executes: `Throw` raises a composite error carrying every failure,
/// `Exit` terminates the backend process with non-zero status (degrading to
/// `Throw` on the front-end), `Return` hands back a partial binding whose
/// failed keys are simply absent.
pub fn bind(spec: &Spec, options: Options) -> Result<BoundEnv, BindError> {
    let context = options.provider.context();
    let source = resolver::effective_source(&options, context);
    let result = resolver::resolve_with_source(spec, &options, context, &source);

    if !result.is_ok() {
        match &options.reporter {
            Some(reporter) => reporter.report(result.failures(), &source),
            None => StderrReporter.report(result.failures(), &source),
        }

        match options.on_error.unwrap_or(default_failure_policy(context)) {
            FailurePolicy::Throw => {
                return Err(BindError::Validation(result.failures().to_vec()));
            }
            FailurePolicy::Exit => {
                if context.is_backend() {
                    // The report above must reach the terminal before the
                    // process dies.
                    let _ = std::io::stderr().flush();
                    std::process::exit(1);
                }
                return Err(BindError::Validation(result.failures().to_vec()));
            }
            FailurePolicy::Return => {}
        }
    }

    Ok(BoundEnv {
        result,
        provider: options.provider,
        client_safe_prefixes: options.client_safe_prefixes,
        strict: options.strict,
        on_client_access_error: options.on_client_access_error,
    })
}

impl BoundEnv {
    /// Read a value by name under the current context's access rules.
    ///
    /// `Ok(None)` means the key resolved to no value, or was withheld under
    /// a non-throwing violation policy; the error cases are a strict-mode
    /// read of an undeclared key and a violation under the throw policy.
    pub fn get(&self, name: &str) -> AccessResult<Option<Value>> {
        let context = self.provider.context();

        if let Some(value) = self.result.value(name) {
            return match context {
                ExecutionContext::Backend => Ok(Some(value.clone())),
                ExecutionContext::Frontend => self.frontend_read(name, value),
            };
        }

        // Hidden keys were never validated; reading one on the front-end is
        // an exposure question, not a missing-key question.
        if self.result.is_hidden(name) {
            return self.violation(name);
        }

        if DERIVED_FLAGS.contains(&name) {
            return Ok(Some(Value::Bool(self.flag(name))));
        }

        if self.strict {
            Err(AccessError::VariableNotFound {
                key: name.to_string(),
            })
        } else {
            Ok(None)
        }
    }

    /// Must-exist read: like [`get`](Self::get) but absence is an error
    /// even when the binding is not strict.
    pub fn require(&self, name: &str) -> AccessResult<Value> {
        self.get(name)?.ok_or_else(|| AccessError::VariableNotFound {
            key: name.to_string(),
        })
    }

    /// String view of a resolved value.
    pub fn get_string(&self, name: &str) -> AccessResult<Option<String>> {
        Ok(self.get(name)?.and_then(|v| match v {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }))
    }

    pub fn get_i64(&self, name: &str) -> AccessResult<Option<i64>> {
        Ok(self.get(name)?.and_then(|v| v.as_i64()))
    }

    pub fn get_f64(&self, name: &str) -> AccessResult<Option<f64>> {
        Ok(self.get(name)?.and_then(|v| v.as_f64()))
    }

    pub fn get_bool(&self, name: &str) -> AccessResult<Option<bool>> {
        Ok(self.get(name)?.and_then(|v| v.as_bool()))
    }

    /// Writes and redefinitions always fail, naming the key.
    pub fn set(&self, key: &str, _value: Value) -> AccessResult<()> {
        Err(AccessError::MutationRejected {
            key: key.to_string(),
        })
    }

    /// Delete requests are accepted and ignored; nothing is removed.
    pub fn remove(&self, _key: &str) {}

    /// The backend-resolved key set, in declaration order. Derived flags
    /// are not enumerated.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.result.values().map(|(k, _)| k)
    }

    /// Resolved pairs in declaration order, as stored on the backend.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.result.values()
    }

    pub fn len(&self) -> usize {
        self.keys().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.result.value(name).is_some()
    }

    pub fn is_development(&self) -> bool {
        self.provider.mode().is_development()
    }

    pub fn is_dev(&self) -> bool {
        self.is_development()
    }

    pub fn is_production(&self) -> bool {
        self.provider.mode().is_production()
    }

    pub fn is_prod(&self) -> bool {
        self.is_production()
    }

    pub fn is_test(&self) -> bool {
        self.provider.mode().is_test()
    }

    /// The configured client-safe prefixes, retained so a downstream
    /// bootstrap generator can recover them without an explicit argument.
    pub fn client_safe_prefixes(&self) -> &[String] {
        &self.client_safe_prefixes
    }

    /// The current execution context, re-derived on every call.
    pub fn context(&self) -> ExecutionContext {
        self.provider.context()
    }

    /// The current execution mode, re-derived on every call.
    pub fn mode(&self) -> ExecutionMode {
        self.provider.mode()
    }

    /// Recorded metadata for a declared key.
    pub fn metadata(&self, name: &str) -> Option<&crate::metadata::ValidatorMetadata> {
        self.result.metadata(name).map(|m| m.as_ref())
    }

    fn flag(&self, name: &str) -> bool {
        let mode = self.provider.mode();
        match name {
            "isDevelopment" | "isDev" => mode.is_development(),
            "isProduction" | "isProd" => mode.is_production(),
            "isTest" => mode.is_test(),
            _ => false,
        }
    }

    /// Front-end read of a key that resolved on the backend: re-check
    /// exposure, then apply second-stage client defaults and the transform.
    fn frontend_read(&self, name: &str, value: &Value) -> AccessResult<Option<Value>> {
        let Some(meta) = self.result.metadata(name) else {
            return self.violation(name);
        };
        if !meta.is_exposed() {
            return self.violation(name);
        }

        let mut value = value.clone();
        if let Some(client) = &meta.client {
            // Presence of the key in the raw source counts as explicitly
            // set, regardless of its value; only unset keys pick up the
            // client-specific default.
            if !self.result.raw_present(name) {
                match client.applicable_default(&self.provider.mode()) {
                    Tristate::Value(v) => value = v.clone(),
                    Tristate::ForceAbsent => return Ok(None),
                    Tristate::Unset => {}
                }
            }
            if let Some(transform) = &client.transform {
                value = transform.apply(value);
            }
        }
        Ok(Some(value))
    }

    fn violation(&self, name: &str) -> AccessResult<Option<Value>> {
        let mode = self.provider.mode();
        let policy = self
            .on_client_access_error
            .unwrap_or_else(|| default_access_violation_policy(&mode));
        match policy {
            AccessViolationPolicy::Throw => Err(AccessError::ClientAccessViolation {
                key: name.to_string(),
            }),
            AccessViolationPolicy::Warn => {
                if mode.is_development() {
                    warn!(key = name, "front-end read of a non-exposed variable");
                }
                Ok(None)
            }
            AccessViolationPolicy::Ignore => Ok(None),
        }
    }
}

impl std::fmt::Debug for BoundEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundEnv")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .field("strict", &self.strict)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticContext;
    use crate::resolver::SourceMap;
    use crate::validator::{builtin, ValidatorOptions};
    use serde_json::json;

    fn simple_env(mode: ExecutionMode) -> BoundEnv {
        let spec = Spec::new().declare(
            "PORT",
            builtin::port(ValidatorOptions::new().default_value(json!(3000))),
        );
        bind(
            &spec,
            Options::new()
                .provider(Arc::new(StaticContext::backend(mode)))
                .source(SourceMap::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_backend_read_returns_stored_value() {
        let env = simple_env(ExecutionMode::Production);
        assert_eq!(env.get("PORT").unwrap(), Some(json!(3000)));
        assert_eq!(env.get_i64("PORT").unwrap(), Some(3000));
    }

    #[test]
    fn test_set_always_rejected() {
        let env = simple_env(ExecutionMode::Production);
        let err = env.set("PORT", json!(4000)).unwrap_err();
        assert!(matches!(err, AccessError::MutationRejected { .. }));
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_remove_is_a_noop() {
        let env = simple_env(ExecutionMode::Production);
        env.remove("PORT");
        assert_eq!(env.get("PORT").unwrap(), Some(json!(3000)));
    }

    #[test]
    fn test_strict_read_of_undeclared_key() {
        let env = simple_env(ExecutionMode::Production);
        assert!(matches!(
            env.get("NOPE"),
            Err(AccessError::VariableNotFound { .. })
        ));
    }

    #[test]
    fn test_derived_flags_ignore_strictness() {
        let env = simple_env(ExecutionMode::Test);
        assert_eq!(env.get("isTest").unwrap(), Some(json!(true)));
        assert_eq!(env.get("isDev").unwrap(), Some(json!(false)));
        assert!(env.is_test());
        assert!(!env.is_development());
    }

    #[test]
    fn test_flags_not_enumerated() {
        let env = simple_env(ExecutionMode::Development);
        let keys: Vec<_> = env.keys().collect();
        assert_eq!(keys, vec!["PORT"]);
        assert_eq!(env.len(), 1);
    }
}
