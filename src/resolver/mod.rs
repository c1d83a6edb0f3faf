//! # Specification Resolver
//!
//! Walks a declarative spec in declaration order, computes the per-key
//! exposure policy, resolves each raw value through the default-variant
//! rules, and aggregates failures.
//!
//! ## Invariants
//! - Every spec key gets a metadata entry, regardless of outcome.
//! - A value lands in the result only if validation succeeded, or the key
//!   was intentionally skipped on the front-end as hidden.
//! - Failures never short-circuit: one bad key does not stop resolution of
//!   the rest, so a single top-level failure reports everything at once.
//! - Resolution is a linear scan over an in-memory snapshot; no I/O happens
//!   mid-resolution and no state is shared between calls.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::bootstrap;
use crate::context::{
    AccessViolationPolicy, ContextProvider, ExecutionContext, FailurePolicy, ProcessContext,
};
use crate::errors::Failure;
use crate::metadata::{Tristate, ValidatorMetadata};
use crate::report::FailureReporter;
use crate::validator::EnvValidator;

/// In-memory snapshot of a key/value source.
///
/// Process-environment values arrive as strings; an injected bootstrap
/// snapshot may carry structured values.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    entries: HashMap<String, Value>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment.
    pub fn from_process_env() -> Self {
        std::env::vars()
            .map(|(k, v)| (k, Value::String(v)))
            .collect()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.entries.insert(key.into(), value);
        self
    }

    /// Insert a plain string value, the common case for environment data.
    pub fn insert_str(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.insert(key, Value::String(value.into()))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

impl FromIterator<(String, Value)> for SourceMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Ordered mapping from variable name to validator.
///
/// Keys are unique; re-declaring a key replaces its validator but keeps the
/// original position, so output enumeration order is stable.
#[derive(Clone, Default)]
pub struct Spec {
    entries: Vec<(String, EnvValidator)>,
}

impl Spec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable. Builder-style so specs read as a literal block.
    pub fn declare(mut self, name: impl Into<String>, validator: EnvValidator) -> Self {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = validator,
            None => self.entries.push((name, validator)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValidator)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(k, _)| k))
            .finish()
    }
}

/// Resolution options.
///
/// Policy fields left unset derive their defaults from the execution
/// context and mode at the moment they are needed.
#[derive(Clone)]
pub struct Options {
    /// Failure policy; defaults to exit on the backend, throw on the
    /// front-end.
    pub on_error: Option<FailurePolicy>,
    /// Whether reads of undeclared keys are errors. Defaults to true.
    pub strict: bool,
    /// Keys matching one of these literal prefixes are exposed to the
    /// front-end automatically.
    pub client_safe_prefixes: Vec<String>,
    /// Keys matching one of these literal prefixes are never exposed,
    /// overriding any explicit client configuration.
    pub server_only_prefixes: Vec<String>,
    /// Client-access-violation policy; defaults to warn in development,
    /// ignore otherwise.
    pub on_client_access_error: Option<AccessViolationPolicy>,
    /// Replacement for the default stderr report.
    pub reporter: Option<Arc<dyn FailureReporter>>,
    /// Override source; defaults to the backend process environment, or the
    /// injected bootstrap snapshot on the front-end.
    pub source: Option<SourceMap>,
    /// Context capability; defaults to ambient process detection.
    pub provider: Arc<dyn ContextProvider>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            on_error: None,
            strict: true,
            client_safe_prefixes: Vec::new(),
            server_only_prefixes: Vec::new(),
            on_client_access_error: None,
            reporter: None,
            source: None,
            provider: Arc::new(ProcessContext),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_error(mut self, policy: FailurePolicy) -> Self {
        self.on_error = Some(policy);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn client_safe_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.client_safe_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn server_only_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.server_only_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_client_access_error(mut self, policy: AccessViolationPolicy) -> Self {
        self.on_client_access_error = Some(policy);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn source(mut self, source: SourceMap) -> Self {
        self.source = Some(source);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.provider = provider;
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("on_error", &self.on_error)
            .field("strict", &self.strict)
            .field("client_safe_prefixes", &self.client_safe_prefixes)
            .field("server_only_prefixes", &self.server_only_prefixes)
            .field("on_client_access_error", &self.on_client_access_error)
            .field("has_reporter", &self.reporter.is_some())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

/// Output of one resolution pass. Built once, then immutable.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    values: Vec<(String, Value)>,
    index: HashMap<String, usize>,
    metadata: HashMap<String, Arc<ValidatorMetadata>>,
    hidden: HashSet<String>,
    raw_present: HashSet<String>,
    failures: Vec<Failure>,
}

impl ResolutionResult {
    /// The resolved value for a key, if validation produced one.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&i| &self.values[i].1)
    }

    /// Resolved values in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The recorded metadata for a key. Present for every spec key.
    pub fn metadata(&self, name: &str) -> Option<&Arc<ValidatorMetadata>> {
        self.metadata.get(name)
    }

    /// Whether the key was intentionally skipped on the front-end.
    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden.contains(name)
    }

    /// Whether the raw source literally contained the key.
    pub fn raw_present(&self, name: &str) -> bool {
        self.raw_present.contains(name)
    }

    /// Per-key failures, in declaration order.
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    fn push_value(&mut self, name: &str, value: Value) {
        self.index.insert(name.to_string(), self.values.len());
        self.values.push((name.to_string(), value));
    }
}

/// Case-sensitive literal prefix match, not separator-aware: "PUBLIC_"
/// matches "PUBLIC_KEY_SECRET" but not "PUBLICKEY", "PUBLIC" or
/// "public_key".
pub(crate) fn matches_prefix(key: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| key.starts_with(p.as_str()))
}

/// The source a resolution pass reads from when none was supplied: the
/// backend process environment, or the injected bootstrap snapshot on the
/// front-end (empty if nothing was injected).
pub(crate) fn effective_source(options: &Options, context: ExecutionContext) -> SourceMap {
    if let Some(source) = &options.source {
        return source.clone();
    }
    match context {
        ExecutionContext::Backend => SourceMap::from_process_env(),
        ExecutionContext::Frontend => bootstrap::snapshot_source().unwrap_or_default(),
    }
}

/// Resolve a spec against the effective source.
pub fn resolve(spec: &Spec, options: &Options) -> ResolutionResult {
    let context = options.provider.context();
    let source = effective_source(options, context);
    resolve_with_source(spec, options, context, &source)
}

pub(crate) fn resolve_with_source(
    spec: &Spec,
    options: &Options,
    context: ExecutionContext,
    source: &SourceMap,
) -> ResolutionResult {
    let mode = options.provider.mode();
    let mut out = ResolutionResult::default();

    for (key, validator) in spec.iter() {
        // An entry whose metadata handle cannot be resolved is a per-key
        // failure, not a crash.
        let Some(base) = validator.metadata() else {
            out.metadata
                .insert(key.to_string(), Arc::new(ValidatorMetadata::default()));
            out.failures.push(Failure::invalid_config(
                key,
                "validator is not registered in the metadata store",
            ));
            continue;
        };

        let server_only = matches_prefix(key, &options.server_only_prefixes);
        let auto_exposed = !server_only && matches_prefix(key, &options.client_safe_prefixes);

        let mut meta = (*base).clone();
        meta.server_only = server_only;
        meta.auto_exposed = auto_exposed;
        if server_only {
            // A server-only prefix overrides an explicit expose request.
            if let Some(client) = meta.client.as_mut() {
                client.expose = false;
            }
        }
        let exposed = meta.is_exposed();

        if context.is_frontend() && !exposed {
            // Front-end code legitimately lacks raw values for hidden keys;
            // skip validation entirely and never read the raw value.
            debug!(key, "hidden from front-end, validation skipped");
            meta.server_only = true;
            out.metadata.insert(key.to_string(), Arc::new(meta));
            out.hidden.insert(key.to_string());
            continue;
        }

        let meta = Arc::new(meta);
        out.metadata.insert(key.to_string(), meta.clone());

        match source.get(key) {
            Some(raw) => {
                out.raw_present.insert(key.to_string());
                match validator.parse(raw) {
                    Ok(value) => out.push_value(key, value),
                    Err(issues) => out.failures.push(Failure::invalid(key, issues)),
                }
            }
            // Declared defaults are trusted values, used verbatim.
            None => match meta.defaults.applicable(&mode) {
                Tristate::Value(value) => out.push_value(key, value.clone()),
                Tristate::ForceAbsent => {}
                Tristate::Unset => out.failures.push(Failure::missing(key)),
            },
        }
    }

    if !out.failures.is_empty() {
        debug!(count = out.failures.len(), "resolution aggregated failures");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ExecutionMode, StaticContext};
    use crate::validator::builtin;
    use crate::validator::ValidatorOptions;
    use serde_json::json;

    fn backend_options(mode: ExecutionMode) -> Options {
        Options::new().provider(Arc::new(StaticContext::backend(mode)))
    }

    #[test]
    fn test_prefix_matching_is_literal_and_case_sensitive() {
        let prefixes = vec!["PUBLIC_".to_string()];
        assert!(matches_prefix("PUBLIC_KEY_SECRET", &prefixes));
        assert!(!matches_prefix("PUBLICKEY", &prefixes));
        assert!(!matches_prefix("PUBLIC", &prefixes));
        assert!(!matches_prefix("public_key", &prefixes));
    }

    #[test]
    fn test_spec_redeclaration_keeps_position() {
        let spec = Spec::new()
            .declare("A", builtin::string(ValidatorOptions::new()))
            .declare("B", builtin::string(ValidatorOptions::new()))
            .declare("A", builtin::int(ValidatorOptions::new()));

        let keys: Vec<_> = spec.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn test_raw_value_wins_over_default() {
        let spec = Spec::new().declare(
            "PORT",
            builtin::port(ValidatorOptions::new().default_value(json!(3000))),
        );
        let mut source = SourceMap::new();
        source.insert_str("PORT", "8080");

        let result = resolve(
            &spec,
            &backend_options(ExecutionMode::Production).source(source),
        );
        assert_eq!(result.value("PORT"), Some(&json!(8080)));
        assert!(result.raw_present("PORT"));
    }

    #[test]
    fn test_default_applies_when_raw_absent() {
        let spec = Spec::new().declare(
            "PORT",
            builtin::port(ValidatorOptions::new().default_value(json!(3000))),
        );
        let result = resolve(
            &spec,
            &backend_options(ExecutionMode::Production).source(SourceMap::new()),
        );
        assert_eq!(result.value("PORT"), Some(&json!(3000)));
        assert!(!result.raw_present("PORT"));
    }

    #[test]
    fn test_missing_without_default_is_a_failure() {
        let spec = Spec::new().declare("API_KEY", builtin::string(ValidatorOptions::new()));
        let result = resolve(
            &spec,
            &backend_options(ExecutionMode::Production).source(SourceMap::new()),
        );
        assert_eq!(result.failures().len(), 1);
        assert_eq!(result.failures()[0].key, "API_KEY");
        assert!(result.value("API_KEY").is_none());
        // Metadata is recorded regardless of the outcome.
        assert!(result.metadata("API_KEY").is_some());
    }

    #[test]
    fn test_declared_absent_default_is_not_a_failure() {
        let spec = Spec::new().declare(
            "OPTIONAL",
            builtin::string(ValidatorOptions::new().default_absent()),
        );
        let result = resolve(
            &spec,
            &backend_options(ExecutionMode::Production).source(SourceMap::new()),
        );
        assert!(result.is_ok());
        assert!(result.value("OPTIONAL").is_none());
    }

    #[test]
    fn test_failures_do_not_short_circuit() {
        let spec = Spec::new()
            .declare("FIRST", builtin::string(ValidatorOptions::new()))
            .declare(
                "SECOND",
                builtin::string(ValidatorOptions::new().default_value(json!("ok"))),
            )
            .declare("THIRD", builtin::port(ValidatorOptions::new()));
        let mut source = SourceMap::new();
        source.insert_str("THIRD", "not-a-port");

        let result = resolve(
            &spec,
            &backend_options(ExecutionMode::Production).source(source),
        );

        let failed: Vec<_> = result.failures().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(failed, vec!["FIRST", "THIRD"]);
        assert_eq!(result.value("SECOND"), Some(&json!("ok")));
    }

    #[test]
    fn test_frontend_hidden_key_is_skipped() {
        let spec = Spec::new().declare("SECRET", builtin::string(ValidatorOptions::new()));
        let options = Options::new()
            .provider(Arc::new(StaticContext::frontend(ExecutionMode::Production)))
            .source(SourceMap::new());

        let result = resolve(&spec, &options);
        assert!(result.is_ok());
        assert!(result.is_hidden("SECRET"));
        assert!(result.metadata("SECRET").unwrap().server_only);
    }
}
