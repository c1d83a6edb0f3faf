//! Bootstrap Script Tests
//!
//! The generated front-end assignment:
//! - Backend output includes exactly the prefix-matched pairs, in
//!   declaration order, and nothing else
//! - `</script>` never survives unescaped, whatever its case
//! - Front-end output is empty unless a snapshot was injected, in which
//!   case that exact object is re-serialized

use std::sync::{Arc, Mutex, OnceLock};

use envbind::{
    bind, bootstrap, builtin, render_script, ExecutionMode, Options, SourceMap, Spec,
    StaticContext, ValidatorOptions,
};
use serde_json::{json, Value};

// The injected snapshot is process-wide; serialize the tests that touch it.
fn snapshot_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn backend_env(source: SourceMap, prefixes: &[&str]) -> envbind::BoundEnv {
    let spec = Spec::new()
        .declare("PUBLIC_X", builtin::string(ValidatorOptions::new()))
        .declare("SECRET", builtin::string(ValidatorOptions::new()));
    bind(
        &spec,
        Options::new()
            .provider(Arc::new(StaticContext::backend(ExecutionMode::Production)))
            .client_safe_prefixes(prefixes.iter().copied())
            .source(source),
    )
    .unwrap()
}

fn sample_source() -> SourceMap {
    let mut source = SourceMap::new();
    source.insert_str("PUBLIC_X", "v");
    source.insert_str("SECRET", "s");
    source
}

/// Scenario: `{PUBLIC_X:"v", SECRET:"s"}` with prefix `["PUBLIC_"]`.
#[test]
fn test_backend_script_is_exact_and_filtered() {
    let env = backend_env(sample_source(), &[]);
    let script = render_script(&env, Some(&["PUBLIC_".to_string()]));

    assert_eq!(script, "window.__ENV__ = {\"PUBLIC_X\":\"v\"};");
    assert!(!script.contains("SECRET"));
    assert!(!script.contains("\"s\""));
}

#[test]
fn test_explicit_prefixes_override_retained_list() {
    // Retained list would include PUBLIC_; the explicit empty list wins.
    let env = backend_env(sample_source(), &["PUBLIC_"]);
    let script = render_script(&env, Some(&[]));
    assert_eq!(script, "window.__ENV__ = {};");
}

#[test]
fn test_retained_prefixes_used_when_no_argument() {
    let env = backend_env(sample_source(), &["PUBLIC_"]);
    let script = render_script(&env, None);
    assert_eq!(script, "window.__ENV__ = {\"PUBLIC_X\":\"v\"};");
}

#[test]
fn test_script_close_sequence_is_escaped() {
    let mut source = SourceMap::new();
    source.insert_str("PUBLIC_X", "a</ScRiPt><b>");
    source.insert_str("SECRET", "s");

    let env = backend_env(source, &["PUBLIC_"]);
    let script = render_script(&env, None);

    assert!(!script.to_ascii_lowercase().contains("</script>"));
    assert!(script.contains("<\\/ScRiPt>"));
    // Other markup passes through untouched.
    assert!(script.contains("<b>"));
}

#[test]
fn test_frontend_without_snapshot_is_empty() {
    let _guard = snapshot_lock().lock().unwrap();
    bootstrap::clear();

    let spec = Spec::new().declare(
        "PUBLIC_X",
        builtin::string(ValidatorOptions::new().default_value(json!("v"))),
    );
    let env = bind(
        &spec,
        Options::new()
            .provider(Arc::new(StaticContext::frontend(ExecutionMode::Production)))
            .client_safe_prefixes(["PUBLIC_"])
            .source(SourceMap::new()),
    )
    .unwrap();

    assert_eq!(render_script(&env, None), "");
}

#[test]
fn test_frontend_reserializes_injected_snapshot_exactly() {
    let _guard = snapshot_lock().lock().unwrap();
    bootstrap::inject(vec![
        ("PUBLIC_B".to_string(), Value::String("2".to_string())),
        ("PUBLIC_A".to_string(), json!(1)),
    ]);

    let spec = Spec::new().declare(
        "PUBLIC_A",
        builtin::int(ValidatorOptions::new().default_value(json!(1))),
    );
    let env = bind(
        &spec,
        Options::new()
            .provider(Arc::new(StaticContext::frontend(ExecutionMode::Production)))
            .client_safe_prefixes(["PUBLIC_"])
            .source(SourceMap::new()),
    )
    .unwrap();

    // Hydration stability: the injected pairs come back verbatim, in their
    // original order, regardless of what the spec declares.
    assert_eq!(
        render_script(&env, None),
        "window.__ENV__ = {\"PUBLIC_B\":\"2\",\"PUBLIC_A\":1};"
    );

    bootstrap::clear();
}

#[test]
fn test_injected_snapshot_is_default_frontend_source() {
    let _guard = snapshot_lock().lock().unwrap();
    bootstrap::inject(vec![(
        "PUBLIC_X".to_string(),
        Value::String("from-bootstrap".to_string()),
    )]);

    let spec = Spec::new().declare("PUBLIC_X", builtin::string(ValidatorOptions::new()));
    // No explicit source: the injected snapshot is the default.
    let env = bind(
        &spec,
        Options::new()
            .provider(Arc::new(StaticContext::frontend(ExecutionMode::Production)))
            .client_safe_prefixes(["PUBLIC_"]),
    )
    .unwrap();

    assert_eq!(env.get("PUBLIC_X").unwrap(), Some(json!("from-bootstrap")));

    bootstrap::clear();
}
