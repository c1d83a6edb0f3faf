//! # Front-End Bootstrap
//!
//! The injectable front-end snapshot (the "front-end global") and the
//! script generator that ships exposed values to it.
//!
//! A backend render embeds the generated assignment in its HTML; the
//! front-end runtime injects the shipped object before binding, which both
//! flips context detection to front-end and becomes the default source.
//!
//! ## Invariants
//! - Snapshot pairs keep their insertion order so re-serialization is
//!   byte-stable across hydration.
//! - The generated script never contains a key that does not match the
//!   prefix filter, and the literal sequence `</script>` (any case) never
//!   survives unescaped.

use std::sync::{OnceLock, RwLock};

use serde_json::Value;

use crate::binding::BoundEnv;
use crate::resolver::{matches_prefix, SourceMap};

/// Property on the well-known front-end global that carries the bootstrap
/// object.
pub const BOOTSTRAP_GLOBAL: &str = "__ENV__";

fn cell() -> &'static RwLock<Option<Vec<(String, Value)>>> {
    static INJECTED: OnceLock<RwLock<Option<Vec<(String, Value)>>>> = OnceLock::new();
    INJECTED.get_or_init(|| RwLock::new(None))
}

/// Install a bootstrap snapshot, switching ambient context detection to
/// front-end. Later injections replace earlier ones wholesale.
pub fn inject<I>(pairs: I)
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut guard = cell().write().unwrap_or_else(|p| p.into_inner());
    *guard = Some(pairs.into_iter().collect());
}

/// Remove the injected snapshot, restoring backend detection.
pub fn clear() {
    let mut guard = cell().write().unwrap_or_else(|p| p.into_inner());
    *guard = None;
}

/// Whether a snapshot is currently injected.
pub fn is_injected() -> bool {
    let guard = cell().read().unwrap_or_else(|p| p.into_inner());
    guard.is_some()
}

/// The injected pairs, in their original order.
pub fn snapshot() -> Option<Vec<(String, Value)>> {
    let guard = cell().read().unwrap_or_else(|p| p.into_inner());
    guard.clone()
}

/// The injected snapshot as a resolution source.
pub(crate) fn snapshot_source() -> Option<SourceMap> {
    snapshot().map(|pairs| pairs.into_iter().collect())
}

/// Generate the bootstrap assignment for a bound environment.
///
/// Backend: filters the resolved keys by `prefixes` (falling back to the
/// prefix list the binding retained) and returns one assignment statement
/// targeting the well-known global. Front-end: returns the empty string,
/// unless a snapshot was injected, in which case that exact object is
/// re-serialized for hydration stability.
pub fn render_script(env: &BoundEnv, prefixes: Option<&[String]>) -> String {
    if env.context().is_frontend() {
        return match snapshot() {
            Some(pairs) => render_assignment(&pairs),
            None => String::new(),
        };
    }

    let prefixes = prefixes.unwrap_or_else(|| env.client_safe_prefixes());
    let pairs: Vec<(String, Value)> = env
        .iter()
        .filter(|(key, _)| matches_prefix(key, prefixes))
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();
    render_assignment(&pairs)
}

fn render_assignment(pairs: &[(String, Value)]) -> String {
    let mut literal = String::from("{");
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            literal.push(',');
        }
        // Key and value are serialized independently so pair order is the
        // declaration order, not a map's.
        literal.push_str(&serde_json::to_string(key).unwrap_or_default());
        literal.push(':');
        literal.push_str(&serde_json::to_string(value).unwrap_or_default());
    }
    literal.push('}');

    format!(
        "window.{} = {};",
        BOOTSTRAP_GLOBAL,
        escape_script_close(&literal)
    )
}

/// Escape every case-insensitive occurrence of `</script>` so the literal
/// cannot terminate the surrounding script tag early.
fn escape_script_close(input: &str) -> String {
    const NEEDLE: &[u8] = b"</script>";
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < bytes.len() {
        // The needle is ASCII, so a byte-level match always sits on UTF-8
        // boundaries and the matched slice is valid to copy as text.
        if bytes.len() - i >= NEEDLE.len()
            && bytes[i..i + NEEDLE.len()].eq_ignore_ascii_case(NEEDLE)
        {
            out.push_str("<\\/");
            out.push_str(&input[i + 2..i + NEEDLE.len()]);
            i += NEEDLE.len();
        } else {
            let ch = input[i..].chars().next().unwrap_or('\u{fffd}');
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_is_case_insensitive() {
        assert_eq!(
            escape_script_close("x</script>y"),
            "x<\\/script>y".to_string()
        );
        assert_eq!(
            escape_script_close("x</ScRiPt>y"),
            "x<\\/ScRiPt>y".to_string()
        );
    }

    #[test]
    fn test_escape_leaves_other_text_alone() {
        assert_eq!(escape_script_close("</scripx>"), "</scripx>");
        assert_eq!(escape_script_close("plain"), "plain");
    }

    #[test]
    fn test_render_assignment_preserves_pair_order() {
        let pairs = vec![
            ("Z_FIRST".to_string(), json!("1")),
            ("A_SECOND".to_string(), json!(2)),
        ];
        assert_eq!(
            render_assignment(&pairs),
            "window.__ENV__ = {\"Z_FIRST\":\"1\",\"A_SECOND\":2};"
        );
    }

    #[test]
    fn test_render_assignment_empty() {
        assert_eq!(render_assignment(&[]), "window.__ENV__ = {};");
    }
}
