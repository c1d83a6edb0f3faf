//! # Validator Metadata
//!
//! Resolution metadata attached to validators at construction and looked up
//! by identity at resolution time, plus the side-table that holds the
//! association.
//!
//! ## Invariants
//! - Metadata is immutable once built; overrides produce a new merged
//!   instance, never a shared mutable one.
//! - The side-table is non-owning: it stores metadata keyed by an opaque
//!   handle and never holds the validator itself, so it cannot keep an
//!   otherwise-unreachable validator alive.
//! - Every optional field that participates in merging is an explicit
//!   tri-state: omitted, declared-absent, or a value. Declared-absent is
//!   distinct from omission and survives the merge.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use serde_json::Value;

use crate::context::ExecutionMode;

/// Omitted vs. declared-absent vs. declared-value, for mergeable fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Tristate<T> {
    /// Field was not declared; a merge preserves the base value.
    #[default]
    Unset,
    /// Field was declared explicitly absent; forces absence through a merge.
    ForceAbsent,
    /// Field was declared with a value.
    Value(T),
}

impl<T> Tristate<T> {
    /// Whether the field was declared at all (absent counts as declared).
    pub fn is_declared(&self) -> bool {
        !matches!(self, Tristate::Unset)
    }

    /// The declared value, if one exists.
    pub fn value(&self) -> Option<&T> {
        match self {
            Tristate::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Merge an override over a base: a declared override wins, an omitted
    /// one preserves the base.
    pub fn or_base(self, base: &Tristate<T>) -> Tristate<T>
    where
        T: Clone,
    {
        if self.is_declared() {
            self
        } else {
            base.clone()
        }
    }
}

/// The three default declarations a key may carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultVariants {
    /// Base default, applicable in every mode.
    pub default: Tristate<Value>,
    /// Development-only variant.
    pub dev_default: Tristate<Value>,
    /// Test-only variant.
    pub test_default: Tristate<Value>,
}

impl DefaultVariants {
    /// The variant applicable under `mode`.
    ///
    /// A mode variant wins over the base default only when it was declared;
    /// declaration, not emptiness, is what matters, so a declared-but-absent
    /// variant still wins and yields absence.
    pub fn applicable(&self, mode: &ExecutionMode) -> &Tristate<Value> {
        if mode.is_development() && self.dev_default.is_declared() {
            &self.dev_default
        } else if mode.is_test() && self.test_default.is_declared() {
            &self.test_default
        } else {
            &self.default
        }
    }
}

/// A client-side value transform, applied at read time on the front-end.
#[derive(Clone)]
pub struct ValueTransform(Arc<dyn Fn(Value) -> Value + Send + Sync>);

impl ValueTransform {
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(transform))
    }

    /// Apply the transform to a resolved value.
    pub fn apply(&self, value: Value) -> Value {
        (self.0)(value)
    }
}

// Transforms are opaque closures; Debug shows presence only.
impl fmt::Debug for ValueTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueTransform(..)")
    }
}

/// Front-end-specific configuration for a key, independent of server-side
/// resolution.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Whether the key may be read and serialized in front-end context.
    pub expose: bool,
    /// Optional transform applied to the value on front-end reads.
    pub transform: Option<ValueTransform>,
    /// Client-specific default, substituted on the front-end when the raw
    /// source did not literally contain the key.
    pub default: Tristate<Value>,
    /// Development-only client default.
    pub dev_default: Tristate<Value>,
}

impl ClientConfig {
    /// The client default applicable under `mode`, following the same
    /// declared-wins rule as [`DefaultVariants::applicable`].
    pub fn applicable_default(&self, mode: &ExecutionMode) -> &Tristate<Value> {
        if mode.is_development() && self.dev_default.is_declared() {
            &self.dev_default
        } else {
            &self.default
        }
    }
}

/// Resolution metadata for one validator instance.
///
/// Built once by the validator factory and never mutated; the resolver
/// records a per-key copy with the exposure fields filled in.
#[derive(Debug, Clone, Default)]
pub struct ValidatorMetadata {
    /// Default declarations.
    pub defaults: DefaultVariants,
    /// Front-end configuration, if any.
    pub client: Option<ClientConfig>,
    /// Human-readable description for documentation tooling.
    pub description: Option<String>,
    /// Example value for documentation tooling.
    pub example: Option<String>,
    /// Key matched a client-safe prefix (computed at resolution).
    pub auto_exposed: bool,
    /// Key matched a server-only prefix, or was hidden from the front-end
    /// (computed at resolution). Always overrides an explicit `expose`.
    pub server_only: bool,
}

impl ValidatorMetadata {
    /// Effective front-end exposure for a key carrying this metadata.
    pub fn is_exposed(&self) -> bool {
        !self.server_only
            && (self.auto_exposed || self.client.as_ref().map_or(false, |c| c.expose))
    }
}

/// Opaque, stable handle identifying one validator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidatorId(u64);

impl ValidatorId {
    /// Allocate the next handle. Handles are unique for the process
    /// lifetime and never reused.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Side-table associating validator handles with their metadata.
///
/// Insert-and-lookup only; entries are never mutated in place, so
/// concurrent reads are safe behind the lock.
pub struct MetadataRegistry {
    table: RwLock<HashMap<ValidatorId, Arc<ValidatorMetadata>>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Associate metadata with a validator handle.
    pub fn attach(&self, id: ValidatorId, metadata: ValidatorMetadata) -> Arc<ValidatorMetadata> {
        let metadata = Arc::new(metadata);
        let mut table = self.table.write().unwrap_or_else(|p| p.into_inner());
        table.insert(id, metadata.clone());
        metadata
    }

    /// Look up the metadata for a validator handle.
    pub fn lookup(&self, id: ValidatorId) -> Option<Arc<ValidatorMetadata>> {
        let table = self.table.read().unwrap_or_else(|p| p.into_inner());
        table.get(&id).cloned()
    }

    /// Number of registered associations.
    pub fn len(&self) -> usize {
        let table = self.table.read().unwrap_or_else(|p| p.into_inner());
        table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide registry. Validators are typically constructed once and
/// reused across resolution calls, so the table's lifetime spans the
/// process.
pub fn registry() -> &'static MetadataRegistry {
    static REGISTRY: OnceLock<MetadataRegistry> = OnceLock::new();
    REGISTRY.get_or_init(MetadataRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tristate_declared() {
        assert!(!Tristate::<Value>::Unset.is_declared());
        assert!(Tristate::<Value>::ForceAbsent.is_declared());
        assert!(Tristate::Value(json!(1)).is_declared());
    }

    #[test]
    fn test_tristate_merge_preserves_base_when_unset() {
        let base = Tristate::Value(json!("base"));
        assert_eq!(Tristate::Unset.or_base(&base), base);
    }

    #[test]
    fn test_tristate_merge_force_absent_wins() {
        let base = Tristate::Value(json!("base"));
        assert_eq!(
            Tristate::<Value>::ForceAbsent.or_base(&base),
            Tristate::ForceAbsent
        );
    }

    #[test]
    fn test_applicable_default_prefers_declared_mode_variant() {
        let variants = DefaultVariants {
            default: Tristate::Value(json!("info")),
            dev_default: Tristate::Value(json!("debug")),
            test_default: Tristate::ForceAbsent,
        };
        assert_eq!(
            variants.applicable(&ExecutionMode::Development),
            &Tristate::Value(json!("debug"))
        );
        // Declared-but-absent still wins over the base default.
        assert_eq!(
            variants.applicable(&ExecutionMode::Test),
            &Tristate::ForceAbsent
        );
        assert_eq!(
            variants.applicable(&ExecutionMode::Production),
            &Tristate::Value(json!("info"))
        );
    }

    #[test]
    fn test_applicable_default_falls_back_when_variant_omitted() {
        let variants = DefaultVariants {
            default: Tristate::Value(json!(3000)),
            ..DefaultVariants::default()
        };
        assert_eq!(
            variants.applicable(&ExecutionMode::Development),
            &Tristate::Value(json!(3000))
        );
    }

    #[test]
    fn test_unrecognized_mode_uses_base_default() {
        let variants = DefaultVariants {
            default: Tristate::Value(json!("base")),
            dev_default: Tristate::Value(json!("dev")),
            test_default: Tristate::Value(json!("test")),
        };
        assert_eq!(
            variants.applicable(&ExecutionMode::Other("staging".into())),
            &Tristate::Value(json!("base"))
        );
    }

    #[test]
    fn test_server_only_overrides_expose() {
        let metadata = ValidatorMetadata {
            client: Some(ClientConfig {
                expose: true,
                ..ClientConfig::default()
            }),
            server_only: true,
            ..ValidatorMetadata::default()
        };
        assert!(!metadata.is_exposed());
    }

    #[test]
    fn test_registry_attach_and_lookup() {
        let registry = MetadataRegistry::new();
        let id = ValidatorId::next();
        registry.attach(
            id,
            ValidatorMetadata {
                description: Some("a key".into()),
                ..ValidatorMetadata::default()
            },
        );

        let found = registry.lookup(id).unwrap();
        assert_eq!(found.description.as_deref(), Some("a key"));
        assert!(registry.lookup(ValidatorId::next()).is_none());
    }

    #[test]
    fn test_registry_entries_are_independent() {
        let registry = MetadataRegistry::new();
        let a = ValidatorId::next();
        let b = ValidatorId::next();
        registry.attach(a, ValidatorMetadata::default());
        registry.attach(
            b,
            ValidatorMetadata {
                server_only: true,
                ..ValidatorMetadata::default()
            },
        );

        assert!(!registry.lookup(a).unwrap().server_only);
        assert!(registry.lookup(b).unwrap().server_only);
    }

    #[test]
    fn test_transform_applies() {
        let transform = ValueTransform::new(|v| match v {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        });
        assert_eq!(transform.apply(json!("abc")), json!("ABC"));
    }
}
