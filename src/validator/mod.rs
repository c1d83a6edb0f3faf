//! # Validator Factory
//!
//! Composes a leaf predicate, a base metadata fragment, and a per-call
//! override fragment into an [`EnvValidator`] plus a registered
//! [`ValidatorMetadata`] pair.
//!
//! ## Invariants
//! - Every `build` call produces a new, independent validator: a fresh
//!   handle and a freshly merged metadata instance. Nothing is shared
//!   mutably between validators from the same factory.
//! - Merge is shallow except for the client fragment, which merges
//!   field-by-field with tri-state semantics: omitting a field preserves
//!   the base, declaring it absent forces absence.
//! - The leaf predicate knows nothing about exposure or defaulting; it is
//!   only ever invoked on a present raw value.

pub mod builtin;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::Issue;
use crate::metadata::{
    self, ClientConfig, DefaultVariants, Tristate, ValidatorId, ValidatorMetadata, ValueTransform,
};

/// The leaf-predicate contract: coerce a present raw value into a validated
/// value, or return the structured uniform failure list.
pub type ParseFn = Arc<dyn Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync>;

/// A leaf validator paired with the handle of its registered metadata.
#[derive(Clone)]
pub struct EnvValidator {
    id: ValidatorId,
    parse: ParseFn,
}

impl EnvValidator {
    /// The metadata handle for this validator instance.
    pub fn id(&self) -> ValidatorId {
        self.id
    }

    /// Run the leaf predicate on a present raw value.
    pub fn parse(&self, raw: &Value) -> Result<Value, Vec<Issue>> {
        (self.parse)(raw)
    }

    /// Look up this validator's metadata in the process-wide registry.
    pub fn metadata(&self) -> Option<Arc<ValidatorMetadata>> {
        metadata::registry().lookup(self.id)
    }

    /// A validator whose handle is not registered in the metadata store.
    ///
    /// The resolver rejects such an entry as an invalid validator
    /// configuration; this constructor exists so callers can represent
    /// validators that bypassed the factory.
    pub fn detached<F>(parse: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync + 'static,
    {
        Self {
            id: ValidatorId::next(),
            parse: Arc::new(parse),
        }
    }
}

impl fmt::Debug for EnvValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvValidator").field("id", &self.id).finish()
    }
}

/// Per-call metadata fragment for the client configuration.
///
/// Every field is tri-state (or `Option` for the plain flag): omitted
/// fields fall back to the factory's base fragment during the merge.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Whether the key may be read on the front-end.
    pub expose: Option<bool>,
    /// Transform applied to front-end reads.
    pub transform: Tristate<ValueTransform>,
    /// Client-specific default.
    pub default: Tristate<Value>,
    /// Development-only client default.
    pub dev_default: Tristate<Value>,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expose(mut self, expose: bool) -> Self {
        self.expose = Some(expose);
        self
    }

    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Tristate::Value(ValueTransform::new(transform));
        self
    }

    /// Declare the transform explicitly absent, masking a base transform.
    pub fn no_transform(mut self) -> Self {
        self.transform = Tristate::ForceAbsent;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Tristate::Value(value);
        self
    }

    /// Declare the client default explicitly absent.
    pub fn default_absent(mut self) -> Self {
        self.default = Tristate::ForceAbsent;
        self
    }

    pub fn dev_default(mut self, value: Value) -> Self {
        self.dev_default = Tristate::Value(value);
        self
    }

    /// Declare the development client default explicitly absent.
    pub fn dev_default_absent(mut self) -> Self {
        self.dev_default = Tristate::ForceAbsent;
        self
    }
}

/// Metadata fragment accepted by the factory, both as a base and as a
/// per-call override.
#[derive(Debug, Clone, Default)]
pub struct ValidatorOptions {
    pub default: Tristate<Value>,
    pub dev_default: Tristate<Value>,
    pub test_default: Tristate<Value>,
    pub description: Option<String>,
    pub example: Option<String>,
    pub client: Option<ClientOptions>,
}

impl ValidatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Tristate::Value(value);
        self
    }

    /// Declare the base default explicitly absent: the key resolves to no
    /// value without being reported missing.
    pub fn default_absent(mut self) -> Self {
        self.default = Tristate::ForceAbsent;
        self
    }

    pub fn dev_default(mut self, value: Value) -> Self {
        self.dev_default = Tristate::Value(value);
        self
    }

    pub fn dev_default_absent(mut self) -> Self {
        self.dev_default = Tristate::ForceAbsent;
        self
    }

    pub fn test_default(mut self, value: Value) -> Self {
        self.test_default = Tristate::Value(value);
        self
    }

    pub fn test_default_absent(mut self) -> Self {
        self.test_default = Tristate::ForceAbsent;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn client(mut self, client: ClientOptions) -> Self {
        self.client = Some(client);
        self
    }
}

/// Builds validators from a leaf predicate and a base metadata fragment.
pub struct ValidatorFactory {
    parse: ParseFn,
    base: ValidatorOptions,
}

impl ValidatorFactory {
    pub fn new<F>(parse: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync + 'static,
    {
        Self {
            parse: Arc::new(parse),
            base: ValidatorOptions::default(),
        }
    }

    /// Set the base metadata fragment merged under every per-call override.
    pub fn with_base(mut self, base: ValidatorOptions) -> Self {
        self.base = base;
        self
    }

    /// Build a validator from the base fragment and a per-call override.
    ///
    /// Allocates a fresh handle and registers the merged metadata in the
    /// process-wide store.
    pub fn build(&self, overrides: ValidatorOptions) -> EnvValidator {
        let merged = merge_options(&self.base, overrides);
        let id = ValidatorId::next();
        metadata::registry().attach(id, merged);
        EnvValidator {
            id,
            parse: self.parse.clone(),
        }
    }
}

/// Shallow merge of two fragments, with field-by-field tri-state merge for
/// the client configuration.
fn merge_options(base: &ValidatorOptions, overrides: ValidatorOptions) -> ValidatorMetadata {
    ValidatorMetadata {
        defaults: DefaultVariants {
            default: overrides.default.or_base(&base.default),
            dev_default: overrides.dev_default.or_base(&base.dev_default),
            test_default: overrides.test_default.or_base(&base.test_default),
        },
        client: merge_client(base.client.as_ref(), overrides.client),
        description: overrides.description.or_else(|| base.description.clone()),
        example: overrides.example.or_else(|| base.example.clone()),
        // Exposure is computed per key at resolution time.
        auto_exposed: false,
        server_only: false,
    }
}

fn merge_client(
    base: Option<&ClientOptions>,
    overrides: Option<ClientOptions>,
) -> Option<ClientConfig> {
    let (base, overrides) = match (base, overrides) {
        (None, None) => return None,
        (Some(base), None) => (base.clone(), ClientOptions::default()),
        (None, Some(overrides)) => (ClientOptions::default(), overrides),
        (Some(base), Some(overrides)) => (base.clone(), overrides),
    };

    let transform = match overrides.transform.or_base(&base.transform) {
        Tristate::Value(t) => Some(t),
        _ => None,
    };

    Some(ClientConfig {
        expose: overrides.expose.or(base.expose).unwrap_or(false),
        transform,
        default: overrides.default.or_base(&base.default),
        dev_default: overrides.dev_default.or_base(&base.dev_default),
    })
}
