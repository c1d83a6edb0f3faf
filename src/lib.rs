//! envbind - a strict, context-aware environment variable binding layer
//!
//! Given a declarative spec mapping variable names to validators, `envbind`
//! resolves each variable from a process-wide key/value source and returns
//! a read-only, access-controlled binding that application code treats as
//! trusted configuration. The same spec runs in a privileged backend
//! context and an unprivileged front-end context; per-key exposure policy
//! decides what the front-end may see.
//!
//! # Principles
//!
//! 1. Resolution is deterministic: same spec, same source, same result.
//! 2. Failures aggregate; one bad key never hides the others.
//! 3. Exposure and mode are re-evaluated at every read, never cached.
//! 4. The binding is immutable; hiding happens per read, never by deletion.
//!
//! # Usage
//!
//! ```
//! use envbind::{bind, builtin, Options, SourceMap, Spec, ValidatorOptions};
//! use envbind::{ExecutionMode, StaticContext};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let spec = Spec::new()
//!     .declare("PORT", builtin::port(ValidatorOptions::new().default_value(json!(3000))))
//!     .declare("LOG_LEVEL", builtin::string(
//!         ValidatorOptions::new()
//!             .default_value(json!("info"))
//!             .dev_default(json!("debug")),
//!     ));
//!
//! let env = bind(
//!     &spec,
//!     Options::new()
//!         .provider(Arc::new(StaticContext::backend(ExecutionMode::Production)))
//!         .source(SourceMap::new()),
//! )
//! .unwrap();
//!
//! assert_eq!(env.get_i64("PORT").unwrap(), Some(3000));
//! assert_eq!(env.get_string("LOG_LEVEL").unwrap().as_deref(), Some("info"));
//! ```

pub mod binding;
pub mod bootstrap;
pub mod context;
pub mod errors;
pub mod metadata;
pub mod report;
pub mod resolver;
pub mod validator;

pub use binding::{bind, BoundEnv, DERIVED_FLAGS};
pub use bootstrap::{render_script, BOOTSTRAP_GLOBAL};
pub use context::{
    default_access_violation_policy, default_failure_policy, AccessViolationPolicy,
    ContextProvider, ExecutionContext, ExecutionMode, FailurePolicy, ProcessContext,
    StaticContext, MODE_VAR,
};
pub use errors::{AccessError, AccessResult, BindError, Failure, FailureKind, Issue};
pub use metadata::{
    ClientConfig, DefaultVariants, MetadataRegistry, Tristate, ValidatorId, ValidatorMetadata,
    ValueTransform,
};
pub use report::{render_report, FailureReporter, StderrReporter};
pub use resolver::{resolve, Options, ResolutionResult, SourceMap, Spec};
pub use validator::{builtin, ClientOptions, EnvValidator, ValidatorFactory, ValidatorOptions};
