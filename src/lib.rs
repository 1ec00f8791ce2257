//! Content Dictionary
//!
//! An in-memory content-model registry for a live content repository. Authors
//! declare models (namespaces, types, aspects, properties, associations,
//! constraints) as inert definition trees; the dictionary compiles them into a
//! resolved type graph and governs how that graph may evolve while content
//! depending on it already exists.
//!
//! ## Features
//!
//! - **Model Compilation**: Prefixed names resolved against declared and
//!   imported namespaces, inheritance flattened, defaults applied
//! - **Asymmetric Compatibility**: Creation is permissive, updates are
//!   additive-only, deletion is gated on actual usage
//! - **Atomic Snapshots**: Registry state swaps copy-on-write; readers never
//!   observe a half-updated type graph
//! - **Lifecycle Notification**: Dependent subsystems observe every reload and
//!   teardown cycle in strict phase order
//! - **Bootstrap**: An embedded core model plus store-held models loaded in
//!   import-dependency order
//!
//! ## Flow
//!
//! ```text
//! ModelDefinition ──compile──> CompiledModel ──validate──> RegistrySnapshot
//!      (inert)                  (resolved)      (additive      (swapped
//!                                                 only)        atomically)
//! ```

pub mod bootstrap;
pub mod checksum;
pub mod compatibility;
pub mod compiled;
pub mod compiler;
pub mod config;
pub mod definition;
pub mod diff;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod namespace;
pub mod oracle;
pub mod registry;
pub mod store;

pub use checksum::Checksum;
pub use compatibility::{CompatibilityChecker, CompatibilityViolation};
pub use compiled::{CompiledClass, CompiledModel};
pub use compiler::ModelCompiler;
pub use config::DictionaryConfig;
pub use definition::{DataType, ModelDefinition};
pub use error::{DictionaryError, Result};
pub use lifecycle::{Phase, RegistryListener};
pub use namespace::{Namespace, QName};
pub use oracle::UsageOracle;
pub use registry::{ModelRegistry, RegistrySnapshot};
pub use store::{DirectoryStore, ModelStore};
