//! Error types for the dictionary

use thiserror::Error;

use crate::compatibility::CompatibilityViolation;
use crate::lifecycle::ListenerFailure;

/// Result type for dictionary operations
pub type Result<T> = std::result::Result<T, DictionaryError>;

/// Dictionary errors
///
/// Compilation errors are always local to one candidate model and never touch
/// the registry. Every registry-mutating error path leaves the registry on its
/// prior snapshot.
#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("unresolved namespace prefix '{prefix}' in model '{model}'{}", suggestion_suffix(.suggestion))]
    UnresolvedNamespace {
        model: String,
        prefix: String,
        suggestion: Option<String>,
    },

    #[error("model '{model}' imports namespace '{uri}' which no registered model declares")]
    UnresolvedImport { model: String, uri: String },

    #[error("namespace '{uri}' is already declared by model '{declared_by}'")]
    NamespaceConflict { uri: String, declared_by: String },

    #[error("duplicate definition of '{name}' in model '{model}'")]
    DuplicateDefinition { model: String, name: String },

    #[error("cyclic inheritance detected at '{class}' (chain: {chain})")]
    CyclicInheritance { class: String, chain: String },

    #[error("inheritance chain of '{class}' exceeds the maximum depth of {max_depth}")]
    InheritanceTooDeep { class: String, max_depth: usize },

    #[error("'{referenced_by}' references unknown class '{name}'")]
    UnresolvedClass { name: String, referenced_by: String },

    #[error("mandatory aspect '{aspect}' on '{class}' does not resolve to an aspect")]
    InvalidMandatoryAspect { class: String, aspect: String },

    #[error("property '{property}' references unknown constraint '{reference}'")]
    UnresolvedConstraintRef { property: String, reference: String },

    #[error("invalid constraint '{name}': {reason}")]
    InvalidConstraint { name: String, reason: String },

    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("incompatible change to model '{model}': {}", join_violations(.violations))]
    IncompatibleModelChange {
        model: String,
        violations: Vec<CompatibilityViolation>,
    },

    #[error("model '{model}' is in use and cannot be removed")]
    ModelInUse { model: String },

    #[error("model '{model}' is not in use")]
    ModelNotInUse { model: String },

    #[error("model '{model}' is not registered")]
    ModelNotFound { model: String },

    #[error("registry is busy with another reload or teardown cycle")]
    RegistryBusy,

    #[error("reload aborted: {}", join_failures(.failures))]
    ReloadAborted { failures: Vec<ListenerFailure> },

    #[error("model dependency cycle involving: {}", .models.join(", "))]
    ModelDependencyCycle { models: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{s}'?)"),
        None => String::new(),
    }
}

fn join_violations(violations: &[CompatibilityViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_failures(failures: &[ListenerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
