//! Model compatibility validation
//!
//! Validation is asymmetric by design: creating a model is permissive, updating
//! one is additive-only, and deleting one is usage-gated. Once a shape exists,
//! anything already stored against it keeps working until nothing depends on it.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::compiled::{CompiledAssociation, CompiledClass, CompiledModel, CompiledProperty};
use crate::diff::{diff_models, DiffStatus};
use crate::error::{DictionaryError, Result};
use crate::graph;
use crate::namespace::QName;
use crate::oracle::{self, UsageOracle};
use crate::registry::RegistrySnapshot;

/// A specific violated compatibility rule, reported so the caller can present
/// an actionable diagnostic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompatibilityViolation {
    #[error("class '{name}' was removed")]
    RemovedClass { name: String },

    #[error("class '{name}' changed between type and aspect")]
    ClassKindChanged { name: String },

    #[error("parent of '{class}' changed from {old} to {new}")]
    ParentChanged {
        class: String,
        old: String,
        new: String,
    },

    #[error("mandatory-aspect set of '{class}' changed; mandatory aspects are frozen across updates")]
    MandatoryAspectsChanged { class: String },

    #[error("property '{name}' was removed")]
    RemovedProperty { name: String },

    #[error("association '{name}' was removed")]
    RemovedAssociation { name: String },

    #[error("property '{property}' narrowed from {old} to {new}")]
    PropertyTypeNarrowed {
        property: String,
        old: String,
        new: String,
    },

    #[error("previously optional property '{property}' became mandatory")]
    PropertyMadeMandatory { property: String },

    #[error("constraints on property '{property}' were tightened")]
    ConstraintsTightened { property: String },

    #[error("association '{association}' reduced its cardinality: {detail}")]
    CardinalityReduced { association: String, detail: String },

    #[error("association '{association}' changed shape: {detail}")]
    AssociationChanged { association: String, detail: String },

    #[error("declared namespace '{uri}' was withdrawn")]
    NamespaceWithdrawn { uri: String },

    #[error("strict mode: '{name}' was modified")]
    StrictModeChange { name: String },
}

/// Decides whether a proposed model change is admissible against the current
/// registry state
pub struct CompatibilityChecker {
    /// Strict mode rejects any change to an existing definition, compatible
    /// or not
    strict: bool,
}

impl Default for CompatibilityChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl CompatibilityChecker {
    pub fn new() -> Self {
        Self { strict: false }
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// `Ok` when the candidate may replace (or newly join) the registry state
    /// captured in `snapshot`
    pub fn validate_update(
        &self,
        candidate: &CompiledModel,
        snapshot: &RegistrySnapshot,
    ) -> Result<()> {
        let Some(current) = snapshot.model(candidate.name()) else {
            // New model: structurally admissible once compiled.
            return Ok(());
        };

        let mut violations = Vec::new();

        for uri in current.declared_uris() {
            if !candidate.declared_uris().any(|u| u == uri) {
                violations.push(CompatibilityViolation::NamespaceWithdrawn {
                    uri: uri.to_string(),
                });
            }
        }

        for class in current.classes() {
            match candidate.class(&class.name) {
                None => violations.push(CompatibilityViolation::RemovedClass {
                    name: class.name.to_string(),
                }),
                Some(candidate_class) => {
                    check_class(class, candidate_class, &mut violations);
                }
            }
        }

        if self.strict {
            for diff in diff_models(current, candidate) {
                if diff.status == DiffStatus::Updated {
                    violations.push(CompatibilityViolation::StrictModeChange {
                        name: diff.name.to_string(),
                    });
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(DictionaryError::IncompatibleModelChange {
                model: candidate.name().to_string(),
                violations,
            })
        }
    }

    /// Whether every definition the model introduces is currently unreferenced.
    ///
    /// Never raises: "in use", registry-internal dependents, and oracle
    /// timeouts all report `false` so the caller can present a diagnostic. An
    /// unregistered model reports `true`; the surrounding delete operation is
    /// responsible for surfacing that case distinctly.
    pub fn can_delete(
        &self,
        name: &QName,
        snapshot: &RegistrySnapshot,
        usage: &Arc<dyn UsageOracle>,
        timeout: Duration,
    ) -> bool {
        let Some(model) = snapshot.model(name) else {
            return true;
        };

        let dependents = graph::dependent_models(snapshot, name);
        if !dependents.is_empty() {
            tracing::debug!(
                model = %name,
                dependents = ?dependents.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "model has registered dependents; delete blocked"
            );
            return false;
        }

        for introduced in model.introduced_names() {
            if oracle::is_in_use_within(usage, &introduced, timeout) {
                tracing::debug!(model = %name, definition = %introduced, "definition in use; delete blocked");
                return false;
            }
        }
        true
    }
}

fn check_class(
    current: &CompiledClass,
    candidate: &CompiledClass,
    violations: &mut Vec<CompatibilityViolation>,
) {
    if current.is_aspect != candidate.is_aspect {
        violations.push(CompatibilityViolation::ClassKindChanged {
            name: current.name.to_string(),
        });
    }
    if current.parent != candidate.parent {
        violations.push(CompatibilityViolation::ParentChanged {
            class: current.name.to_string(),
            old: display_opt(&current.parent),
            new: display_opt(&candidate.parent),
        });
    }
    // Frozen in both directions: additions and removals both fail.
    if current.mandatory_aspects != candidate.mandatory_aspects {
        violations.push(CompatibilityViolation::MandatoryAspectsChanged {
            class: current.name.to_string(),
        });
    }

    for (name, property) in &current.properties {
        match candidate.properties.get(name) {
            None => violations.push(CompatibilityViolation::RemovedProperty {
                name: name.to_string(),
            }),
            Some(candidate_property) => {
                check_property(property, candidate_property, violations);
            }
        }
    }

    for (name, association) in &current.associations {
        match candidate.associations.get(name) {
            None => violations.push(CompatibilityViolation::RemovedAssociation {
                name: name.to_string(),
            }),
            Some(candidate_association) => {
                check_association(association, candidate_association, violations);
            }
        }
    }
}

fn check_property(
    current: &CompiledProperty,
    candidate: &CompiledProperty,
    violations: &mut Vec<CompatibilityViolation>,
) {
    if !current.data_type.widens_to(candidate.data_type) {
        violations.push(CompatibilityViolation::PropertyTypeNarrowed {
            property: current.name.to_string(),
            old: format!("{:?}", current.data_type),
            new: format!("{:?}", candidate.data_type),
        });
    }
    if !current.mandatory && candidate.mandatory {
        violations.push(CompatibilityViolation::PropertyMadeMandatory {
            property: current.name.to_string(),
        });
    }
    // Conservative: dropping constraints widens, adding or altering one
    // tightens and would invalidate stored values.
    let tightened = candidate
        .constraints
        .iter()
        .any(|c| !current.constraints.contains(c));
    if tightened {
        violations.push(CompatibilityViolation::ConstraintsTightened {
            property: current.name.to_string(),
        });
    }
}

fn check_association(
    current: &CompiledAssociation,
    candidate: &CompiledAssociation,
    violations: &mut Vec<CompatibilityViolation>,
) {
    let name = current.name.to_string();

    if current.is_child() != candidate.is_child() {
        violations.push(CompatibilityViolation::AssociationChanged {
            association: name,
            detail: "changed between peer and child association".to_string(),
        });
        return;
    }

    for (label, old_end, new_end) in [
        ("source", &current.source, &candidate.source),
        ("target", &current.target, &candidate.target),
    ] {
        if old_end.many && !new_end.many {
            violations.push(CompatibilityViolation::CardinalityReduced {
                association: name.clone(),
                detail: format!("{label} end changed from many to single"),
            });
        }
        if !old_end.mandatory && new_end.mandatory {
            violations.push(CompatibilityViolation::CardinalityReduced {
                association: name.clone(),
                detail: format!("{label} end became mandatory"),
            });
        }
        if old_end.class != new_end.class {
            violations.push(CompatibilityViolation::AssociationChanged {
                association: name.clone(),
                detail: format!("{label} end class constraint changed"),
            });
        }
    }

    if let (Some(old_child), Some(new_child)) = (&current.child, &candidate.child) {
        if old_child.allow_duplicate_child_name && !new_child.allow_duplicate_child_name {
            violations.push(CompatibilityViolation::CardinalityReduced {
                association: name.clone(),
                detail: "duplicate child names no longer allowed".to_string(),
            });
        }
        if old_child.required_child_name.is_none() && new_child.required_child_name.is_some() {
            violations.push(CompatibilityViolation::CardinalityReduced {
                association: name,
                detail: "required child name was introduced".to_string(),
            });
        }
    }
}

fn display_opt(name: &Option<QName>) -> String {
    match name {
        Some(q) => q.to_string(),
        None => "<none>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ModelCompiler;
    use crate::definition::{DataType, ModelDefinition};
    use crate::oracle::NoUsageOracle;

    fn compile_against(
        definition: &ModelDefinition,
        snapshot: &RegistrySnapshot,
    ) -> CompiledModel {
        ModelCompiler::new(snapshot).compile(definition).unwrap()
    }

    fn registered(definition: &ModelDefinition) -> RegistrySnapshot {
        let empty = RegistrySnapshot::empty();
        let compiled = compile_against(definition, &empty);
        empty.with_model(Arc::new(compiled))
    }

    fn model_v1() -> ModelDefinition {
        let mut model = ModelDefinition::new("test1:model1");
        model.add_namespace("urn:test:model1", "test1");
        {
            let t = model.create_type("test1:type1");
            t.create_property("test1:prop1", DataType::Text);
        }
        model
    }

    #[test]
    fn test_new_model_is_admissible() {
        let snapshot = RegistrySnapshot::empty();
        let candidate = compile_against(&model_v1(), &snapshot);
        assert!(CompatibilityChecker::new()
            .validate_update(&candidate, &snapshot)
            .is_ok());
    }

    #[test]
    fn test_additive_update_is_admissible() {
        let snapshot = registered(&model_v1());
        let mut def = model_v1();
        def.types[0].create_property("test1:prop2", DataType::Int);
        def.create_aspect("test1:newAspect");
        let candidate = compile_against(&def, &snapshot);

        assert!(CompatibilityChecker::new()
            .validate_update(&candidate, &snapshot)
            .is_ok());
    }

    #[test]
    fn test_removed_property_rejected() {
        let snapshot = registered(&model_v1());
        let mut def = model_v1();
        def.types[0].properties.clear();
        let candidate = compile_against(&def, &snapshot);

        let err = CompatibilityChecker::new()
            .validate_update(&candidate, &snapshot)
            .unwrap_err();
        match err {
            DictionaryError::IncompatibleModelChange { violations, .. } => {
                assert!(matches!(
                    violations[0],
                    CompatibilityViolation::RemovedProperty { .. }
                ));
            }
            other => panic!("expected IncompatibleModelChange, got {other}"),
        }
    }

    #[test]
    fn test_removed_type_rejected() {
        let snapshot = registered(&model_v1());
        let mut def = ModelDefinition::new("test1:model1");
        def.add_namespace("urn:test:model1", "test1");
        let candidate = compile_against(&def, &snapshot);

        let err = CompatibilityChecker::new()
            .validate_update(&candidate, &snapshot)
            .unwrap_err();
        assert!(matches!(
            err,
            DictionaryError::IncompatibleModelChange { .. }
        ));
    }

    #[test]
    fn test_mandatory_aspect_freeze_in_both_directions() {
        let mut def_with_aspect = model_v1();
        def_with_aspect.create_aspect("test1:marker");
        def_with_aspect.types[0].add_mandatory_aspect("test1:marker");
        let snapshot = registered(&def_with_aspect);

        // Dropping the mandatory aspect fails even though everything else is
        // compatible.
        let mut dropped = model_v1();
        dropped.create_aspect("test1:marker");
        let candidate = compile_against(&dropped, &snapshot);
        let err = CompatibilityChecker::new()
            .validate_update(&candidate, &snapshot)
            .unwrap_err();
        let DictionaryError::IncompatibleModelChange { violations, .. } = err else {
            panic!("expected IncompatibleModelChange");
        };
        assert!(violations
            .iter()
            .any(|v| matches!(v, CompatibilityViolation::MandatoryAspectsChanged { .. })));

        // Newly adding one fails too.
        let plain_snapshot = registered(&model_v1());
        let mut added = model_v1();
        added.create_aspect("test1:marker");
        added.types[0].add_mandatory_aspect("test1:marker");
        let candidate = compile_against(&added, &plain_snapshot);
        assert!(CompatibilityChecker::new()
            .validate_update(&candidate, &plain_snapshot)
            .is_err());
    }

    #[test]
    fn test_type_narrowing_rejected_widening_allowed() {
        let mut def = model_v1();
        def.types[0].create_property("test1:count", DataType::Int);
        let snapshot = registered(&def);

        // Int -> Long widens: fine.
        let mut widened = def.clone();
        widened.types[0].properties[1].data_type = DataType::Long;
        let candidate = compile_against(&widened, &snapshot);
        assert!(CompatibilityChecker::new()
            .validate_update(&candidate, &snapshot)
            .is_ok());

        // Text -> Int narrows: rejected.
        let mut narrowed = def.clone();
        narrowed.types[0].properties[0].data_type = DataType::Int;
        let candidate = compile_against(&narrowed, &snapshot);
        let err = CompatibilityChecker::new()
            .validate_update(&candidate, &snapshot)
            .unwrap_err();
        let DictionaryError::IncompatibleModelChange { violations, .. } = err else {
            panic!("expected IncompatibleModelChange");
        };
        assert!(matches!(
            violations[0],
            CompatibilityViolation::PropertyTypeNarrowed { .. }
        ));
    }

    #[test]
    fn test_optional_to_mandatory_rejected() {
        let snapshot = registered(&model_v1());
        let mut def = model_v1();
        def.types[0].properties[0].mandatory = true;
        let candidate = compile_against(&def, &snapshot);

        let err = CompatibilityChecker::new()
            .validate_update(&candidate, &snapshot)
            .unwrap_err();
        let DictionaryError::IncompatibleModelChange { violations, .. } = err else {
            panic!("expected IncompatibleModelChange");
        };
        assert!(matches!(
            violations[0],
            CompatibilityViolation::PropertyMadeMandatory { .. }
        ));
    }

    #[test]
    fn test_constraint_tightening_rejected() {
        let snapshot = registered(&model_v1());
        let mut def = model_v1();
        def.types[0].properties[0]
            .constraints
            .push(crate::definition::ConstraintDeclaration {
                name: None,
                reference: None,
                constraint_type: Some("LENGTH".into()),
                description: None,
                parameters: vec![crate::definition::NamedValue::scalar("maxLength", "10")],
            });
        let candidate = compile_against(&def, &snapshot);

        let err = CompatibilityChecker::new()
            .validate_update(&candidate, &snapshot)
            .unwrap_err();
        let DictionaryError::IncompatibleModelChange { violations, .. } = err else {
            panic!("expected IncompatibleModelChange");
        };
        assert!(matches!(
            violations[0],
            CompatibilityViolation::ConstraintsTightened { .. }
        ));
    }

    #[test]
    fn test_cardinality_reduction_rejected() {
        let mut def = model_v1();
        def.types[0].create_association("test1:refs").target.many = true;
        let snapshot = registered(&def);

        let mut reduced = def.clone();
        reduced.types[0].associations[0].target.many = false;
        let candidate = compile_against(&reduced, &snapshot);

        let err = CompatibilityChecker::new()
            .validate_update(&candidate, &snapshot)
            .unwrap_err();
        let DictionaryError::IncompatibleModelChange { violations, .. } = err else {
            panic!("expected IncompatibleModelChange");
        };
        assert!(matches!(
            violations[0],
            CompatibilityViolation::CardinalityReduced { .. }
        ));
    }

    #[test]
    fn test_parent_change_rejected() {
        let mut def = model_v1();
        def.create_type("test1:base");
        def.create_type("test1:sub").set_parent("test1:base");
        let snapshot = registered(&def);

        let mut reparented = def.clone();
        reparented.types[2].parent = Some("test1:type1".into());
        let candidate = compile_against(&reparented, &snapshot);

        let err = CompatibilityChecker::new()
            .validate_update(&candidate, &snapshot)
            .unwrap_err();
        let DictionaryError::IncompatibleModelChange { violations, .. } = err else {
            panic!("expected IncompatibleModelChange");
        };
        assert!(matches!(
            violations[0],
            CompatibilityViolation::ParentChanged { .. }
        ));
    }

    #[test]
    fn test_strict_mode_rejects_benign_update() {
        let snapshot = registered(&model_v1());
        let mut def = model_v1();
        def.types[0].properties[0].title = Some("Renamed title".into());
        def.types[0].properties[0].indexed = Some(false);
        let candidate = compile_against(&def, &snapshot);

        assert!(CompatibilityChecker::new()
            .validate_update(&candidate, &snapshot)
            .is_ok());
        assert!(CompatibilityChecker::new()
            .strict()
            .validate_update(&candidate, &snapshot)
            .is_err());
    }

    #[test]
    fn test_can_delete_unregistered_model() {
        let snapshot = RegistrySnapshot::empty();
        let usage: Arc<dyn UsageOracle> = Arc::new(NoUsageOracle);
        assert!(CompatibilityChecker::new().can_delete(
            &QName::new("urn:test:model1", "model1"),
            &snapshot,
            &usage,
            Duration::from_millis(100),
        ));
    }
}
