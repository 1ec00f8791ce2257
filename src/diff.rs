//! Structural model diffing
//!
//! Computes element-level differences between two compiled models: which
//! types, aspects, properties, associations and namespaces were created,
//! updated, removed, or left unchanged. The compatibility validator interprets
//! the diff; the admin CLI prints it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compiled::{CompiledClass, CompiledModel};
use crate::namespace::QName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Type,
    Aspect,
    Property,
    Association,
    Namespace,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ElementKind::Type => "type",
            ElementKind::Aspect => "aspect",
            ElementKind::Property => "property",
            ElementKind::Association => "association",
            ElementKind::Namespace => "namespace",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Created,
    Updated,
    Removed,
    Unchanged,
}

/// One element-level difference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDiff {
    pub kind: ElementKind,
    pub name: QName,
    pub status: DiffStatus,
    /// Human-readable detail for updated elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ElementDiff {
    fn new(kind: ElementKind, name: QName, status: DiffStatus) -> Self {
        Self {
            kind,
            name,
            status,
            detail: None,
        }
    }

    fn updated(kind: ElementKind, name: QName, detail: impl Into<String>) -> Self {
        Self {
            kind,
            name,
            status: DiffStatus::Updated,
            detail: Some(detail.into()),
        }
    }
}

/// Diff `old` against `new`, element by element
pub fn diff_models(old: &CompiledModel, new: &CompiledModel) -> Vec<ElementDiff> {
    let mut diffs = Vec::new();

    for uri in old.declared_uris() {
        if !new.declared_uris().any(|u| u == uri) {
            diffs.push(ElementDiff::new(
                ElementKind::Namespace,
                QName::new(uri, ""),
                DiffStatus::Removed,
            ));
        }
    }
    for uri in new.declared_uris() {
        if !old.declared_uris().any(|u| u == uri) {
            diffs.push(ElementDiff::new(
                ElementKind::Namespace,
                QName::new(uri, ""),
                DiffStatus::Created,
            ));
        }
    }

    for old_class in old.classes() {
        let kind = class_kind(old_class);
        match new.class(&old_class.name) {
            None => {
                diffs.push(ElementDiff::new(
                    kind,
                    old_class.name.clone(),
                    DiffStatus::Removed,
                ));
                for prop in old_class.properties.keys() {
                    diffs.push(ElementDiff::new(
                        ElementKind::Property,
                        prop.clone(),
                        DiffStatus::Removed,
                    ));
                }
                for assoc in old_class.associations.keys() {
                    diffs.push(ElementDiff::new(
                        ElementKind::Association,
                        assoc.clone(),
                        DiffStatus::Removed,
                    ));
                }
            }
            Some(new_class) => diff_class(old_class, new_class, &mut diffs),
        }
    }
    for new_class in new.classes() {
        if old.class(&new_class.name).is_none() {
            diffs.push(ElementDiff::new(
                class_kind(new_class),
                new_class.name.clone(),
                DiffStatus::Created,
            ));
            for prop in new_class.properties.keys() {
                diffs.push(ElementDiff::new(
                    ElementKind::Property,
                    prop.clone(),
                    DiffStatus::Created,
                ));
            }
            for assoc in new_class.associations.keys() {
                diffs.push(ElementDiff::new(
                    ElementKind::Association,
                    assoc.clone(),
                    DiffStatus::Created,
                ));
            }
        }
    }

    diffs
}

fn class_kind(class: &CompiledClass) -> ElementKind {
    if class.is_aspect {
        ElementKind::Aspect
    } else {
        ElementKind::Type
    }
}

fn diff_class(old: &CompiledClass, new: &CompiledClass, diffs: &mut Vec<ElementDiff>) {
    let kind = class_kind(old);
    let mut changed = Vec::new();

    if old.is_aspect != new.is_aspect {
        changed.push("kind changed between type and aspect".to_string());
    }
    if old.parent != new.parent {
        changed.push(format!(
            "parent changed from {} to {}",
            display_opt(&old.parent),
            display_opt(&new.parent)
        ));
    }
    if old.mandatory_aspects != new.mandatory_aspects {
        changed.push("mandatory-aspect set changed".to_string());
    }

    if changed.is_empty() {
        diffs.push(ElementDiff::new(
            kind,
            old.name.clone(),
            DiffStatus::Unchanged,
        ));
    } else {
        diffs.push(ElementDiff::updated(
            kind,
            old.name.clone(),
            changed.join("; "),
        ));
    }

    for (name, old_prop) in &old.properties {
        match new.properties.get(name) {
            None => diffs.push(ElementDiff::new(
                ElementKind::Property,
                name.clone(),
                DiffStatus::Removed,
            )),
            Some(new_prop) if new_prop == old_prop => diffs.push(ElementDiff::new(
                ElementKind::Property,
                name.clone(),
                DiffStatus::Unchanged,
            )),
            Some(new_prop) => {
                let mut details = Vec::new();
                if old_prop.data_type != new_prop.data_type {
                    details.push(format!(
                        "type {:?} -> {:?}",
                        old_prop.data_type, new_prop.data_type
                    ));
                }
                if old_prop.mandatory != new_prop.mandatory {
                    details.push(format!(
                        "mandatory {} -> {}",
                        old_prop.mandatory, new_prop.mandatory
                    ));
                }
                if old_prop.constraints != new_prop.constraints {
                    details.push("constraints changed".to_string());
                }
                if old_prop.tokenisation != new_prop.tokenisation {
                    details.push("tokenisation changed".to_string());
                }
                if old_prop.indexed != new_prop.indexed {
                    details.push("indexing changed".to_string());
                }
                if old_prop.default_value != new_prop.default_value {
                    details.push("default value changed".to_string());
                }
                diffs.push(ElementDiff::updated(
                    ElementKind::Property,
                    name.clone(),
                    details.join("; "),
                ));
            }
        }
    }
    for name in new.properties.keys() {
        if !old.properties.contains_key(name) {
            diffs.push(ElementDiff::new(
                ElementKind::Property,
                name.clone(),
                DiffStatus::Created,
            ));
        }
    }

    for (name, old_assoc) in &old.associations {
        match new.associations.get(name) {
            None => diffs.push(ElementDiff::new(
                ElementKind::Association,
                name.clone(),
                DiffStatus::Removed,
            )),
            Some(new_assoc) if new_assoc == old_assoc => diffs.push(ElementDiff::new(
                ElementKind::Association,
                name.clone(),
                DiffStatus::Unchanged,
            )),
            Some(_) => diffs.push(ElementDiff::updated(
                ElementKind::Association,
                name.clone(),
                "association shape changed",
            )),
        }
    }
    for name in new.associations.keys() {
        if !old.associations.contains_key(name) {
            diffs.push(ElementDiff::new(
                ElementKind::Association,
                name.clone(),
                DiffStatus::Created,
            ));
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
    use crate::registry::RegistrySnapshot;

    fn compile(definition: &ModelDefinition) -> CompiledModel {
        let snapshot = RegistrySnapshot::empty();
        ModelCompiler::new(&snapshot).compile(definition).unwrap()
    }

    fn model_v1() -> ModelDefinition {
        let mut model = ModelDefinition::new("test1:model1");
        model.add_namespace("urn:test:model1", "test1");
        model
            .create_type("test1:type1")
            .create_property("test1:prop1", DataType::Text);
        model
    }

    #[test]
    fn test_identical_models_are_unchanged() {
        let old = compile(&model_v1());
        let new = compile(&model_v1());
        let diffs = diff_models(&old, &new);
        assert!(diffs.iter().all(|d| d.status == DiffStatus::Unchanged));
    }

    #[test]
    fn test_added_property_reported_created() {
        let old = compile(&model_v1());
        let mut def = model_v1();
        def.types[0].create_property("test1:prop2", DataType::Int);
        let new = compile(&def);

        let diffs = diff_models(&old, &new);
        let created: Vec<_> = diffs
            .iter()
            .filter(|d| d.status == DiffStatus::Created)
            .collect();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].kind, ElementKind::Property);
        assert_eq!(created[0].name.local_name(), "prop2");
    }

    #[test]
    fn test_removed_type_reported_removed() {
        let old = compile(&model_v1());
        let mut def = ModelDefinition::new("test1:model1");
        def.add_namespace("urn:test:model1", "test1");
        let new = compile(&def);

        let diffs = diff_models(&old, &new);
        assert!(diffs
            .iter()
            .any(|d| d.kind == ElementKind::Type && d.status == DiffStatus::Removed));
        assert!(diffs
            .iter()
            .any(|d| d.kind == ElementKind::Property && d.status == DiffStatus::Removed));
    }

    #[test]
    fn test_narrowed_property_reported_updated() {
        let old = compile(&model_v1());
        let mut def = model_v1();
        def.types[0].properties[0].data_type = DataType::Int;
        let new = compile(&def);

        let diffs = diff_models(&old, &new);
        let updated: Vec<_> = diffs
            .iter()
            .filter(|d| d.status == DiffStatus::Updated)
            .collect();
        assert_eq!(updated.len(), 1);
        assert!(updated[0].detail.as_ref().unwrap().contains("type"));
    }
}
