//! Model compilation
//!
//! Turns a raw definition tree into a `CompiledModel` against a fixed registry
//! snapshot: prefix resolution, duplicate detection, constraint binding,
//! defaulting, and inheritance flattening with bounded cycle detection. The
//! compiler never touches the registry.

use std::collections::{BTreeMap, BTreeSet};

use crate::compiled::{
    AssociationEndpoint, ChildAssociationRules, CompiledAssociation, CompiledClass,
    CompiledConstraint, CompiledModel, CompiledProperty,
};
use crate::definition::{
    AssociationDeclaration, ClassDeclaration, ConstraintDeclaration, ModelDefinition,
    PropertyDeclaration,
};
use crate::error::{DictionaryError, Result};
use crate::namespace::{self, QName};
use crate::registry::RegistrySnapshot;

/// Bound on parent-chain traversal; guarantees termination even if the visited
/// set were defeated by pathological graphs.
pub const DEFAULT_MAX_INHERITANCE_DEPTH: usize = 128;

/// Compiles one model definition against one registry snapshot.
///
/// The snapshot must be treated as frozen for the duration of the compile;
/// concurrent registry writers are serialized elsewhere.
pub struct ModelCompiler<'a> {
    snapshot: &'a RegistrySnapshot,
    max_inheritance_depth: usize,
}

impl<'a> ModelCompiler<'a> {
    pub fn new(snapshot: &'a RegistrySnapshot) -> Self {
        Self {
            snapshot,
            max_inheritance_depth: DEFAULT_MAX_INHERITANCE_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_inheritance_depth: usize) -> Self {
        self.max_inheritance_depth = max_inheritance_depth;
        self
    }

    pub fn compile(&self, definition: &ModelDefinition) -> Result<CompiledModel> {
        let prefixes = self.build_prefix_table(definition)?;
        let model_name = self.resolve(definition, &prefixes, &definition.name)?;

        // A URI may be owned by at most one model registry-wide. The model
        // being updated naturally re-declares its own URIs.
        for ns in &definition.namespaces {
            if let Some(owner) = self.snapshot.declaring_model(&ns.uri) {
                if owner != &model_name {
                    return Err(DictionaryError::NamespaceConflict {
                        uri: ns.uri.clone(),
                        declared_by: owner.to_string(),
                    });
                }
            }
        }

        let constraints = self.compile_shared_constraints(definition, &prefixes)?;
        let mut classes = self.compile_classes(definition, &prefixes, &constraints, &model_name)?;
        self.resolve_class_graph(&mut classes)?;

        Ok(CompiledModel::new(
            model_name,
            definition.namespaces.clone(),
            definition.imports.clone(),
            constraints,
            classes,
            definition.clone(),
        ))
    }

    /// Declared namespaces plus imports, keyed by prefix
    fn build_prefix_table(&self, definition: &ModelDefinition) -> Result<BTreeMap<String, String>> {
        let mut prefixes: BTreeMap<String, String> = BTreeMap::new();

        for ns in &definition.namespaces {
            if !namespace::is_valid_uri(&ns.uri) {
                return Err(DictionaryError::InvalidName {
                    name: ns.uri.clone(),
                    reason: "malformed namespace URI".to_string(),
                });
            }
            if !namespace::is_valid_prefix(&ns.prefix) {
                return Err(DictionaryError::InvalidName {
                    name: ns.prefix.clone(),
                    reason: "malformed namespace prefix".to_string(),
                });
            }
            if prefixes.insert(ns.prefix.clone(), ns.uri.clone()).is_some() {
                return Err(DictionaryError::DuplicateDefinition {
                    model: definition.name.clone(),
                    name: ns.prefix.clone(),
                });
            }
        }

        for import in &definition.imports {
            if self.snapshot.declaring_model(&import.uri).is_none() {
                return Err(DictionaryError::UnresolvedImport {
                    model: definition.name.clone(),
                    uri: import.uri.clone(),
                });
            }
            if prefixes
                .insert(import.prefix.clone(), import.uri.clone())
                .is_some()
            {
                return Err(DictionaryError::DuplicateDefinition {
                    model: definition.name.clone(),
                    name: import.prefix.clone(),
                });
            }
        }

        Ok(prefixes)
    }

    fn resolve(
        &self,
        definition: &ModelDefinition,
        prefixes: &BTreeMap<String, String>,
        prefixed: &str,
    ) -> Result<QName> {
        let (prefix, local) = namespace::split_prefixed(prefixed)?;
        let uri = prefixes.get(prefix).ok_or_else(|| {
            DictionaryError::UnresolvedNamespace {
                model: definition.name.clone(),
                prefix: prefix.to_string(),
                suggestion: namespace::suggest_prefix(prefix, prefixes.keys().map(String::as_str)),
            }
        })?;
        if !namespace::is_valid_local_name(local) {
            return Err(DictionaryError::InvalidName {
                name: prefixed.to_string(),
                reason: "malformed local name".to_string(),
            });
        }
        Ok(QName::new(uri.clone(), local))
    }

    fn compile_shared_constraints(
        &self,
        definition: &ModelDefinition,
        prefixes: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<QName, CompiledConstraint>> {
        let mut constraints = BTreeMap::new();
        for decl in &definition.constraints {
            let raw_name = decl.name.as_deref().ok_or_else(|| {
                DictionaryError::InvalidConstraint {
                    name: "<anonymous>".to_string(),
                    reason: "model-level constraints must be named".to_string(),
                }
            })?;
            if decl.reference.is_some() {
                return Err(DictionaryError::InvalidConstraint {
                    name: raw_name.to_string(),
                    reason: "shared constraints must be defined inline, not by ref".to_string(),
                });
            }
            let name = self.resolve(definition, prefixes, raw_name)?;
            let compiled = compile_inline_constraint(decl, Some(name.clone()), raw_name)?;
            if constraints.insert(name.clone(), compiled).is_some() {
                return Err(DictionaryError::DuplicateDefinition {
                    model: definition.name.clone(),
                    name: raw_name.to_string(),
                });
            }
        }
        Ok(constraints)
    }

    fn compile_classes(
        &self,
        definition: &ModelDefinition,
        prefixes: &BTreeMap<String, String>,
        shared_constraints: &BTreeMap<QName, CompiledConstraint>,
        model_name: &QName,
    ) -> Result<BTreeMap<QName, CompiledClass>> {
        let mut classes = BTreeMap::new();
        // Property and association names are unique across the whole model
        let mut declared: BTreeSet<QName> = BTreeSet::new();

        let declarations = definition
            .types
            .iter()
            .map(|c| (c, false))
            .chain(definition.aspects.iter().map(|c| (c, true)));

        for (decl, is_aspect) in declarations {
            let class =
                self.compile_class(definition, prefixes, shared_constraints, decl, is_aspect, &mut declared)?;

            // The same class may not be introduced twice, in this model or by
            // a different registered model.
            if let Some(owner) = self.snapshot.class_owner(&class.name) {
                if owner != model_name {
                    return Err(DictionaryError::DuplicateDefinition {
                        model: definition.name.clone(),
                        name: decl.name.clone(),
                    });
                }
            }
            if classes.insert(class.name.clone(), class).is_some() {
                return Err(DictionaryError::DuplicateDefinition {
                    model: definition.name.clone(),
                    name: decl.name.clone(),
                });
            }
        }
        Ok(classes)
    }

    fn compile_class(
        &self,
        definition: &ModelDefinition,
        prefixes: &BTreeMap<String, String>,
        shared_constraints: &BTreeMap<QName, CompiledConstraint>,
        decl: &ClassDeclaration,
        is_aspect: bool,
        declared: &mut BTreeSet<QName>,
    ) -> Result<CompiledClass> {
        let name = self.resolve(definition, prefixes, &decl.name)?;
        let parent = decl
            .parent
            .as_deref()
            .map(|p| self.resolve(definition, prefixes, p))
            .transpose()?;

        let mut mandatory_aspects = BTreeSet::new();
        for aspect in &decl.mandatory_aspects {
            mandatory_aspects.insert(self.resolve(definition, prefixes, aspect)?);
        }

        let mut properties = BTreeMap::new();
        for prop in &decl.properties {
            let compiled = self.compile_property(definition, prefixes, shared_constraints, prop)?;
            if !declared.insert(compiled.name.clone()) {
                return Err(DictionaryError::DuplicateDefinition {
                    model: definition.name.clone(),
                    name: prop.name.clone(),
                });
            }
            properties.insert(compiled.name.clone(), compiled);
        }

        let mut associations = BTreeMap::new();
        for assoc in &decl.associations {
            let compiled = self.compile_association(definition, prefixes, assoc)?;
            if !declared.insert(compiled.name.clone()) {
                return Err(DictionaryError::DuplicateDefinition {
                    model: definition.name.clone(),
                    name: assoc.name.clone(),
                });
            }
            associations.insert(compiled.name.clone(), compiled);
        }

        Ok(CompiledClass {
            name,
            is_aspect,
            title: decl.title.clone(),
            description: decl.description.clone(),
            parent,
            mandatory_aspects,
            properties,
            associations,
            // Filled in by resolve_class_graph once all classes exist
            flattened_properties: BTreeMap::new(),
            flattened_associations: BTreeMap::new(),
        })
    }

    fn compile_property(
        &self,
        definition: &ModelDefinition,
        prefixes: &BTreeMap<String, String>,
        shared_constraints: &BTreeMap<QName, CompiledConstraint>,
        decl: &PropertyDeclaration,
    ) -> Result<CompiledProperty> {
        let name = self.resolve(definition, prefixes, &decl.name)?;

        let mut constraints = Vec::new();
        for c in &decl.constraints {
            constraints.push(self.compile_property_constraint(
                definition,
                prefixes,
                shared_constraints,
                &decl.name,
                c,
            )?);
        }

        Ok(CompiledProperty {
            name,
            data_type: decl.data_type,
            mandatory: decl.mandatory,
            default_value: decl.default_value.clone(),
            indexed: decl.indexed.unwrap_or(true),
            tokenisation: decl.tokenisation.unwrap_or_default(),
            constraints,
        })
    }

    fn compile_property_constraint(
        &self,
        definition: &ModelDefinition,
        prefixes: &BTreeMap<String, String>,
        shared_constraints: &BTreeMap<QName, CompiledConstraint>,
        property: &str,
        decl: &ConstraintDeclaration,
    ) -> Result<CompiledConstraint> {
        if let Some(reference) = decl.reference.as_deref() {
            // Bind the ref: candidate-local shared constraints first, then the
            // rest of the registry.
            let target = self.resolve(definition, prefixes, reference)?;
            let shared = shared_constraints
                .get(&target)
                .or_else(|| self.snapshot.shared_constraint(&target))
                .ok_or_else(|| DictionaryError::UnresolvedConstraintRef {
                    property: property.to_string(),
                    reference: reference.to_string(),
                })?;
            return Ok(shared.clone());
        }

        let name = decl
            .name
            .as_deref()
            .map(|n| self.resolve(definition, prefixes, n))
            .transpose()?;
        compile_inline_constraint(decl, name, property)
    }

    fn compile_association(
        &self,
        definition: &ModelDefinition,
        prefixes: &BTreeMap<String, String>,
        decl: &AssociationDeclaration,
    ) -> Result<CompiledAssociation> {
        let name = self.resolve(definition, prefixes, &decl.name)?;
        let source = AssociationEndpoint {
            class: decl
                .source
                .class
                .as_deref()
                .map(|c| self.resolve(definition, prefixes, c))
                .transpose()?,
            mandatory: decl.source.mandatory,
            many: decl.source.many,
        };
        let target = AssociationEndpoint {
            class: decl
                .target
                .class
                .as_deref()
                .map(|c| self.resolve(definition, prefixes, c))
                .transpose()?,
            mandatory: decl.target.mandatory,
            many: decl.target.many,
        };
        let child = decl.child.as_ref().map(|extras| ChildAssociationRules {
            required_child_name: extras.required_child_name.clone(),
            allow_duplicate_child_name: extras.allow_duplicate_child_name.unwrap_or(true),
            propagate_timestamps: extras.propagate_timestamps.unwrap_or(false),
        });
        Ok(CompiledAssociation {
            name,
            source,
            target,
            child,
        })
    }

    /// Second pass: verify parent chains, mandatory aspects and association
    /// endpoints against the candidate plus the snapshot, then flatten
    /// inheritance for lookup.
    fn resolve_class_graph(&self, classes: &mut BTreeMap<QName, CompiledClass>) -> Result<()> {
        let lookup = |name: &QName, classes: &BTreeMap<QName, CompiledClass>| -> Option<CompiledClass> {
            classes
                .get(name)
                .cloned()
                .or_else(|| self.snapshot.class(name).cloned())
        };

        let mut flattened: Vec<(
            QName,
            BTreeMap<QName, CompiledProperty>,
            BTreeMap<QName, CompiledAssociation>,
        )> = Vec::new();

        for class in classes.values() {
            // Walk the parent chain root-ward, bounded and cycle-checked
            let mut chain = vec![class.clone()];
            let mut visited: BTreeSet<QName> = BTreeSet::new();
            visited.insert(class.name.clone());
            let mut cursor = class.parent.clone();
            let mut depth = 0usize;

            while let Some(parent_name) = cursor {
                depth += 1;
                if depth > self.max_inheritance_depth {
                    return Err(DictionaryError::InheritanceTooDeep {
                        class: class.name.to_string(),
                        max_depth: self.max_inheritance_depth,
                    });
                }
                if !visited.insert(parent_name.clone()) {
                    let mut names: Vec<String> =
                        chain.iter().map(|c| c.name.to_string()).collect();
                    names.push(parent_name.to_string());
                    return Err(DictionaryError::CyclicInheritance {
                        class: class.name.to_string(),
                        chain: names.join(" -> "),
                    });
                }
                let parent = lookup(&parent_name, classes).ok_or_else(|| {
                    DictionaryError::UnresolvedClass {
                        name: parent_name.to_string(),
                        referenced_by: class.name.to_string(),
                    }
                })?;
                cursor = parent.parent.clone();
                chain.push(parent);
            }

            // Root-first so nearer declarations override inherited ones
            let mut props = BTreeMap::new();
            let mut assocs = BTreeMap::new();
            for ancestor in chain.iter().rev() {
                props.extend(ancestor.properties.clone());
                assocs.extend(ancestor.associations.clone());
            }

            for aspect in &class.mandatory_aspects {
                match lookup(aspect, classes) {
                    Some(c) if c.is_aspect => {}
                    _ => {
                        return Err(DictionaryError::InvalidMandatoryAspect {
                            class: class.name.to_string(),
                            aspect: aspect.to_string(),
                        })
                    }
                }
            }

            for assoc in class.associations.values() {
                for endpoint in [&assoc.source, &assoc.target] {
                    if let Some(endpoint_class) = &endpoint.class {
                        if lookup(endpoint_class, classes).is_none() {
                            return Err(DictionaryError::UnresolvedClass {
                                name: endpoint_class.to_string(),
                                referenced_by: assoc.name.to_string(),
                            });
                        }
                    }
                }
            }

            flattened.push((class.name.clone(), props, assocs));
        }

        for (name, props, assocs) in flattened {
            if let Some(class) = classes.get_mut(&name) {
                class.flattened_properties = props;
                class.flattened_associations = assocs;
            }
        }
        Ok(())
    }
}

fn compile_inline_constraint(
    decl: &ConstraintDeclaration,
    name: Option<QName>,
    context: &str,
) -> Result<CompiledConstraint> {
    let constraint_type =
        decl.constraint_type
            .clone()
            .ok_or_else(|| DictionaryError::InvalidConstraint {
                name: context.to_string(),
                reason: "constraint has neither a type nor a ref".to_string(),
            })?;
    for parameter in &decl.parameters {
        if !parameter.is_well_formed() {
            return Err(DictionaryError::InvalidConstraint {
                name: context.to_string(),
                reason: format!(
                    "parameter '{}' must populate exactly one of value/values",
                    parameter.name
                ),
            });
        }
    }
    Ok(CompiledConstraint {
        name,
        constraint_type,
        description: decl.description.clone(),
        parameters: decl.parameters.clone(),
    })
}
