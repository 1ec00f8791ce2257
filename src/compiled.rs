//! Compiled models
//!
//! The validated, resolved form of a model definition: every prefix resolved to
//! a qualified name, inheritance flattened for lookup (with the parent link
//! retained for re-validation), constraints bound, defaults applied. Compiled
//! models are immutable; an update produces a new one that atomically
//! supersedes the old in the registry.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use semver::Version;

use crate::checksum::Checksum;
use crate::definition::{DataType, ModelDefinition, NamedValue, Tokenisation};
use crate::namespace::{Namespace, QName};

/// A constraint bound to concrete parameter values.
///
/// `ref`s are resolved at compile time: a property-level reference to a shared
/// constraint compiles to a copy of the shared definition with `name` set to
/// the shared constraint's qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledConstraint {
    pub name: Option<QName>,
    pub constraint_type: String,
    pub description: Option<String>,
    pub parameters: Vec<NamedValue>,
}

/// A fully resolved property: no optional field remains ambiguous
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProperty {
    pub name: QName,
    pub data_type: DataType,
    pub mandatory: bool,
    pub default_value: Option<String>,
    pub indexed: bool,
    pub tokenisation: Tokenisation,
    pub constraints: Vec<CompiledConstraint>,
}

/// One resolved end of an association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationEndpoint {
    pub class: Option<QName>,
    pub mandatory: bool,
    pub many: bool,
}

/// Child-association rules with lazy defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildAssociationRules {
    pub required_child_name: Option<String>,
    pub allow_duplicate_child_name: bool,
    pub propagate_timestamps: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledAssociation {
    pub name: QName,
    pub source: AssociationEndpoint,
    pub target: AssociationEndpoint,
    pub child: Option<ChildAssociationRules>,
}

impl CompiledAssociation {
    pub fn is_child(&self) -> bool {
        self.child.is_some()
    }
}

/// A resolved type or aspect
#[derive(Debug, Clone)]
pub struct CompiledClass {
    pub name: QName,
    pub is_aspect: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Parent link, retained for re-validation even though lookups are flattened
    pub parent: Option<QName>,
    pub mandatory_aspects: BTreeSet<QName>,
    /// Properties declared directly on this class
    pub properties: BTreeMap<QName, CompiledProperty>,
    /// Associations declared directly on this class
    pub associations: BTreeMap<QName, CompiledAssociation>,
    /// Own + inherited properties, flattened at compile time
    pub flattened_properties: BTreeMap<QName, CompiledProperty>,
    /// Own + inherited associations, flattened at compile time
    pub flattened_associations: BTreeMap<QName, CompiledAssociation>,
}

impl CompiledClass {
    /// Look up a property on this class or any ancestor
    pub fn property(&self, name: &QName) -> Option<&CompiledProperty> {
        self.flattened_properties.get(name)
    }

    /// Look up an association on this class or any ancestor
    pub fn association(&self, name: &QName) -> Option<&CompiledAssociation> {
        self.flattened_associations.get(name)
    }
}

/// An immutable, fully resolved model
#[derive(Debug, Clone)]
pub struct CompiledModel {
    name: QName,
    description: Option<String>,
    author: Option<String>,
    version: Option<Version>,
    namespaces: Vec<Namespace>,
    imports: Vec<Namespace>,
    constraints: BTreeMap<QName, CompiledConstraint>,
    classes: BTreeMap<QName, CompiledClass>,
    checksum: Checksum,
    compiled_at: DateTime<Utc>,
    definition: ModelDefinition,
}

impl CompiledModel {
    pub(crate) fn new(
        name: QName,
        namespaces: Vec<Namespace>,
        imports: Vec<Namespace>,
        constraints: BTreeMap<QName, CompiledConstraint>,
        classes: BTreeMap<QName, CompiledClass>,
        definition: ModelDefinition,
    ) -> Self {
        let checksum = Checksum::from_definition(&definition);
        Self {
            name,
            description: definition.description.clone(),
            author: definition.author.clone(),
            version: definition.version.clone(),
            namespaces,
            imports,
            constraints,
            classes,
            checksum,
            compiled_at: Utc::now(),
            definition,
        }
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn imports(&self) -> &[Namespace] {
        &self.imports
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    pub fn compiled_at(&self) -> DateTime<Utc> {
        self.compiled_at
    }

    /// The raw definition this model was compiled from
    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }

    pub fn classes(&self) -> impl Iterator<Item = &CompiledClass> {
        self.classes.values()
    }

    pub fn class(&self, name: &QName) -> Option<&CompiledClass> {
        self.classes.get(name)
    }

    pub fn class_map(&self) -> &BTreeMap<QName, CompiledClass> {
        &self.classes
    }

    pub fn types(&self) -> impl Iterator<Item = &CompiledClass> {
        self.classes.values().filter(|c| !c.is_aspect)
    }

    pub fn aspects(&self) -> impl Iterator<Item = &CompiledClass> {
        self.classes.values().filter(|c| c.is_aspect)
    }

    pub fn shared_constraint(&self, name: &QName) -> Option<&CompiledConstraint> {
        self.constraints.get(name)
    }

    pub fn shared_constraints(&self) -> &BTreeMap<QName, CompiledConstraint> {
        &self.constraints
    }

    /// URIs this model declares (and therefore owns in the registry)
    pub fn declared_uris(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(|ns| ns.uri.as_str())
    }

    /// Every qualified name this model introduces: classes plus the properties
    /// and associations declared on them. Deletion is gated on all of these
    /// being unused.
    pub fn introduced_names(&self) -> Vec<QName> {
        let mut names = Vec::new();
        for class in self.classes.values() {
            names.push(class.name.clone());
            names.extend(class.properties.keys().cloned());
            names.extend(class.associations.keys().cloned());
        }
        names
    }
}
