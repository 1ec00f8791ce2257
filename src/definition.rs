//! Model definition trees
//!
//! The raw, author-supplied form of one model: the namespaces it declares,
//! the namespaces it imports, shared constraints, and type/aspect definitions.
//! Names at this level are prefixed strings ("test1:type1"); resolution to
//! qualified names happens in the compiler. The definition tree is inert data:
//! nothing here validates anything.

use chrono::NaiveDate;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::namespace::Namespace;

/// Data type of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Text,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Date,
    DateTime,
    NodeRef,
    Content,
    Any,
}

impl DataType {
    /// Whether a stored value of `self` remains valid when the property is
    /// redeclared as `candidate`. Identity always widens; otherwise only a
    /// strictly larger value space qualifies.
    pub fn widens_to(self, candidate: DataType) -> bool {
        if self == candidate || candidate == DataType::Any {
            return true;
        }
        matches!(
            (self, candidate),
            (DataType::Int, DataType::Long)
                | (DataType::Float, DataType::Double)
                | (DataType::Date, DataType::DateTime)
        )
    }
}

/// Whether a property value participates in full-text search, exact-match
/// ordering, or both. Purely declarative at this layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tokenisation {
    #[default]
    Always,
    Never,
    Both,
}

/// A named constraint parameter: exactly one of the scalar or list slot is
/// populated. The compiler enforces the invariant; serde round-trips both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl NamedValue {
    pub fn scalar(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            values: None,
        }
    }

    pub fn list(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            values: Some(values),
        }
    }

    /// True when exactly one slot is populated
    pub fn is_well_formed(&self) -> bool {
        self.value.is_some() != self.values.is_some()
    }
}

/// A constraint attached to a property or declared at model level.
///
/// A model-level constraint must carry a `name`; a property-level one may
/// instead carry a `ref` pointing at a shared definition. Parameters round-trip
/// through compilation unchanged — evaluation is out of scope here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Reference to a shared constraint, as a prefixed name
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub constraint_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<NamedValue>,
}

/// A property declaration on a type or aspect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Absent means "indexed"; resolved at compile time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
    /// Absent means ALWAYS; resolved at compile time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenisation: Option<Tokenisation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintDeclaration>,
}

impl PropertyDeclaration {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            title: None,
            data_type,
            mandatory: false,
            default_value: None,
            indexed: None,
            tokenisation: None,
            constraints: Vec::new(),
        }
    }

    pub fn set_mandatory(&mut self, mandatory: bool) -> &mut Self {
        self.mandatory = mandatory;
        self
    }

    pub fn set_default_value(&mut self, value: impl Into<String>) -> &mut Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn set_tokenisation(&mut self, mode: Tokenisation) -> &mut Self {
        self.tokenisation = Some(mode);
        self
    }

    pub fn add_constraint(&mut self, constraint: ConstraintDeclaration) -> &mut Self {
        self.constraints.push(constraint);
        self
    }

    /// Attach a reference to a shared constraint
    pub fn add_constraint_ref(&mut self, reference: impl Into<String>) -> &mut Self {
        self.constraints.push(ConstraintDeclaration {
            reference: Some(reference.into()),
            ..Default::default()
        });
        self
    }
}

/// One end of an association
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDeclaration {
    /// Class the endpoint is constrained to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub many: bool,
}

/// Child-association extras. The two flags are lazily defaulted: absence means
/// "allow duplicates" / "don't propagate", never a sentinel error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildAssociationExtras {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_child_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_duplicate_child_name: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagate_timestamps: Option<bool>,
}

/// An association declaration; `child` present makes it a child association
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub source: EndpointDeclaration,
    #[serde(default)]
    pub target: EndpointDeclaration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<ChildAssociationExtras>,
}

impl AssociationDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            source: EndpointDeclaration::default(),
            target: EndpointDeclaration::default(),
            child: None,
        }
    }
}

/// A type or aspect definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mandatory_aspects: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associations: Vec<AssociationDeclaration>,
}

impl ClassDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            parent: None,
            mandatory_aspects: Vec::new(),
            properties: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn set_parent(&mut self, parent: impl Into<String>) -> &mut Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn add_mandatory_aspect(&mut self, aspect: impl Into<String>) -> &mut Self {
        self.mandatory_aspects.push(aspect.into());
        self
    }

    pub fn create_property(
        &mut self,
        name: impl Into<String>,
        data_type: DataType,
    ) -> &mut PropertyDeclaration {
        self.properties.push(PropertyDeclaration::new(name, data_type));
        self.properties.last_mut().unwrap()
    }

    pub fn create_association(&mut self, name: impl Into<String>) -> &mut AssociationDeclaration {
        self.associations.push(AssociationDeclaration::new(name));
        self.associations.last_mut().unwrap()
    }

    pub fn create_child_association(
        &mut self,
        name: impl Into<String>,
    ) -> &mut AssociationDeclaration {
        let mut assoc = AssociationDeclaration::new(name);
        assoc.child = Some(ChildAssociationExtras::default());
        self.associations.push(assoc);
        self.associations.last_mut().unwrap()
    }
}

/// The raw definition of one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Prefixed model name, e.g. "test1:model1"
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<Namespace>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Namespace>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<ClassDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aspects: Vec<ClassDeclaration>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            author: None,
            published: None,
            version: None,
            namespaces: Vec::new(),
            imports: Vec::new(),
            constraints: Vec::new(),
            types: Vec::new(),
            aspects: Vec::new(),
        }
    }

    pub fn add_namespace(&mut self, uri: impl Into<String>, prefix: impl Into<String>) -> &mut Self {
        self.namespaces.push(Namespace::new(uri, prefix));
        self
    }

    pub fn add_import(&mut self, uri: impl Into<String>, prefix: impl Into<String>) -> &mut Self {
        self.imports.push(Namespace::new(uri, prefix));
        self
    }

    pub fn add_constraint(&mut self, constraint: ConstraintDeclaration) -> &mut Self {
        self.constraints.push(constraint);
        self
    }

    pub fn create_type(&mut self, name: impl Into<String>) -> &mut ClassDeclaration {
        self.types.push(ClassDeclaration::new(name));
        self.types.last_mut().unwrap()
    }

    pub fn create_aspect(&mut self, name: impl Into<String>) -> &mut ClassDeclaration {
        self.aspects.push(ClassDeclaration::new(name));
        self.aspects.last_mut().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_roundtrip() {
        let mut model = ModelDefinition::new("test1:model1");
        model.add_namespace("urn:test:model1", "test1");
        {
            let t = model.create_type("test1:type1");
            t.create_property("test1:prop1", DataType::Text)
                .set_mandatory(true);
            t.create_child_association("test1:children");
        }

        let json = serde_json::to_string(&model).unwrap();
        let back: ModelDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "test1:model1");
        assert_eq!(back.types.len(), 1);
        assert!(back.types[0].properties[0].mandatory);
        assert!(back.types[0].associations[0].child.is_some());
        // Lazily defaulted flags stay absent until compile time
        assert_eq!(
            back.types[0].associations[0]
                .child
                .as_ref()
                .unwrap()
                .allow_duplicate_child_name,
            None
        );
    }

    #[test]
    fn test_named_value_exclusivity() {
        assert!(NamedValue::scalar("maxLength", "255").is_well_formed());
        assert!(NamedValue::list("allowed", vec!["a".into(), "b".into()]).is_well_formed());
        let neither = NamedValue {
            name: "empty".into(),
            value: None,
            values: None,
        };
        assert!(!neither.is_well_formed());
        let both = NamedValue {
            name: "both".into(),
            value: Some("x".into()),
            values: Some(vec!["y".into()]),
        };
        assert!(!both.is_well_formed());
    }

    #[test]
    fn test_data_type_widening() {
        assert!(DataType::Int.widens_to(DataType::Int));
        assert!(DataType::Int.widens_to(DataType::Long));
        assert!(DataType::Float.widens_to(DataType::Double));
        assert!(DataType::Date.widens_to(DataType::DateTime));
        assert!(DataType::Text.widens_to(DataType::Any));
        assert!(!DataType::Long.widens_to(DataType::Int));
        assert!(!DataType::Text.widens_to(DataType::Int));
        assert!(!DataType::Any.widens_to(DataType::Text));
    }
}
