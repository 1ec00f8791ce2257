//! The canonical evolution scenario: a model grows additively, is blocked from
//! shrinking, and can only be removed once nothing references it.

use std::sync::Arc;

use content_dictionary::definition::{DataType, ModelDefinition};
use content_dictionary::oracle::{FixedUsageOracle, NoUsageOracle};
use content_dictionary::{CompatibilityViolation, DictionaryError, ModelRegistry, QName, UsageOracle};

/// Aspect `test1:a` with a property, type `test1:t` carrying the aspect as
/// mandatory plus its own property `test1:p1`
fn model_v1() -> ModelDefinition {
    let mut model = ModelDefinition::new("test1:model1");
    model.add_namespace("urn:test:model1", "test1");
    model
        .create_aspect("test1:a")
        .create_property("test1:flag", DataType::Boolean);
    {
        let t = model.create_type("test1:t");
        t.add_mandatory_aspect("test1:a");
        t.create_property("test1:p1", DataType::Text);
    }
    model
}

fn model_name() -> QName {
    QName::new("urn:test:model1", "model1")
}

#[test]
fn additive_growth_succeeds_then_aspect_withdrawal_fails() {
    let registry = ModelRegistry::default();
    registry.load(&model_v1()).unwrap();

    // Adding a property is additive and goes through.
    let mut v2 = model_v1();
    v2.types[0].create_property("test1:p2", DataType::Int);
    registry.load(&v2).unwrap();

    let t = registry
        .snapshot()
        .class(&QName::new("urn:test:model1", "t"))
        .unwrap()
        .clone();
    assert_eq!(t.properties.len(), 2);

    // Omitting the mandatory aspect from the type is rejected, and p2 is
    // still there afterwards.
    let mut v3 = model_v1();
    v3.types[0].create_property("test1:p2", DataType::Int);
    v3.types[0].mandatory_aspects.clear();
    let err = registry.load(&v3).unwrap_err();
    let DictionaryError::IncompatibleModelChange { violations, .. } = err else {
        panic!("expected IncompatibleModelChange");
    };
    assert!(violations
        .iter()
        .any(|v| matches!(v, CompatibilityViolation::MandatoryAspectsChanged { .. })));

    let t = registry
        .snapshot()
        .class(&QName::new("urn:test:model1", "t"))
        .unwrap()
        .clone();
    assert_eq!(t.properties.len(), 2);
    assert_eq!(t.mandatory_aspects.len(), 1);
}

#[test]
fn deletion_is_gated_on_usage() {
    let registry = ModelRegistry::default();
    registry.load(&model_v1()).unwrap();

    // A repository still holding nodes of test1:t blocks the whole model.
    let busy: Arc<dyn UsageOracle> = Arc::new(FixedUsageOracle::new([QName::new(
        "urn:test:model1",
        "t",
    )]));
    assert!(!registry.can_delete(&model_name(), &busy));
    let err = registry.unload(&model_name(), &busy).unwrap_err();
    assert!(matches!(err, DictionaryError::ModelInUse { .. }));
    assert!(registry.contains_model(&model_name()));

    // Usage of an introduced property alone is enough to block.
    let property_busy: Arc<dyn UsageOracle> = Arc::new(FixedUsageOracle::new([QName::new(
        "urn:test:model1",
        "p1",
    )]));
    assert!(!registry.can_delete(&model_name(), &property_busy));

    // Once the last reference is gone the model can go.
    let idle: Arc<dyn UsageOracle> = Arc::new(NoUsageOracle);
    assert!(registry.can_delete(&model_name(), &idle));
    registry.unload(&model_name(), &idle).unwrap();
    assert!(registry.snapshot().is_empty());
}

#[test]
fn namespace_is_released_after_unload() {
    let registry = ModelRegistry::default();
    registry.load(&model_v1()).unwrap();

    // While registered, another model may not claim the URI.
    let mut rival = ModelDefinition::new("other:model2");
    rival.add_namespace("urn:test:model1", "other");
    let err = registry.load(&rival).unwrap_err();
    assert!(matches!(err, DictionaryError::NamespaceConflict { .. }));

    let idle: Arc<dyn UsageOracle> = Arc::new(NoUsageOracle);
    registry.unload(&model_name(), &idle).unwrap();

    // The URI is free again.
    registry.load(&rival).unwrap();
    assert!(registry.contains_model(&QName::new("urn:test:model1", "model2")));
}

#[test]
fn strict_mode_blocks_even_compatible_edits() {
    let mut config = content_dictionary::DictionaryConfig::default();
    config.compatibility.strict = true;
    let registry = ModelRegistry::new(config);
    registry.load(&model_v1()).unwrap();

    let mut tweaked = model_v1();
    tweaked.types[0].properties[0].title = Some("Primary".into());
    let err = registry.load(&tweaked).unwrap_err();
    let DictionaryError::IncompatibleModelChange { violations, .. } = err else {
        panic!("expected IncompatibleModelChange");
    };
    assert!(violations
        .iter()
        .any(|v| matches!(v, CompatibilityViolation::StrictModeChange { .. })));
}
