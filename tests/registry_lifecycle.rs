//! End-to-end registry behaviour: bootstrap, lifecycle notification, and
//! atomic snapshot visibility.

use std::sync::Arc;

use parking_lot::Mutex;

use content_dictionary::definition::{DataType, ModelDefinition};
use content_dictionary::lifecycle::{ListenerResult, RegistryListener};
use content_dictionary::oracle::NoUsageOracle;
use content_dictionary::store::MemoryStore;
use content_dictionary::{DictionaryError, ModelRegistry, QName, UsageOracle};

fn invoicing_model() -> ModelDefinition {
    let mut model = ModelDefinition::new("acme:invoicing");
    model.add_namespace("urn:acme:invoicing", "acme");
    model.add_import("urn:content:core", "core");
    {
        let t = model.create_type("acme:invoice");
        t.set_parent("core:content");
        t.create_property("acme:total", DataType::Double);
    }
    model
}

fn no_usage() -> Arc<dyn UsageOracle> {
    Arc::new(NoUsageOracle)
}

#[test]
fn bootstrap_loads_embedded_core_and_store_models_in_order() {
    // The store model imports the embedded core namespace, so core must come
    // first regardless of listing order.
    let store = MemoryStore::with_definitions([invoicing_model()]);
    let registry = ModelRegistry::default();
    let loaded = registry.bootstrap(&store).unwrap();

    assert_eq!(
        loaded,
        vec![
            QName::new("urn:content:core", "core"),
            QName::new("urn:acme:invoicing", "invoicing"),
        ]
    );

    let snapshot = registry.snapshot();
    let invoice = snapshot
        .class(&QName::new("urn:acme:invoicing", "invoice"))
        .unwrap();
    // Inheritance across models is flattened at compile time.
    assert!(invoice
        .property(&QName::new("urn:content:core", "name"))
        .is_some());
    assert!(invoice
        .property(&QName::new("urn:acme:invoicing", "total"))
        .is_some());
}

#[test]
fn bootstrap_can_run_without_embedded_models() {
    let mut config = content_dictionary::DictionaryConfig::default();
    config.bootstrap.enabled = false;
    let registry = ModelRegistry::new(config);
    let loaded = registry.bootstrap(&MemoryStore::new()).unwrap();
    assert!(loaded.is_empty());
    assert!(registry.snapshot().is_empty());
}

struct ObservingListener {
    registry: Arc<ModelRegistry>,
    events: Mutex<Vec<String>>,
}

impl RegistryListener for ObservingListener {
    fn id(&self) -> &str {
        "observer"
    }

    fn before_reload(&self) -> ListenerResult {
        let count = self.registry.snapshot().len();
        self.events.lock().push(format!("before:{count}"));
        Ok(())
    }

    fn after_reload(&self) -> ListenerResult {
        let count = self.registry.snapshot().len();
        self.events.lock().push(format!("after:{count}"));
        Ok(())
    }

    fn after_teardown(&self) -> ListenerResult {
        let count = self.registry.snapshot().len();
        self.events.lock().push(format!("destroy:{count}"));
        Ok(())
    }
}

#[test]
fn listeners_observe_old_state_before_swap_and_new_state_after() {
    let registry = Arc::new(ModelRegistry::default());
    let listener = Arc::new(ObservingListener {
        registry: Arc::clone(&registry),
        events: Mutex::new(Vec::new()),
    });
    registry
        .register_listener(Arc::clone(&listener) as Arc<dyn RegistryListener>)
        .unwrap();

    let mut model = ModelDefinition::new("test1:model1");
    model.add_namespace("urn:test:model1", "test1");
    model.create_type("test1:type1");
    registry.load(&model).unwrap();

    registry
        .unload(&QName::new("urn:test:model1", "model1"), &no_usage())
        .unwrap();

    // Pre-init sees the pre-swap registry, post-init the post-swap registry,
    // post-destroy the post-removal registry.
    assert_eq!(
        *listener.events.lock(),
        vec!["before:0", "after:1", "destroy:0"]
    );
}

struct FailingListener {
    fail_before: bool,
}

impl RegistryListener for FailingListener {
    fn id(&self) -> &str {
        "failing"
    }

    fn before_reload(&self) -> ListenerResult {
        if self.fail_before {
            return Err("subsystem not ready".into());
        }
        Ok(())
    }

    fn after_reload(&self) -> ListenerResult {
        Err("cache refresh failed".into())
    }
}

#[test]
fn pre_init_failure_aborts_load_and_registry_is_unchanged() {
    let registry = ModelRegistry::default();
    registry
        .register_listener(Arc::new(FailingListener { fail_before: true }))
        .unwrap();

    let mut model = ModelDefinition::new("test1:model1");
    model.add_namespace("urn:test:model1", "test1");
    model.create_type("test1:type1");

    let err = registry.load(&model).unwrap_err();
    assert!(matches!(err, DictionaryError::ReloadAborted { .. }));
    assert!(registry.snapshot().is_empty());

    // The aborted cycle left the registry idle; a clean retry succeeds once
    // the listener stops failing.
    assert!(registry.deregister_listener("failing").unwrap());
    registry.load(&model).unwrap();
    assert_eq!(registry.snapshot().len(), 1);
}

#[test]
fn post_init_failure_is_reported_but_load_sticks() {
    let registry = ModelRegistry::default();
    registry
        .register_listener(Arc::new(FailingListener { fail_before: false }))
        .unwrap();

    let mut model = ModelDefinition::new("test1:model1");
    model.add_namespace("urn:test:model1", "test1");
    model.create_type("test1:type1");

    let report = registry.load(&model).unwrap();
    assert_eq!(report.listener_failures.len(), 1);
    assert_eq!(report.listener_failures[0].listener, "failing");
    assert!(registry.contains_model(&QName::new("urn:test:model1", "model1")));
}

#[test]
fn core_model_is_protected_by_dependents() {
    let store = MemoryStore::with_definitions([invoicing_model()]);
    let registry = ModelRegistry::default();
    registry.bootstrap(&store).unwrap();

    let core = QName::new("urn:content:core", "core");
    let err = registry.unload(&core, &no_usage()).unwrap_err();
    assert!(matches!(err, DictionaryError::ModelInUse { .. }));

    registry
        .unload(&QName::new("urn:acme:invoicing", "invoicing"), &no_usage())
        .unwrap();
    registry.unload(&core, &no_usage()).unwrap();
    assert!(registry.snapshot().is_empty());
}
