//! Model Registry
//!
//! Owns the set of compiled models and is the single source of truth for what
//! types, aspects, properties and associations currently exist. State is
//! published by copy-on-write snapshot replacement: a writer builds a complete
//! new snapshot and installs it with one atomic swap, so readers never block
//! and never observe a half-updated registry. Writers are serialized; a reload
//! arriving while another cycle is in flight is rejected outright.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::compatibility::CompatibilityChecker;
use crate::compiled::{CompiledClass, CompiledConstraint, CompiledModel};
use crate::compiler::ModelCompiler;
use crate::config::DictionaryConfig;
use crate::definition::ModelDefinition;
use crate::error::{DictionaryError, Result};
use crate::graph;
use crate::lifecycle::{LifecycleNotifier, ListenerFailure, Phase, RegistryListener};
use crate::namespace::QName;
use crate::oracle::UsageOracle;
use crate::store::ModelStore;

/// One immutable view of registry state.
///
/// Callers must treat a snapshot as frozen for the duration of one logical
/// operation; a later snapshot never mutates an earlier one.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    models: BTreeMap<QName, Arc<CompiledModel>>,
    uri_owner: BTreeMap<String, QName>,
    class_owner: BTreeMap<QName, QName>,
}

impl RegistrySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn model(&self, name: &QName) -> Option<&CompiledModel> {
        self.models.get(name).map(Arc::as_ref)
    }

    pub fn models(&self) -> impl Iterator<Item = &CompiledModel> {
        self.models.values().map(Arc::as_ref)
    }

    pub fn model_names(&self) -> Vec<QName> {
        self.models.keys().cloned().collect()
    }

    pub fn contains(&self, name: &QName) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Which model declares (owns) a namespace URI, if any
    pub fn declaring_model(&self, uri: &str) -> Option<&QName> {
        self.uri_owner.get(uri)
    }

    /// Which model introduces a class, if any
    pub fn class_owner(&self, name: &QName) -> Option<&QName> {
        self.class_owner.get(name)
    }

    /// Look up a class across all registered models
    pub fn class(&self, name: &QName) -> Option<&CompiledClass> {
        let owner = self.class_owner.get(name)?;
        self.models.get(owner)?.class(name)
    }

    /// Look up a shared constraint across all registered models
    pub fn shared_constraint(&self, name: &QName) -> Option<&CompiledConstraint> {
        self.models
            .values()
            .find_map(|model| model.shared_constraint(name))
    }

    /// A new snapshot with `model` added or replaced
    pub fn with_model(&self, model: Arc<CompiledModel>) -> RegistrySnapshot {
        let mut next = self.clone();
        next.remove_entries(model.name());
        for uri in model.declared_uris() {
            next.uri_owner.insert(uri.to_string(), model.name().clone());
        }
        for class in model.classes() {
            next.class_owner
                .insert(class.name.clone(), model.name().clone());
        }
        next.models.insert(model.name().clone(), model);
        next
    }

    /// A new snapshot with `name` removed
    pub fn without_model(&self, name: &QName) -> RegistrySnapshot {
        let mut next = self.clone();
        next.remove_entries(name);
        next.models.remove(name);
        next
    }

    fn remove_entries(&mut self, name: &QName) {
        self.uri_owner.retain(|_, owner| owner != name);
        self.class_owner.retain(|_, owner| owner != name);
    }
}

/// Outcome of a load request
#[derive(Debug)]
pub struct LoadReport {
    pub model: QName,
    /// True when the definition checksum matched the registered model and no
    /// cycle was run
    pub skipped: bool,
    /// Non-fatal post-init listener failures
    pub listener_failures: Vec<ListenerFailure>,
}

/// Outcome of an unload request
#[derive(Debug)]
pub struct UnloadReport {
    pub model: QName,
    /// Non-fatal post-destroy listener failures
    pub listener_failures: Vec<ListenerFailure>,
}

/// The registry: compiled models keyed by model name, swapped atomically
pub struct ModelRegistry {
    config: DictionaryConfig,
    state: ArcSwap<RegistrySnapshot>,
    write_lock: Mutex<()>,
    notifier: LifecycleNotifier,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(DictionaryConfig::default())
    }
}

impl ModelRegistry {
    pub fn new(config: DictionaryConfig) -> Self {
        Self {
            config,
            state: ArcSwap::from_pointee(RegistrySnapshot::empty()),
            write_lock: Mutex::new(()),
            notifier: LifecycleNotifier::new(),
        }
    }

    pub fn config(&self) -> &DictionaryConfig {
        &self.config
    }

    /// Current state; never observed half-updated
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.state.load_full()
    }

    pub fn model_names(&self) -> Vec<QName> {
        self.snapshot().model_names()
    }

    pub fn contains_model(&self, name: &QName) -> bool {
        self.snapshot().contains(name)
    }

    pub fn phase(&self) -> Phase {
        self.notifier.phase()
    }

    /// Registration is only permitted while no cycle is running
    pub fn register_listener(&self, listener: Arc<dyn RegistryListener>) -> Result<()> {
        self.notifier.register(listener)
    }

    pub fn deregister_listener(&self, id: &str) -> Result<bool> {
        self.notifier.deregister(id)
    }

    /// Compile, validate and install one model definition, running a full
    /// lifecycle cycle around the swap.
    pub fn load(&self, definition: &ModelDefinition) -> Result<LoadReport> {
        let _guard = self
            .write_lock
            .try_lock()
            .ok_or(DictionaryError::RegistryBusy)?;
        let snapshot = self.snapshot();

        let compiled = ModelCompiler::new(&snapshot)
            .with_max_depth(self.config.compiler.max_inheritance_depth)
            .compile(definition)?;
        let name = compiled.name().clone();

        if let Some(current) = snapshot.model(&name) {
            if current.checksum() == compiled.checksum() {
                tracing::debug!(model = %name, "definition unchanged; reload skipped");
                return Ok(LoadReport {
                    model: name,
                    skipped: true,
                    listener_failures: Vec::new(),
                });
            }
        }

        self.checker().validate_update(&compiled, &snapshot)?;

        let mut next = snapshot.with_model(Arc::new(compiled));

        // Dependent models flatten inherited state at compile time, so an
        // update to a base model must recompile everything downstream against
        // the new state. All of it lands in the same atomic swap; any
        // recompile failure aborts the whole load.
        let dependents = graph::transitive_dependents(&snapshot, &name);
        if !dependents.is_empty() {
            let definitions: Vec<ModelDefinition> = dependents
                .iter()
                .filter_map(|n| snapshot.model(n).map(|m| m.definition().clone()))
                .collect();
            for index in graph::load_order(&definitions)? {
                let recompiled = ModelCompiler::new(&next)
                    .with_max_depth(self.config.compiler.max_inheritance_depth)
                    .compile(&definitions[index])?;
                next = next.with_model(Arc::new(recompiled));
            }
            tracing::debug!(model = %name, dependents = dependents.len(),
                "dependent models recompiled");
        }

        let next = Arc::new(next);
        let listener_failures = self
            .notifier
            .run_reload(|| self.state.store(Arc::clone(&next)))?;

        tracing::info!(model = %name, models = next.len(), "model loaded");
        Ok(LoadReport {
            model: name,
            skipped: false,
            listener_failures,
        })
    }

    /// Remove one model, gated on the usage oracle.
    ///
    /// Unloading a name that is not registered fails with `ModelNotInUse`
    /// ("no-op because already unused"), distinct from `ModelInUse`
    /// ("blocked because used").
    pub fn unload(&self, name: &QName, usage: &Arc<dyn UsageOracle>) -> Result<UnloadReport> {
        let _guard = self
            .write_lock
            .try_lock()
            .ok_or(DictionaryError::RegistryBusy)?;
        let snapshot = self.snapshot();

        if !snapshot.contains(name) {
            return Err(DictionaryError::ModelNotInUse {
                model: name.to_string(),
            });
        }
        if !self
            .checker()
            .can_delete(name, &snapshot, usage, self.config.oracle.timeout())
        {
            return Err(DictionaryError::ModelInUse {
                model: name.to_string(),
            });
        }

        let next = Arc::new(snapshot.without_model(name));
        let listener_failures = self
            .notifier
            .run_teardown(|| self.state.store(Arc::clone(&next)))?;

        tracing::info!(model = %name, models = next.len(), "model unloaded");
        Ok(UnloadReport {
            model: name.clone(),
            listener_failures,
        })
    }

    /// Non-raising deletion predicate against the current snapshot
    pub fn can_delete(&self, name: &QName, usage: &Arc<dyn UsageOracle>) -> bool {
        self.checker()
            .can_delete(name, &self.snapshot(), usage, self.config.oracle.timeout())
    }

    /// Assert that a model is actively referenced. Fails with `ModelNotFound`
    /// for unregistered names and `ModelNotInUse` when nothing references the
    /// model — the redundant-assertion case callers distinguish from
    /// `ModelInUse`.
    pub fn assert_in_use(&self, name: &QName, usage: &Arc<dyn UsageOracle>) -> Result<()> {
        let snapshot = self.snapshot();
        if !snapshot.contains(name) {
            return Err(DictionaryError::ModelNotFound {
                model: name.to_string(),
            });
        }
        if self
            .checker()
            .can_delete(name, &snapshot, usage, self.config.oracle.timeout())
        {
            return Err(DictionaryError::ModelNotInUse {
                model: name.to_string(),
            });
        }
        Ok(())
    }

    /// Rebuild the registry at startup: embedded bootstrap models first (when
    /// enabled), then everything the persistence collaborator lists, in
    /// import-dependency order.
    pub fn bootstrap(&self, store: &dyn ModelStore) -> Result<Vec<QName>> {
        let mut definitions = Vec::new();
        if self.config.bootstrap.enabled {
            definitions.extend(crate::bootstrap::bootstrap_definitions()?);
        }
        for name in store.list_registered_model_names()? {
            definitions.push(store.load_definition(&name)?);
        }

        let order = graph::load_order(&definitions)?;
        let mut loaded = Vec::new();
        for index in order {
            let report = self.load(&definitions[index])?;
            loaded.push(report.model);
        }
        tracing::info!(models = loaded.len(), "registry bootstrapped");
        Ok(loaded)
    }

    fn checker(&self) -> CompatibilityChecker {
        if self.config.compatibility.strict {
            CompatibilityChecker::new().strict()
        } else {
            CompatibilityChecker::new()
        }
    }
}
