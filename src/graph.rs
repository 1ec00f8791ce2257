//! Model dependency graph
//!
//! Models depend on each other through namespace imports and cross-model
//! references (parents, mandatory aspects, association endpoints). This module
//! answers two questions: in what order must a set of definitions be loaded,
//! and which registered models depend on a given one.

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::definition::ModelDefinition;
use crate::error::{DictionaryError, Result};
use crate::namespace::QName;
use crate::registry::RegistrySnapshot;

/// Topological load order for a batch of definitions: dependencies first.
///
/// Imports of URIs declared outside the batch are assumed already registered
/// and do not constrain the order. Returns indexes into `definitions`.
pub fn load_order(definitions: &[ModelDefinition]) -> Result<Vec<usize>> {
    let mut declared_by: HashMap<&str, usize> = HashMap::new();
    for (index, definition) in definitions.iter().enumerate() {
        for ns in &definition.namespaces {
            declared_by.insert(ns.uri.as_str(), index);
        }
    }

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<_> = (0..definitions.len()).map(|i| graph.add_node(i)).collect();
    for (index, definition) in definitions.iter().enumerate() {
        for import in &definition.imports {
            if let Some(&dependency) = declared_by.get(import.uri.as_str()) {
                if dependency != index {
                    graph.add_edge(nodes[dependency], nodes[index], ());
                }
            }
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|n| graph[n]).collect()),
        Err(cycle) => {
            let stuck = graph[cycle.node_id()];
            Err(DictionaryError::ModelDependencyCycle {
                models: vec![definitions[stuck].name.clone()],
            })
        }
    }
}

/// Registered models that depend on `model`: they import one of its namespaces
/// or reference one of its classes as a parent, mandatory aspect, or
/// association endpoint.
pub fn dependent_models(snapshot: &RegistrySnapshot, model: &QName) -> Vec<QName> {
    let Some(target) = snapshot.model(model) else {
        return Vec::new();
    };
    let uris: BTreeSet<&str> = target.declared_uris().collect();
    let classes: BTreeSet<&QName> = target.class_map().keys().collect();

    let mut dependents = Vec::new();
    for other in snapshot.models() {
        if other.name() == model {
            continue;
        }
        let imports_target = other.imports().iter().any(|ns| uris.contains(ns.uri.as_str()));
        let references_target = other.classes().any(|class| {
            class.parent.as_ref().is_some_and(|p| classes.contains(p))
                || class.mandatory_aspects.iter().any(|a| classes.contains(a))
                || class.associations.values().any(|assoc| {
                    [&assoc.source, &assoc.target].into_iter().any(|end| {
                        end.class.as_ref().is_some_and(|c| classes.contains(c))
                    })
                })
        });
        if imports_target || references_target {
            dependents.push(other.name().clone());
        }
    }
    dependents
}

/// `dependent_models`, closed transitively: everything that would have to be
/// recompiled or removed if `model` changed. The root itself is excluded.
pub fn transitive_dependents(snapshot: &RegistrySnapshot, model: &QName) -> Vec<QName> {
    let mut seen: BTreeSet<QName> = BTreeSet::new();
    let mut queue = vec![model.clone()];
    while let Some(current) = queue.pop() {
        for dependent in dependent_models(snapshot, &current) {
            if seen.insert(dependent.clone()) {
                queue.push(dependent);
            }
        }
    }
    seen.remove(model);
    seen.into_iter().collect()
}
