//! Model persistence
//!
//! The registry itself is purely in-memory; durable model definitions live
//! behind the `ModelStore` trait so the compilation and lifecycle machinery
//! stays independent of where definitions come from. `DirectoryStore` is the
//! filesystem implementation: one `*.model.json` file per definition.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::definition::ModelDefinition;
use crate::error::{DictionaryError, Result};
use crate::namespace::{self, QName};

const MODEL_FILE_SUFFIX: &str = ".model.json";

/// Derive the qualified name of a definition: the local part of its prefixed
/// name, resolved against its own declared namespaces.
pub fn definition_qname(definition: &ModelDefinition) -> Result<QName> {
    let (prefix, local) = namespace::split_prefixed(&definition.name)?;
    let declared = definition
        .namespaces
        .iter()
        .find(|ns| ns.prefix == prefix)
        .ok_or_else(|| DictionaryError::UnresolvedNamespace {
            model: definition.name.clone(),
            prefix: prefix.to_string(),
            suggestion: None,
        })?;
    Ok(QName::new(&declared.uri, local))
}

/// Durable storage for model definitions
pub trait ModelStore: Send + Sync {
    fn list_registered_model_names(&self) -> Result<Vec<QName>>;
    fn load_definition(&self, name: &QName) -> Result<ModelDefinition>;
    fn save_definition(&self, definition: &ModelDefinition) -> Result<()>;
    /// Returns whether a definition with that name was present
    fn remove_definition(&self, name: &QName) -> Result<bool>;
}

/// Store over a directory tree of `*.model.json` files
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan(&self) -> Result<Vec<(PathBuf, ModelDefinition)>> {
        let mut found = Vec::new();
        if !self.root.exists() {
            return Ok(found);
        }
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
            })?;
            let path = entry.path();
            let is_model_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(MODEL_FILE_SUFFIX));
            if !entry.file_type().is_file() || !is_model_file {
                continue;
            }
            let content = std::fs::read_to_string(path)?;
            let definition: ModelDefinition = serde_json::from_str(&content)?;
            found.push((path.to_path_buf(), definition));
        }
        Ok(found)
    }

    fn find(&self, name: &QName) -> Result<Option<(PathBuf, ModelDefinition)>> {
        for (path, definition) in self.scan()? {
            if definition_qname(&definition)? == *name {
                return Ok(Some((path, definition)));
            }
        }
        Ok(None)
    }

    fn file_path(&self, definition: &ModelDefinition) -> PathBuf {
        let file_stem = definition.name.replace(namespace::PREFIX_SEPARATOR, ".");
        self.root.join(format!("{file_stem}{MODEL_FILE_SUFFIX}"))
    }
}

impl ModelStore for DirectoryStore {
    fn list_registered_model_names(&self) -> Result<Vec<QName>> {
        let mut names = Vec::new();
        for (_, definition) in self.scan()? {
            names.push(definition_qname(&definition)?);
        }
        names.sort();
        Ok(names)
    }

    fn load_definition(&self, name: &QName) -> Result<ModelDefinition> {
        match self.find(name)? {
            Some((_, definition)) => Ok(definition),
            None => Err(DictionaryError::ModelNotFound {
                model: name.to_string(),
            }),
        }
    }

    fn save_definition(&self, definition: &ModelDefinition) -> Result<()> {
        // Validates the name is resolvable before anything touches disk.
        let name = definition_qname(definition)?;
        std::fs::create_dir_all(&self.root)?;

        // A rename may have changed the file stem; drop the old file first.
        if let Some((old_path, _)) = self.find(&name)? {
            std::fs::remove_file(&old_path)?;
        }

        let path = self.file_path(definition);
        let json = serde_json::to_string_pretty(definition)?;
        std::fs::write(&path, json)?;
        tracing::debug!(model = %name, path = %path.display(), "definition saved");
        Ok(())
    }

    fn remove_definition(&self, name: &QName) -> Result<bool> {
        match self.find(name)? {
            Some((path, _)) => {
                std::fs::remove_file(&path)?;
                tracing::debug!(model = %name, path = %path.display(), "definition removed");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// In-memory store; useful for tests and embedded deployments
#[derive(Default)]
pub struct MemoryStore {
    definitions: Mutex<Vec<ModelDefinition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definitions(definitions: impl IntoIterator<Item = ModelDefinition>) -> Self {
        Self {
            definitions: Mutex::new(definitions.into_iter().collect()),
        }
    }
}

impl ModelStore for MemoryStore {
    fn list_registered_model_names(&self) -> Result<Vec<QName>> {
        let mut names = self
            .definitions
            .lock()
            .iter()
            .map(definition_qname)
            .collect::<Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }

    fn load_definition(&self, name: &QName) -> Result<ModelDefinition> {
        self.definitions
            .lock()
            .iter()
            .find(|d| definition_qname(d).is_ok_and(|q| q == *name))
            .cloned()
            .ok_or_else(|| DictionaryError::ModelNotFound {
                model: name.to_string(),
            })
    }

    fn save_definition(&self, definition: &ModelDefinition) -> Result<()> {
        let name = definition_qname(definition)?;
        let mut definitions = self.definitions.lock();
        definitions.retain(|d| !definition_qname(d).is_ok_and(|q| q == name));
        definitions.push(definition.clone());
        Ok(())
    }

    fn remove_definition(&self, name: &QName) -> Result<bool> {
        let mut definitions = self.definitions.lock();
        let before = definitions.len();
        definitions.retain(|d| !definition_qname(d).is_ok_and(|q| q == *name));
        Ok(definitions.len() != before)
    }
}

/// `Arc<dyn ModelStore>` passthrough so shared stores slot into APIs taking
/// `&dyn ModelStore`
impl ModelStore for Arc<dyn ModelStore> {
    fn list_registered_model_names(&self) -> Result<Vec<QName>> {
        (**self).list_registered_model_names()
    }

    fn load_definition(&self, name: &QName) -> Result<ModelDefinition> {
        (**self).load_definition(name)
    }

    fn save_definition(&self, definition: &ModelDefinition) -> Result<()> {
        (**self).save_definition(definition)
    }

    fn remove_definition(&self, name: &QName) -> Result<bool> {
        (**self).remove_definition(name)
    }
}
