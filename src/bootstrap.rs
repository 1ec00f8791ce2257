//! Embedded bootstrap models
//!
//! The core model ships inside the binary so a fresh registry can stand up a
//! usable type graph with no store at all. Definitions are parsed lazily at
//! bootstrap time; a malformed embedded file is a packaging error and surfaces
//! as a normal parse error rather than a panic.

use include_dir::{include_dir, Dir};

use crate::definition::ModelDefinition;
use crate::error::Result;

static BOOTSTRAP_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/bootstrap");

/// Parse every embedded `*.model.json`, in path order
pub fn bootstrap_definitions() -> Result<Vec<ModelDefinition>> {
    let mut files: Vec<_> = BOOTSTRAP_DIR
        .files()
        .filter(|f| {
            f.path()
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".model.json"))
        })
        .collect();
    files.sort_by_key(|f| f.path());

    let mut definitions = Vec::with_capacity(files.len());
    for file in files {
        let definition: ModelDefinition = serde_json::from_slice(file.contents())?;
        tracing::debug!(model = %definition.name, path = %file.path().display(),
            "embedded definition parsed");
        definitions.push(definition);
    }
    Ok(definitions)
}
