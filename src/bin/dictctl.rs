//! Dictionary Admin CLI
//!
//! Inspects and mutates a model store, standing up an in-process registry
//! (embedded core model plus everything in the store) so every operation runs
//! against the same compiled state the repository would see.
//!
//! Usage:
//!   dictctl list
//!   dictctl show core:core
//!   dictctl check my.model.json
//!   dictctl diff my.model.json
//!   dictctl load my.model.json
//!   dictctl unload acme:invoicing

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use content_dictionary::definition::ModelDefinition;
use content_dictionary::diff::{diff_models, DiffStatus};
use content_dictionary::oracle::NoUsageOracle;
use content_dictionary::registry::RegistrySnapshot;
use content_dictionary::store::ModelStore;
use content_dictionary::{
    namespace, DictionaryConfig, DirectoryStore, ModelCompiler, ModelRegistry, QName, UsageOracle,
};

#[derive(Parser)]
#[command(name = "dictctl")]
#[command(about = "Inspect and manage a content-model store")]
struct Cli {
    /// Path to a dictionary.toml config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model store directory (overrides config)
    #[arg(short, long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered models
    List,
    /// Show one compiled model
    Show {
        /// Prefixed model name, e.g. "core:core"
        model: String,
    },
    /// Compile and validate a definition file without installing it
    Check {
        file: PathBuf,
    },
    /// Diff a definition file against its registered version
    Diff {
        file: PathBuf,
    },
    /// Validate a definition file, install it, and save it to the store
    Load {
        file: PathBuf,
    },
    /// Remove a model from the registry and the store
    Unload {
        /// Prefixed model name, e.g. "acme:invoicing"
        model: String,
    },
    /// Write the effective configuration to a TOML file
    InitConfig {
        #[arg(default_value = "dictionary.toml")]
        path: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => DictionaryConfig::load_from(path)?,
        None => DictionaryConfig::load()?,
    };
    if let Some(store) = cli.store {
        config.store.path = store;
    }

    if let Command::InitConfig { path } = &cli.command {
        config.save(path)?;
        println!("✅ wrote {}", path.display());
        return Ok(());
    }

    let store = DirectoryStore::new(config.store.path.clone());
    let registry = ModelRegistry::new(config);
    registry
        .bootstrap(&store)
        .context("failed to stand up registry from store")?;

    match cli.command {
        Command::List => list(&registry),
        Command::Show { model } => show(&registry, &model),
        Command::Check { file } => check(&registry, &file),
        Command::Diff { file } => diff(&registry, &file),
        Command::Load { file } => load(&registry, &store, &file),
        Command::Unload { model } => unload(&registry, &store, &model),
        // Handled before the registry is built.
        Command::InitConfig { .. } => Ok(()),
    }
}

fn list(registry: &ModelRegistry) -> anyhow::Result<()> {
    let snapshot = registry.snapshot();
    println!("📚 {} model(s) registered\n", snapshot.len());
    for model in snapshot.models() {
        let version = model
            .version()
            .map(|v| format!(" v{v}"))
            .unwrap_or_default();
        println!(
            "  {}{} — {} type(s), {} aspect(s)",
            model.name(),
            version,
            model.types().count(),
            model.aspects().count()
        );
    }
    Ok(())
}

fn show(registry: &ModelRegistry, model: &str) -> anyhow::Result<()> {
    let snapshot = registry.snapshot();
    let name = resolve_model_name(&snapshot, model)?;
    let model = snapshot
        .model(&name)
        .with_context(|| format!("model '{name}' is not registered"))?;

    println!("📦 {}", model.name());
    if let Some(description) = model.description() {
        println!("   {description}");
    }
    if let Some(version) = model.version() {
        println!("   version:  {version}");
    }
    println!("   checksum: {}", model.checksum());
    println!("   compiled: {}", model.compiled_at().to_rfc3339());

    println!("\n   namespaces:");
    for ns in model.namespaces() {
        println!("     {} -> {}", ns.prefix, ns.uri);
    }
    for class in model.classes() {
        let kind = if class.is_aspect { "aspect" } else { "type" };
        println!("\n   {kind} {}", class.name);
        if let Some(parent) = &class.parent {
            println!("     parent: {parent}");
        }
        for aspect in &class.mandatory_aspects {
            println!("     mandatory aspect: {aspect}");
        }
        for property in class.flattened_properties.values() {
            let inherited = if class.properties.contains_key(&property.name) {
                ""
            } else {
                " (inherited)"
            };
            let mandatory = if property.mandatory { ", mandatory" } else { "" };
            println!(
                "     property {} ({:?}{mandatory}){inherited}",
                property.name, property.data_type
            );
        }
        for assoc in class.flattened_associations.values() {
            let kind = if assoc.is_child() { "child assoc" } else { "assoc" };
            println!("     {kind} {}", assoc.name);
        }
    }
    Ok(())
}

fn check(registry: &ModelRegistry, file: &PathBuf) -> anyhow::Result<()> {
    let definition = read_definition(file)?;
    let snapshot = registry.snapshot();
    let compiled = ModelCompiler::new(&snapshot).compile(&definition)?;

    let checker = checker_for(registry);
    match checker.validate_update(&compiled, &snapshot) {
        Ok(()) => {
            println!("✅ {} compiles and is a compatible change", compiled.name());
            Ok(())
        }
        Err(e) => bail!("{e}"),
    }
}

fn diff(registry: &ModelRegistry, file: &PathBuf) -> anyhow::Result<()> {
    let definition = read_definition(file)?;
    let snapshot = registry.snapshot();
    let candidate = ModelCompiler::new(&snapshot).compile(&definition)?;
    let Some(current) = snapshot.model(candidate.name()) else {
        println!("🆕 {} is not registered yet; everything is new", candidate.name());
        return Ok(());
    };

    let diffs = diff_models(current, &candidate);
    let changed: Vec<_> = diffs
        .iter()
        .filter(|d| d.status != DiffStatus::Unchanged)
        .collect();
    if changed.is_empty() {
        println!("✅ no changes");
        return Ok(());
    }
    for entry in changed {
        let marker = match entry.status {
            DiffStatus::Created => "+",
            DiffStatus::Removed => "-",
            DiffStatus::Updated => "~",
            DiffStatus::Unchanged => " ",
        };
        match &entry.detail {
            Some(detail) => println!("  {marker} {} {} ({detail})", entry.kind, entry.name),
            None => println!("  {marker} {} {}", entry.kind, entry.name),
        }
    }
    Ok(())
}

fn load(registry: &ModelRegistry, store: &DirectoryStore, file: &PathBuf) -> anyhow::Result<()> {
    let definition = read_definition(file)?;
    let report = registry.load(&definition)?;
    if report.skipped {
        println!("✅ {} is unchanged; nothing to do", report.model);
        return Ok(());
    }
    store.save_definition(&definition)?;
    for failure in &report.listener_failures {
        println!("⚠️  {failure}");
    }
    println!("✅ {} loaded and saved", report.model);
    Ok(())
}

fn unload(registry: &ModelRegistry, store: &DirectoryStore, model: &str) -> anyhow::Result<()> {
    let snapshot = registry.snapshot();
    let name = resolve_model_name(&snapshot, model)?;

    // No live repository to consult here; dependency checks between registered
    // models still apply.
    let oracle: std::sync::Arc<dyn UsageOracle> = std::sync::Arc::new(NoUsageOracle);
    let report = registry.unload(&name, &oracle)?;
    store.remove_definition(&name)?;
    for failure in &report.listener_failures {
        println!("⚠️  {failure}");
    }
    println!("✅ {} unloaded", report.model);
    Ok(())
}

fn read_definition(file: &PathBuf) -> anyhow::Result<ModelDefinition> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let definition = serde_json::from_str(&content)
        .with_context(|| format!("cannot parse {}", file.display()))?;
    Ok(definition)
}

/// Resolve a prefixed model name against the prefixes of registered models
fn resolve_model_name(snapshot: &RegistrySnapshot, name: &str) -> anyhow::Result<QName> {
    let (prefix, local) = namespace::split_prefixed(name)?;
    for model in snapshot.models() {
        for ns in model.namespaces() {
            if ns.prefix == prefix {
                return Ok(QName::new(&ns.uri, local));
            }
        }
    }
    bail!("no registered model declares the prefix '{prefix}'")
}

fn checker_for(registry: &ModelRegistry) -> content_dictionary::CompatibilityChecker {
    if registry.config().compatibility.strict {
        content_dictionary::CompatibilityChecker::new().strict()
    } else {
        content_dictionary::CompatibilityChecker::new()
    }
}
