//! Configuration for the dictionary
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (dictionary.toml)
//! - Environment variables (DICTIONARY_*)
//!
//! ## Example config file (dictionary.toml):
//! ```toml
//! [compiler]
//! max_inheritance_depth = 128
//!
//! [oracle]
//! timeout_ms = 5000
//!
//! [store]
//! path = "./models"
//!
//! [bootstrap]
//! enabled = true
//!
//! [compatibility]
//! strict = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main configuration for the dictionary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictionaryConfig {
    #[serde(default)]
    pub compiler: CompilerConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    #[serde(default)]
    pub compatibility: CompatibilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Bound on parent-chain traversal
    #[serde(default = "default_max_inheritance_depth")]
    pub max_inheritance_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_inheritance_depth: default_max_inheritance_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Deadline for a single usage query; timeouts count as "in use"
    #[serde(default = "default_oracle_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_oracle_timeout_ms(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root of the model store directory
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Whether the embedded core model is loaded at startup
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompatibilityConfig {
    /// Strict mode rejects any change to existing definitions
    #[serde(default)]
    pub strict: bool,
}

impl DictionaryConfig {
    /// Load from `dictionary.toml` in the working directory (optional) plus
    /// `DICTIONARY_*` environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("dictionary.toml")
    }

    /// Load from an explicit config file path (optional) plus environment
    /// overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("DICTIONARY").separator("__"));
        builder.build()?.try_deserialize()
    }

    /// Write the configuration as TOML, e.g. to scaffold a `dictionary.toml`
    pub fn save(&self, path: impl AsRef<Path>) -> crate::error::Result<()> {
        let rendered = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), rendered)?;
        Ok(())
    }
}

fn default_max_inheritance_depth() -> usize {
    crate::compiler::DEFAULT_MAX_INHERITANCE_DEPTH
}

fn default_oracle_timeout_ms() -> u64 {
    5000
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./models")
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DictionaryConfig::default();
        assert_eq!(
            config.compiler.max_inheritance_depth,
            crate::compiler::DEFAULT_MAX_INHERITANCE_DEPTH
        );
        assert_eq!(config.oracle.timeout(), Duration::from_millis(5000));
        assert!(config.bootstrap.enabled);
        assert!(!config.compatibility.strict);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dictionary.toml");
        std::fs::write(
            &path,
            "[compiler]\nmax_inheritance_depth = 7\n\n[oracle]\ntimeout_ms = 250\n",
        )
        .unwrap();

        let config = DictionaryConfig::load_from(&path).unwrap();
        assert_eq!(config.compiler.max_inheritance_depth, 7);
        assert_eq!(config.oracle.timeout_ms, 250);
        // Unspecified sections keep their defaults.
        assert!(config.bootstrap.enabled);
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dictionary.toml");

        let mut config = DictionaryConfig::default();
        config.oracle.timeout_ms = 1234;
        config.compatibility.strict = true;
        config.save(&path).unwrap();

        let loaded = DictionaryConfig::load_from(&path).unwrap();
        assert_eq!(loaded.oracle.timeout_ms, 1234);
        assert!(loaded.compatibility.strict);
        assert_eq!(
            loaded.compiler.max_inheritance_depth,
            config.compiler.max_inheritance_depth
        );
    }
}
