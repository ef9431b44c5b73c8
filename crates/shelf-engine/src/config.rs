use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shelf_types::TypeDescriptor;

use crate::error::{EngineError, EngineResult};

/// Settings for [`PersistenceEngine::open`](crate::PersistenceEngine::open).
///
/// ```toml
/// root = "/var/lib/shelf"
/// user = "batch"
///
/// [[types]]
/// key = "org.example.Customer"
/// tag = "CUS"
/// reference_lists = ["orders"]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding every record file.
    pub root: PathBuf,
    /// Acting user written into version stamps.
    pub user: String,
    /// Persistable types.
    pub types: Vec<TypeDescriptor>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./shelf-data"),
            user: "system".into(),
            types: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Read a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Parse TOML configuration text.
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }
}
