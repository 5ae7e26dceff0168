use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::storage::{FileStorage, MemoryStorage, Storage};

/// Name of the database created when the registry would otherwise be empty
pub const DEFAULT_DATABASE: &str = "DemoDB";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Snapshot file; None keeps everything in memory
    pub data_file: Option<PathBuf>,
    /// Database sessions start on, and the one recreated when the last is dropped
    pub default_database: String,
    /// Seed the sample company schema when no snapshot exists
    pub seed_demo: bool,
    /// Write the seeded registry out immediately
    pub persist_seed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: None,
            default_database: DEFAULT_DATABASE.to_string(),
            seed_demo: false,
            persist_seed: true,
        }
    }
}

impl Config {
    /// Storage backend matching `data_file`
    pub fn storage(&self) -> Box<dyn Storage> {
        match &self.data_file {
            Some(path) => Box::new(FileStorage::new(path)),
            None => Box::new(MemoryStorage::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, DEFAULT_DATABASE};
    use crate::error::Result;

    #[test]
    fn test_config_defaults() -> Result<()> {
        let config: Config = serde_json::from_str(r#"{"seed_demo": true}"#)?;
        assert!(config.seed_demo);
        assert!(config.persist_seed);
        assert_eq!(config.default_database, DEFAULT_DATABASE);
        assert_eq!(config.data_file, None);
        Ok(())
    }
}
