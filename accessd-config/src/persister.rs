use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{ConfigError, ShardConfigurationSet};

/// Durable read/write of a [`ShardConfigurationSet`] (spec §4.6). The wire
/// format is implementation-defined JSON with a stable schema; this trait
/// is the seam a deployment substitutes its own storage backend behind
/// (object storage, a config-management service, etc). `accessd` only
/// ships the file-backed implementation below.
pub trait ShardConfigurationPersister: Send + Sync {
    fn write(&self, set: &ShardConfigurationSet) -> Result<(), ConfigError>;
    fn read(&self) -> Result<ShardConfigurationSet, ConfigError>;
}

/// Reads/writes the configuration set as a JSON file on local disk.
#[derive(Debug, Clone)]
pub struct JsonFileConfigurationPersister {
    path: PathBuf,
}

impl JsonFileConfigurationPersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ShardConfigurationPersister for JsonFileConfigurationPersister {
    fn write(&self, set: &ShardConfigurationSet) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(set).map_err(|e| ConfigError::Write(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| ConfigError::Write(e.to_string()))?;
        info!(path = %self.path.display(), "wrote shard configuration");
        Ok(())
    }

    fn read(&self) -> Result<ShardConfigurationSet, ConfigError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| ConfigError::Read(e.to_string()))?;
        let set: ShardConfigurationSet =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Deserialize(e.to_string()))?;
        set.validate()?;
        debug!(path = %self.path.display(), assignments = set.len(), "read shard configuration");
        Ok(set)
    }
}

/// Convenience: read and validate a configuration file at `path` without
/// constructing a persister.
pub fn load(path: &Path) -> Result<ShardConfigurationSet, ConfigError> {
    JsonFileConfigurationPersister::new(path).read()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataElement, Operation, ShardAssignment, ShardClientConfig};

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shards.json");
        let persister = JsonFileConfigurationPersister::new(&path);

        let set = ShardConfigurationSet::new(vec![ShardAssignment::new(
            DataElement::User,
            Operation::Event,
            0,
            ShardClientConfig::new("localhost", 9000, "shard-0"),
        )]);

        persister.write(&set).unwrap();
        let read_back = persister.read().unwrap();
        assert!(set.equals(&read_back));
    }

    #[test]
    fn read_rejects_invalid_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shards.json");
        fs::write(
            &path,
            r#"{"assignments":[
                {"element":"User","operation":"Event","hash_range_start":0,"client_config":{"host":"a","port":1,"description":"a"}},
                {"element":"User","operation":"Event","hash_range_start":0,"client_config":{"host":"b","port":2,"description":"b"}}
            ]}"#,
        )
        .unwrap();

        let persister = JsonFileConfigurationPersister::new(&path);
        assert!(matches!(
            persister.read(),
            Err(ConfigError::DuplicateAssignment { .. })
        ));
    }
}
