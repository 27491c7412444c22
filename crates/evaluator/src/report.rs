//! JSON persistence shared by every evaluation report.

use kernelscope_core::{KernelScopeError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn unix_time_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}

pub trait JsonReport: Serialize + DeserializeOwned {
    /// Write the report as pretty JSON, creating parent directories.
    fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source_name = path.display().to_string();
        let json = fs::read_to_string(path).map_err(|e| KernelScopeError::parse(&source_name, e))?;
        serde_json::from_str(&json).map_err(|e| KernelScopeError::parse(&source_name, e))
    }
}
