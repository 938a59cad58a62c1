// shopsync/src/config/overrides_file.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{Result, SyncError};

/// Project-relative path of the declarative override file.
pub const OVERRIDE_FILE_NAME: &str = "shopsync.json";

/// The declarative override file. Every key is optional; unknown keys are
/// ignored. The file is read fresh on each invocation, never cached.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OverrideFile {
    #[serde(default)]
    pub ignore_tables: Vec<String>,

    /// sales_channel id (hex) -> domain to assign to that channel.
    #[serde(default)]
    pub sales_channel_domains: BTreeMap<String, String>,

    /// configuration key -> value, either a bare scalar or
    /// `{"_value": ..., "scope_id": "..."}`.
    #[serde(default)]
    pub system_config: BTreeMap<String, ConfigEntry>,

    #[serde(default)]
    pub sql_updates: Vec<String>,

    #[serde(default)]
    pub post_sync_commands: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConfigEntry {
    Detailed {
        #[serde(rename = "_value")]
        value: serde_json::Value,
        #[serde(default)]
        scope_id: Option<String>,
    },
    Scalar(serde_json::Value),
}

impl ConfigEntry {
    pub fn value(&self) -> &serde_json::Value {
        match self {
            ConfigEntry::Detailed { value, .. } => value,
            ConfigEntry::Scalar(value) => value,
        }
    }

    pub fn scope_id(&self) -> Option<&str> {
        match self {
            ConfigEntry::Detailed { scope_id, .. } => scope_id.as_deref(),
            ConfigEntry::Scalar(_) => None,
        }
    }
}

impl OverrideFile {
    /// Returns `Ok(None)` when the file does not exist. Unreadable or
    /// malformed content is fatal; everything downstream trusts this file.
    pub fn load(path: &Path) -> Result<Option<OverrideFile>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::Override(format!(
                "failed to read override file {}: {e}",
                path.display()
            ))
        })?;
        let file = serde_json::from_str(&content).map_err(|e| {
            SyncError::Override(format!("malformed override file {}: {e}", path.display()))
        })?;
        Ok(Some(file))
    }

    /// Ordered table exclusions with duplicates removed, first occurrence
    /// winning.
    pub fn ignore_table_set(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for table in &self.ignore_tables {
            let table = table.trim();
            if !table.is_empty() && !seen.iter().any(|known: &String| known == table) {
                seen.push(table.to_string());
            }
        }
        seen
    }
}
