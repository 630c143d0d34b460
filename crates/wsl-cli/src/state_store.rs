use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;
use wsl_core::ScriptError;
use wsl_runtime::VariableStore;

use crate::{map_cli_state_invalid, map_cli_state_read, map_cli_state_write};

pub(crate) const GLOBALS_SCHEMA: &str = "wsl-globals.v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GlobalsFile {
    pub(crate) schema_version: String,
    pub(crate) variables: BTreeMap<String, String>,
}

pub(crate) fn save_globals(path: &Path, variables: &BTreeMap<String, String>) -> Result<(), ScriptError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(map_cli_state_write)?;

    let state = GlobalsFile {
        schema_version: GLOBALS_SCHEMA.to_string(),
        variables: variables.clone(),
    };
    let payload = serde_json::to_string_pretty(&state)
        .map_err(|error| ScriptError::new("CLI_STATE_WRITE", error.to_string()))?;
    fs::write(path, payload).map_err(map_cli_state_write)
}

/// Missing file means no globals yet.
pub(crate) fn load_globals(path: &Path) -> Result<BTreeMap<String, String>, ScriptError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let raw = fs::read_to_string(path).map_err(map_cli_state_read)?;
    let state: GlobalsFile = serde_json::from_str(&raw).map_err(map_cli_state_invalid)?;

    if state.schema_version != GLOBALS_SCHEMA {
        return Err(ScriptError::new(
            "CLI_STATE_SCHEMA",
            format!("Unsupported globals schema: {}", state.schema_version),
        ));
    }

    Ok(state.variables)
}

/// Global variable store written through to a JSON file on every change.
#[derive(Debug)]
pub(crate) struct JsonFileVariableStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl JsonFileVariableStore {
    pub(crate) fn open(path: impl Into<PathBuf>) -> Result<Self, ScriptError> {
        let path = path.into();
        let values = load_globals(&path)?;
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    fn persist(&self, values: &BTreeMap<String, String>) {
        if let Err(error) = save_globals(&self.path, values) {
            warn!(path = %self.path.display(), code = %error.code, "{}", error.message);
        }
    }
}

impl VariableStore for JsonFileVariableStore {
    fn get(&self, name: &str) -> Option<String> {
        self.values.read().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) {
        let mut values = self.values.write();
        values.insert(name.to_string(), value.to_string());
        self.persist(&values);
    }

    fn remove(&self, name: &str) -> Option<String> {
        let mut values = self.values.write();
        let removed = values.remove(name);
        if removed.is_some() {
            self.persist(&values);
        }
        removed
    }

    fn contains(&self, name: &str) -> bool {
        self.values.read().contains_key(name)
    }
}
