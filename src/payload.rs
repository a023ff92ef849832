use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stac::Item;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::TaskError;
use crate::selection::{SelectionOptions, SelectionSpec};
use crate::task::TASK_NAME;

/// The host-workflow envelope: the item under `features` plus the process
/// definition carrying per-task options. Fields the task does not interpret
/// are carried through untouched.
#[derive(Debug, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub features: Vec<Item>,
    #[serde(default)]
    pub process: Vec<ProcessDefinition>,
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProcessDefinition {
    #[serde(default)]
    pub tasks: HashMap<String, Value>,
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

impl Payload {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let payload: Self = serde_json::from_str(&content)?;
        Ok(payload)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// The item this invocation operates on.
    pub fn item(&self) -> Result<&Item, TaskError> {
        self.features
            .first()
            .ok_or_else(|| TaskError::Config("payload contains no features".to_string()))
    }

    pub fn replace_item(&mut self, item: Item) {
        if self.features.is_empty() {
            self.features.push(item);
        } else {
            self.features[0] = item;
        }
    }

    /// The options block for this task. A missing or malformed block is a
    /// configuration error, surfaced before any processing starts.
    pub fn task_options(&self) -> Result<SelectionOptions, TaskError> {
        let raw = self
            .process
            .first()
            .and_then(|process| process.tasks.get(TASK_NAME))
            .ok_or_else(|| {
                TaskError::Config(format!("no options for task '{}' in payload", TASK_NAME))
            })?;
        if raw.get("assets").is_none() {
            return Err(TaskError::Config(
                "assets that need to be copied required to be specified".to_string(),
            ));
        }
        let options: SelectionOptions =
            serde_json::from_value(raw.clone()).map_err(|err| TaskError::Config(err.to_string()))?;
        if matches!(&options.assets, SelectionSpec::Explicit(keys) if keys.is_empty()) {
            return Err(TaskError::Config(
                "assets must name at least one asset key".to_string(),
            ));
        }
        Ok(options)
    }
}
