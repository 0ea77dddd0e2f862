/// Core workflow type definitions
///
/// Defines the persisted registry shapes (registry state and per-workflow records)
/// and the naming rules every registered workflow must satisfy.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A registered workflow as handed out to callers
///
/// Built from the persisted entry plus the key it is stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    /// Unique workflow name (e.g., "echo", "support_bot")
    pub name: String,
    /// Location of the on-disk copy of the uploaded workflow code
    pub file_path: String,
    /// Free-form metadata, reserved for future use
    pub metadata: Map<String, Value>,
}

/// Persisted entry for one workflow inside the registry file
///
/// The name is the map key, so it is not repeated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredWorkflow {
    pub file_path: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Whole-file registry state
///
/// Serialized as `{ "active": <name|null>, "workflows": { name: StoredWorkflow } }`.
/// `active` must either be `None` or name a key of `workflows`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryState {
    #[serde(default)]
    pub active: Option<String>,
    #[serde(default)]
    pub workflows: BTreeMap<String, StoredWorkflow>,
}

impl RegistryState {
    /// Build the caller-facing record for `name`, if registered
    pub fn record(&self, name: &str) -> Option<WorkflowRecord> {
        self.workflows.get(name).map(|stored| WorkflowRecord {
            name: name.to_string(),
            file_path: stored.file_path.clone(),
            metadata: stored.metadata.clone(),
        })
    }

    /// All records in persisted map order
    pub fn records(&self) -> Vec<WorkflowRecord> {
        self.workflows
            .iter()
            .map(|(name, stored)| WorkflowRecord {
                name: name.clone(),
                file_path: stored.file_path.clone(),
                metadata: stored.metadata.clone(),
            })
            .collect()
    }
}

/// Check that `name` only uses lowercase ASCII letters, digits and underscores
/// and contains at least one letter or digit.
///
/// Names become file names under the workflows directory, so this is also
/// what keeps uploads from escaping it.
pub fn is_valid_workflow_name(name: &str) -> bool {
    let allowed = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    allowed && name.chars().any(|c| c != '_')
}

/// Turn free text typed by the user into a candidate workflow name
///
/// Trims, replaces spaces with underscores and lowercases. Returns `None` when
/// the result is not a valid name.
pub fn normalize_workflow_name(raw: &str) -> Option<String> {
    let candidate = raw.trim().replace(' ', "_").to_lowercase();
    is_valid_workflow_name(&candidate).then_some(candidate)
}
