/// JSON-file persistence for the workflow registry
///
/// The whole registry (active pointer plus every workflow record) lives in one
/// pretty-printed JSON file. Every read reloads the file and every write rewrites it
/// in full. There is no locking: two writers racing on read-then-rewrite can lose
/// an update, which is acceptable for the single-user deployment this serves.

use crate::workflow::types::{RegistryState, StoredWorkflow, WorkflowRecord};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// File-backed registry of workflow records and the active workflow name
///
/// I/O failures never reach callers. A failed read behaves like an empty registry,
/// a failed write is logged and dropped.
#[derive(Debug, Clone)]
pub struct WorkflowStore {
    /// Path of the registry JSON file
    path: PathBuf,
}

impl WorkflowStore {
    /// Open the registry at `path`, creating parent directories and an empty
    /// registry file when none exists yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let store = Self { path: path.into() };

        if let Some(parent) = store.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::error!(
                    "❌ Failed to create registry directory {}: {}",
                    parent.display(),
                    e
                );
            }
        }

        if !store.path.exists() {
            store.save_state(&RegistryState::default());
        }

        tracing::info!("📋 Workflow registry ready at {}", store.path.display());
        store
    }

    /// Location of the backing registry file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_state(&self) -> RegistryState {
        let parsed = fs::read_to_string(&self.path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str(&raw).map_err(anyhow::Error::from));

        match parsed {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(
                    "❌ Failed to load workflow registry {}: {}",
                    self.path.display(),
                    e
                );
                RegistryState::default()
            }
        }
    }

    fn save_state(&self, state: &RegistryState) {
        let written = serde_json::to_string_pretty(state)
            .map_err(anyhow::Error::from)
            .and_then(|json| fs::write(&self.path, json).map_err(anyhow::Error::from));

        if let Err(e) = written {
            tracing::error!("❌ Failed to save workflow registry {}: {}", self.path.display(), e);
        }
    }

    /// Name of the active workflow, if any
    pub fn get_active(&self) -> Option<String> {
        self.load_state().active
    }

    /// Set or clear the active workflow
    ///
    /// Does not check that `name` is registered; the lifecycle manager does that
    /// before calling.
    pub fn set_active(&self, name: Option<&str>) {
        let mut state = self.load_state();
        state.active = name.map(str::to_string);
        self.save_state(&state);
        tracing::info!("🎯 Active workflow set to {:?}", name);
    }

    /// Register a workflow, replacing any existing record with the same name
    pub fn add_workflow(&self, name: &str, file_path: &str, metadata: Option<Map<String, Value>>) {
        let mut state = self.load_state();
        state.workflows.insert(
            name.to_string(),
            StoredWorkflow {
                file_path: file_path.to_string(),
                metadata: metadata.unwrap_or_default(),
            },
        );
        self.save_state(&state);
        tracing::info!("📝 Registered workflow: {}", name);
    }

    /// Look up a single workflow record
    pub fn get_workflow(&self, name: &str) -> Option<WorkflowRecord> {
        self.load_state().record(name)
    }

    /// All registered workflows, in registry file order
    pub fn list_workflows(&self) -> Vec<WorkflowRecord> {
        self.load_state().records()
    }

    /// Remove a workflow record
    ///
    /// Returns false when the name is unknown. Clears the active pointer in the
    /// same rewrite when it pointed at the removed workflow.
    pub fn remove_workflow(&self, name: &str) -> bool {
        let mut state = self.load_state();
        if state.workflows.remove(name).is_none() {
            return false;
        }

        if state.active.as_deref() == Some(name) {
            state.active = None;
        }

        self.save_state(&state);
        tracing::info!("🗑️ Removed workflow record: {}", name);
        true
    }

    /// Whether a workflow with this name is registered
    pub fn workflow_exists(&self, name: &str) -> bool {
        self.load_state().workflows.contains_key(name)
    }
}
