/// Workflow lifecycle management
///
/// Orchestrates saving, loading, activating and removing workflows. Durable state
/// goes through [`WorkflowStore`], code loading goes through a [`WorkflowLoader`],
/// and loaded workflows are cached in memory behind an `ArcSwap` so readers never
/// take a lock.
///
/// Every public operation reports failure as `false`/`None` and logs the cause;
/// the only error that ever reaches a caller is a workflow's own runtime failure,
/// raised later by [`LoadedWorkflow::run`].

use crate::{
    runtime::{LoadedWorkflow, WorkflowLoader},
    workflow::{
        storage::WorkflowStore,
        types::{is_valid_workflow_name, WorkflowRecord},
    },
};
use arc_swap::ArcSwap;
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Owns the registry, the workflow file tree and the loaded-workflow cache
///
/// Designed for one conversation driving it sequentially. Concurrent saves or
/// removals of the same name are not serialized.
pub struct WorkflowManager {
    /// Durable name -> record mapping plus the active pointer
    store: WorkflowStore,

    /// Strategy used to turn workflow files into runnable workflows
    loader: Arc<dyn WorkflowLoader>,

    /// Directory holding one file per registered workflow
    workflows_dir: PathBuf,

    /// Already-loaded workflows keyed by name
    /// Entries are dropped whenever their record is updated or removed
    cache: ArcSwap<HashMap<String, Arc<LoadedWorkflow>>>,
}

impl WorkflowManager {
    /// Create a manager storing workflow files under `workflows_dir`
    pub fn new(
        store: WorkflowStore,
        loader: Arc<dyn WorkflowLoader>,
        workflows_dir: impl Into<PathBuf>,
    ) -> Self {
        let workflows_dir = workflows_dir.into();
        if let Err(e) = fs::create_dir_all(&workflows_dir) {
            tracing::error!(
                "❌ Failed to create workflows directory {}: {}",
                workflows_dir.display(),
                e
            );
        }

        tracing::info!("📁 Workflow manager using {}", workflows_dir.display());

        Self {
            store,
            loader,
            workflows_dir,
            cache: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    /// Canonical file location for a workflow: `<workflows_dir>/<name>.<ext>`
    pub fn workflow_path(&self, name: &str) -> PathBuf {
        self.workflows_dir
            .join(format!("{}.{}", name, self.loader.source_extension()))
    }

    /// Where an upload is written before it has been validated
    ///
    /// Names never contain dots, so this can't collide with a canonical path.
    fn staging_path(&self, name: &str) -> PathBuf {
        self.workflows_dir
            .join(format!("{}.upload.{}", name, self.loader.source_extension()))
    }

    /// Store an uploaded workflow under `name`
    ///
    /// The upload is validated with a full load before it replaces anything, so a
    /// rejected upload leaves neither a stray file nor a broken registered workflow.
    /// On success the record is upserted and any cached instance is dropped, so the
    /// next load sees the new code.
    pub fn save_workflow(&self, name: &str, content: &[u8], is_update: bool) -> bool {
        if !is_valid_workflow_name(name) {
            tracing::error!("❌ Refusing to save workflow with invalid name: {:?}", name);
            return false;
        }

        let staging = self.staging_path(name);
        if let Err(e) = fs::write(&staging, content) {
            tracing::error!("❌ Failed to write workflow '{}': {}", name, e);
            return false;
        }

        if !self.loader.validate(&staging) {
            tracing::warn!("⚠️ Upload for workflow '{}' is not a valid workflow", name);
            discard(&staging);
            return false;
        }

        let path = self.workflow_path(name);
        if let Err(e) = fs::rename(&staging, &path) {
            tracing::error!("❌ Failed to move workflow '{}' into place: {}", name, e);
            discard(&staging);
            return false;
        }

        self.store.add_workflow(name, &path.to_string_lossy(), None);
        self.evict(name);

        if is_update {
            tracing::info!("🔥 Updated workflow: {}", name);
        } else {
            tracing::info!("✨ Saved workflow: {}", name);
        }

        true
    }

    /// Get a runnable workflow, loading it on first use
    ///
    /// Cache hits are returned as-is without touching the file. Unknown names and
    /// files that fail to load both yield `None`.
    pub fn load_workflow(&self, name: &str) -> Option<Arc<LoadedWorkflow>> {
        if let Some(cached) = self.cache.load().get(name) {
            tracing::debug!("⚡ Workflow cache hit: {}", name);
            return Some(Arc::clone(cached));
        }

        let record = self.store.get_workflow(name)?;

        match self.loader.load(Path::new(&record.file_path)) {
            Ok(workflow) => {
                let workflow = Arc::new(workflow);
                self.cache_insert(name, Arc::clone(&workflow));
                Some(workflow)
            }
            Err(e) => {
                tracing::error!("❌ Failed to load workflow '{}': {}", name, e);
                None
            }
        }
    }

    /// Make `name` the active workflow
    ///
    /// Only succeeds when the workflow can actually be loaded.
    pub fn activate_workflow(&self, name: &str) -> bool {
        if self.load_workflow(name).is_none() {
            return false;
        }

        self.store.set_active(Some(name));
        tracing::info!("🎯 Activated workflow: {}", name);
        true
    }

    /// The active workflow, loaded and ready to run
    pub fn get_active_workflow(&self) -> Option<Arc<LoadedWorkflow>> {
        let name = self.store.get_active()?;
        self.load_workflow(&name)
    }

    pub fn get_active_workflow_name(&self) -> Option<String> {
        self.store.get_active()
    }

    pub fn list_workflows(&self) -> Vec<WorkflowRecord> {
        self.store.list_workflows()
    }

    pub fn workflow_exists(&self, name: &str) -> bool {
        self.store.workflow_exists(name)
    }

    pub fn get_workflow_info(&self, name: &str) -> Option<WorkflowRecord> {
        self.store.get_workflow(name)
    }

    /// Remove a workflow's file, record and cached instance
    ///
    /// Returns false for unknown names. All three steps are attempted even when
    /// an earlier one fails; any failure makes the overall result false. A file
    /// that is already gone does not count as a failure.
    pub fn remove_workflow(&self, name: &str) -> bool {
        let Some(record) = self.store.get_workflow(name) else {
            return false;
        };

        let mut removed = true;

        match fs::remove_file(&record.file_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!("❌ Failed to delete file for workflow '{}': {}", name, e);
                removed = false;
            }
        }

        if !self.store.remove_workflow(name) {
            tracing::error!("❌ Workflow '{}' vanished from the registry during removal", name);
            removed = false;
        }

        self.evict(name);

        if removed {
            tracing::info!("🗑️ Removed workflow: {}", name);
        }

        removed
    }

    /// Names of the workflows currently held in the cache
    pub fn cached_workflows(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cache.load().keys().cloned().collect();
        names.sort();
        names
    }

    fn cache_insert(&self, name: &str, workflow: Arc<LoadedWorkflow>) {
        let current = self.cache.load();
        let mut next = (**current).clone();
        next.insert(name.to_string(), workflow);
        self.cache.store(Arc::new(next));
    }

    fn evict(&self, name: &str) {
        let current = self.cache.load();
        if !current.contains_key(name) {
            return;
        }

        let mut next = (**current).clone();
        next.remove(name);
        self.cache.store(Arc::new(next));
        tracing::debug!("♻️ Evicted cached workflow: {}", name);
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::error!("❌ Failed to clean up {}: {}", path.display(), e);
        }
    }
}
