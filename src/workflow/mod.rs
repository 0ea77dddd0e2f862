/// Workflow Management Layer
///
/// This module handles workflow records, persistence, and lifecycle.
/// It provides the core workflow management functionality including:
/// - Type definitions (WorkflowRecord, RegistryState) and naming rules
/// - JSON-file persistence of the registry
/// - The lifecycle manager with its lock-free loaded-workflow cache

// Core workflow type definitions
pub mod types;

// JSON-file persistence for the workflow registry
pub mod storage;

// Save/load/activate/remove orchestration and the ArcSwap cache
pub mod manager;

// Re-export commonly used types
pub use manager::WorkflowManager;
pub use storage::WorkflowStore;
pub use types::{is_valid_workflow_name, normalize_workflow_name, RegistryState, WorkflowRecord};
