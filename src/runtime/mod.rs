/// Workflow Runtime
///
/// This module turns uploaded workflow files into runnable workflows.
/// It handles:
/// - The loader contract (entry point discovery, output shapes, error kinds)
/// - The embedded Lua loader used in production

// Loader strategy trait, loaded workflow handle and output adapters
pub mod loader;

// mlua-backed loader for `.lua` workflow modules
pub mod lua;

// Re-export main types
pub use loader::{
    EntryPoint, LoadError, LoadedWorkflow, WorkflowError, WorkflowLoader, WorkflowOutput,
    EMPTY_OUTPUT_PLACEHOLDER,
};
pub use lua::LuaWorkflowLoader;
