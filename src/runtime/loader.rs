/// Workflow loading contract
///
/// A loader turns a workflow file on disk into a [`LoadedWorkflow`]: an executable
/// unit whose entry point has been found and wrapped behind a uniform
/// `run(text) -> text` call. How the code is actually evaluated is up to the
/// loader implementation, so the lifecycle manager stays independent of the
/// scripting engine.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

/// Text returned when a workflow run produces nothing
pub const EMPTY_OUTPUT_PLACEHOLDER: &str = "Workflow completed with no output.";

/// Why a workflow file could not be loaded
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Workflow file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid workflow in {}: {reason}", .path.display())]
    ContractViolation { path: PathBuf, reason: String },

    #[error("Failed to read workflow file: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub(crate) fn contract(path: &Path, reason: impl Into<String>) -> Self {
        Self::ContractViolation {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Failure raised while a loaded workflow is running
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow '{workflow}' failed: {message}")]
    Execution { workflow: String, message: String },
}

/// Result shapes an entry point may produce
///
/// Entry points are untyped third-party code. Whatever they return is sorted into one
/// of these variants by the loader, then flattened to text by [`WorkflowOutput::into_text`].
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutput {
    /// Entry point returned a plain string
    Text(String),
    /// Entry point returned a structured value with an `output_text` field
    Structured { output_text: String },
    /// Entry point returned nothing
    Empty,
    /// Anything else, already stringified
    Other(String),
}

impl WorkflowOutput {
    /// Collapse the output into the reply text shown to the user
    pub fn into_text(self) -> String {
        match self {
            WorkflowOutput::Text(text) => text,
            WorkflowOutput::Structured { output_text } => output_text,
            WorkflowOutput::Empty => EMPTY_OUTPUT_PLACEHOLDER.to_string(),
            WorkflowOutput::Other(text) => text,
        }
    }
}

/// Invocation handle bound to a loaded workflow's entry point
///
/// Implementations are called from the blocking thread pool and may take as
/// long as they like.
pub trait EntryPoint: Send + Sync {
    /// Call the entry point with `{ input_as_text }` and classify what it returned
    fn invoke(&self, input_as_text: &str) -> Result<WorkflowOutput, String>;
}

/// A workflow that has been loaded and is ready to run
///
/// Lives only in memory. Cheap to share through an `Arc`.
pub struct LoadedWorkflow {
    name: String,
    description: String,
    entry: Arc<dyn EntryPoint>,
}

impl LoadedWorkflow {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        entry: Arc<dyn EntryPoint>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            entry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run the workflow with the user's message and return the reply text
    ///
    /// The entry point runs on the blocking pool so slow workflows never stall the
    /// async executor. Errors (including panics) are logged with the workflow name
    /// and handed back to the caller; nothing is retried.
    pub async fn run(&self, user_input: &str) -> Result<String, WorkflowError> {
        let entry = Arc::clone(&self.entry);
        let input = user_input.to_string();
        let started = std::time::Instant::now();

        let outcome = tokio::task::spawn_blocking(move || entry.invoke(&input))
            .await
            .map_err(|e| format!("workflow task aborted: {}", e))
            .and_then(|result| result);

        match outcome {
            Ok(output) => {
                tracing::info!("✅ Workflow '{}' completed in {:?}", self.name, started.elapsed());
                Ok(output.into_text())
            }
            Err(message) => {
                tracing::error!("❌ Workflow '{}' failed: {}", self.name, message);
                Err(WorkflowError::Execution {
                    workflow: self.name.clone(),
                    message,
                })
            }
        }
    }
}

impl fmt::Debug for LoadedWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedWorkflow")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Strategy for turning workflow files into runnable workflows
pub trait WorkflowLoader: Send + Sync {
    /// File extension (without the dot) used for stored workflow files
    fn source_extension(&self) -> &str;

    /// Load the workflow at `path` and bind its entry point
    fn load(&self, path: &Path) -> Result<LoadedWorkflow, LoadError>;

    /// Whether `path` holds a loadable workflow
    ///
    /// Performs a full load and throws the result away.
    fn validate(&self, path: &Path) -> bool {
        match self.load(path) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("⚠️ Workflow validation failed: {}", e);
                false
            }
        }
    }
}
