/// AgentKit: chat front end for uploaded agent workflows
///
/// This library provides the workflow registry, the dynamic workflow loader, the
/// lifecycle manager with its loaded-workflow cache, and the chat layer that lets
/// a single user upload, switch between and talk to workflows.

// Core configuration and setup
pub mod config;

// Workflow management layer - records, registry persistence and lifecycle
pub mod workflow;

// Workflow runtime - loader contract and the embedded Lua loader
pub mod runtime;

// Chat layer - commands, conversation state machine and outgoing messages
pub mod bot;

// HTTP API layer - chat turns and workflow management endpoints
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use bot::{BotHandlers, ChatOutbox, ChatTransport};
pub use runtime::{LoadedWorkflow, LuaWorkflowLoader, WorkflowLoader};
pub use server::start_server;
pub use workflow::{WorkflowManager, WorkflowRecord, WorkflowStore};
