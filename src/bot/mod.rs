/// Chat front end
///
/// Transport-agnostic conversation layer on top of the workflow manager:
/// - Command table loading and help formatting
/// - The outgoing-message transport trait and its in-memory outbox
/// - Handlers implementing the upload/naming/chat state machine

// Command table and `/command` parsing
pub mod commands;

// ChatTransport trait and the in-memory ChatOutbox
pub mod transport;

// Conversation state machine and command handlers
pub mod handlers;

pub use commands::{parse_command, CommandSpec, CommandTable, ParsedCommand};
pub use handlers::BotHandlers;
pub use transport::{ChatOutbox, ChatTransport, MessageId, OutgoingMessage, TurnRecorder};
