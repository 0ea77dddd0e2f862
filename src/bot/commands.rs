/// Chat command table and command parsing
///
/// The command table maps command names to help text. It is loaded from a JSON
/// array of `{ "command": ..., "description": ... }` objects, falling back to the
/// table built into the binary.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

const BUILTIN_COMMANDS: &str = include_str!("../../assets/commands.json");

/// Commands listed under "Workflow Management" in the help text
const WORKFLOW_COMMANDS: [&str; 5] = ["upload", "update", "workflows", "activate", "remove"];

/// Commands that take a workflow name argument
const NAMED_COMMANDS: [&str; 3] = ["update", "activate", "remove"];

const CONVERSATION_COMMANDS: [&str; 1] = ["info"];

/// One entry of the command table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub command: String,
    pub description: String,
}

/// Ordered list of chat commands with their help text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandTable {
    commands: Vec<CommandSpec>,
}

impl CommandTable {
    pub fn new(commands: Vec<CommandSpec>) -> Self {
        Self { commands }
    }

    /// The command table compiled into the binary
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_COMMANDS).unwrap_or_else(|e| {
            tracing::error!("❌ Built-in command table is invalid: {}", e);
            Self::default()
        })
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw).map(Self::new)
    }

    /// Load the command table from `path`, or use the built-in one when no path is given
    ///
    /// A file that can't be read or parsed yields an empty table.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };

        let loaded = fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| Self::from_json(&raw).map_err(anyhow::Error::from));

        match loaded {
            Ok(table) => {
                tracing::info!(
                    "📜 Loaded {} commands from {}",
                    table.commands.len(),
                    path.display()
                );
                table
            }
            Err(e) => {
                tracing::error!("❌ Failed to load commands from {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    /// Render the grouped help message (Markdown)
    pub fn format_help(&self) -> String {
        let mut workflow = Vec::new();
        let mut conversation = Vec::new();
        let mut general = Vec::new();

        for spec in &self.commands {
            let name = spec.command.as_str();
            if WORKFLOW_COMMANDS.contains(&name) {
                workflow.push(spec);
            } else if CONVERSATION_COMMANDS.contains(&name) {
                conversation.push(spec);
            } else if name != "start" {
                general.push(spec);
            }
        }

        let mut message = String::from("🔧 *Available Commands:*\n\n");

        if !workflow.is_empty() {
            message.push_str("*Workflow Management:*\n");
            for spec in workflow {
                let usage = if NAMED_COMMANDS.contains(&spec.command.as_str()) {
                    " <name>"
                } else {
                    ""
                };
                message.push_str(&format!("/{}{} - {}\n", spec.command, usage, spec.description));
            }
            message.push('\n');
        }

        for (title, group) in [("Conversation", conversation), ("General", general)] {
            if group.is_empty() {
                continue;
            }
            message.push_str(&format!("*{}:*\n", title));
            for spec in group {
                message.push_str(&format!("/{} - {}\n", spec.command, spec.description));
            }
            message.push('\n');
        }

        message.push_str("💬 Just send a message to chat with your active workflow!");
        message
    }
}

/// A `/command arg ...` message split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Parse a chat message as a command
///
/// Returns `None` for text that doesn't start with `/`. A `@botname` suffix on the
/// command is dropped and the name is lowercased.
pub fn parse_command(text: &str) -> Option<ParsedCommand> {
    let rest = text.trim().strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let head = parts.next()?;
    let name = head.split('@').next().unwrap_or(head).to_lowercase();

    if name.is_empty() {
        return None;
    }

    Some(ParsedCommand {
        name,
        args: parts.map(str::to_string).collect(),
    })
}
