/// Chat command and message handlers (single-user mode)
///
/// Drives the conversation: workflow uploads and naming, management commands and
/// plain chat turns forwarded to the active workflow. Replies go out through a
/// [`ChatTransport`], so the same handlers serve any front end.

use crate::{
    bot::{
        commands::{parse_command, CommandTable, ParsedCommand},
        transport::{ChatTransport, MessageId, TurnRecorder},
    },
    runtime::LoadedWorkflow,
    workflow::{normalize_workflow_name, WorkflowManager},
};
use std::sync::Arc;
use tokio::sync::Mutex;

const WELCOME: &str = "🤖 *Welcome to AgentKit!*\n\n\
    Upload your agent workflows and chat with them right here.\n\n\
    *Getting Started:*\n\
    1. Save your workflow code as a `.lua` or `.txt` file\n\
    2. Use /upload to send the file and register your workflow\n\
    3. Give your workflow a name when prompted\n\
    4. Start chatting!\n\n\
    Use /help to see all available commands.";

const SAVE_FAILED: &str = "❌ Failed to save workflow. Please ensure the file contains valid workflow code \
    with a `run_workflow()` function.";

const PROCESSING_FAILED: &str = "❌ An error occurred while processing your message. Please try again.";

/// Where the single user currently is in the upload/naming flow
#[derive(Debug, Default)]
struct ConversationState {
    /// A workflow file is expected next
    awaiting_upload: bool,
    /// Set when the expected file replaces an existing workflow
    update_target: Option<String>,
    /// Uploaded bytes waiting for the user to pick a name
    pending_file: Option<Vec<u8>>,
    /// The next plain message is the name for `pending_file`
    awaiting_name: bool,
}

/// Conversation handlers for one user
pub struct BotHandlers {
    manager: Arc<WorkflowManager>,
    commands: CommandTable,
    /// Accepted upload extensions, lowercase with leading dot
    accepted_extensions: Vec<String>,
    transport: Arc<dyn ChatTransport>,
    state: Mutex<ConversationState>,
}

impl BotHandlers {
    pub fn new(
        manager: Arc<WorkflowManager>,
        commands: CommandTable,
        accepted_extensions: Vec<String>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            manager,
            commands,
            accepted_extensions: accepted_extensions
                .into_iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            transport,
            state: Mutex::new(ConversationState::default()),
        }
    }

    /// Entry point for any text from the user: commands or chat
    ///
    /// Returns the ids of the messages this turn sent.
    pub async fn handle_text(&self, text: &str) -> Vec<MessageId> {
        let turn = TurnRecorder::new(Arc::clone(&self.transport));
        match parse_command(text) {
            Some(command) => self.handle_command(&turn, command).await,
            None => self.handle_message(&turn, text).await,
        }
        turn.into_sent()
    }

    /// Handle an uploaded file
    ///
    /// Returns the ids of the messages this turn sent.
    pub async fn handle_document(&self, file_name: &str, content: Vec<u8>) -> Vec<MessageId> {
        let turn = TurnRecorder::new(Arc::clone(&self.transport));
        self.receive_document(&turn, file_name, content).await;
        turn.into_sent()
    }

    async fn handle_command(&self, out: &dyn ChatTransport, command: ParsedCommand) {
        tracing::debug!("💬 Command /{} {:?}", command.name, command.args);

        match command.name.as_str() {
            "start" => self.start(out).await,
            "help" => self.help(out).await,
            "upload" => self.upload(out).await,
            "update" => self.update(out, command.first_arg()).await,
            "workflows" => self.workflows(out).await,
            "activate" => self.activate(out, command.first_arg()).await,
            "remove" => self.remove(out, command.first_arg()).await,
            "info" => self.info(out).await,
            _ => {
                let text = format!(
                    "❓ Unknown command /{}. Use /help to see available commands.",
                    command.name
                );
                reply(out, text).await
            }
        }
    }

    async fn start(&self, out: &dyn ChatTransport) {
        reply(out, WELCOME).await;
    }

    async fn help(&self, out: &dyn ChatTransport) {
        reply(out, self.commands.format_help()).await;
    }

    async fn upload(&self, out: &dyn ChatTransport) {
        {
            let mut state = self.state.lock().await;
            state.awaiting_upload = true;
            state.update_target = None;
        }

        reply(
            out,
            format!(
                "📤 Please upload your workflow file.\n\nSave your workflow code as a {} file, then send it here.",
                self.extension_list()
            ),
        )
        .await;
    }

    async fn update(&self, out: &dyn ChatTransport, name: Option<&str>) {
        let Some(name) = name else {
            reply(
                out,
                "⚠️ Please provide a workflow name.\nUsage: `/update <workflow_name>`",
            )
            .await;
            return;
        };

        if !self.manager.workflow_exists(name) {
            reply(
                out,
                format!(
                    "❌ Workflow '*{}*' not found.\nUse /workflows to see available workflows.",
                    name
                ),
            )
            .await;
            return;
        }

        {
            let mut state = self.state.lock().await;
            state.awaiting_upload = true;
            state.update_target = Some(name.to_string());
        }

        reply(
            out,
            format!(
                "📤 Please upload the updated workflow file for '*{}*'.\n\nSave the updated code as a {} file and send it here.",
                name,
                self.extension_list()
            ),
        )
        .await;
    }

    async fn workflows(&self, out: &dyn ChatTransport) {
        let workflows = self.manager.list_workflows();
        let active = self.manager.get_active_workflow_name();

        if workflows.is_empty() {
            reply(
                out,
                "📋 You haven't registered any workflows yet.\nUse /upload to register your first workflow!",
            )
            .await;
            return;
        }

        let mut response = String::from("📋 *Your Workflows:*\n\n");
        for record in &workflows {
            let marker = if active.as_deref() == Some(record.name.as_str()) { "🔄 " } else { "   " };
            response.push_str(&format!("{}*{}*\n", marker, record.name));
        }
        response.push_str(&format!("\n💬 Active: *{}*", active.as_deref().unwrap_or("None")));

        reply(out, response).await;
    }

    async fn activate(&self, out: &dyn ChatTransport, name: Option<&str>) {
        let Some(name) = name else {
            reply(
                out,
                "⚠️ Please provide a workflow name.\nUsage: `/activate <workflow_name>`",
            )
            .await;
            return;
        };

        let target = name.to_string();
        if !self.blocking(move |m| m.activate_workflow(&target)).await.unwrap_or(false) {
            reply(
                out,
                format!(
                    "❌ Workflow '*{}*' not found.\nUse /workflows to see available workflows.",
                    name
                ),
            )
            .await;
            return;
        }

        reply(out, format!("✅ Workflow '*{}*' activated!", name)).await;
    }

    async fn remove(&self, out: &dyn ChatTransport, name: Option<&str>) {
        let Some(name) = name else {
            reply(
                out,
                "⚠️ Please provide a workflow name.\nUsage: `/remove <workflow_name>`",
            )
            .await;
            return;
        };

        if !self.manager.remove_workflow(name) {
            reply(out, format!("❌ Workflow '*{}*' not found.", name)).await;
            return;
        }

        reply(out, format!("🗑️ Workflow '*{}*' removed.", name)).await;
    }

    async fn info(&self, out: &dyn ChatTransport) {
        let Some(active) = self.manager.get_active_workflow_name() else {
            reply(out, "⚠️ No active workflow. Use /upload or /activate first.").await;
            return;
        };

        let Some(workflow) = self.active_workflow().await else {
            reply(out, "❌ Could not load active workflow.").await;
            return;
        };

        reply(
            out,
            format!(
                "📋 *Active Workflow:* {}\n\n*Name:* {}\n*Description:* {}",
                active,
                workflow.name(),
                workflow.description()
            ),
        )
        .await;
    }

    async fn receive_document(&self, out: &dyn ChatTransport, file_name: &str, content: Vec<u8>) {
        let mut state = self.state.lock().await;

        if !state.awaiting_upload {
            reply(out, "❌ I wasn't expecting a file. Use /upload or /update first.").await;
            return;
        }

        if !self.is_accepted(file_name) {
            reply(
                out,
                format!(
                    "❌ Please upload a workflow file with one of these extensions: {}",
                    self.accepted_extensions.join(", ")
                ),
            )
            .await;
            return;
        }

        tracing::info!("📎 Received workflow file '{}' ({} bytes)", file_name, content.len());

        if let Some(name) = state.update_target.clone() {
            let target = name.clone();
            let saved = self
                .blocking(move |m| m.save_workflow(&target, &content, true))
                .await
                .unwrap_or(false);
            if !saved {
                reply(out, SAVE_FAILED).await;
                return;
            }

            state.awaiting_upload = false;
            state.update_target = None;
            reply(out, format!("✅ Workflow '*{}*' updated successfully!", name)).await;
        } else {
            state.pending_file = Some(content);
            state.awaiting_upload = false;
            state.awaiting_name = true;
            reply(
                out,
                "✅ File received!\n\nWhat would you like to name this workflow?\n\
                 (Use lowercase letters, numbers, and underscores only)",
            )
            .await;
        }
    }

    /// Handle a non-command message: either the name for a pending upload or a
    /// chat turn for the active workflow
    async fn handle_message(&self, out: &dyn ChatTransport, text: &str) {
        {
            let mut state = self.state.lock().await;
            if state.awaiting_name {
                self.name_pending_workflow(out, &mut state, text).await;
                return;
            }
        }

        self.chat_with_active_workflow(out, text).await;
    }

    async fn name_pending_workflow(
        &self,
        out: &dyn ChatTransport,
        state: &mut ConversationState,
        text: &str,
    ) {
        let Some(name) = normalize_workflow_name(text) else {
            reply(
                out,
                "❌ Workflow name can only contain letters, numbers, and underscores.\n\
                 Please provide a valid name.",
            )
            .await;
            return;
        };

        if self.manager.workflow_exists(&name) {
            reply(
                out,
                format!(
                    "❌ Workflow '*{0}*' already exists.\nUse `/update {0}` to update it, or choose a different name.",
                    name
                ),
            )
            .await;
            return;
        }

        let content = state.pending_file.take();
        state.awaiting_name = false;

        let saved = match content {
            Some(content) => {
                let target = name.clone();
                self.blocking(move |m| m.save_workflow(&target, &content, false))
                    .await
                    .unwrap_or(false)
            }
            None => false,
        };

        if !saved {
            reply(out, SAVE_FAILED).await;
            return;
        }

        let target = name.clone();
        let activated = self
            .blocking(move |m| m.list_workflows().len() == 1 && m.activate_workflow(&target))
            .await
            .unwrap_or(false);

        if activated {
            let text = format!("✅ Workflow '*{}*' created and activated!\nReady to chat!", name);
            reply(out, text).await;
        } else {
            reply(
                out,
                format!(
                    "✅ Workflow '*{0}*' created!\nUse `/activate {0}` to switch to it.",
                    name
                ),
            )
            .await;
        }
    }

    /// Forward a chat turn to the active workflow
    ///
    /// A placeholder goes out immediately and is rewritten with the answer once the
    /// workflow finishes. The conversation state is not locked while it runs.
    async fn chat_with_active_workflow(&self, out: &dyn ChatTransport, text: &str) {
        let Some(active) = self.manager.get_active_workflow_name() else {
            reply(
                out,
                "⚠️ No active workflow. Please use /upload to register a workflow first!",
            )
            .await;
            return;
        };

        let Some(workflow) = self.active_workflow().await else {
            reply(out, "❌ Could not load active workflow. Please try /activate again.").await;
            return;
        };

        let header = format!("🔄 *[{}]*", active);
        let placeholder = match out
            .send(format!("{}\n\n⏳ Processing your request...", header))
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("⚠️ Failed to send processing placeholder: {}", e);
                None
            }
        };

        match workflow.run(text).await {
            Ok(response) => {
                deliver(out, placeholder, format!("{}\n\n{}", header, response)).await;
            }
            Err(e) => {
                tracing::error!("❌ Chat turn failed: {}", e);
                deliver(out, placeholder, PROCESSING_FAILED.to_string()).await;
            }
        }
    }

    /// The active workflow, loaded on the blocking pool on a cache miss
    async fn active_workflow(&self) -> Option<Arc<LoadedWorkflow>> {
        self.blocking(|m| m.get_active_workflow()).await.flatten()
    }

    /// Run a manager call that may evaluate workflow code off the async workers
    async fn blocking<T, F>(&self, op: F) -> Option<T>
    where
        F: FnOnce(&WorkflowManager) -> T + Send + 'static,
        T: Send + 'static,
    {
        let manager = Arc::clone(&self.manager);
        match tokio::task::spawn_blocking(move || op(&manager)).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("❌ Workflow manager task failed: {}", e);
                None
            }
        }
    }

    fn is_accepted(&self, file_name: &str) -> bool {
        let file_name = file_name.to_lowercase();
        self.accepted_extensions
            .iter()
            .any(|ext| file_name.ends_with(ext.as_str()))
    }

    fn extension_list(&self) -> String {
        self.accepted_extensions
            .iter()
            .map(|ext| format!("`{}`", ext))
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

/// Rewrite the placeholder if there is one, otherwise send a fresh message
async fn deliver(out: &dyn ChatTransport, placeholder: Option<MessageId>, text: String) {
    if let Some(id) = placeholder {
        match out.edit(id, text.clone()).await {
            Ok(()) => return,
            Err(e) => tracing::warn!("⚠️ Failed to edit placeholder, sending a new message: {}", e),
        }
    }

    reply(out, text).await;
}

async fn reply(out: &dyn ChatTransport, text: impl Into<String>) {
    if let Err(e) = out.send(text.into()).await {
        tracing::error!("❌ Failed to send reply: {}", e);
    }
}
