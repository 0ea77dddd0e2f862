/// AgentKit: chat with your uploaded agent workflows
///
/// Main entry point. Loads configuration from the environment (and `.env`) and
/// starts the HTTP server:
/// - Chat turns at /api/chat/*
/// - Workflow management at /api/workflows/*
/// - Health check at /healthz

use agentkit::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    start_server(config).await
}
