/// Server setup and initialization
///
/// Wires together all components: registry, loader, lifecycle manager, chat handlers
/// and HTTP routes. Provides the application factory used by the binary and tests.

use crate::{
    api::{chat::create_chat_routes, workflows::create_workflow_routes, AppState},
    bot::{BotHandlers, ChatOutbox, CommandTable},
    config::Config,
    runtime::LuaWorkflowLoader,
    workflow::{WorkflowManager, WorkflowStore},
};
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Build the shared application state from configuration
///
/// Creates the data directories, opens the registry and loads the command table.
pub fn build_state(config: &Config) -> AppState {
    tracing::info!("📋 Opening workflow registry");
    let store = WorkflowStore::new(config.storage.registry_path());

    tracing::info!("⚙️ Initializing workflow manager with Lua loader");
    let manager = Arc::new(WorkflowManager::new(
        store,
        Arc::new(LuaWorkflowLoader::new()),
        config.storage.workflows_dir(),
    ));

    let commands = CommandTable::load(config.chat.commands_file.as_deref());
    let outbox = Arc::new(ChatOutbox::with_limit(config.chat.transcript_limit));

    let bot = Arc::new(BotHandlers::new(
        Arc::clone(&manager),
        commands,
        config.chat.accepted_extensions.clone(),
        outbox.clone(),
    ));

    AppState { manager, bot, outbox }
}

/// Create the Axum router over an existing application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(create_chat_routes())
        .merge(create_workflow_routes())
        .with_state(state)
}

/// Create the main Axum application with all routes
pub fn create_app(config: &Config) -> Result<Router> {
    config.validate()?;

    let state = build_state(config);
    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = create_router(state);

    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    init_logging(&config);

    tracing::info!("Starting AgentKit server...");

    let app = create_app(&config)?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
