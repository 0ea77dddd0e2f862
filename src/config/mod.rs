/// Configuration management for the agentkit service
///
/// Handles server configuration, data locations, logging and upload rules.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Transcript size used when AGENTKIT_TRANSCRIPT_LIMIT is unset
pub const DEFAULT_TRANSCRIPT_LIMIT: usize = 1000;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Chat front-end configuration
    pub chat: ChatConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Where the registry file and workflow files live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base data directory (default: "data")
    /// Creates: workflows.json, workflows/<name>.lua
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (e.g., "info", "agentkit=debug")
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Upload file extensions accepted by the chat front end, with leading dot
    pub accepted_extensions: Vec<String>,
    /// Optional JSON command table overriding the built-in one
    pub commands_file: Option<PathBuf>,
    /// Outgoing messages kept in the in-memory transcript before the oldest are dropped
    pub transcript_limit: usize,
}

impl StorageConfig {
    /// Path of the registry JSON file
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("workflows.json")
    }

    /// Directory holding uploaded workflow files
    pub fn workflows_dir(&self) -> PathBuf {
        self.data_dir.join("workflows")
    }
}

impl Config {
    /// Build configuration from the environment, reading a `.env` file first if present
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::default()
    }

    /// Check the configuration and make sure the data directory exists
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("AGENTKIT_PORT must be a non-zero port number");
        }

        if self.chat.accepted_extensions.len() != 2 {
            bail!(
                "AGENTKIT_ACCEPTED_EXTENSIONS must list exactly two extensions, got {:?}",
                self.chat.accepted_extensions
            );
        }

        if self.chat.transcript_limit == 0 {
            bail!("AGENTKIT_TRANSCRIPT_LIMIT must be at least 1");
        }

        std::fs::create_dir_all(&self.storage.data_dir).with_context(|| {
            format!("Failed to create data directory {}", self.storage.data_dir.display())
        })?;

        Ok(())
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("AGENTKIT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("AGENTKIT_PORT")
                    .unwrap_or_else(|_| "3004".to_string())
                    .parse()
                    .unwrap_or(3004),
            },
            storage: StorageConfig {
                data_dir: std::env::var("AGENTKIT_DATA_DIR")
                    .unwrap_or_else(|_| "data".to_string())
                    .into(),
            },
            logging: LoggingConfig {
                level: std::env::var("AGENTKIT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            chat: ChatConfig {
                accepted_extensions: std::env::var("AGENTKIT_ACCEPTED_EXTENSIONS")
                    .map(|raw| parse_extensions(&raw))
                    .unwrap_or_else(|_| vec![".lua".to_string(), ".txt".to_string()]),
                commands_file: std::env::var("AGENTKIT_COMMANDS_FILE").ok().map(PathBuf::from),
                transcript_limit: std::env::var("AGENTKIT_TRANSCRIPT_LIMIT")
                    .ok()
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(DEFAULT_TRANSCRIPT_LIMIT),
            },
        }
    }
}

/// Parse a comma-separated extension list, adding the leading dot where missing
fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| if ext.starts_with('.') { ext } else { format!(".{}", ext) })
        .collect()
}
