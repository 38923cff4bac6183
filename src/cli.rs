// ABOUTME: Command-line flags for the discord-mcp binary
// ABOUTME: Flags override values from config.toml and the environment

use clap::Parser;
use discord_mcp_core::config::Config;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "discord-mcp")]
#[command(about = "MCP server for Discord with an optional sampling bridge", long_about = None)]
#[command(version)]
pub struct Args {
    /// Path to config.toml (otherwise DISCORD_MCP_CONFIG_PATH, ./config.toml, XDG config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Feed chat messages into MCP sampling (`--sampling false` to turn off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub sampling: Option<bool>,

    /// Seconds between two sampling requests from the same user
    #[arg(long = "rate-limit", value_name = "SECONDS")]
    pub rate_limit: Option<u64>,

    /// Maximum characters per outgoing message
    #[arg(long = "message-chunk-size", value_name = "CHARS")]
    pub message_chunk_size: Option<usize>,

    /// Only respond to messages that mention the bot
    #[arg(long = "mentions-only", num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub mentions_only: Option<bool>,

    /// Ignore direct messages
    #[arg(long = "block-dms", num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub block_dms: Option<bool>,

    /// Comma-separated guild IDs to ignore
    #[arg(long = "blocked-guilds", value_name = "IDS")]
    pub blocked_guilds: Option<String>,

    /// Comma-separated user IDs to ignore
    #[arg(long = "banned-users", value_name = "IDS")]
    pub banned_users: Option<String>,

    /// Milliseconds a mention reaction waits for sampling before the fallback emoji
    #[arg(long = "reaction-timeout", value_name = "MS")]
    pub reaction_timeout: Option<u64>,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long = "metrics-addr", value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Log as JSON lines instead of human-readable text
    #[arg(long = "log-json")]
    pub log_json: bool,
}

impl Args {
    /// Apply flag overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        let sampling = &mut config.sampling;
        if let Some(enabled) = self.sampling {
            sampling.enabled = enabled;
        }
        if let Some(secs) = self.rate_limit {
            sampling.rate_limit_seconds = secs;
        }
        if let Some(size) = self.message_chunk_size {
            sampling.message_chunk_size = size;
        }
        if let Some(mentions_only) = self.mentions_only {
            sampling.respond_to_mentions_only = mentions_only;
        }
        if let Some(block_dms) = self.block_dms {
            sampling.block_dms = block_dms;
        }
        if let Some(guilds) = &self.blocked_guilds {
            sampling.blocked_guilds = guilds.clone();
        }
        if let Some(users) = &self.banned_users {
            sampling.banned_users = users.clone();
        }
        if let Some(ms) = self.reaction_timeout {
            sampling.reaction_timeout_ms = ms;
        }
    }
}
