// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates bridge settings and derives the blocked-guild and banned-user sets
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

// Custom Debug impl to redact the bot token
impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Feed chat messages into MCP sampling
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum seconds between two sampling requests from the same user
    #[serde(default = "default_rate_limit_seconds")]
    pub rate_limit_seconds: u64,
    /// Maximum characters per outgoing chat message
    #[serde(default = "default_message_chunk_size")]
    pub message_chunk_size: usize,
    /// Only respond to messages that mention the bot
    #[serde(default = "default_true")]
    pub respond_to_mentions_only: bool,
    /// Ignore direct messages
    #[serde(default = "default_true")]
    pub block_dms: bool,
    /// Comma-separated guild IDs to ignore
    #[serde(default)]
    pub blocked_guilds: String,
    /// Comma-separated user IDs to ignore
    #[serde(default)]
    pub banned_users: String,
    /// Ignore messages from other bots, not just our own
    #[serde(default = "default_true")]
    pub ignore_bots: bool,
    /// How long a mention reaction waits for sampling before using the fallback
    #[serde(default = "default_reaction_timeout_ms")]
    pub reaction_timeout_ms: u64,
    #[serde(default = "default_reaction_fallback_emoji")]
    pub reaction_fallback_emoji: String,
    /// Deadline for message sampling requests
    #[serde(default = "default_sampling_timeout_ms")]
    pub sampling_timeout_ms: u64,
    /// Deadline for reaction sampling requests (also bounds abandoned ones)
    #[serde(default = "default_reaction_sampling_timeout_ms")]
    pub reaction_sampling_timeout_ms: u64,
    #[serde(default = "default_message_max_tokens")]
    pub message_max_tokens: u32,
    #[serde(default = "default_reaction_max_tokens")]
    pub reaction_max_tokens: u32,
    /// Show a typing indicator while waiting for sampling
    #[serde(default = "default_true")]
    pub typing_indicator: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit_seconds: default_rate_limit_seconds(),
            message_chunk_size: default_message_chunk_size(),
            respond_to_mentions_only: true,
            block_dms: true,
            blocked_guilds: String::new(),
            banned_users: String::new(),
            ignore_bots: true,
            reaction_timeout_ms: default_reaction_timeout_ms(),
            reaction_fallback_emoji: default_reaction_fallback_emoji(),
            sampling_timeout_ms: default_sampling_timeout_ms(),
            reaction_sampling_timeout_ms: default_reaction_sampling_timeout_ms(),
            message_max_tokens: default_message_max_tokens(),
            reaction_max_tokens: default_reaction_max_tokens(),
            typing_indicator: true,
        }
    }
}

impl SamplingConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs(self.rate_limit_seconds)
    }

    pub fn reaction_timeout(&self) -> Duration {
        Duration::from_millis(self.reaction_timeout_ms)
    }

    pub fn sampling_timeout(&self) -> Duration {
        Duration::from_millis(self.sampling_timeout_ms)
    }

    pub fn reaction_sampling_timeout(&self) -> Duration {
        Duration::from_millis(self.reaction_sampling_timeout_ms)
    }

    pub fn blocked_guild_set(&self) -> HashSet<String> {
        parse_id_list(&self.blocked_guilds)
    }

    pub fn banned_user_set(&self) -> HashSet<String> {
        parse_id_list(&self.banned_users)
    }

    /// Reject values the bridge cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.message_chunk_size == 0 {
            anyhow::bail!("message_chunk_size must be greater than zero");
        }
        if self.reaction_fallback_emoji.trim().is_empty() {
            anyhow::bail!("reaction_fallback_emoji must not be empty");
        }
        if self.message_max_tokens == 0 || self.reaction_max_tokens == 0 {
            anyhow::bail!("max token budgets must be greater than zero");
        }
        Ok(())
    }
}

/// Split a comma-separated ID list, trimming entries and dropping empty ones
pub fn parse_id_list(value: &str) -> HashSet<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_rate_limit_seconds() -> u64 {
    2
}

fn default_message_chunk_size() -> usize {
    2000 // Discord message length limit
}

fn default_reaction_timeout_ms() -> u64 {
    10_000
}

fn default_reaction_fallback_emoji() -> String {
    "🤔".to_string()
}

fn default_sampling_timeout_ms() -> u64 {
    60_000
}

fn default_reaction_sampling_timeout_ms() -> u64 {
    30_000
}

fn default_message_max_tokens() -> u32 {
    200
}

fn default_reaction_max_tokens() -> u32 {
    10
}

/// Parse a boolean env var, accepting the usual spellings
fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be a boolean, got: {}", name, value),
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got: {}", name, val)),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// XDG config location, e.g. ~/.config/discord-mcp/config.toml
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "discord-mcp")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Find the config file, checking multiple locations in order:
    /// 1. DISCORD_MCP_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory)
    /// 3. ~/.config/discord-mcp/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("DISCORD_MCP_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        Self::default_config_path().filter(|p| p.exists())
    }

    /// Parse a config file without applying environment overrides
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str::<Config>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    /// An explicit path wins over the usual search locations.
    pub fn load_from(explicit: Option<&std::path::Path>) -> Result<Self> {
        let path = explicit.map(PathBuf::from).or_else(Self::find_config_file);
        let mut config = match path {
            Some(config_path) => {
                tracing::info!(path = %config_path.display(), "Loading configuration from file");
                Self::from_file(&config_path)?
            }
            None => {
                tracing::info!("No config file found, using environment variables and defaults");
                Config::default()
            }
        };

        config.apply_env_overrides()?;
        config.sampling.validate()?;
        Ok(config)
    }

    /// Load configuration from the usual search locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("DISCORD_TOKEN") {
            if !val.trim().is_empty() {
                self.discord.token = Some(val);
            }
        }

        let sampling = &mut self.sampling;
        if let Ok(val) = std::env::var("SAMPLING_ENABLED") {
            sampling.enabled = parse_bool("SAMPLING_ENABLED", &val)?;
        }
        if let Some(val) = env_number("DEFAULT_RATE_LIMIT_SECONDS")? {
            sampling.rate_limit_seconds = val;
        }
        if let Some(val) = env_number("DEFAULT_MESSAGE_CHUNK_SIZE")? {
            sampling.message_chunk_size = val;
        }
        if let Ok(val) = std::env::var("RESPOND_TO_MENTIONS_ONLY") {
            sampling.respond_to_mentions_only = parse_bool("RESPOND_TO_MENTIONS_ONLY", &val)?;
        }
        if let Ok(val) = std::env::var("BLOCK_DMS") {
            sampling.block_dms = parse_bool("BLOCK_DMS", &val)?;
        }
        if let Ok(val) = std::env::var("BLOCKED_GUILDS") {
            sampling.blocked_guilds = val;
        }
        if let Ok(val) = std::env::var("BANNED_USERS") {
            sampling.banned_users = val;
        }
        if let Some(val) = env_number("REACTION_TIMEOUT_MS")? {
            sampling.reaction_timeout_ms = val;
        }
        if let Ok(val) = std::env::var("REACTION_FALLBACK_EMOJI") {
            sampling.reaction_fallback_emoji = val;
        }
        if let Some(val) = env_number("SAMPLING_TIMEOUT_MS")? {
            sampling.sampling_timeout_ms = val;
        }
        if let Some(val) = env_number("REACTION_SAMPLING_TIMEOUT_MS")? {
            sampling.reaction_sampling_timeout_ms = val;
        }
        Ok(())
    }

    /// Bot token, or an error explaining how to provide one
    pub fn require_token(&self) -> Result<&str> {
        self.discord
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Discord token missing: set DISCORD_TOKEN or [discord].token in config.toml"
                )
            })
    }
}
