// ABOUTME: Chat platform implementations for the MCP server
// ABOUTME: Re-exports the Discord client and its gateway handle

pub mod discord;

pub use discord::{DiscordClient, GatewayHandle};
