// ABOUTME: Library root for the Discord MCP server
// ABOUTME: Wires the Discord platform, MCP protocol handling, tools and stdio transport

pub mod cli;
pub mod mcp;
pub mod platform;
pub mod server;
pub mod tools;

pub use discord_mcp_core::{config, Config};
