// ABOUTME: Main entry point for the Discord MCP server
// ABOUTME: Initializes logging, config and Discord, then serves MCP over stdio until shutdown

use anyhow::{Context, Result};
use clap::Parser;
use discord_mcp::cli::Args;
use discord_mcp::mcp::{McpPeer, McpServer};
use discord_mcp::platform::DiscordClient;
use discord_mcp::server;
use discord_mcp::tools::DiscordTools;
use discord_mcp_core::{Config, EventBridge, SystemClock};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging(json: bool) {
    // stdout carries the protocol, so every log line goes to stderr
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,twilight_gateway=warn,twilight_http=warn".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Log panics before they take the process down
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(args.log_json);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Discord MCP server");

    let mut config = Config::load_from(args.config.as_deref())?;
    args.apply(&mut config);
    config.sampling.validate()?;
    let token = config.require_token()?.to_string();

    tracing::info!(
        sampling = config.sampling.enabled,
        rate_limit_secs = config.sampling.rate_limit_seconds,
        chunk_size = config.sampling.message_chunk_size,
        mentions_only = config.sampling.respond_to_mentions_only,
        block_dms = config.sampling.block_dms,
        blocked_guilds = config.sampling.blocked_guild_set().len(),
        banned_users = config.sampling.banned_user_set().len(),
        "Configuration loaded"
    );

    if let Some(addr) = args.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to initialize Prometheus metrics")?;
        tracing::info!(addr = %addr, "Prometheus metrics listening");
    }

    let discord = Arc::new(DiscordClient::connect(&token).await?);
    let gateway = discord.start_gateway(&token);

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let peer = McpPeer::new(outbound_tx);
    let mcp = Arc::new(McpServer::new(
        peer.clone(),
        DiscordTools::new(discord.clone()),
        config.sampling.enabled,
    ));

    let bridge = config.sampling.enabled.then(|| {
        let bridge = EventBridge::new(
            discord.clone(),
            Arc::new(peer.clone()),
            &config.sampling,
            Arc::new(SystemClock),
        );
        bridge.enable();
        bridge
    });

    tracing::info!(
        sampling = bridge.is_some(),
        "MCP server ready on stdio"
    );

    tokio::select! {
        result = server::serve(mcp, outbound_rx, tokio::io::stdin(), tokio::io::stdout()) => {
            if let Err(e) = result {
                tracing::error!(error = %format!("{:#}", e), "MCP transport failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
    }

    if let Some(bridge) = &bridge {
        bridge.disable();
    }
    gateway.shutdown().await;
    tracing::info!("Discord MCP server stopped");
    Ok(())
}
