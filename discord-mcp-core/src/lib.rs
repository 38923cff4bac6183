// ABOUTME: Platform-agnostic sampling bridge between chat events and an MCP client
// ABOUTME: Filtering, cooldowns, sampling, reactions and chunked delivery behind narrow traits

pub mod bridge;
pub mod config;
pub mod cooldown;
pub mod delivery;
pub mod events;
pub mod filter;
pub mod metrics;
pub mod prompt;
pub mod reaction;
pub mod sampling;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use bridge::{BridgeHandler, EventBridge, EventOutcome, SamplingOutcome, APOLOGY};
pub use config::{Config, DiscordConfig, SamplingConfig};
pub use cooldown::{Clock, CooldownTracker, SystemClock};
pub use delivery::{deliver, split_chunks, DeliveryError};
pub use events::{HandlerRegistry, MessageHandler, Subscription};
pub use filter::{FilterPolicy, FilterReason};
pub use reaction::ReactionRace;
pub use sampling::{Sampler, SamplingError};

// Re-export core traits for convenient access
pub use traits::{
    // Chat platform
    ChannelCapability, ChannelInfo, ChatClient, ChatUser, GuildRef, InboundMessage,
    // Webhooks
    WebhookEdit, WebhookInfo, WebhookMessage,
    // Sampling
    Role, SamplingContent, SamplingMessage, SamplingPeer, SamplingRequest, SamplingResponse,
};
