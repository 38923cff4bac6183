// ABOUTME: Event bridge that turns chat messages into sampling requests and replies
// ABOUTME: Owns the enable/disable lifecycle and the per-event handling pipeline

use crate::config::SamplingConfig;
use crate::cooldown::{Clock, CooldownTracker};
use crate::delivery;
use crate::events::{MessageHandler, Subscription};
use crate::filter::{FilterPolicy, FilterReason};
use crate::metrics;
use crate::prompt;
use crate::reaction::ReactionRace;
use crate::sampling::Sampler;
use crate::traits::{ChatClient, InboundMessage, SamplingPeer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sent when the bridge tried to answer and something broke
pub const APOLOGY: &str = "💥 Oops! Something went wrong. My brain.exe has stopped working.";

// =============================================================================
// Outcomes
// =============================================================================

/// What happened on the sampling path of one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplingOutcome {
    /// Author is inside their cooldown window
    Throttled,
    /// Channel is gone or does not accept posts
    ChannelUnavailable,
    /// Sampling produced no usable text
    NoResponse,
    Responded { chunks: usize },
    /// Something failed after the cooldown was taken; an apology was attempted
    Failed,
}

/// Result of handling one "message created" event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Filtered(FilterReason),
    Handled {
        /// Emoji applied when the bot was mentioned
        reaction: Option<String>,
        sampling: SamplingOutcome,
    },
}

// =============================================================================
// Per-event handler
// =============================================================================

/// Handles message events for one enabled period of the bridge.
///
/// Each handler owns its cooldown table, so re-enabling starts fresh.
pub struct BridgeHandler {
    client: Arc<dyn ChatClient>,
    policy: FilterPolicy,
    cooldown: CooldownTracker,
    sampler: Sampler,
    reactions: ReactionRace,
    chunk_size: usize,
    max_tokens: u32,
    sampling_timeout: Duration,
    typing: bool,
}

impl BridgeHandler {
    pub fn new(
        client: Arc<dyn ChatClient>,
        sampler: Sampler,
        config: &SamplingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policy: FilterPolicy::new(client.bot_user_id(), config),
            cooldown: CooldownTracker::new(config.rate_limit(), clock),
            reactions: ReactionRace::new(sampler.clone(), config),
            client,
            sampler,
            chunk_size: config.message_chunk_size,
            max_tokens: config.message_max_tokens,
            sampling_timeout: config.sampling_timeout(),
            typing: config.typing_indicator,
        }
    }

    /// Run the full pipeline for one message. Never fails.
    pub async fn process(&self, message: &InboundMessage) -> EventOutcome {
        if let Some(reason) = self.policy.filter_reason(message) {
            tracing::debug!(
                message_id = %message.id,
                author_id = %message.author.id,
                reason = reason.as_str(),
                "Message filtered"
            );
            metrics::record_filtered(reason);
            return EventOutcome::Filtered(reason);
        }

        // Mention reactions skip the cooldown and run alongside sampling
        let mentioned = message.mentions_user(self.policy.bot_user_id());
        let reaction = async {
            if mentioned {
                Some(self.reactions.react(self.client.as_ref(), message).await)
            } else {
                None
            }
        };

        let (reaction, sampling) = tokio::join!(reaction, self.sample_and_reply(message));
        EventOutcome::Handled { reaction, sampling }
    }

    async fn sample_and_reply(&self, message: &InboundMessage) -> SamplingOutcome {
        if !self.cooldown.try_acquire(&message.author.id) {
            tracing::debug!(author_id = %message.author.id, "Sampling throttled by cooldown");
            metrics::record_throttled();
            return SamplingOutcome::Throttled;
        }

        match self.try_sample_and_reply(message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    message_id = %message.id,
                    channel_id = %message.channel_id,
                    error = %format!("{:#}", e),
                    "Error processing sampling request"
                );
                if let Err(send_err) = self
                    .client
                    .reply(&message.channel_id, &message.id, APOLOGY)
                    .await
                {
                    tracing::debug!(error = %send_err, "Failed to send apology");
                }
                SamplingOutcome::Failed
            }
        }
    }

    async fn try_sample_and_reply(&self, message: &InboundMessage) -> Result<SamplingOutcome> {
        let channel = match self
            .client
            .fetch_channel(&message.channel_id)
            .await
            .context("Failed to fetch channel")?
        {
            Some(channel) if channel.capability.can_send() => channel,
            other => {
                tracing::debug!(
                    channel_id = %message.channel_id,
                    capability = ?other.map(|c| c.capability),
                    "Channel cannot receive a response"
                );
                return Ok(SamplingOutcome::ChannelUnavailable);
            }
        };

        let template = prompt::message_template(message, Some(&channel));

        if self.typing && channel.capability.supports_typing() {
            self.client
                .send_typing(&channel.id)
                .await
                .context("Failed to send typing indicator")?;
        }

        metrics::record_sampling_request("message");
        let text = match self
            .sampler
            .request_completion(&template, self.max_tokens, self.sampling_timeout)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                metrics::record_sampling_failure("message", e.kind());
                return Err(e.into());
            }
        };

        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            tracing::debug!(message_id = %message.id, "Sampling returned no text");
            return Ok(SamplingOutcome::NoResponse);
        };

        let chunks =
            delivery::deliver(self.client.as_ref(), &channel, &message.id, &text, self.chunk_size)
                .await?;
        metrics::record_chunks_sent(chunks);

        tracing::info!(
            message_id = %message.id,
            channel_id = %channel.id,
            response_len = text.len(),
            chunks,
            "Sent sampling response"
        );
        Ok(SamplingOutcome::Responded { chunks })
    }
}

#[async_trait]
impl MessageHandler for BridgeHandler {
    async fn on_message_create(&self, message: InboundMessage) {
        self.process(&message).await;
    }
}

// =============================================================================
// Bridge lifecycle
// =============================================================================

/// Connects a chat client to a sampling peer.
///
/// Disabled until `enable()` registers a handler; `disable()` removes it.
/// Events already being handled when the bridge is disabled run to completion.
pub struct EventBridge {
    client: Arc<dyn ChatClient>,
    sampler: Sampler,
    config: SamplingConfig,
    clock: Arc<dyn Clock>,
    subscription: Mutex<Option<Subscription>>,
}

impl EventBridge {
    pub fn new(
        client: Arc<dyn ChatClient>,
        peer: Arc<dyn SamplingPeer>,
        config: &SamplingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            sampler: Sampler::new(peer),
            config: config.clone(),
            clock,
            subscription: Mutex::new(None),
        }
    }

    /// A fresh handler with an empty cooldown table
    pub fn handler(&self) -> BridgeHandler {
        BridgeHandler::new(
            self.client.clone(),
            self.sampler.clone(),
            &self.config,
            self.clock.clone(),
        )
    }

    /// Start handling message events. Returns false if already enabled.
    pub fn enable(&self) -> bool {
        let mut subscription = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if subscription.is_some() {
            return false;
        }
        *subscription = Some(self.client.subscribe(Arc::new(self.handler())));
        tracing::info!(
            bot_user_id = %self.client.bot_user_id(),
            rate_limit_secs = self.config.rate_limit_seconds,
            "Sampling bridge enabled"
        );
        true
    }

    /// Stop handling message events. Returns false if already disabled.
    pub fn disable(&self) -> bool {
        let Some(subscription) = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return false;
        };
        if !self.client.unsubscribe(subscription) {
            tracing::warn!("Sampling handler was already unregistered");
        }
        tracing::info!("Sampling bridge disabled");
        true
    }

    pub fn is_enabled(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}
