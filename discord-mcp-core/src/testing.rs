// ABOUTME: Test doubles for the chat platform, the sampling peer, and the clock
// ABOUTME: Allows deterministic bridge tests without Discord or an MCP client
//!
//! # Example
//!
//! ```no_run
//! use discord_mcp_core::testing::{MockChatClient, ScriptedSamplingPeer};
//! use discord_mcp_core::traits::ChannelInfo;
//!
//! let client = MockChatClient::new("bot");
//! client.add_channel(ChannelInfo::text("c1", "general"));
//! let peer = ScriptedSamplingPeer::new().respond_text("hi there");
//! ```

use crate::cooldown::Clock;
use crate::events::{HandlerRegistry, MessageHandler, Subscription};
use crate::traits::{
    ChannelInfo, ChatClient, InboundMessage, SamplingPeer, SamplingRequest, SamplingResponse,
    WebhookEdit, WebhookInfo, WebhookMessage,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Clock
// =============================================================================

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Sampling Peer
// =============================================================================

#[derive(Debug, Clone)]
enum Scripted {
    Respond(SamplingResponse),
    Fail(String),
}

/// Sampling peer that replays scripted answers.
///
/// Answers are consumed in order; the last one repeats forever.
#[derive(Debug, Default)]
pub struct ScriptedSamplingPeer {
    script: Mutex<VecDeque<Scripted>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<SamplingRequest>>,
}

impl ScriptedSamplingPeer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, response: SamplingResponse) -> Self {
        self.push(Scripted::Respond(response))
    }

    pub fn respond_text(self, text: &str) -> Self {
        self.respond(SamplingResponse::text(text))
    }

    pub fn fail(self, message: &str) -> Self {
        self.push(Scripted::Fail(message.to_string()))
    }

    /// Sleep this long before answering every request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(self, entry: Scripted) -> Self {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).push_back(entry);
        self
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<SamplingRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn next(&self) -> Option<Scripted> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

#[async_trait]
impl SamplingPeer for ScriptedSamplingPeer {
    async fn create_message(&self, request: SamplingRequest) -> Result<SamplingResponse> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next() {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted sampling response")),
        }
    }
}

// =============================================================================
// Chat Client
// =============================================================================

/// An operation recorded by MockChatClient
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    Send {
        channel_id: String,
        text: String,
    },
    Reply {
        channel_id: String,
        message_id: String,
        text: String,
    },
    React {
        channel_id: String,
        message_id: String,
        emoji: String,
    },
    RemoveReaction {
        channel_id: String,
        message_id: String,
        emoji: String,
        user_id: Option<String>,
    },
    Delete {
        channel_id: String,
        message_id: String,
    },
    Typing {
        channel_id: String,
    },
    CreateChannel {
        guild_id: String,
        name: String,
        topic: Option<String>,
    },
    DeleteChannel {
        channel_id: String,
        reason: Option<String>,
    },
    CreateWebhook {
        channel_id: String,
        name: String,
    },
    ExecuteWebhook {
        webhook_id: String,
        message: WebhookMessage,
    },
    EditWebhook {
        webhook_id: String,
        edit: WebhookEdit,
    },
    DeleteWebhook {
        webhook_id: String,
        reason: Option<String>,
    },
}

impl ChatAction {
    /// Text of a send or reply
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Send { text, .. } | Self::Reply { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Operations MockChatClient can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    FetchChannel,
    Send,
    Reply,
    React,
    RemoveReaction,
    Delete,
    Typing,
    CreateChannel,
    DeleteChannel,
    Webhook,
}

/// In-memory chat platform that records every operation.
///
/// Actions are recorded when the call completes, after any configured delay.
pub struct MockChatClient {
    bot_id: String,
    registry: HandlerRegistry,
    channels: Mutex<HashMap<String, ChannelInfo>>,
    /// Webhook ID to token
    webhooks: Mutex<HashMap<String, String>>,
    actions: Mutex<Vec<ChatAction>>,
    failing: Mutex<HashSet<MockOp>>,
    send_delays: Mutex<VecDeque<Duration>>,
    next_id: AtomicU64,
}

impl MockChatClient {
    pub fn new(bot_id: &str) -> Self {
        Self {
            bot_id: bot_id.to_string(),
            registry: HandlerRegistry::new(),
            channels: Mutex::new(HashMap::new()),
            webhooks: Mutex::new(HashMap::new()),
            actions: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            send_delays: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Delay the next sends and replies, one duration per call in order
    pub fn delay_sends(&self, delays: impl IntoIterator<Item = Duration>) {
        self.send_delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(delays);
    }

    pub fn add_webhook(&self, webhook_id: &str, token: &str) {
        self.webhooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(webhook_id.to_string(), token.to_string());
    }

    pub fn has_webhook(&self, webhook_id: &str) -> bool {
        self.webhooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(webhook_id)
    }

    pub fn add_channel(&self, channel: ChannelInfo) {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel.id.clone(), channel);
    }

    pub fn remove_channel(&self, channel_id: &str) {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).remove(channel_id);
    }

    /// Make every future call of `op` fail
    pub fn fail(&self, op: MockOp) {
        self.failing.lock().unwrap_or_else(|e| e.into_inner()).insert(op);
    }

    pub fn actions(&self) -> Vec<ChatAction> {
        self.actions.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Texts of all sends and replies, in order
    pub fn sent_texts(&self) -> Vec<String> {
        self.actions()
            .iter()
            .filter_map(|a| a.text().map(String::from))
            .collect()
    }

    /// Emojis of all reactions, in order
    pub fn reactions(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                ChatAction::React { emoji, .. } => Some(emoji),
                _ => None,
            })
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Deliver a message to every subscriber and wait for all of them
    pub async fn emit(&self, message: InboundMessage) {
        for handler in self.registry.handlers() {
            handler.on_message_create(message.clone()).await;
        }
    }

    fn check(&self, op: MockOp) -> Result<()> {
        if self.failing.lock().unwrap_or_else(|e| e.into_inner()).contains(&op) {
            anyhow::bail!("mock platform error: {:?}", op);
        }
        Ok(())
    }

    fn record(&self, action: ChatAction) {
        self.actions.lock().unwrap_or_else(|e| e.into_inner()).push(action);
    }

    fn new_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn send_delay(&self) {
        let delay = self
            .send_delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Whether `token` opens the webhook. `None` stands for bot authentication.
    fn webhook_matches(&self, webhook_id: &str, token: Option<&str>) -> bool {
        match self
            .webhooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(webhook_id)
        {
            Some(stored) => token.map_or(true, |t| t == stored),
            None => false,
        }
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    fn bot_user_id(&self) -> &str {
        &self.bot_id
    }

    fn bot_user_name(&self) -> &str {
        &self.bot_id
    }

    fn subscribe(&self, handler: Arc<dyn MessageHandler>) -> Subscription {
        self.registry.register(handler)
    }

    fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.registry.remove(subscription)
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<Option<ChannelInfo>> {
        self.check(MockOp::FetchChannel)?;
        Ok(self.channels.lock().unwrap_or_else(|e| e.into_inner()).get(channel_id).cloned())
    }

    async fn send(&self, channel_id: &str, text: &str) -> Result<String> {
        self.check(MockOp::Send)?;
        self.send_delay().await;
        self.record(ChatAction::Send {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        });
        Ok(self.new_id("sent"))
    }

    async fn reply(&self, channel_id: &str, message_id: &str, text: &str) -> Result<String> {
        self.check(MockOp::Reply)?;
        self.send_delay().await;
        self.record(ChatAction::Reply {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            text: text.to_string(),
        });
        Ok(self.new_id("sent"))
    }

    async fn react(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()> {
        self.check(MockOp::React)?;
        self.record(ChatAction::React {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
        user_id: Option<&str>,
    ) -> Result<()> {
        self.check(MockOp::RemoveReaction)?;
        self.record(ChatAction::RemoveReaction {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
            user_id: user_id.map(String::from),
        });
        Ok(())
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.check(MockOp::Delete)?;
        self.record(ChatAction::Delete {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    async fn send_typing(&self, channel_id: &str) -> Result<()> {
        self.check(MockOp::Typing)?;
        self.record(ChatAction::Typing {
            channel_id: channel_id.to_string(),
        });
        Ok(())
    }

    async fn create_text_channel(
        &self,
        guild_id: &str,
        name: &str,
        topic: Option<&str>,
    ) -> Result<ChannelInfo> {
        self.check(MockOp::CreateChannel)?;
        let channel = ChannelInfo::text(self.new_id("channel"), name);
        self.add_channel(channel.clone());
        self.record(ChatAction::CreateChannel {
            guild_id: guild_id.to_string(),
            name: name.to_string(),
            topic: topic.map(String::from),
        });
        Ok(channel)
    }

    async fn delete_channel(&self, channel_id: &str, reason: Option<&str>) -> Result<()> {
        self.check(MockOp::DeleteChannel)?;
        self.remove_channel(channel_id);
        self.record(ChatAction::DeleteChannel {
            channel_id: channel_id.to_string(),
            reason: reason.map(String::from),
        });
        Ok(())
    }

    async fn create_webhook(
        &self,
        channel_id: &str,
        name: &str,
        _avatar: Option<&str>,
        _reason: Option<&str>,
    ) -> Result<WebhookInfo> {
        self.check(MockOp::Webhook)?;
        let webhook = WebhookInfo {
            id: self.new_id("webhook"),
            token: Some(self.new_id("token")),
        };
        if let Some(token) = &webhook.token {
            self.add_webhook(&webhook.id, token);
        }
        self.record(ChatAction::CreateWebhook {
            channel_id: channel_id.to_string(),
            name: name.to_string(),
        });
        Ok(webhook)
    }

    async fn execute_webhook(
        &self,
        webhook_id: &str,
        token: &str,
        message: &WebhookMessage,
    ) -> Result<bool> {
        self.check(MockOp::Webhook)?;
        if !self.webhook_matches(webhook_id, Some(token)) {
            return Ok(false);
        }
        self.record(ChatAction::ExecuteWebhook {
            webhook_id: webhook_id.to_string(),
            message: message.clone(),
        });
        Ok(true)
    }

    async fn edit_webhook(
        &self,
        webhook_id: &str,
        token: Option<&str>,
        edit: &WebhookEdit,
    ) -> Result<bool> {
        self.check(MockOp::Webhook)?;
        if !self.webhook_matches(webhook_id, token) {
            return Ok(false);
        }
        self.record(ChatAction::EditWebhook {
            webhook_id: webhook_id.to_string(),
            edit: edit.clone(),
        });
        Ok(true)
    }

    async fn delete_webhook(
        &self,
        webhook_id: &str,
        token: Option<&str>,
        reason: Option<&str>,
    ) -> Result<bool> {
        self.check(MockOp::Webhook)?;
        if !self.webhook_matches(webhook_id, token) {
            return Ok(false);
        }
        self.webhooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(webhook_id);
        self.record(ChatAction::DeleteWebhook {
            webhook_id: webhook_id.to_string(),
            reason: reason.map(String::from),
        });
        Ok(true)
    }
}
