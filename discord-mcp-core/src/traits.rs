// ABOUTME: Core traits for the chat platform and sampling collaborators
// ABOUTME: Defines inbound message, channel capability, and sampling request/response types

use crate::events::{MessageHandler, Subscription};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// User Identity
// =============================================================================

/// Author of a chat message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatUser {
    /// Platform user ID (Discord snowflake as a string)
    pub id: String,
    /// Account username
    pub username: String,
    /// Display name, if the user set one
    pub display_name: Option<String>,
    /// Whether the account is an automated bot
    pub bot: bool,
}

impl ChatUser {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            display_name: None,
            bot: false,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn as_bot(mut self) -> Self {
        self.bot = true;
        self
    }

    /// Display name, falling back to the username
    pub fn display_name_or_username(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Guild (server) a message was posted in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildRef {
    pub id: String,
    /// Cached guild name, if the platform knows it
    pub name: Option<String>,
}

impl GuildRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

// =============================================================================
// Inbound Message
// =============================================================================

/// A "message created" event from the chat platform
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Platform message ID
    pub id: String,
    /// The user who sent the message
    pub author: ChatUser,
    /// Guild context; `None` for direct messages
    pub guild: Option<GuildRef>,
    /// Channel the message was posted in
    pub channel_id: String,
    /// Message text
    pub content: String,
    /// IDs of users mentioned in the message
    pub mentions: HashSet<String>,
    /// When the message was created
    pub created_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Whether the message mentions the given user
    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.contains(user_id)
    }

    /// Whether the message was sent outside any guild
    pub fn is_direct(&self) -> bool {
        self.guild.is_none()
    }
}

// =============================================================================
// Channels
// =============================================================================

/// What a channel can do, decided once when the channel is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCapability {
    /// Text channel the bot can post into
    Sendable {
        /// Whether the channel shows a typing indicator
        typing: bool,
    },
    /// Holds messages but does not accept posts directly (e.g. forums)
    TextReadOnly,
    /// Categories, directories and other non-text channels
    NonText,
}

impl ChannelCapability {
    pub fn can_send(&self) -> bool {
        matches!(self, Self::Sendable { .. })
    }

    pub fn supports_typing(&self) -> bool {
        matches!(self, Self::Sendable { typing: true })
    }
}

/// A fetched channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    /// Channel name; `None` for DMs
    pub name: Option<String>,
    pub capability: ChannelCapability,
    /// Whether webhooks can be created in this channel
    pub webhooks: bool,
}

impl ChannelInfo {
    pub fn text(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            capability: ChannelCapability::Sendable { typing: true },
            webhooks: true,
        }
    }

    pub fn direct(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            capability: ChannelCapability::Sendable { typing: true },
            webhooks: false,
        }
    }
}

// =============================================================================
// Webhooks
// =============================================================================

/// A webhook the bot created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookInfo {
    pub id: String,
    /// Secret needed to post through the webhook
    pub token: Option<String>,
}

/// A message posted through a webhook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookMessage {
    pub content: String,
    /// Overrides the webhook's default name
    pub username: Option<String>,
    /// Overrides the webhook's default avatar
    pub avatar_url: Option<String>,
    /// Post into this thread of the webhook's channel
    pub thread_id: Option<String>,
}

/// Changes to a webhook. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookEdit {
    pub name: Option<String>,
    /// Image data URI
    pub avatar: Option<String>,
    /// Move the webhook to another channel
    pub channel_id: Option<String>,
    /// Audit log reason
    pub reason: Option<String>,
}

// =============================================================================
// Chat Platform
// =============================================================================

/// Chat platform operations the bridge and tools consume.
///
/// Every network operation may fail with a platform error (network,
/// permission, not found); callers treat those as plain errors.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// The bot's own user ID on this platform
    fn bot_user_id(&self) -> &str;

    /// The bot's account name
    fn bot_user_name(&self) -> &str;

    /// Check if a user ID is the bot itself
    fn is_self(&self, user_id: &str) -> bool {
        user_id == self.bot_user_id()
    }

    /// Register a handler for "message created" events
    fn subscribe(&self, handler: Arc<dyn MessageHandler>) -> Subscription;

    /// Remove a previously registered handler. Returns false if it was already gone.
    fn unsubscribe(&self, subscription: Subscription) -> bool;

    /// Fetch a channel. `Ok(None)` means the channel no longer exists.
    async fn fetch_channel(&self, channel_id: &str) -> Result<Option<ChannelInfo>>;

    /// Send text to a channel, returning the new message ID
    async fn send(&self, channel_id: &str, text: &str) -> Result<String>;

    /// Send text as a reply to a specific message, returning the new message ID
    async fn reply(&self, channel_id: &str, message_id: &str, text: &str) -> Result<String>;

    /// React to a message with a unicode emoji
    async fn react(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()>;

    /// Remove a reaction. `user_id = None` removes the bot's own reaction.
    async fn remove_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
        user_id: Option<&str>,
    ) -> Result<()>;

    /// Delete a message
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()>;

    /// Show the typing indicator in a channel
    async fn send_typing(&self, channel_id: &str) -> Result<()>;

    /// Create a text channel in a guild
    async fn create_text_channel(
        &self,
        guild_id: &str,
        name: &str,
        topic: Option<&str>,
    ) -> Result<ChannelInfo>;

    /// Delete a channel
    async fn delete_channel(&self, channel_id: &str, reason: Option<&str>) -> Result<()>;

    /// Create a webhook in a channel
    async fn create_webhook(
        &self,
        channel_id: &str,
        name: &str,
        avatar: Option<&str>,
        reason: Option<&str>,
    ) -> Result<WebhookInfo>;

    /// Post a message through a webhook. `Ok(false)` means the webhook does not exist.
    async fn execute_webhook(
        &self,
        webhook_id: &str,
        token: &str,
        message: &WebhookMessage,
    ) -> Result<bool>;

    /// Edit a webhook, authenticating with its token when given.
    /// `Ok(false)` means the webhook does not exist.
    async fn edit_webhook(
        &self,
        webhook_id: &str,
        token: Option<&str>,
        edit: &WebhookEdit,
    ) -> Result<bool>;

    /// Delete a webhook. `Ok(false)` means the webhook does not exist.
    async fn delete_webhook(
        &self,
        webhook_id: &str,
        token: Option<&str>,
        reason: Option<&str>,
    ) -> Result<bool>;
}

// =============================================================================
// Sampling
// =============================================================================

/// Conversation role of a sampling content block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Content of a sampling message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SamplingContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl SamplingContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A single role-tagged content block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingMessage {
    pub role: Role,
    pub content: SamplingContent,
}

/// Parameters of a "create message" sampling request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingRequest {
    pub messages: Vec<SamplingMessage>,
    pub max_tokens: u32,
    /// Deadline for the whole round trip; not part of the wire format
    #[serde(skip)]
    pub timeout: Duration,
}

impl SamplingRequest {
    /// A request with one user-role text block
    pub fn user_text(text: impl Into<String>, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            messages: vec![SamplingMessage {
                role: Role::User,
                content: SamplingContent::text(text),
            }],
            max_tokens,
            timeout,
        }
    }
}

/// Result of a "create message" sampling request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingResponse {
    pub role: Role,
    pub content: SamplingContent,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl SamplingResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: SamplingContent::text(text),
            model: None,
            stop_reason: None,
        }
    }
}

/// The remote peer able to run sampling requests
#[async_trait]
pub trait SamplingPeer: Send + Sync {
    async fn create_message(&self, request: SamplingRequest) -> Result<SamplingResponse>;
}

// =============================================================================
// Tests
// =============================================================================
