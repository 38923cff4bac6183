// ABOUTME: Discord platform implementation on twilight (gateway, HTTP, in-memory cache)
// ABOUTME: Implements ChatClient and feeds MESSAGE_CREATE events to registered handlers

pub mod convert;

use anyhow::{Context, Result};
use async_trait::async_trait;
use discord_mcp_core::events::{HandlerRegistry, MessageHandler, Subscription};
use discord_mcp_core::traits::{
    ChannelInfo, ChatClient, WebhookEdit, WebhookInfo, WebhookMessage,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use twilight_cache_inmemory::{DefaultInMemoryCache, ResourceType};
use twilight_gateway::{
    CloseFrame, Event, EventTypeFlags, Intents, MessageSender, Shard, ShardId, StreamExt,
};
use twilight_http::error::ErrorType;
use twilight_http::request::channel::reaction::RequestReactionType;
use twilight_http::request::AuditLogReason;
use twilight_http::Client as HttpClient;
use twilight_model::channel::ChannelType;
use twilight_model::id::marker::{
    ChannelMarker, GuildMarker, MessageMarker, UserMarker, WebhookMarker,
};
use twilight_model::id::Id;

use convert::parse_id;

/// Gateway intents the bridge and tools need
pub fn intents() -> Intents {
    Intents::GUILDS
        | Intents::GUILD_MESSAGES
        | Intents::DIRECT_MESSAGES
        | Intents::MESSAGE_CONTENT
}

// =============================================================================
// DiscordClient - Implements ChatClient
// =============================================================================

/// Discord bot connection: REST client, guild cache and handler registry
pub struct DiscordClient {
    http: Arc<HttpClient>,
    cache: Arc<DefaultInMemoryCache>,
    registry: Arc<HandlerRegistry>,
    /// Bot's own user ID as a string
    bot_user_id: String,
    bot_user_name: String,
}

impl DiscordClient {
    /// Authenticate with the REST API and resolve the bot's identity.
    ///
    /// Does not open the gateway; call `start_gateway` for live events.
    pub async fn connect(token: &str) -> Result<Self> {
        let http = Arc::new(HttpClient::new(token.to_string()));

        let me = http
            .current_user()
            .await
            .context("Failed to fetch current Discord user (is the token valid?)")?
            .model()
            .await
            .context("Failed to parse current Discord user")?;

        tracing::info!(
            bot_username = %me.name,
            bot_id = %me.id,
            "Discord bot authenticated"
        );

        let cache = DefaultInMemoryCache::builder()
            .resource_types(ResourceType::GUILD)
            .build();

        Ok(Self {
            http,
            cache: Arc::new(cache),
            registry: Arc::new(HandlerRegistry::new()),
            bot_user_id: me.id.to_string(),
            bot_user_name: me.name,
        })
    }

    /// Open a gateway shard and dispatch events until it is closed
    pub fn start_gateway(&self, token: &str) -> GatewayHandle {
        let shard = Shard::new(ShardId::ONE, token.to_string(), intents());
        let sender = shard.sender();
        let task = tokio::spawn(run_shard(
            shard,
            Arc::clone(&self.cache),
            Arc::clone(&self.registry),
        ));
        GatewayHandle { sender, task }
    }

    fn channel_id(&self, raw: &str) -> Result<Id<ChannelMarker>> {
        parse_id(raw, "channel")
    }

    fn message_id(&self, raw: &str) -> Result<Id<MessageMarker>> {
        parse_id(raw, "message")
    }

    fn webhook_id(&self, raw: &str) -> Result<Id<WebhookMarker>> {
        parse_id(raw, "webhook")
    }
}

#[async_trait]
impl ChatClient for DiscordClient {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    fn bot_user_name(&self) -> &str {
        &self.bot_user_name
    }

    fn subscribe(&self, handler: Arc<dyn MessageHandler>) -> Subscription {
        self.registry.register(handler)
    }

    fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.registry.remove(subscription)
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<Option<ChannelInfo>> {
        let id = self.channel_id(channel_id)?;
        let response = match self.http.channel(id).await {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to fetch channel {}", channel_id))
            }
        };
        let channel = response
            .model()
            .await
            .context("Failed to parse channel")?;
        Ok(Some(convert::channel_info(&channel)))
    }

    async fn send(&self, channel_id: &str, text: &str) -> Result<String> {
        let message = self
            .http
            .create_message(self.channel_id(channel_id)?)
            .content(text)
            .await
            .context("Failed to send Discord message")?
            .model()
            .await
            .context("Failed to parse sent message")?;
        Ok(message.id.to_string())
    }

    async fn reply(&self, channel_id: &str, message_id: &str, text: &str) -> Result<String> {
        let message = self
            .http
            .create_message(self.channel_id(channel_id)?)
            .content(text)
            .reply(self.message_id(message_id)?)
            .await
            .context("Failed to send Discord reply")?
            .model()
            .await
            .context("Failed to parse sent reply")?;
        Ok(message.id.to_string())
    }

    async fn react(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()> {
        self.http
            .create_reaction(
                self.channel_id(channel_id)?,
                self.message_id(message_id)?,
                &RequestReactionType::Unicode { name: emoji },
            )
            .await
            .with_context(|| format!("Failed to add reaction {}", emoji))?;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
        user_id: Option<&str>,
    ) -> Result<()> {
        let channel = self.channel_id(channel_id)?;
        let message = self.message_id(message_id)?;
        let reaction = RequestReactionType::Unicode { name: emoji };

        match user_id {
            Some(user) => {
                let user: Id<UserMarker> = parse_id(user, "user")?;
                self.http
                    .delete_reaction(channel, message, &reaction, user)
                    .await
            }
            None => {
                self.http
                    .delete_current_user_reaction(channel, message, &reaction)
                    .await
            }
        }
        .with_context(|| format!("Failed to remove reaction {}", emoji))?;
        Ok(())
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.http
            .delete_message(self.channel_id(channel_id)?, self.message_id(message_id)?)
            .await
            .context("Failed to delete Discord message")?;
        Ok(())
    }

    async fn send_typing(&self, channel_id: &str) -> Result<()> {
        self.http
            .create_typing_trigger(self.channel_id(channel_id)?)
            .await
            .context("Failed to send typing indicator")?;
        Ok(())
    }

    async fn create_text_channel(
        &self,
        guild_id: &str,
        name: &str,
        topic: Option<&str>,
    ) -> Result<ChannelInfo> {
        let guild: Id<GuildMarker> = parse_id(guild_id, "guild")?;
        let mut request = self
            .http
            .create_guild_channel(guild, name)
            .kind(ChannelType::GuildText);
        if let Some(topic) = topic {
            request = request.topic(topic);
        }
        let channel = request
            .await
            .with_context(|| format!("Failed to create channel {}", name))?
            .model()
            .await
            .context("Failed to parse created channel")?;
        Ok(convert::channel_info(&channel))
    }

    async fn delete_channel(&self, channel_id: &str, reason: Option<&str>) -> Result<()> {
        let mut request = self.http.delete_channel(self.channel_id(channel_id)?);
        if let Some(reason) = reason {
            request = request.reason(reason);
        }
        request
            .await
            .with_context(|| format!("Failed to delete channel {}", channel_id))?;
        Ok(())
    }

    async fn create_webhook(
        &self,
        channel_id: &str,
        name: &str,
        avatar: Option<&str>,
        reason: Option<&str>,
    ) -> Result<WebhookInfo> {
        let mut request = self
            .http
            .create_webhook(self.channel_id(channel_id)?, name);
        if let Some(avatar) = avatar {
            request = request.avatar(avatar);
        }
        if let Some(reason) = reason {
            request = request.reason(reason);
        }
        let webhook = request
            .await
            .context("Failed to create webhook")?
            .model()
            .await
            .context("Failed to parse created webhook")?;
        Ok(WebhookInfo {
            id: webhook.id.to_string(),
            token: webhook.token,
        })
    }

    async fn execute_webhook(
        &self,
        webhook_id: &str,
        token: &str,
        message: &WebhookMessage,
    ) -> Result<bool> {
        let mut request = self
            .http
            .execute_webhook(self.webhook_id(webhook_id)?, token)
            .content(&message.content);
        if let Some(username) = &message.username {
            request = request.username(username);
        }
        if let Some(avatar_url) = &message.avatar_url {
            request = request.avatar_url(avatar_url);
        }
        if let Some(thread_id) = &message.thread_id {
            request = request.thread_id(parse_id(thread_id, "thread")?);
        }
        found(request.await)
            .with_context(|| format!("Failed to send message through webhook {}", webhook_id))
    }

    async fn edit_webhook(
        &self,
        webhook_id: &str,
        token: Option<&str>,
        edit: &WebhookEdit,
    ) -> Result<bool> {
        let id = self.webhook_id(webhook_id)?;
        let result = match token {
            // Token auth cannot move the webhook or leave an audit log reason
            Some(token) if edit.channel_id.is_none() && edit.reason.is_none() => {
                let mut request = self.http.update_webhook_with_token(id, token);
                if let Some(name) = &edit.name {
                    request = request.name(name);
                }
                if let Some(avatar) = &edit.avatar {
                    request = request.avatar(Some(avatar.as_str()));
                }
                found(request.await)
            }
            _ => {
                let mut request = self.http.update_webhook(id);
                if let Some(name) = &edit.name {
                    request = request.name(name);
                }
                if let Some(avatar) = &edit.avatar {
                    request = request.avatar(Some(avatar.as_str()));
                }
                if let Some(channel_id) = &edit.channel_id {
                    request = request.channel_id(self.channel_id(channel_id)?);
                }
                if let Some(reason) = &edit.reason {
                    request = request.reason(reason);
                }
                found(request.await)
            }
        };
        result.with_context(|| format!("Failed to edit webhook {}", webhook_id))
    }

    async fn delete_webhook(
        &self,
        webhook_id: &str,
        token: Option<&str>,
        reason: Option<&str>,
    ) -> Result<bool> {
        let mut request = self.http.delete_webhook(self.webhook_id(webhook_id)?);
        if let Some(token) = token {
            request = request.token(token);
        }
        if let Some(reason) = reason {
            request = request.reason(reason);
        }
        found(request.await).with_context(|| format!("Failed to delete webhook {}", webhook_id))
    }
}

/// `Ok(false)` for a 404, so callers can report a missing resource
fn found<T>(result: Result<T, twilight_http::Error>) -> Result<bool, twilight_http::Error> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if is_not_found(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_not_found(error: &twilight_http::Error) -> bool {
    matches!(error.kind(), ErrorType::Response { status, .. } if status.get() == 404)
}

// =============================================================================
// Gateway
// =============================================================================

/// Running gateway shard; dropping it leaves the shard running
pub struct GatewayHandle {
    sender: MessageSender,
    task: JoinHandle<()>,
}

impl GatewayHandle {
    /// Close the shard and wait for its event loop to finish
    pub async fn shutdown(self) {
        if let Err(e) = self.sender.close(CloseFrame::NORMAL) {
            tracing::warn!(error = %e, "Failed to close Discord gateway");
        }
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Discord gateway task failed");
        }
    }
}

async fn run_shard(
    mut shard: Shard,
    cache: Arc<DefaultInMemoryCache>,
    registry: Arc<HandlerRegistry>,
) {
    let shard_id = shard.id().number();
    tracing::info!(shard_id, "Discord gateway started");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(shard_id, error = %e, "Error receiving gateway event");
                continue;
            }
        };
        cache.update(&event);

        match event {
            Event::Ready(ready) => {
                tracing::info!(
                    shard_id,
                    user = %ready.user.name,
                    guilds = ready.guilds.len(),
                    "Discord gateway ready"
                );
            }
            Event::MessageCreate(message) => {
                let guild_name = message
                    .guild_id
                    .and_then(|id| cache.guild(id).map(|g| g.name().to_string()));
                let inbound = convert::inbound_message(&message, guild_name);
                tracing::trace!(
                    message_id = %inbound.id,
                    channel_id = %inbound.channel_id,
                    "Dispatching message"
                );
                registry.dispatch(inbound);
            }
            Event::GatewayClose(frame) => {
                tracing::info!(shard_id, frame = ?frame, "Discord gateway closed");
            }
            _ => {}
        }
    }

    tracing::info!(shard_id, "Discord gateway event loop ended");
}
