// ABOUTME: Discord actions exposed as MCP tools: messages, reactions, channels and webhooks
// ABOUTME: Stateless translators from tool arguments to ChatClient calls

use discord_mcp_core::traits::{ChatClient, WebhookEdit, WebhookMessage};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::mcp::ToolDefinition;

/// Audit log reason when a webhook is deleted without one
const DEFAULT_WEBHOOK_DELETE_REASON: &str = "Webhook deleted via API";

/// Pause between reactions when adding several, to stay under Discord's rate limit
pub const MULTI_REACTION_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendArgs {
    channel_id: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactionArgs {
    channel_id: String,
    message_id: String,
    emoji: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultiReactionArgs {
    channel_id: String,
    message_id: String,
    emojis: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveReactionArgs {
    channel_id: String,
    message_id: String,
    emoji: String,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageArgs {
    channel_id: String,
    message_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTextChannelArgs {
    guild_id: String,
    channel_name: String,
    #[serde(default)]
    topic: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteChannelArgs {
    channel_id: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateWebhookArgs {
    channel_id: String,
    name: String,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendWebhookMessageArgs {
    webhook_id: String,
    webhook_token: String,
    content: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default, rename = "avatarURL")]
    avatar_url: Option<String>,
    #[serde(default)]
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditWebhookArgs {
    webhook_id: String,
    #[serde(default)]
    webhook_token: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteWebhookArgs {
    webhook_id: String,
    #[serde(default)]
    webhook_token: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("Invalid arguments for {}: {}", tool, e))
}

/// MCP tool handlers backed by a chat client
#[derive(Clone)]
pub struct DiscordTools {
    client: Arc<dyn ChatClient>,
}

impl DiscordTools {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }

    /// Get list of available tools
    pub fn definitions() -> Vec<ToolDefinition> {
        let ids = |extra: Value| {
            let mut schema = json!({
                "type": "object",
                "properties": {
                    "channelId": { "type": "string", "description": "Discord channel ID" },
                    "messageId": { "type": "string", "description": "Discord message ID" }
                },
                "required": ["channelId", "messageId"]
            });
            if let (Some(props), Some(extra)) = (
                schema["properties"].as_object_mut(),
                extra.get("properties").and_then(Value::as_object),
            ) {
                props.extend(extra.clone());
            }
            if let (Some(required), Some(extra)) = (
                schema["required"].as_array_mut(),
                extra.get("required").and_then(Value::as_array),
            ) {
                required.extend(extra.iter().cloned());
            }
            schema
        };

        vec![
            ToolDefinition {
                name: "discord_send".to_string(),
                description: "Send a message to a Discord text channel".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "channelId": { "type": "string", "description": "Discord channel ID" },
                        "message": { "type": "string", "description": "Message text" }
                    },
                    "required": ["channelId", "message"]
                }),
            },
            ToolDefinition {
                name: "discord_add_reaction".to_string(),
                description: "Add an emoji reaction to a message".to_string(),
                input_schema: ids(json!({
                    "properties": { "emoji": { "type": "string", "description": "Unicode emoji" } },
                    "required": ["emoji"]
                })),
            },
            ToolDefinition {
                name: "discord_add_multiple_reactions".to_string(),
                description: "Add several emoji reactions to a message, in order".to_string(),
                input_schema: ids(json!({
                    "properties": {
                        "emojis": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Unicode emojis to add"
                        }
                    },
                    "required": ["emojis"]
                })),
            },
            ToolDefinition {
                name: "discord_remove_reaction".to_string(),
                description: "Remove a reaction from a message. Removes the bot's own reaction unless userId is given".to_string(),
                input_schema: ids(json!({
                    "properties": {
                        "emoji": { "type": "string", "description": "Unicode emoji" },
                        "userId": { "type": "string", "description": "User whose reaction to remove (optional)" }
                    },
                    "required": ["emoji"]
                })),
            },
            ToolDefinition {
                name: "discord_delete_message".to_string(),
                description: "Delete a message".to_string(),
                input_schema: ids(json!({})),
            },
            ToolDefinition {
                name: "discord_login".to_string(),
                description: "Report the Discord account the server is logged in as".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "token": { "type": "string", "description": "Ignored; the token is fixed at startup" }
                    }
                }),
            },
            ToolDefinition {
                name: "discord_create_text_channel".to_string(),
                description: "Create a text channel in a server".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "guildId": { "type": "string", "description": "Discord server ID" },
                        "channelName": { "type": "string", "description": "Name of the new channel" },
                        "topic": { "type": "string", "description": "Channel topic (optional)" }
                    },
                    "required": ["guildId", "channelName"]
                }),
            },
            ToolDefinition {
                name: "discord_delete_channel".to_string(),
                description: "Delete a channel".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "channelId": { "type": "string", "description": "Discord channel ID" },
                        "reason": { "type": "string", "description": "Audit log reason (optional)" }
                    },
                    "required": ["channelId"]
                }),
            },
            ToolDefinition {
                name: "discord_create_webhook".to_string(),
                description: "Create a webhook in a channel".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "channelId": { "type": "string", "description": "Discord channel ID" },
                        "name": { "type": "string", "description": "Webhook name" },
                        "avatar": { "type": "string", "description": "Avatar image data URI (optional)" },
                        "reason": { "type": "string", "description": "Audit log reason (optional)" }
                    },
                    "required": ["channelId", "name"]
                }),
            },
            ToolDefinition {
                name: "discord_send_webhook_message".to_string(),
                description: "Send a message through a webhook".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "webhookId": { "type": "string", "description": "Webhook ID" },
                        "webhookToken": { "type": "string", "description": "Webhook token" },
                        "content": { "type": "string", "description": "Message text" },
                        "username": { "type": "string", "description": "Override the webhook name (optional)" },
                        "avatarURL": { "type": "string", "description": "Override the webhook avatar (optional)" },
                        "threadId": { "type": "string", "description": "Thread to post into (optional)" }
                    },
                    "required": ["webhookId", "webhookToken", "content"]
                }),
            },
            ToolDefinition {
                name: "discord_edit_webhook".to_string(),
                description: "Edit a webhook's name, avatar or channel".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "webhookId": { "type": "string", "description": "Webhook ID" },
                        "webhookToken": { "type": "string", "description": "Webhook token (optional)" },
                        "name": { "type": "string", "description": "New name (optional)" },
                        "avatar": { "type": "string", "description": "New avatar image data URI (optional)" },
                        "channelId": { "type": "string", "description": "Move to this channel (optional)" },
                        "reason": { "type": "string", "description": "Audit log reason (optional)" }
                    },
                    "required": ["webhookId"]
                }),
            },
            ToolDefinition {
                name: "discord_delete_webhook".to_string(),
                description: "Delete a webhook".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "webhookId": { "type": "string", "description": "Webhook ID" },
                        "webhookToken": { "type": "string", "description": "Webhook token (optional)" },
                        "reason": { "type": "string", "description": "Audit log reason (optional)" }
                    },
                    "required": ["webhookId"]
                }),
            },
        ]
    }

    /// Run a tool. `Err` carries the text of an error tool result.
    pub async fn call(&self, tool: &str, args: Value) -> Result<String, String> {
        match tool {
            "discord_send" => self.send(parse_args(tool, args)?).await,
            "discord_add_reaction" => self.add_reaction(parse_args(tool, args)?).await,
            "discord_add_multiple_reactions" => {
                self.add_multiple_reactions(parse_args(tool, args)?).await
            }
            "discord_remove_reaction" => self.remove_reaction(parse_args(tool, args)?).await,
            "discord_delete_message" => self.delete_message(parse_args(tool, args)?).await,
            "discord_login" => Ok(self.login()),
            "discord_create_text_channel" => {
                self.create_text_channel(parse_args(tool, args)?).await
            }
            "discord_delete_channel" => self.delete_channel(parse_args(tool, args)?).await,
            "discord_create_webhook" => self.create_webhook(parse_args(tool, args)?).await,
            "discord_send_webhook_message" => {
                self.send_webhook_message(parse_args(tool, args)?).await
            }
            "discord_edit_webhook" => self.edit_webhook(parse_args(tool, args)?).await,
            "discord_delete_webhook" => self.delete_webhook(parse_args(tool, args)?).await,
            _ => Err(format!("Unknown tool: {}", tool)),
        }
    }

    async fn send(&self, args: SendArgs) -> Result<String, String> {
        let channel = self
            .client
            .fetch_channel(&args.channel_id)
            .await
            .map_err(|e| format!("{:#}", e))?
            .ok_or_else(|| format!("Cannot find text channel ID: {}", args.channel_id))?;

        if !channel.capability.can_send() {
            return Err("This channel type does not support sending messages".to_string());
        }

        self.client
            .send(&channel.id, &args.message)
            .await
            .map_err(|e| format!("{:#}", e))?;
        Ok(format!(
            "Message successfully sent to channel ID: {}",
            args.channel_id
        ))
    }

    async fn add_reaction(&self, args: ReactionArgs) -> Result<String, String> {
        self.client
            .react(&args.channel_id, &args.message_id, &args.emoji)
            .await
            .map_err(|e| format!("{:#}", e))?;
        Ok(format!(
            "Successfully added reaction {} to message ID: {}",
            args.emoji, args.message_id
        ))
    }

    async fn add_multiple_reactions(&self, args: MultiReactionArgs) -> Result<String, String> {
        if args.emojis.is_empty() {
            return Err("emojis must contain at least one emoji".to_string());
        }

        for (idx, emoji) in args.emojis.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(MULTI_REACTION_DELAY).await;
            }
            self.client
                .react(&args.channel_id, &args.message_id, emoji)
                .await
                .map_err(|e| format!("Added {} of {} reactions: {:#}", idx, args.emojis.len(), e))?;
        }
        Ok(format!(
            "Successfully added {} reactions to message ID: {}",
            args.emojis.len(),
            args.message_id
        ))
    }

    async fn remove_reaction(&self, args: RemoveReactionArgs) -> Result<String, String> {
        self.client
            .remove_reaction(
                &args.channel_id,
                &args.message_id,
                &args.emoji,
                args.user_id.as_deref(),
            )
            .await
            .map_err(|e| format!("{:#}", e))?;

        let whose = match &args.user_id {
            Some(user) => format!("user {}", user),
            None => "bot".to_string(),
        };
        Ok(format!(
            "Successfully removed reaction {} from {} on message ID: {}",
            args.emoji, whose, args.message_id
        ))
    }

    async fn delete_message(&self, args: MessageArgs) -> Result<String, String> {
        self.client
            .delete_message(&args.channel_id, &args.message_id)
            .await
            .map_err(|e| format!("{:#}", e))?;
        Ok(format!(
            "Successfully deleted message ID: {} from channel: {}",
            args.message_id, args.channel_id
        ))
    }

    /// The gateway logs in at startup, so this only reports who we are
    fn login(&self) -> String {
        format!("Already logged in as: {}", self.client.bot_user_name())
    }

    async fn create_text_channel(&self, args: CreateTextChannelArgs) -> Result<String, String> {
        let channel = self
            .client
            .create_text_channel(&args.guild_id, &args.channel_name, args.topic.as_deref())
            .await
            .map_err(|e| format!("{:#}", e))?;
        Ok(format!(
            "Successfully created text channel \"{}\" with ID: {}",
            args.channel_name, channel.id
        ))
    }

    async fn delete_channel(&self, args: DeleteChannelArgs) -> Result<String, String> {
        self.client
            .fetch_channel(&args.channel_id)
            .await
            .map_err(|e| format!("{:#}", e))?
            .ok_or_else(|| format!("Cannot find channel with ID: {}", args.channel_id))?;

        self.client
            .delete_channel(&args.channel_id, args.reason.as_deref())
            .await
            .map_err(|e| format!("{:#}", e))?;
        Ok(format!(
            "Successfully deleted channel with ID: {}",
            args.channel_id
        ))
    }

    async fn create_webhook(&self, args: CreateWebhookArgs) -> Result<String, String> {
        let channel = self
            .client
            .fetch_channel(&args.channel_id)
            .await
            .map_err(|e| format!("{:#}", e))?
            .filter(|c| c.capability.can_send())
            .ok_or_else(|| format!("Cannot find text channel with ID: {}", args.channel_id))?;

        if !channel.webhooks {
            return Err(format!(
                "Channel type does not support webhooks: {}",
                args.channel_id
            ));
        }

        let webhook = self
            .client
            .create_webhook(
                &channel.id,
                &args.name,
                args.avatar.as_deref(),
                args.reason.as_deref(),
            )
            .await
            .map_err(|e| format!("{:#}", e))?;
        Ok(format!(
            "Successfully created webhook with ID: {} and token: {}",
            webhook.id,
            webhook.token.as_deref().unwrap_or("none")
        ))
    }

    async fn send_webhook_message(&self, args: SendWebhookMessageArgs) -> Result<String, String> {
        let message = WebhookMessage {
            content: args.content,
            username: args.username,
            avatar_url: args.avatar_url,
            thread_id: args.thread_id,
        };
        let found = self
            .client
            .execute_webhook(&args.webhook_id, &args.webhook_token, &message)
            .await
            .map_err(|e| format!("{:#}", e))?;
        if !found {
            return Err(webhook_not_found(&args.webhook_id));
        }
        Ok(format!(
            "Successfully sent webhook message to webhook ID: {}",
            args.webhook_id
        ))
    }

    async fn edit_webhook(&self, args: EditWebhookArgs) -> Result<String, String> {
        let edit = WebhookEdit {
            name: args.name,
            avatar: args.avatar,
            channel_id: args.channel_id,
            reason: args.reason,
        };
        let found = self
            .client
            .edit_webhook(&args.webhook_id, args.webhook_token.as_deref(), &edit)
            .await
            .map_err(|e| format!("{:#}", e))?;
        if !found {
            return Err(webhook_not_found(&args.webhook_id));
        }
        Ok(format!(
            "Successfully edited webhook with ID: {}",
            args.webhook_id
        ))
    }

    async fn delete_webhook(&self, args: DeleteWebhookArgs) -> Result<String, String> {
        let reason = args
            .reason
            .as_deref()
            .unwrap_or(DEFAULT_WEBHOOK_DELETE_REASON);
        let found = self
            .client
            .delete_webhook(&args.webhook_id, args.webhook_token.as_deref(), Some(reason))
            .await
            .map_err(|e| format!("{:#}", e))?;
        if !found {
            return Err(webhook_not_found(&args.webhook_id));
        }
        Ok(format!(
            "Successfully deleted webhook with ID: {}",
            args.webhook_id
        ))
    }
}

fn webhook_not_found(webhook_id: &str) -> String {
    format!("Cannot find webhook with ID: {}", webhook_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use discord_mcp_core::testing::{ChatAction, MockChatClient, MockOp};
    use discord_mcp_core::traits::{ChannelCapability, ChannelInfo};

    fn tools() -> (DiscordTools, Arc<MockChatClient>) {
        let client = Arc::new(MockChatClient::new("bot"));
        client.add_channel(ChannelInfo::text("c1", "general"));
        (DiscordTools::new(client.clone()), client)
    }

    #[test]
    fn test_definitions_have_required_ids() {
        let defs = DiscordTools::definitions();
        assert_eq!(defs.len(), 12);

        let remove = defs
            .iter()
            .find(|d| d.name == "discord_remove_reaction")
            .unwrap();
        let required = remove.input_schema["required"].as_array().unwrap();
        assert!(required.contains(&json!("channelId")));
        assert!(required.contains(&json!("emoji")));
        assert!(!required.contains(&json!("userId")));
        assert!(remove.input_schema["properties"]["userId"].is_object());
    }

    #[tokio::test]
    async fn test_send() {
        let (tools, client) = tools();
        let text = tools
            .call("discord_send", json!({"channelId": "c1", "message": "hello"}))
            .await
            .unwrap();
        assert!(text.contains("c1"));
        assert_eq!(client.sent_texts(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_send_unknown_channel() {
        let (tools, client) = tools();
        let err = tools
            .call("discord_send", json!({"channelId": "nope", "message": "hello"}))
            .await
            .unwrap_err();
        assert_eq!(err, "Cannot find text channel ID: nope");
        assert!(client.actions().is_empty());
    }

    #[tokio::test]
    async fn test_send_to_category_rejected() {
        let (tools, client) = tools();
        client.add_channel(ChannelInfo {
            id: "cat".to_string(),
            name: Some("Category".to_string()),
            capability: ChannelCapability::NonText,
            webhooks: false,
        });
        let err = tools
            .call("discord_send", json!({"channelId": "cat", "message": "hello"}))
            .await
            .unwrap_err();
        assert!(err.contains("does not support sending"));
    }

    #[tokio::test]
    async fn test_missing_argument() {
        let (tools, _client) = tools();
        let err = tools
            .call("discord_add_reaction", json!({"channelId": "c1"}))
            .await
            .unwrap_err();
        assert!(err.starts_with("Invalid arguments for discord_add_reaction"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (tools, _client) = tools();
        let err = tools.call("discord_ban_everyone", json!({})).await.unwrap_err();
        assert_eq!(err, "Unknown tool: discord_ban_everyone");
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiple_reactions_are_spaced() {
        let (tools, client) = tools();
        let start = tokio::time::Instant::now();

        tools
            .call(
                "discord_add_multiple_reactions",
                json!({"channelId": "c1", "messageId": "m1", "emojis": ["1️⃣", "2️⃣", "3️⃣"]}),
            )
            .await
            .unwrap();

        assert_eq!(client.reactions(), vec!["1️⃣", "2️⃣", "3️⃣"]);
        assert!(start.elapsed() >= MULTI_REACTION_DELAY * 2);
    }

    #[tokio::test]
    async fn test_remove_reaction_defaults_to_bot() {
        let (tools, client) = tools();
        tools
            .call(
                "discord_remove_reaction",
                json!({"channelId": "c1", "messageId": "m1", "emoji": "👍"}),
            )
            .await
            .unwrap();
        tools
            .call(
                "discord_remove_reaction",
                json!({"channelId": "c1", "messageId": "m1", "emoji": "👍", "userId": "42"}),
            )
            .await
            .unwrap();

        let users: Vec<Option<String>> = client
            .actions()
            .into_iter()
            .filter_map(|a| match a {
                ChatAction::RemoveReaction { user_id, .. } => Some(user_id),
                _ => None,
            })
            .collect();
        assert_eq!(users, vec![None, Some("42".to_string())]);
    }

    #[tokio::test]
    async fn test_platform_error_becomes_tool_error() {
        let (tools, client) = tools();
        client.fail(MockOp::Delete);
        let err = tools
            .call(
                "discord_delete_message",
                json!({"channelId": "c1", "messageId": "m1"}),
            )
            .await
            .unwrap_err();
        assert!(err.contains("mock platform error"));
    }

    #[tokio::test]
    async fn test_login_reports_bot_name() {
        let (tools, _client) = tools();
        let text = tools
            .call("discord_login", json!({"token": "ignored"}))
            .await
            .unwrap();
        assert_eq!(text, "Already logged in as: bot");
    }

    #[tokio::test]
    async fn test_create_and_delete_text_channel() {
        let (tools, client) = tools();
        let text = tools
            .call(
                "discord_create_text_channel",
                json!({"guildId": "g1", "channelName": "news", "topic": "daily"}),
            )
            .await
            .unwrap();
        assert!(text.starts_with("Successfully created text channel \"news\" with ID: "));

        let id = text.rsplit(' ').next().unwrap().to_string();
        tools
            .call("discord_delete_channel", json!({"channelId": id, "reason": "done"}))
            .await
            .unwrap();

        assert_eq!(
            client.actions()[1],
            ChatAction::DeleteChannel {
                channel_id: id.clone(),
                reason: Some("done".to_string()),
            }
        );
        let err = tools
            .call("discord_delete_channel", json!({"channelId": id}))
            .await
            .unwrap_err();
        assert!(err.starts_with("Cannot find channel with ID"));
    }

    #[tokio::test]
    async fn test_create_webhook_reports_id_and_token() {
        let (tools, client) = tools();
        let text = tools
            .call("discord_create_webhook", json!({"channelId": "c1", "name": "relay"}))
            .await
            .unwrap();
        assert!(text.starts_with("Successfully created webhook with ID: webhook-"));
        assert!(text.contains("and token: token-"));
        assert_eq!(
            client.actions(),
            vec![ChatAction::CreateWebhook {
                channel_id: "c1".to_string(),
                name: "relay".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_create_webhook_needs_webhook_channel() {
        let (tools, client) = tools();
        client.add_channel(ChannelInfo::direct("dm1"));

        let err = tools
            .call("discord_create_webhook", json!({"channelId": "dm1", "name": "relay"}))
            .await
            .unwrap_err();
        assert_eq!(err, "Channel type does not support webhooks: dm1");

        let err = tools
            .call("discord_create_webhook", json!({"channelId": "gone", "name": "relay"}))
            .await
            .unwrap_err();
        assert_eq!(err, "Cannot find text channel with ID: gone");
        assert!(client.actions().is_empty());
    }

    #[tokio::test]
    async fn test_send_webhook_message() {
        let (tools, client) = tools();
        client.add_webhook("w1", "secret");

        tools
            .call(
                "discord_send_webhook_message",
                json!({
                    "webhookId": "w1",
                    "webhookToken": "secret",
                    "content": "hi",
                    "username": "Relay",
                    "avatarURL": "https://example.com/a.png"
                }),
            )
            .await
            .unwrap();

        assert_eq!(
            client.actions(),
            vec![ChatAction::ExecuteWebhook {
                webhook_id: "w1".to_string(),
                message: WebhookMessage {
                    content: "hi".to_string(),
                    username: Some("Relay".to_string()),
                    avatar_url: Some("https://example.com/a.png".to_string()),
                    thread_id: None,
                },
            }]
        );
    }

    #[tokio::test]
    async fn test_send_webhook_message_wrong_token() {
        let (tools, client) = tools();
        client.add_webhook("w1", "secret");

        let err = tools
            .call(
                "discord_send_webhook_message",
                json!({"webhookId": "w1", "webhookToken": "guess", "content": "hi"}),
            )
            .await
            .unwrap_err();
        assert_eq!(err, "Cannot find webhook with ID: w1");
        assert!(client.actions().is_empty());
    }

    #[tokio::test]
    async fn test_edit_webhook() {
        let (tools, client) = tools();
        client.add_webhook("w1", "secret");

        let text = tools
            .call(
                "discord_edit_webhook",
                json!({"webhookId": "w1", "name": "renamed", "channelId": "c1"}),
            )
            .await
            .unwrap();
        assert_eq!(text, "Successfully edited webhook with ID: w1");
        assert_eq!(
            client.actions(),
            vec![ChatAction::EditWebhook {
                webhook_id: "w1".to_string(),
                edit: WebhookEdit {
                    name: Some("renamed".to_string()),
                    channel_id: Some("c1".to_string()),
                    ..WebhookEdit::default()
                },
            }]
        );

        let err = tools
            .call("discord_edit_webhook", json!({"webhookId": "w9"}))
            .await
            .unwrap_err();
        assert_eq!(err, "Cannot find webhook with ID: w9");
    }

    #[tokio::test]
    async fn test_delete_webhook_uses_default_reason() {
        let (tools, client) = tools();
        client.add_webhook("w1", "secret");

        tools
            .call(
                "discord_delete_webhook",
                json!({"webhookId": "w1", "webhookToken": "secret"}),
            )
            .await
            .unwrap();

        assert!(!client.has_webhook("w1"));
        assert_eq!(
            client.actions(),
            vec![ChatAction::DeleteWebhook {
                webhook_id: "w1".to_string(),
                reason: Some(DEFAULT_WEBHOOK_DELETE_REASON.to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_webhook_platform_error_becomes_tool_error() {
        let (tools, client) = tools();
        client.add_webhook("w1", "secret");
        client.fail(MockOp::Webhook);

        let err = tools
            .call("discord_delete_webhook", json!({"webhookId": "w1"}))
            .await
            .unwrap_err();
        assert!(err.contains("mock platform error"));
    }
}
