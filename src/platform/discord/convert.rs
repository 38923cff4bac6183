// ABOUTME: Conversions between twilight models and the bridge's platform-neutral types
// ABOUTME: Maps channel kinds to capabilities and gateway messages to inbound messages

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use discord_mcp_core::traits::{ChannelCapability, ChannelInfo, ChatUser, GuildRef, InboundMessage};
use twilight_model::channel::{Channel, ChannelType, Message};
use twilight_model::id::Id;

/// Parse a snowflake string into a typed twilight ID
pub fn parse_id<T>(raw: &str, what: &str) -> Result<Id<T>> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .and_then(Id::new_checked)
        .with_context(|| format!("Invalid {} ID: {}", what, raw))
}

/// Decide once, from the channel kind, what the bridge may do with a channel
pub fn capability_for(kind: ChannelType) -> ChannelCapability {
    match kind {
        ChannelType::GuildText
        | ChannelType::GuildVoice
        | ChannelType::GuildStageVoice
        | ChannelType::GuildAnnouncement
        | ChannelType::AnnouncementThread
        | ChannelType::PublicThread
        | ChannelType::PrivateThread
        | ChannelType::Private
        | ChannelType::Group => ChannelCapability::Sendable { typing: true },
        // Posts go into threads, never the channel itself
        ChannelType::GuildForum | ChannelType::GuildMedia => ChannelCapability::TextReadOnly,
        _ => ChannelCapability::NonText,
    }
}

/// Guild channels that can own webhooks; threads and DMs cannot
pub fn supports_webhooks(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::GuildText
            | ChannelType::GuildVoice
            | ChannelType::GuildStageVoice
            | ChannelType::GuildAnnouncement
            | ChannelType::GuildForum
            | ChannelType::GuildMedia
    )
}

pub fn channel_info(channel: &Channel) -> ChannelInfo {
    ChannelInfo {
        id: channel.id.to_string(),
        name: channel.name.clone(),
        capability: capability_for(channel.kind),
        webhooks: supports_webhooks(channel.kind),
    }
}

/// Convert a gateway message. `guild_name` comes from the cache when known.
pub fn inbound_message(message: &Message, guild_name: Option<String>) -> InboundMessage {
    let mut author = ChatUser::new(message.author.id.to_string(), message.author.name.clone());
    if let Some(global_name) = &message.author.global_name {
        author = author.with_display_name(global_name.clone());
    }
    author.bot = message.author.bot;

    let created_at = DateTime::from_timestamp_micros(message.timestamp.as_micros())
        .unwrap_or_else(Utc::now);

    InboundMessage {
        id: message.id.to_string(),
        author,
        guild: message.guild_id.map(|id| GuildRef {
            id: id.to_string(),
            name: guild_name,
        }),
        channel_id: message.channel_id.to_string(),
        content: message.content.clone(),
        mentions: message.mentions.iter().map(|m| m.id.to_string()).collect(),
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twilight_model::id::marker::ChannelMarker;

    #[test]
    fn test_parse_id() {
        let id: Id<ChannelMarker> = parse_id("123456789012345678", "channel").unwrap();
        assert_eq!(id.get(), 123456789012345678);
        assert!(parse_id::<ChannelMarker>(" 42 ", "channel").is_ok());
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        let err = parse_id::<ChannelMarker>("general", "channel").unwrap_err();
        assert!(err.to_string().contains("Invalid channel ID: general"));
        assert!(parse_id::<ChannelMarker>("0", "channel").is_err());
        assert!(parse_id::<ChannelMarker>("-5", "channel").is_err());
    }

    #[test]
    fn test_text_like_channels_are_sendable() {
        for kind in [
            ChannelType::GuildText,
            ChannelType::GuildVoice,
            ChannelType::GuildAnnouncement,
            ChannelType::PublicThread,
            ChannelType::PrivateThread,
            ChannelType::Private,
            ChannelType::Group,
        ] {
            assert_eq!(
                capability_for(kind),
                ChannelCapability::Sendable { typing: true },
                "{:?}",
                kind
            );
        }
    }

    #[test]
    fn test_forum_channels_are_read_only() {
        assert_eq!(
            capability_for(ChannelType::GuildForum),
            ChannelCapability::TextReadOnly
        );
        assert_eq!(
            capability_for(ChannelType::GuildMedia),
            ChannelCapability::TextReadOnly
        );
    }

    #[test]
    fn test_categories_are_not_text() {
        assert_eq!(
            capability_for(ChannelType::GuildCategory),
            ChannelCapability::NonText
        );
        assert_eq!(
            capability_for(ChannelType::GuildDirectory),
            ChannelCapability::NonText
        );
        assert_eq!(
            capability_for(ChannelType::Unknown(250)),
            ChannelCapability::NonText
        );
    }

    #[test]
    fn test_only_guild_channels_support_webhooks() {
        assert!(supports_webhooks(ChannelType::GuildText));
        assert!(supports_webhooks(ChannelType::GuildAnnouncement));
        assert!(supports_webhooks(ChannelType::GuildForum));
        assert!(!supports_webhooks(ChannelType::PublicThread));
        assert!(!supports_webhooks(ChannelType::Private));
        assert!(!supports_webhooks(ChannelType::GuildCategory));
    }
}
