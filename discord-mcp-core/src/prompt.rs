// ABOUTME: Renders inbound chat messages into sampling prompts
// ABOUTME: Fixed field layout for message replies, plus an emoji-only variant for reactions

use crate::traits::{ChannelInfo, InboundMessage};
use chrono::SecondsFormat;

const REACTION_INSTRUCTION: &str = "React to the following chat message. \
Answer with exactly one emoji and nothing else.";

/// Placeholder for guild or channel names the platform did not give us
const UNKNOWN_NAME: &str = "unknown";

/// Render the fixed-field template sent for message sampling
pub fn message_template(message: &InboundMessage, channel: Option<&ChannelInfo>) -> String {
    let (guild_name, channel_fallback) = match &message.guild {
        Some(guild) => (guild.name.as_deref().unwrap_or(UNKNOWN_NAME), UNKNOWN_NAME),
        None => ("Direct Message", "DM"),
    };
    let channel_name = channel
        .and_then(|c| c.name.as_deref())
        .unwrap_or(channel_fallback);

    format!(
        "MESSAGE FROM USER:\n\
         user_id: {}\n\
         user_name: {}\n\
         user_display_name: {}\n\
         guild_name: {}\n\
         channel_name: {}\n\
         message: {}\n\
         timestamp: {}",
        message.author.id,
        message.author.username,
        message.author.display_name_or_username(),
        guild_name,
        channel_name,
        message.content,
        message.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Template for reaction sampling. The channel is not fetched on this path.
pub fn reaction_template(message: &InboundMessage) -> String {
    format!("{}\n\n{}", REACTION_INSTRUCTION, message_template(message, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ChatUser, GuildRef};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    fn message() -> InboundMessage {
        InboundMessage {
            id: "m1".to_string(),
            author: ChatUser::new("42", "alice").with_display_name("Alice"),
            guild: Some(GuildRef::named("g1", "Rustaceans")),
            channel_id: "c1".to_string(),
            content: "hello bot".to_string(),
            mentions: HashSet::new(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
        }
    }

    #[test]
    fn test_message_template_fields() {
        let channel = ChannelInfo::text("c1", "general");
        let rendered = message_template(&message(), Some(&channel));

        assert_eq!(
            rendered,
            "MESSAGE FROM USER:\n\
             user_id: 42\n\
             user_name: alice\n\
             user_display_name: Alice\n\
             guild_name: Rustaceans\n\
             channel_name: general\n\
             message: hello bot\n\
             timestamp: 2024-03-01T12:30:05.000Z"
        );
    }

    #[test]
    fn test_message_template_direct_message() {
        let mut msg = message();
        msg.guild = None;
        msg.author = ChatUser::new("42", "alice");

        let rendered = message_template(&msg, Some(&ChannelInfo::direct("c1")));
        assert!(rendered.contains("guild_name: Direct Message\n"));
        assert!(rendered.contains("channel_name: DM\n"));
        assert!(rendered.contains("user_display_name: alice\n"));
    }

    #[test]
    fn test_unnamed_guild_is_unknown_not_dm() {
        let mut msg = message();
        msg.guild = Some(GuildRef::new("g1"));
        let rendered = message_template(&msg, Some(&ChannelInfo::text("c1", "general")));
        assert!(rendered.contains("guild_name: unknown\n"));
        assert!(!rendered.contains("Direct Message"));
    }

    #[test]
    fn test_direct_message_without_channel() {
        let mut msg = message();
        msg.guild = None;
        let rendered = message_template(&msg, None);
        assert!(rendered.contains("guild_name: Direct Message\n"));
        assert!(rendered.contains("channel_name: DM\n"));
    }

    #[test]
    fn test_reaction_template_wraps_message() {
        let rendered = reaction_template(&message());
        assert!(rendered.starts_with(REACTION_INSTRUCTION));
        assert!(rendered.contains("message: hello bot"));
        assert!(rendered.contains("guild_name: Rustaceans\n"));
        // Guild message with no fetched channel is never labelled as a DM
        assert!(rendered.contains("channel_name: unknown\n"));
        assert!(!rendered.contains("channel_name: DM"));
    }
}
