// ABOUTME: Decides which inbound messages the bridge ignores
// ABOUTME: Pure checks over author, guild and mentions; no I/O

use crate::config::SamplingConfig;
use crate::traits::InboundMessage;
use std::collections::HashSet;

/// Why a message was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    /// Sent by the bridge itself (or by another bot when bots are ignored)
    OwnOrBotMessage,
    BannedUser,
    DirectMessageBlocked,
    BlockedGuild,
    NotMentioned,
}

impl FilterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OwnOrBotMessage => "own_or_bot",
            Self::BannedUser => "banned_user",
            Self::DirectMessageBlocked => "dm_blocked",
            Self::BlockedGuild => "blocked_guild",
            Self::NotMentioned => "not_mentioned",
        }
    }
}

/// Static filtering rules, built once from configuration
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    bot_user_id: String,
    banned_users: HashSet<String>,
    blocked_guilds: HashSet<String>,
    block_dms: bool,
    mentions_only: bool,
    ignore_bots: bool,
}

impl FilterPolicy {
    pub fn new(bot_user_id: impl Into<String>, config: &SamplingConfig) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
            banned_users: config.banned_user_set(),
            blocked_guilds: config.blocked_guild_set(),
            block_dms: config.block_dms,
            mentions_only: config.respond_to_mentions_only,
            ignore_bots: config.ignore_bots,
        }
    }

    pub fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    /// First rule that rejects the message, in precedence order
    pub fn filter_reason(&self, message: &InboundMessage) -> Option<FilterReason> {
        if message.author.id == self.bot_user_id || (self.ignore_bots && message.author.bot) {
            return Some(FilterReason::OwnOrBotMessage);
        }
        if self.banned_users.contains(&message.author.id) {
            return Some(FilterReason::BannedUser);
        }
        match &message.guild {
            None if self.block_dms => return Some(FilterReason::DirectMessageBlocked),
            Some(guild) if self.blocked_guilds.contains(&guild.id) => {
                return Some(FilterReason::BlockedGuild)
            }
            _ => {}
        }
        if self.mentions_only && !message.mentions_user(&self.bot_user_id) {
            return Some(FilterReason::NotMentioned);
        }
        None
    }

    pub fn should_filter(&self, message: &InboundMessage) -> bool {
        self.filter_reason(message).is_some()
    }
}
