// ABOUTME: Races a reaction sampling request against a timer to pick an emoji
// ABOUTME: Late sampling answers are discarded; reaction failures never escape

use crate::config::SamplingConfig;
use crate::metrics;
use crate::prompt;
use crate::sampling::Sampler;
use crate::traits::{ChatClient, InboundMessage};
use std::time::Duration;

/// First whitespace-delimited token of the trimmed sampling text
pub fn extract_emoji(text: &str) -> Option<&str> {
    text.split_whitespace().next()
}

#[derive(Clone)]
pub struct ReactionRace {
    sampler: Sampler,
    race_timeout: Duration,
    sampling_timeout: Duration,
    max_tokens: u32,
    fallback: String,
}

impl ReactionRace {
    pub fn new(sampler: Sampler, config: &SamplingConfig) -> Self {
        Self {
            sampler,
            race_timeout: config.reaction_timeout(),
            sampling_timeout: config.reaction_sampling_timeout(),
            max_tokens: config.reaction_max_tokens,
            fallback: config.reaction_fallback_emoji.clone(),
        }
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Pick the emoji to react with. Never fails.
    ///
    /// The sampling call runs as a detached task. If the timer fires first the
    /// task is left to finish on its own and its answer is dropped; nothing is
    /// sent to the peer to cancel it.
    pub async fn pick_reaction(&self, message: &InboundMessage) -> String {
        let template = prompt::reaction_template(message);
        let sampler = self.sampler.clone();
        let (max_tokens, sampling_timeout) = (self.max_tokens, self.sampling_timeout);

        metrics::record_sampling_request("reaction");
        let mut task = tokio::spawn(async move {
            sampler
                .request_completion(&template, max_tokens, sampling_timeout)
                .await
        });

        tokio::select! {
            joined = &mut task => match joined {
                Ok(Ok(Some(text))) => match extract_emoji(&text) {
                    Some(emoji) => {
                        metrics::record_reaction("sampled");
                        return emoji.to_string();
                    }
                    None => tracing::debug!(message_id = %message.id, "Reaction sampling returned empty text"),
                },
                Ok(Ok(None)) => {
                    tracing::debug!(message_id = %message.id, "Reaction sampling returned no text")
                }
                Ok(Err(e)) => {
                    metrics::record_sampling_failure("reaction", e.kind());
                    tracing::debug!(message_id = %message.id, error = %e, "Reaction sampling failed");
                }
                Err(e) => tracing::warn!(message_id = %message.id, error = %e, "Reaction sampling task panicked"),
            },
            _ = tokio::time::sleep(self.race_timeout) => {
                tracing::debug!(
                    message_id = %message.id,
                    timeout_ms = self.race_timeout.as_millis() as u64,
                    "Reaction sampling too slow, using fallback"
                );
            }
        }

        metrics::record_reaction("fallback");
        self.fallback.clone()
    }

    /// Pick an emoji and apply it to `message`. Platform errors are logged and dropped.
    pub async fn react(&self, client: &dyn ChatClient, message: &InboundMessage) -> String {
        let emoji = self.pick_reaction(message).await;
        if let Err(e) = client.react(&message.channel_id, &message.id, &emoji).await {
            tracing::warn!(
                channel_id = %message.channel_id,
                message_id = %message.id,
                emoji = %emoji,
                error = %e,
                "Failed to add reaction"
            );
        }
        emoji
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockChatClient, MockOp, ScriptedSamplingPeer};
    use crate::traits::ChatUser;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn config() -> SamplingConfig {
        SamplingConfig {
            reaction_timeout_ms: 10_000,
            reaction_sampling_timeout_ms: 30_000,
            ..SamplingConfig::default()
        }
    }

    fn message() -> InboundMessage {
        InboundMessage {
            id: "m1".to_string(),
            author: ChatUser::new("u1", "alice"),
            guild: None,
            channel_id: "c1".to_string(),
            content: "<@bot> hi".to_string(),
            mentions: HashSet::from(["bot".to_string()]),
            created_at: Utc::now(),
        }
    }

    fn race(peer: ScriptedSamplingPeer) -> (ReactionRace, Arc<ScriptedSamplingPeer>) {
        let peer = Arc::new(peer);
        let race = ReactionRace::new(Sampler::new(peer.clone()), &config());
        (race, peer)
    }

    #[test]
    fn test_extract_emoji() {
        assert_eq!(extract_emoji("🔥"), Some("🔥"));
        assert_eq!(extract_emoji("  👍 because it rocks\n"), Some("👍"));
        assert_eq!(extract_emoji("   "), None);
        assert_eq!(extract_emoji(""), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampling_before_timeout_wins() {
        let (race, peer) = race(
            ScriptedSamplingPeer::new()
                .respond_text("🔥")
                .with_delay(Duration::from_secs(2)),
        );

        assert_eq!(race.pick_reaction(&message()).await, "🔥");

        let request = &peer.requests()[0];
        assert_eq!(request.max_tokens, 10);
        assert_eq!(request.timeout, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_sampling_uses_fallback() {
        let (race, _peer) = race(
            ScriptedSamplingPeer::new()
                .respond_text("🔥")
                .with_delay(Duration::from_secs(15)),
        );
        assert_eq!(race.pick_reaction(&message()).await, "🤔");
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_answer_is_never_applied() {
        let (race, peer) = race(
            ScriptedSamplingPeer::new()
                .respond_text("🔥")
                .with_delay(Duration::from_secs(15)),
        );
        let client = MockChatClient::new("bot");

        assert_eq!(race.react(&client, &message()).await, "🤔");
        // Let the abandoned request finish
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(client.reactions(), vec!["🤔"]);
        assert_eq!(peer.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_sampling_uses_fallback() {
        let (race, _peer) = race(ScriptedSamplingPeer::new().fail("no sampling support"));
        assert_eq!(race.pick_reaction(&message()).await, "🤔");
    }

    #[tokio::test]
    async fn test_blank_sampling_uses_fallback() {
        let (race, _peer) = race(ScriptedSamplingPeer::new().respond_text("  \n "));
        assert_eq!(race.pick_reaction(&message()).await, "🤔");
    }

    #[tokio::test]
    async fn test_multi_word_answer_uses_first_token() {
        let (race, _peer) = race(ScriptedSamplingPeer::new().respond_text(" 🎉 party time"));
        assert_eq!(race.pick_reaction(&message()).await, "🎉");
    }

    #[tokio::test]
    async fn test_react_swallows_platform_errors() {
        let (race, _peer) = race(ScriptedSamplingPeer::new().respond_text("👍"));
        let client = MockChatClient::new("bot");
        client.fail(MockOp::React);

        assert_eq!(race.react(&client, &message()).await, "👍");
        assert!(client.reactions().is_empty());
    }
}
