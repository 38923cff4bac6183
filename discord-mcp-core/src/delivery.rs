// ABOUTME: Sends a possibly long response back to a channel in ordered chunks
// ABOUTME: First chunk replies to the triggering message; the rest are plain sends

use crate::traits::{ChannelInfo, ChatClient};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("channel {channel_id} cannot accept outgoing messages")]
    ChannelUnavailable { channel_id: String },

    #[error("failed to send message: {0:#}")]
    Platform(#[from] anyhow::Error),
}

/// Split `text` into consecutive pieces of at most `size` characters.
///
/// Counts Unicode scalar values, so a multi-byte character is never cut.
/// A `size` of zero is treated as one.
pub fn split_chunks(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Deliver `text` to `channel`, returning the number of messages sent.
///
/// Each send is awaited before the next is issued so the channel shows the
/// chunks in order.
pub async fn deliver(
    client: &dyn ChatClient,
    channel: &ChannelInfo,
    reply_to: &str,
    text: &str,
    chunk_size: usize,
) -> Result<usize, DeliveryError> {
    if !channel.capability.can_send() {
        return Err(DeliveryError::ChannelUnavailable {
            channel_id: channel.id.clone(),
        });
    }

    let chunks = split_chunks(text, chunk_size);
    for (idx, chunk) in chunks.iter().enumerate() {
        if idx == 0 {
            client.reply(&channel.id, reply_to, chunk).await?;
        } else {
            client.send(&channel.id, chunk).await?;
        }
        tracing::trace!(
            channel_id = %channel.id,
            chunk = idx + 1,
            total = chunks.len(),
            "Sent response chunk"
        );
    }

    Ok(chunks.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ChatAction, MockChatClient, MockOp};
    use crate::traits::ChannelCapability;
    use std::time::Duration;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(split_chunks("hi there", 2000), vec!["hi there"]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(split_chunks("", 10).is_empty());
    }

    #[test]
    fn test_chunk_count_and_lengths() {
        for (len, size) in [(10, 3), (9, 3), (1, 1), (4001, 2000), (2000, 2000), (7, 100)] {
            let text = "x".repeat(len);
            let chunks = split_chunks(&text, size);

            assert_eq!(chunks.len(), len.div_ceil(size), "len={} size={}", len, size);
            let (last, full) = chunks.split_last().unwrap();
            assert!(full.iter().all(|c| c.chars().count() == size));
            assert!(last.chars().count() <= size);
            assert_eq!(chunks.concat(), text);
        }
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "héllo wörld 🔥🔥🔥";
        let chunks = split_chunks(text, 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
        assert_eq!(chunks.concat(), text);
        assert_eq!(chunks.len(), text.chars().count().div_ceil(4));
    }

    #[test]
    fn test_newlines_are_kept() {
        let chunks = split_chunks("ab\ncd", 3);
        assert_eq!(chunks, vec!["ab\n", "cd"]);
    }

    #[tokio::test]
    async fn test_deliver_replies_then_sends_in_order() {
        let client = MockChatClient::new("bot");
        let channel = ChannelInfo::text("c1", "general");

        let sent = deliver(&client, &channel, "m1", "abcdefg", 3).await.unwrap();

        assert_eq!(sent, 3);
        assert_eq!(
            client.actions(),
            vec![
                ChatAction::Reply {
                    channel_id: "c1".into(),
                    message_id: "m1".into(),
                    text: "abc".into()
                },
                ChatAction::Send {
                    channel_id: "c1".into(),
                    text: "def".into()
                },
                ChatAction::Send {
                    channel_id: "c1".into(),
                    text: "g".into()
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_chunk_completes_before_the_next_starts() {
        let client = MockChatClient::new("bot");
        // Earlier chunks are slower, so overlapping sends would finish in reverse
        client.delay_sends([
            Duration::from_millis(300),
            Duration::from_millis(200),
            Duration::from_millis(100),
        ]);
        let channel = ChannelInfo::text("c1", "general");
        let start = tokio::time::Instant::now();

        let sent = deliver(&client, &channel, "m1", "abcdefghi", 3).await.unwrap();

        assert_eq!(sent, 3);
        assert_eq!(client.sent_texts(), vec!["abc", "def", "ghi"]);
        assert!(start.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_deliver_rejects_read_only_channel() {
        let client = MockChatClient::new("bot");
        let channel = ChannelInfo {
            id: "forum".into(),
            name: Some("ideas".into()),
            capability: ChannelCapability::TextReadOnly,
            webhooks: true,
        };

        let err = deliver(&client, &channel, "m1", "hi", 2000)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::ChannelUnavailable { channel_id } if channel_id == "forum"));
        assert!(client.actions().is_empty());
    }

    #[tokio::test]
    async fn test_deliver_stops_on_platform_error() {
        let client = MockChatClient::new("bot");
        client.fail(MockOp::Send);
        let channel = ChannelInfo::text("c1", "general");

        let err = deliver(&client, &channel, "m1", "abcdef", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Platform(_)));
        // The reply went out before the failing send
        assert_eq!(client.sent_texts(), vec!["abc"]);
    }
}
