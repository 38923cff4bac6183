// ABOUTME: Adapter over the MCP "create message" sampling request
// ABOUTME: Builds a single user block and enforces a hard timeout; never retries

use crate::traits::{SamplingPeer, SamplingRequest};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a sampling request produced no result
#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("sampling request timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },

    #[error("sampling request failed: {0:#}")]
    Protocol(#[from] anyhow::Error),
}

impl SamplingError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Protocol(_) => "protocol",
        }
    }
}

/// Issues sampling requests against the remote peer. Failures are surfaced, never retried.
#[derive(Clone)]
pub struct Sampler {
    peer: Arc<dyn SamplingPeer>,
}

impl Sampler {
    pub fn new(peer: Arc<dyn SamplingPeer>) -> Self {
        Self { peer }
    }

    /// Request a completion for `template`.
    ///
    /// Returns `Ok(None)` when the peer answered with non-text content.
    pub async fn request_completion(
        &self,
        template: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Option<String>, SamplingError> {
        let request = SamplingRequest::user_text(template, max_tokens, timeout);

        tracing::debug!(
            max_tokens,
            timeout_ms = timeout.as_millis() as u64,
            prompt_len = template.len(),
            "Sending sampling request"
        );

        let response = tokio::time::timeout(timeout, self.peer.create_message(request))
            .await
            .map_err(|_| SamplingError::Timeout { after: timeout })??;

        let text = response.content.as_text().map(String::from);
        if text.is_none() {
            tracing::debug!(content = ?response.content, "Sampling returned non-text content");
        }
        Ok(text)
    }
}
