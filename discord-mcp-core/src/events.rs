// ABOUTME: Subscription bookkeeping for "message created" event handlers
// ABOUTME: Platforms embed a HandlerRegistry and hand out Subscription handles

use crate::traits::InboundMessage;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;

/// Receives "message created" events from a chat platform
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message_create(&self, message: InboundMessage);
}

/// Handle for a registered handler.
///
/// Not `Clone`: the only way to deregister is to give the handle back,
/// so a registration can be removed at most once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Registered handlers keyed by subscription ID
#[derive(Default)]
pub struct HandlerRegistry {
    next_id: AtomicU64,
    handlers: RwLock<BTreeMap<u64, Arc<dyn MessageHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler and return its subscription handle
    pub fn register(&self, handler: Arc<dyn MessageHandler>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, handler);
        tracing::debug!(subscription = id, "Message handler registered");
        Subscription { id }
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn remove(&self, subscription: Subscription) -> bool {
        let removed = self
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&subscription.id)
            .is_some();
        tracing::debug!(subscription = subscription.id, removed, "Message handler removed");
        removed
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the current handlers in registration order
    pub fn handlers(&self) -> Vec<Arc<dyn MessageHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Deliver a message to every handler, each on its own task.
    ///
    /// Handlers registered after this call do not see the message.
    pub fn dispatch(&self, message: InboundMessage) -> Vec<JoinHandle<()>> {
        self.handlers()
            .into_iter()
            .map(|handler| {
                let message = message.clone();
                tokio::spawn(async move { handler.on_message_create(message).await })
            })
            .collect()
    }
}
