//! Inbound message routing.
//!
//! [`InboundMessageHandler`] maps channels to listeners and hands every
//! inbound message to the [`CommandBuffer`], so listener code never runs on
//! the transport's delivery thread.
//!
//! The registry holds weak references only. A listener dropped (or removed)
//! before its pending deliveries run simply misses them.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::command_buffer::CommandBuffer;
use crate::error::Result;
use crate::message::Message;
use crate::protocol::{
    MessageListener, CHANNEL_DELIMITER, CHANNEL_MULTI_LEVEL_WILDCARD,
    CHANNEL_SINGLE_LEVEL_WILDCARD,
};

/// Registration handle of a listener.
///
/// Ids are never reused, so a stale delivery can always tell that its
/// listener was removed, even if a new listener took over the channel.
pub type ListenerId = u64;

#[derive(Clone)]
struct Subscription {
    id: ListenerId,
    listener: Weak<dyn MessageListener>,
}

#[derive(Default)]
struct Registry {
    /// Literal channels
    exact: HashMap<String, Subscription>,
    /// Wildcard patterns in registration order
    patterns: Vec<(String, Subscription)>,
    /// Registered listeners
    listeners: Vec<Subscription>,
    next_id: ListenerId,
}

impl Registry {
    fn find_listener(&self, ptr: *const ()) -> Option<ListenerId> {
        self.listeners
            .iter()
            .find(|s| s.listener.as_ptr() as *const () == ptr && s.listener.strong_count() > 0)
            .map(|s| s.id)
    }

    fn is_registered(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|s| s.id == id)
    }

    fn owner_of(&self, channel: &str) -> Option<ListenerId> {
        self.exact.get(channel).map(|s| s.id).or_else(|| {
            self.patterns
                .iter()
                .find(|(p, _)| p == channel)
                .map(|(_, s)| s.id)
        })
    }

    fn bind(&mut self, channel: String, subscription: Subscription, protocol: &str) {
        let id = subscription.id;
        let previous = if is_wildcard(&channel) {
            match self.patterns.iter_mut().find(|(p, _)| *p == channel) {
                Some((_, existing)) => Some(std::mem::replace(existing, subscription)),
                None => {
                    self.patterns.push((channel.clone(), subscription));
                    None
                }
            }
        } else {
            self.exact.insert(channel.clone(), subscription)
        };

        if let Some(previous) = previous {
            if previous.id != id && previous.listener.strong_count() > 0 {
                tracing::warn!(
                    "Channel '{}' reassigned to protocol '{}' (was listener #{})",
                    channel,
                    protocol,
                    previous.id
                );
            }
        }
    }

    fn resolve(&self, channel: &str) -> Option<Subscription> {
        if let Some(subscription) = self.exact.get(channel) {
            return Some(subscription.clone());
        }

        self.patterns
            .iter()
            .find(|(pattern, _)| topic_matches(pattern, channel))
            .map(|(_, subscription)| subscription.clone())
    }

    fn unbind(&mut self, id: ListenerId) {
        self.exact.retain(|_, s| s.id != id);
        self.patterns.retain(|(_, s)| s.id != id);
        self.listeners.retain(|s| s.id != id);
    }

    /// Forget listeners that have been dropped.
    fn prune(&mut self) {
        let dead: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|s| s.listener.strong_count() == 0)
            .map(|s| s.id)
            .collect();
        for id in dead {
            self.unbind(id);
        }
    }
}

/// Channel based router feeding the command buffer.
pub struct InboundMessageHandler {
    registry: Arc<RwLock<Registry>>,
    command_buffer: CommandBuffer,
}

impl InboundMessageHandler {
    /// Create a router dispatching through the given command buffer.
    pub fn new(command_buffer: CommandBuffer) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            command_buffer,
        }
    }

    /// Register a listener for every inbound channel of its protocol.
    ///
    /// Registering the same listener again keeps its id and only adds
    /// channels it did not own yet. A channel owned by another listener is
    /// handed over to this one.
    pub fn add_listener<L>(&self, listener: &Arc<L>) -> ListenerId
    where
        L: MessageListener + 'static,
    {
        let protocol = listener.protocol();
        let channels = protocol.inbound_channels();
        let ptr = Arc::as_ptr(listener) as *const ();

        let dyn_listener: Arc<dyn MessageListener> = listener.clone();
        let weak = Arc::downgrade(&dyn_listener);

        let mut registry = self.registry.write();
        registry.prune();
        let id = match registry.find_listener(ptr) {
            Some(id) => id,
            None => {
                registry.next_id += 1;
                let id = registry.next_id;
                registry.listeners.push(Subscription {
                    id,
                    listener: weak.clone(),
                });
                id
            }
        };

        for channel in channels {
            if registry.owner_of(&channel) == Some(id) {
                continue;
            }
            registry.bind(
                channel,
                Subscription {
                    id,
                    listener: weak.clone(),
                },
                protocol.name(),
            );
        }

        tracing::info!(
            "Registered listener #{} for protocol '{}'",
            id,
            protocol.name()
        );
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    ///
    /// Deliveries already queued for it become no-ops.
    pub fn remove_listener<L>(&self, listener: &Arc<L>) -> bool
    where
        L: MessageListener + 'static,
    {
        let ptr = Arc::as_ptr(listener) as *const ();
        let mut registry = self.registry.write();

        match registry.find_listener(ptr) {
            Some(id) => {
                registry.unbind(id);
                tracing::info!("Removed listener #{}", id);
                true
            }
            None => false,
        }
    }

    /// Union of all registered channels and patterns, sorted.
    pub fn channels(&self) -> Vec<String> {
        let registry = self.registry.read();

        let mut channels: Vec<String> = registry
            .exact
            .keys()
            .cloned()
            .chain(registry.patterns.iter().map(|(p, _)| p.clone()))
            .collect();
        channels.sort();
        channels.dedup();
        channels
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.registry.read().listeners.len()
    }

    /// Route a raw transport message.
    ///
    /// Lookup and enqueue happen before returning, so messages on a channel
    /// reach their listener in the order they were reported here.
    pub fn message_received(&self, channel: &str, content: &str) -> Result<()> {
        let Some(subscription) = self.registry.read().resolve(channel) else {
            tracing::warn!("No listener registered for channel: {}", channel);
            return Ok(());
        };

        let message = Message::new(channel, content);
        let registry = self.registry.clone();

        self.command_buffer.push(async move {
            let listener = {
                let registry = registry.read();
                if !registry.is_registered(subscription.id) {
                    tracing::debug!(
                        "Listener #{} removed before delivery on '{}'",
                        subscription.id,
                        message.channel()
                    );
                    return Ok(());
                }
                match subscription.listener.upgrade() {
                    Some(listener) => listener,
                    None => {
                        tracing::debug!(
                            "Listener #{} dropped before delivery on '{}'",
                            subscription.id,
                            message.channel()
                        );
                        return Ok(());
                    }
                }
            };

            listener.message_received(message).await
        })?;

        Ok(())
    }
}

/// Whether a channel contains wildcard levels.
pub fn is_wildcard(channel: &str) -> bool {
    channel.split(CHANNEL_DELIMITER).any(|level| {
        level == CHANNEL_SINGLE_LEVEL_WILDCARD || level == CHANNEL_MULTI_LEVEL_WILDCARD
    })
}

/// Check if a topic matches a pattern.
///
/// Supports MQTT-style wildcards:
/// - `+` matches exactly one topic level
/// - `#` matches zero or more trailing topic levels
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern == topic {
        return true;
    }

    let mut pattern_levels = pattern.split(CHANNEL_DELIMITER);
    let mut topic_levels = topic.split(CHANNEL_DELIMITER);

    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some(CHANNEL_MULTI_LEVEL_WILDCARD), _) => return true,
            (Some(CHANNEL_SINGLE_LEVEL_WILDCARD), Some(_)) => continue,
            (Some(p), Some(t)) if p == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
