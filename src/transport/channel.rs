//! Channel abstraction over the two underlying transports.
//!
//! A channel is the uniform interface the router uses to move wire objects:
//! post, subscribe, unsubscribe. Two kinds exist:
//!
//! - [`ChannelKind::Page`] - in-page messaging, usable only between roles
//!   sharing the same tab's page context
//! - [`ChannelKind::Runtime`] - cross-process messaging between any role
//!   and the hub
//!
//! The hub's runtime channel is asymmetric: inbound delivery arrives via
//! subscription, but outbound addressing is derived from the sub-message's
//! forwarder/target context ids and fails fast when the hub addresses
//! itself (by topology it never needs to).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::ListenerToken;

// ============================================================================
// ChannelKind
// ============================================================================

/// The two physical transports the routing layer runs over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// In-page messaging; same-tab page world and content script only.
    Page,
    /// Cross-process messaging; any role to and from the hub.
    Runtime,
}

impl ChannelKind {
    /// Returns the wire name of the kind.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Page => "page",
            ChannelKind::Runtime => "runtime",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Listener Types
// ============================================================================

/// Callback invoked for every wire object delivered on a channel.
///
/// Listeners receive raw wire values; prefix stripping and envelope
/// decoding happen above the channel layer.
pub type WireListener = Arc<dyn Fn(&Value) + Send + Sync>;

// ============================================================================
// MessagingChannel
// ============================================================================

/// Uniform transport interface.
///
/// Implementations must deliver posts in FIFO order per channel; no
/// ordering is guaranteed across different channels.
pub trait MessagingChannel: Send + Sync {
    /// The kind of transport this channel runs over.
    fn kind(&self) -> ChannelKind;

    /// Posts a wire object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Addressing`](crate::Error::Addressing) when the hub
    /// channel is asked to address the hub itself, or
    /// [`Error::Transport`](crate::Error::Transport) on delivery failure.
    fn post(&self, wire: Value) -> Result<()>;

    /// Subscribes to every wire object delivered on this channel.
    fn add_listener(&self, listener: WireListener) -> ListenerToken;

    /// Removes a previously registered listener.
    ///
    /// Unknown tokens are ignored.
    fn remove_listener(&self, token: ListenerToken);
}

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Token-keyed listener set shared by channel implementations.
///
/// Notification clones the listener list before invoking callbacks, so a
/// callback may post (and thus re-enter a registry) without deadlocking.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<FxHashMap<ListenerToken, WireListener>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its removal token.
    pub fn add(&self, listener: WireListener) -> ListenerToken {
        let token = ListenerToken::next();
        self.listeners.lock().insert(token, listener);
        token
    }

    /// Removes a listener. Unknown tokens are ignored.
    pub fn remove(&self, token: ListenerToken) {
        self.listeners.lock().remove(&token);
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Returns `true` if no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Invokes every registered listener with the wire object.
    pub fn notify(&self, wire: &Value) {
        let listeners: Vec<WireListener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(wire);
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    #[test]
    fn test_channel_kind_serde() {
        assert_eq!(
            serde_json::to_string(&ChannelKind::Page).expect("serialize"),
            "\"page\""
        );
        let kind: ChannelKind = serde_json::from_str("\"runtime\"").expect("deserialize");
        assert_eq!(kind, ChannelKind::Runtime);
    }

    #[test]
    fn test_registry_add_remove() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = Arc::clone(&hits);
        let token = registry.add(Arc::new(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));

        registry.notify(&json!({}));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        registry.remove(token);
        registry.notify(&json!({}));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_reentrant_notify() {
        let registry = Arc::new(ListenerRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let registry_clone = Arc::clone(&registry);
        let hits_clone = Arc::clone(&hits);
        registry.add(Arc::new(move |wire| {
            // Re-entering from a callback must not deadlock.
            if hits_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                registry_clone.notify(wire);
            }
        }));

        registry.notify(&json!({}));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
