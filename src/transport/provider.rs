//! Host-platform transport injection.
//!
//! The router core never calls platform APIs directly. Everything it needs
//! from the host - channels for its role, the set of live tabs, and
//! connect/disconnect notifications - comes through a [`TransportProvider`]
//! implementation, which keeps the core deterministic under test (the
//! in-memory provider) and portable across hosts.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::identifiers::{ListenerToken, TabId};
use crate::protocol::{ContextId, Role};

use super::channel::MessagingChannel;

// ============================================================================
// LifecycleEvent
// ============================================================================

/// Transport-level connection lifecycle notification.
///
/// Only contexts holding a cross-process connection produce these; the
/// page world has no connection of its own (its readiness is relayed by
/// its content script), and the hub never connects anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A context established its cross-process connection.
    Connected(ContextId),
    /// A context's cross-process connection went away.
    Disconnected(ContextId),
}

/// Callback invoked for every lifecycle event.
pub type LifecycleListener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

// ============================================================================
// Attachment
// ============================================================================

/// Result of attaching a role to the transport.
///
/// Carries the assigned context id (tab-bound roles get their tab filled in
/// by the provider) and the channels the role may use.
pub struct Attachment {
    /// The attached context's address.
    pub context_id: ContextId,
    /// Channels available to this context, at most one per kind.
    pub channels: Vec<Arc<dyn MessagingChannel>>,
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("context_id", &self.context_id)
            .field("channels", &self.channels.len())
            .finish()
    }
}

// ============================================================================
// TransportProvider
// ============================================================================

/// Injected host-platform interface.
///
/// One provider instance represents one execution context's view of the
/// host. Attaching twice through the same view (or attaching a non-`other`
/// context id that is already taken) fails loudly, which is what enforces
/// the one-router-per-context singleton guarantee.
pub trait TransportProvider: Send + Sync {
    /// Attaches a role to the transport and opens its channels.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateContext`](crate::Error::DuplicateContext) when
    ///   the execution context already has a router
    /// - [`Error::Transport`](crate::Error::Transport) when the role cannot
    ///   attach from this execution context
    fn attach(&self, role: Role) -> Result<Attachment>;

    /// Enumerates tabs that currently hold a live cross-process connection.
    fn live_tabs(&self) -> Vec<TabId>;

    /// Subscribes to connect/disconnect events.
    ///
    /// Only the hub has a use for this; other roles learn readiness through
    /// the hub's broadcasts.
    fn subscribe_lifecycle(&self, listener: LifecycleListener) -> ListenerToken;

    /// Removes a lifecycle subscription. Unknown tokens are ignored.
    fn unsubscribe_lifecycle(&self, token: ListenerToken);
}
