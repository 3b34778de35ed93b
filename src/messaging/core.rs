//! The per-context message router.
//!
//! One [`Messaging`] instance per execution context, attached to the host
//! through an injected [`TransportProvider`]. The router owns:
//!
//! - the dispatch loop: every wire object on every attached channel is
//!   decoded, echo-filtered, forwarded when this context is the named
//!   forwarder, and delivered when this context is among the targets
//! - the reply correlator: `request` parks a oneshot sender keyed by
//!   message id and resolves it on the first matching `replyTo`
//! - readiness: the hub variant holds the authoritative tracker and
//!   broadcasts every change; edge variants cache the broadcast snapshot
//!   for target expansion
//! - the control plane: handshake and readiness messages are consumed
//!   here and never reach application listeners
//!
//! # Topology
//!
//! ```text
//!        web-5 ◄──page──► contentScript-5 ◄──runtime──┐
//!                                                     ▼
//!        web-9 ◄──page──► contentScript-9 ◄──runtime──► background
//!                                                     ▲
//!                                  other ◄──runtime───┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ListenerToken, MessageId};
use crate::protocol::{ContextId, Envelope, Role, wire};
use crate::readiness::{ReadinessSnapshot, ReadinessTracker};
use crate::routing::{SubMessage, resolver, split};
use crate::transport::{
    ChannelKind, LifecycleEvent, MessagingChannel, TransportProvider,
};

use super::control;
use super::post::PostMessage;

/// Reply timeout applied when neither the connection nor the individual
/// request overrides it.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(5000);

// ============================================================================
// Listener Types
// ============================================================================

/// Callback invoked for every delivered application envelope.
pub type MessageCallback = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Listener-side filter applied before a callback fires.
///
/// Target containment and scope are checked by the router itself; the
/// filter narrows by application message type.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    message_types: Option<Vec<String>>,
}

impl MessageFilter {
    /// Matches every application message.
    #[inline]
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Matches only messages of the given type.
    #[must_use]
    pub fn of_type(message_type: impl Into<String>) -> Self {
        Self {
            message_types: Some(vec![message_type.into()]),
        }
    }

    /// Matches messages of any of the given types.
    #[must_use]
    pub fn of_types<I, S>(message_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            message_types: Some(message_types.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Clone)]
struct ListenerEntry {
    filter: MessageFilter,
    scope: Option<String>,
    include_replies: bool,
    callback: MessageCallback,
}

impl ListenerEntry {
    fn matches(&self, envelope: &Envelope) -> bool {
        if envelope.is_reply() && !self.include_replies {
            return false;
        }
        if let Some(wanted) = &self.filter.message_types
            && !envelope
                .message_type
                .as_ref()
                .is_some_and(|t| wanted.contains(t))
        {
            return false;
        }
        // An unscoped envelope reaches every view; a scoped envelope
        // reaches only the matching scope view.
        match (&self.scope, &envelope.scope) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(view), Some(sent)) => view == sent,
        }
    }
}

// ============================================================================
// Readiness State
// ============================================================================

/// Hub and edge variants of readiness knowledge.
enum ReadinessState {
    /// The hub's authoritative table.
    Authoritative(ReadinessTracker),
    /// An edge's cache of the last broadcast snapshot.
    Cached(RwLock<ReadinessSnapshot>),
}

// ============================================================================
// RouterCore
// ============================================================================

/// Shared state behind every [`Messaging`] view of one connection.
struct RouterCore {
    context_id: ContextId,
    channels: FxHashMap<ChannelKind, Arc<dyn MessagingChannel>>,
    provider: Arc<dyn TransportProvider>,
    listeners: Mutex<FxHashMap<ListenerToken, ListenerEntry>>,
    pending: Mutex<FxHashMap<MessageId, oneshot::Sender<Envelope>>>,
    readiness: ReadinessState,
    default_timeout: Duration,
    registrations: Mutex<Vec<(ChannelKind, ListenerToken)>>,
    lifecycle_token: Mutex<Option<ListenerToken>>,
}

impl RouterCore {
    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    /// Entry point for every wire object on every attached channel.
    fn dispatch(&self, raw: &Value) {
        let Some(envelope) = wire::from_wire(raw) else {
            trace!(context = %self.context_id, "Ignoring foreign wire object");
            return;
        };
        // The page bus echoes a poster's own messages back to it.
        if envelope.source == self.context_id {
            return;
        }
        if envelope.forwarder.as_ref() == Some(&self.context_id) {
            self.forward(envelope);
        } else if envelope.targets(&self.context_id) {
            self.deliver(envelope);
        } else {
            trace!(
                context = %self.context_id,
                message = %envelope.id,
                "Not addressed to this context"
            );
        }
    }

    /// Re-resolves a sub-message naming this context as forwarder.
    fn forward(&self, envelope: Envelope) {
        let mut onward = envelope.clone();
        onward.forwarder = None;
        onward.channel = None;
        onward.target.retain(|target| *target != self.context_id);

        if envelope.targets(&self.context_id) {
            self.deliver(envelope);
        }
        if onward.target.is_empty() {
            return;
        }

        let outcome = split(&self.context_id, &onward).and_then(|subs| self.post_subs(subs));
        if let Err(err) = outcome {
            warn!(
                context = %self.context_id,
                message = %onward.id,
                error = %err,
                "Forwarding failed"
            );
        }
    }

    /// Final delivery to this context.
    fn deliver(&self, envelope: Envelope) {
        if let Some(message_type) = envelope.message_type.as_deref()
            && control::is_control(message_type)
        {
            self.handle_control(&envelope);
            return;
        }

        // Resolving a pending request does not consume the reply; listeners
        // registered with include_replies still see it below.
        if let Some(original_id) = envelope.reply_to
            && let Some(sender) = self.pending.lock().remove(&original_id)
            && sender.send(envelope.clone()).is_err()
        {
            trace!(message = %original_id, "Reply arrived after its request was dropped");
        }

        let entries: Vec<ListenerEntry> = self.listeners.lock().values().cloned().collect();
        for entry in entries {
            if entry.matches(&envelope) {
                (entry.callback)(&envelope);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    /// Builds a concrete envelope from a post description.
    fn build_envelope(&self, message: PostMessage, scope: Option<&str>) -> Result<Envelope> {
        let PostMessage {
            message_type,
            content,
            target,
            reply_to,
            ..
        } = message;

        if let Some(original) = reply_to {
            if target.is_some() {
                return Err(Error::addressing(
                    "a reply's target is derived from the original message",
                ));
            }
            let mut envelope = Envelope::new(
                message_type.or(original.message_type),
                content,
                self.context_id.clone(),
                vec![original.source],
                original.scope,
                original.tab_id,
            );
            envelope.reply_to = Some(original.id);
            return Ok(envelope);
        }

        let snapshot = self.readiness_snapshot();
        let targets = resolver::expand(&self.context_id, target.as_deref(), &snapshot)?;
        Ok(Envelope::new(
            message_type,
            content,
            self.context_id.clone(),
            targets,
            scope.map(str::to_string),
            self.context_id.tab(),
        ))
    }

    /// Sends an envelope: local delivery for a self-target, forwarding
    /// resolution and channel posts for everything else.
    fn send(&self, envelope: Envelope) -> Result<()> {
        let mut outbound = envelope;
        if outbound.targets(&self.context_id) {
            let local = outbound.clone();
            outbound.target.retain(|target| *target != self.context_id);
            self.deliver(local);
        }
        if outbound.target.is_empty() {
            return Ok(());
        }
        let subs = split(&self.context_id, &outbound)?;
        self.post_subs(subs)
    }

    fn post_subs(&self, subs: Vec<SubMessage>) -> Result<()> {
        for sub in subs {
            let channel = self
                .channels
                .get(&sub.channel)
                .ok_or(Error::ChannelClosed)?;
            channel.post(wire::to_wire(&sub.envelope)?)?;
        }
        Ok(())
    }

    /// Sends an envelope and awaits the correlated reply.
    async fn request(&self, envelope: Envelope, timeout: Duration) -> Result<Envelope> {
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().insert(envelope.id, sender);

        if let Err(err) = self.send(envelope.clone()) {
            self.pending.lock().remove(&envelope.id);
            return Err(err);
        }

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                self.pending.lock().remove(&envelope.id);
                Err(Error::ChannelClosed)
            }
            Err(_) => {
                self.pending.lock().remove(&envelope.id);
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                Err(Error::reply_timeout(envelope, timeout_ms))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Control Plane
    // ------------------------------------------------------------------------

    fn handle_control(&self, envelope: &Envelope) {
        let Some(message_type) = envelope.message_type.as_deref() else {
            return;
        };
        match message_type {
            control::HELLO => self.on_hello(envelope),
            control::HELLO_ACK => {
                debug!(context = %self.context_id, "Page-world link acknowledged");
            }
            control::WEB_READY => {
                if !self.context_id.is_hub() {
                    return;
                }
                match control::context_from(&envelope.content) {
                    Some(web) => self.mark_connected(web),
                    None => warn!("Readiness relay without a context id"),
                }
            }
            control::READINESS => {
                match serde_json::from_value::<ReadinessSnapshot>(envelope.content.clone()) {
                    Ok(snapshot) => self.store_snapshot(snapshot),
                    Err(err) => warn!(error = %err, "Malformed readiness update"),
                }
            }
            other => {
                trace!(message_type = other, "Ignoring unknown control message");
            }
        }
    }

    /// Content script half of the page handshake: ack the page world and
    /// relay its readiness to the hub.
    fn on_hello(&self, envelope: &Envelope) {
        if self.context_id.role() != Role::ContentScript {
            return;
        }
        let Some(web) = control::context_from(&envelope.content) else {
            warn!("Handshake without a context id");
            return;
        };

        let ack = Envelope::new(
            Some(control::HELLO_ACK.to_string()),
            control::context_content(&self.context_id),
            self.context_id.clone(),
            vec![web.clone()],
            None,
            self.context_id.tab(),
        );
        let relay = Envelope::new(
            Some(control::WEB_READY.to_string()),
            control::context_content(&web),
            self.context_id.clone(),
            vec![ContextId::hub()],
            None,
            self.context_id.tab(),
        );
        if let Err(err) = self.send(ack).and_then(|()| self.send(relay)) {
            warn!(
                context = %self.context_id,
                error = %err,
                "Failed to relay page-world handshake"
            );
        }
    }

    /// Page-world half of the handshake, sent once at connect time.
    fn send_hello(&self) -> Result<()> {
        let Some(tab) = self.context_id.tab() else {
            return Ok(());
        };
        let hello = Envelope::new(
            Some(control::HELLO.to_string()),
            control::context_content(&self.context_id),
            self.context_id.clone(),
            vec![ContextId::with_tab(Role::ContentScript, tab)],
            None,
            Some(tab),
        );
        self.send(hello)
    }

    // ------------------------------------------------------------------------
    // Readiness
    // ------------------------------------------------------------------------

    fn readiness_snapshot(&self) -> ReadinessSnapshot {
        match &self.readiness {
            ReadinessState::Authoritative(tracker) => tracker.snapshot(),
            ReadinessState::Cached(cache) => cache.read().clone(),
        }
    }

    fn store_snapshot(&self, snapshot: ReadinessSnapshot) {
        if let ReadinessState::Cached(cache) = &self.readiness {
            trace!(
                context = %self.context_id,
                connected = snapshot.len(),
                "Readiness updated"
            );
            *cache.write() = snapshot;
        }
    }

    fn mark_connected(&self, context_id: ContextId) {
        if let ReadinessState::Authoritative(tracker) = &self.readiness
            && tracker.connect(context_id)
        {
            self.broadcast_readiness();
        }
    }

    fn on_lifecycle(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Connected(context_id) => self.mark_connected(context_id.clone()),
            LifecycleEvent::Disconnected(context_id) => {
                if let ReadinessState::Authoritative(tracker) = &self.readiness
                    && !tracker.disconnect(context_id).is_empty()
                {
                    self.broadcast_readiness();
                }
            }
        }
    }

    /// Pushes the current snapshot to every connected context.
    fn broadcast_readiness(&self) {
        let snapshot = self.readiness_snapshot();
        let targets: Vec<ContextId> = snapshot.contexts().cloned().collect();
        if targets.is_empty() {
            return;
        }
        let content = match serde_json::to_value(&snapshot) {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "Failed to encode readiness snapshot");
                return;
            }
        };
        let update = Envelope::new(
            Some(control::READINESS.to_string()),
            content,
            self.context_id.clone(),
            targets,
            None,
            None,
        );
        if let Err(err) = self.send(update) {
            warn!(error = %err, "Failed to broadcast readiness");
        }
    }
}

impl Drop for RouterCore {
    fn drop(&mut self) {
        for (kind, token) in self.registrations.lock().drain(..) {
            if let Some(channel) = self.channels.get(&kind) {
                channel.remove_listener(token);
            }
        }
        if let Some(token) = self.lifecycle_token.lock().take() {
            self.provider.unsubscribe_lifecycle(token);
        }
    }
}

// ============================================================================
// Messaging
// ============================================================================

/// Handle to one context's router.
///
/// Cloning and [`Messaging::scoped`] produce cheap views over the same
/// underlying connection; the connection itself lives until the last view
/// is dropped.
#[derive(Clone)]
pub struct Messaging {
    core: Arc<RouterCore>,
    scope: Option<String>,
}

impl Messaging {
    /// Attaches a role to the host and starts routing.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateContext`] when this execution context already has
    /// a router, [`Error::Transport`] when the role cannot attach here.
    pub fn connect(provider: Arc<dyn TransportProvider>, role: Role) -> Result<Self> {
        Self::connect_with_timeout(provider, role, DEFAULT_REPLY_TIMEOUT)
    }

    /// [`Messaging::connect`] with a non-default reply timeout.
    pub fn connect_with_timeout(
        provider: Arc<dyn TransportProvider>,
        role: Role,
        default_timeout: Duration,
    ) -> Result<Self> {
        let attachment = provider.attach(role)?;

        let mut channels: FxHashMap<ChannelKind, Arc<dyn MessagingChannel>> =
            FxHashMap::default();
        for channel in attachment.channels {
            channels.insert(channel.kind(), channel);
        }

        let readiness = if role == Role::Background {
            ReadinessState::Authoritative(ReadinessTracker::new())
        } else {
            ReadinessState::Cached(RwLock::new(ReadinessSnapshot::new()))
        };

        let core = Arc::new(RouterCore {
            context_id: attachment.context_id,
            channels,
            provider: Arc::clone(&provider),
            listeners: Mutex::new(FxHashMap::default()),
            pending: Mutex::new(FxHashMap::default()),
            readiness,
            default_timeout,
            registrations: Mutex::new(Vec::new()),
            lifecycle_token: Mutex::new(None),
        });

        for (kind, channel) in &core.channels {
            let weak = Arc::downgrade(&core);
            let token = channel.add_listener(Arc::new(move |raw| {
                if let Some(core) = weak.upgrade() {
                    core.dispatch(raw);
                }
            }));
            core.registrations.lock().push((*kind, token));
        }

        if core.context_id.is_hub() {
            // Content scripts attached before the hub never re-announce.
            for tab in provider.live_tabs() {
                core.mark_connected(ContextId::with_tab(Role::ContentScript, tab));
            }
            let weak = Arc::downgrade(&core);
            let token = provider.subscribe_lifecycle(Arc::new(move |event| {
                if let Some(core) = weak.upgrade() {
                    core.on_lifecycle(event);
                }
            }));
            core.lifecycle_token.lock().replace(token);
        }

        if role == Role::Web {
            core.send_hello()?;
        }

        debug!(context = %core.context_id, "Messaging connected");
        Ok(Self { core, scope: None })
    }

    /// Returns this router's context id.
    #[inline]
    #[must_use]
    pub fn context_id(&self) -> &ContextId {
        &self.core.context_id
    }

    /// Returns this view's scope, if any.
    #[inline]
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Returns a view that stamps outbound messages with the scope and
    /// filters inbound delivery to it.
    ///
    /// Unscoped (global) messages still reach scoped views.
    #[must_use]
    pub fn scoped(&self, scope: impl Into<String>) -> Self {
        Self {
            core: Arc::clone(&self.core),
            scope: Some(scope.into()),
        }
    }

    /// Returns the last known readiness snapshot.
    ///
    /// Authoritative on the hub; on edges, as fresh as the last broadcast.
    #[must_use]
    pub fn readiness(&self) -> ReadinessSnapshot {
        self.core.readiness_snapshot()
    }

    /// Sends a message without awaiting a reply.
    ///
    /// Delivery is not guaranteed: a target that disconnects mid-flight is
    /// dropped silently, per the transport contract.
    ///
    /// # Errors
    ///
    /// [`Error::Addressing`] for an invalid or empty target specification,
    /// [`Error::Unreachable`] on a topology bug, transport errors from the
    /// underlying channel.
    pub fn post(&self, message: PostMessage) -> Result<()> {
        let envelope = self.core.build_envelope(message, self.scope.as_deref())?;
        self.core.send(envelope)
    }

    /// Sends a message and awaits the first reply.
    ///
    /// # Errors
    ///
    /// Everything [`Messaging::post`] raises, plus [`Error::ReplyTimeout`]
    /// carrying the original envelope when no reply arrives in time.
    pub async fn request(&self, message: PostMessage) -> Result<Envelope> {
        let timeout = message.timeout.unwrap_or(self.core.default_timeout);
        let envelope = self.core.build_envelope(message, self.scope.as_deref())?;
        self.core.request(envelope, timeout).await
    }

    /// Registers a delivery callback.
    ///
    /// The callback fires for every envelope that targets this context,
    /// passes the filter, and matches this view's scope. Replies are
    /// excluded unless `include_replies` is set; control messages never
    /// reach callbacks.
    pub fn on_message(
        &self,
        filter: MessageFilter,
        callback: MessageCallback,
        include_replies: bool,
    ) -> ListenerToken {
        let token = ListenerToken::next();
        self.core.listeners.lock().insert(
            token,
            ListenerEntry {
                filter,
                scope: self.scope.clone(),
                include_replies,
                callback,
            },
        );
        token
    }

    /// Removes a delivery callback. Unknown tokens are ignored.
    pub fn remove_listener(&self, token: ListenerToken) {
        self.core.listeners.lock().remove(&token);
    }

    /// Number of requests still awaiting a reply.
    #[cfg(test)]
    pub(crate) fn pending_requests(&self) -> usize {
        self.core.pending.lock().len()
    }
}

impl fmt::Debug for Messaging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messaging")
            .field("context_id", &self.core.context_id)
            .field("scope", &self.scope)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
