//! In-memory transport for deterministic testing.
//!
//! Models the host platform as plain data structures:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                   MemoryTransport                     │
//! │                                                       │
//! │  tab 5: page bus ◄── web-5, contentScript-5           │
//! │  tab 9: page bus ◄── web-9, contentScript-9           │
//! │                                                       │
//! │  runtime: edges post to the hub inbox;                │
//! │           the hub posts to per-context edge inboxes   │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! - One page bus per tab; every post is delivered to all listeners on the
//!   bus, the poster's own included (window messaging semantics)
//! - Edge runtime posts reach the hub only; hub posts are addressed by the
//!   sub-message's forwarder/target context ids
//! - Delivery is synchronous, so per-channel FIFO holds trivially
//! - Attaching a cross-process role fires a connect lifecycle event;
//!   [`MemoryTransport::disconnect`] severs one and fires the disconnect

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{ListenerToken, TabId};
use crate::protocol::{ContextId, Role, wire};

use super::channel::{ChannelKind, ListenerRegistry, MessagingChannel, WireListener};
use super::provider::{
    Attachment, LifecycleEvent, LifecycleListener, TransportProvider,
};

// ============================================================================
// Shared State
// ============================================================================

/// State shared by every execution-context view of one fake host.
#[derive(Default)]
struct HostShared {
    /// Per-tab page bus, shared by the tab's page world and content script.
    page_buses: Mutex<FxHashMap<TabId, Arc<ListenerRegistry>>>,

    /// Listeners registered by the hub's runtime channel.
    hub_inbox: Arc<ListenerRegistry>,

    /// Runtime listeners per edge context. `other` surfaces are collapsed
    /// to one key and may hold several inboxes.
    edge_inboxes: Mutex<FxHashMap<ContextId, Vec<Arc<ListenerRegistry>>>>,

    /// Attached context ids, for singleton enforcement.
    attached: Mutex<FxHashSet<ContextId>>,

    /// Lifecycle subscriptions.
    lifecycle: Mutex<FxHashMap<ListenerToken, LifecycleListener>>,
}

impl HostShared {
    fn page_bus(&self, tab: TabId) -> Arc<ListenerRegistry> {
        Arc::clone(
            self.page_buses
                .lock()
                .entry(tab)
                .or_insert_with(|| Arc::new(ListenerRegistry::new())),
        )
    }

    fn emit(&self, event: &LifecycleEvent) {
        let listeners: Vec<LifecycleListener> =
            self.lifecycle.lock().values().cloned().collect();
        for listener in listeners {
            listener(event);
        }
    }
}

// ============================================================================
// Channels
// ============================================================================

/// In-page channel backed by a tab's shared bus.
struct PageChannel {
    bus: Arc<ListenerRegistry>,
}

impl MessagingChannel for PageChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Page
    }

    fn post(&self, wire: Value) -> Result<()> {
        self.bus.notify(&wire);
        Ok(())
    }

    fn add_listener(&self, listener: WireListener) -> ListenerToken {
        self.bus.add(listener)
    }

    fn remove_listener(&self, token: ListenerToken) {
        self.bus.remove(token);
    }
}

/// Edge-side runtime channel: posts land in the hub inbox.
struct EdgeRuntimeChannel {
    shared: Arc<HostShared>,
    inbox: Arc<ListenerRegistry>,
}

impl MessagingChannel for EdgeRuntimeChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Runtime
    }

    fn post(&self, wire: Value) -> Result<()> {
        self.shared.hub_inbox.notify(&wire);
        Ok(())
    }

    fn add_listener(&self, listener: WireListener) -> ListenerToken {
        self.inbox.add(listener)
    }

    fn remove_listener(&self, token: ListenerToken) {
        self.inbox.remove(token);
    }
}

/// Hub-side runtime channel.
///
/// Outbound addressing is derived from the sub-message itself: the
/// forwarder if set, otherwise each target. Addressing the hub from the
/// hub fails fast; a vanished destination is dropped with a log line,
/// matching the no-delivery-guarantee contract.
struct HubRuntimeChannel {
    shared: Arc<HostShared>,
}

impl MessagingChannel for HubRuntimeChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Runtime
    }

    fn post(&self, wire: Value) -> Result<()> {
        let envelope = wire::from_wire(&wire)
            .ok_or_else(|| Error::transport("hub channel accepts routed envelopes only"))?;

        let destinations: Vec<ContextId> = match envelope.forwarder {
            Some(forwarder) => vec![forwarder],
            None => envelope.target,
        };

        for destination in destinations {
            match destination.role() {
                Role::Background => {
                    return Err(Error::addressing("the hub cannot address itself"));
                }
                Role::Web => {
                    return Err(Error::transport(
                        "the runtime transport cannot address the page world",
                    ));
                }
                Role::ContentScript | Role::Other => {
                    let inboxes: Vec<Arc<ListenerRegistry>> = self
                        .shared
                        .edge_inboxes
                        .lock()
                        .get(&destination)
                        .cloned()
                        .unwrap_or_default();
                    if inboxes.is_empty() {
                        debug!(%destination, "Dropping post to vanished context");
                    }
                    for inbox in inboxes {
                        inbox.notify(&wire);
                    }
                }
            }
        }
        Ok(())
    }

    fn add_listener(&self, listener: WireListener) -> ListenerToken {
        self.shared.hub_inbox.add(listener)
    }

    fn remove_listener(&self, token: ListenerToken) {
        self.shared.hub_inbox.remove(token);
    }
}

// ============================================================================
// MemoryTransport
// ============================================================================

/// A complete fake host: every execution context of one simulated browser.
///
/// # Example
///
/// ```ignore
/// let host = MemoryTransport::new();
/// let hub = Messaging::connect(host.extension_context(), Role::Background)?;
/// let cs = Messaging::connect(host.tab_context(TabId::new(5)), Role::ContentScript)?;
/// let web = Messaging::connect(host.tab_context(TabId::new(5)), Role::Web)?;
/// ```
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<HostShared>,
}

impl MemoryTransport {
    /// Creates an empty fake host.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(HostShared::default()),
        }
    }

    /// Returns a fresh execution-context view bound to a tab.
    ///
    /// Suitable for attaching the page-world or content-script role.
    #[must_use]
    pub fn tab_context(&self, tab: TabId) -> Arc<MemoryContext> {
        Arc::new(MemoryContext {
            shared: Arc::clone(&self.shared),
            tab: Some(tab),
            attached: Mutex::new(None),
        })
    }

    /// Returns a fresh tabless execution-context view.
    ///
    /// Suitable for attaching the hub or an `other` surface.
    #[must_use]
    pub fn extension_context(&self) -> Arc<MemoryContext> {
        Arc::new(MemoryContext {
            shared: Arc::clone(&self.shared),
            tab: None,
            attached: Mutex::new(None),
        })
    }

    /// Severs a context's cross-process connection.
    ///
    /// Fires the disconnect lifecycle event; the page bus is left alone
    /// since the page world holds no connection of its own.
    pub fn disconnect(&self, context_id: &ContextId) {
        let removed = {
            let mut attached = self.shared.attached.lock();
            let mut inboxes = self.shared.edge_inboxes.lock();
            inboxes.remove(context_id);
            attached.remove(context_id)
        };
        if removed {
            debug!(context = %context_id, "Disconnected");
            self.shared
                .emit(&LifecycleEvent::Disconnected(context_id.clone()));
        }
    }

    /// Severs a tab's content-script connection.
    pub fn disconnect_tab(&self, tab: TabId) {
        self.disconnect(&ContextId::with_tab(Role::ContentScript, tab));
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryContext
// ============================================================================

/// One execution context's view of a [`MemoryTransport`].
///
/// At most one role may attach through a view; a second attach fails with
/// a duplicate-context error, which is what gives `Messaging` its
/// singleton-per-context guarantee.
pub struct MemoryContext {
    shared: Arc<HostShared>,
    tab: Option<TabId>,
    attached: Mutex<Option<ContextId>>,
}

impl TransportProvider for MemoryContext {
    fn attach(&self, role: Role) -> Result<Attachment> {
        let context_id = match (role.is_tab_bound(), self.tab) {
            (true, Some(tab)) => ContextId::with_tab(role, tab),
            (true, None) => {
                return Err(Error::transport(format!(
                    "role {role} can only attach from a tab context"
                )));
            }
            (false, Some(_)) => {
                return Err(Error::transport(format!(
                    "role {role} cannot attach from a tab context"
                )));
            }
            (false, None) => ContextId::tabless(role),
        };

        // One router per execution context.
        {
            let mut attached = self.attached.lock();
            if let Some(existing) = attached.as_ref() {
                return Err(Error::duplicate_context(existing.clone()));
            }
            attached.replace(context_id.clone());
        }
        // And one context per address, except for the collapsed `other`.
        {
            let mut attached = self.shared.attached.lock();
            if role != Role::Other && !attached.insert(context_id.clone()) {
                self.attached.lock().take();
                return Err(Error::duplicate_context(context_id));
            }
            if role == Role::Other {
                attached.insert(context_id.clone());
            }
        }

        let mut channels: Vec<Arc<dyn MessagingChannel>> = Vec::new();
        let mut connected = false;

        match (role, context_id.tab()) {
            (Role::Web, Some(tab)) => {
                channels.push(Arc::new(PageChannel {
                    bus: self.shared.page_bus(tab),
                }));
            }
            (Role::ContentScript, Some(tab)) => {
                let inbox = Arc::new(ListenerRegistry::new());
                self.shared
                    .edge_inboxes
                    .lock()
                    .entry(context_id.clone())
                    .or_default()
                    .push(Arc::clone(&inbox));
                channels.push(Arc::new(PageChannel {
                    bus: self.shared.page_bus(tab),
                }));
                channels.push(Arc::new(EdgeRuntimeChannel {
                    shared: Arc::clone(&self.shared),
                    inbox,
                }));
                connected = true;
            }
            (Role::Background, _) => {
                channels.push(Arc::new(HubRuntimeChannel {
                    shared: Arc::clone(&self.shared),
                }));
            }
            (Role::Other, _) => {
                let inbox = Arc::new(ListenerRegistry::new());
                self.shared
                    .edge_inboxes
                    .lock()
                    .entry(context_id.clone())
                    .or_default()
                    .push(Arc::clone(&inbox));
                channels.push(Arc::new(EdgeRuntimeChannel {
                    shared: Arc::clone(&self.shared),
                    inbox,
                }));
                connected = true;
            }
            (Role::Web | Role::ContentScript, None) => {
                unreachable!("tab-bound context id always carries a tab");
            }
        }

        trace!(context = %context_id, "Attached");
        if connected {
            self.shared
                .emit(&LifecycleEvent::Connected(context_id.clone()));
        }

        Ok(Attachment {
            context_id,
            channels,
        })
    }

    fn live_tabs(&self) -> Vec<TabId> {
        let mut tabs: Vec<TabId> = self
            .shared
            .edge_inboxes
            .lock()
            .keys()
            .filter(|ctx| ctx.role() == Role::ContentScript)
            .filter_map(ContextId::tab)
            .collect();
        tabs.sort_unstable();
        tabs
    }

    fn subscribe_lifecycle(&self, listener: LifecycleListener) -> ListenerToken {
        let token = ListenerToken::next();
        self.shared.lifecycle.lock().insert(token, listener);
        token
    }

    fn unsubscribe_lifecycle(&self, token: ListenerToken) {
        self.shared.lifecycle.lock().remove(&token);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::protocol::Envelope;

    fn routed_wire(envelope: &Envelope) -> Value {
        wire::to_wire(envelope).expect("encode")
    }

    #[test]
    fn test_attach_assigns_context_id() {
        let host = MemoryTransport::new();
        let attachment = host
            .tab_context(TabId::new(5))
            .attach(Role::ContentScript)
            .expect("attach");
        assert_eq!(attachment.context_id.to_string(), "contentScript-5");
        assert_eq!(attachment.channels.len(), 2);
    }

    #[test]
    fn test_attach_twice_is_duplicate() {
        let host = MemoryTransport::new();
        let ctx = host.tab_context(TabId::new(5));
        ctx.attach(Role::ContentScript).expect("attach");
        let err = ctx.attach(Role::ContentScript).unwrap_err();
        assert!(matches!(err, Error::DuplicateContext { .. }));
    }

    #[test]
    fn test_same_address_from_two_views_is_duplicate() {
        let host = MemoryTransport::new();
        host.tab_context(TabId::new(5))
            .attach(Role::ContentScript)
            .expect("attach");
        let err = host
            .tab_context(TabId::new(5))
            .attach(Role::ContentScript)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateContext { .. }));
    }

    #[test]
    fn test_multiple_other_surfaces_allowed() {
        let host = MemoryTransport::new();
        host.extension_context().attach(Role::Other).expect("first");
        host.extension_context()
            .attach(Role::Other)
            .expect("second other surface");
    }

    #[test]
    fn test_tab_role_requires_tab_context() {
        let host = MemoryTransport::new();
        assert!(host.extension_context().attach(Role::Web).is_err());
        assert!(host.tab_context(TabId::new(1)).attach(Role::Background).is_err());
    }

    #[test]
    fn test_page_bus_echoes_to_all_listeners() {
        let host = MemoryTransport::new();
        let web = host
            .tab_context(TabId::new(3))
            .attach(Role::Web)
            .expect("attach");
        let cs = host
            .tab_context(TabId::new(3))
            .attach(Role::ContentScript)
            .expect("attach");

        let hits = Arc::new(AtomicUsize::new(0));
        for attachment in [&web, &cs] {
            for channel in &attachment.channels {
                if channel.kind() == ChannelKind::Page {
                    let hits = Arc::clone(&hits);
                    channel.add_listener(Arc::new(move |_| {
                        hits.fetch_add(1, Ordering::SeqCst);
                    }));
                }
            }
        }

        let mut env = Envelope::test_fixture();
        env.tab_id = Some(TabId::new(3));
        web.channels[0].post(routed_wire(&env)).expect("post");
        // Both page listeners see it, the poster's own included.
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hub_self_send_fails_fast() {
        let host = MemoryTransport::new();
        let hub = host
            .extension_context()
            .attach(Role::Background)
            .expect("attach");

        let mut env = Envelope::test_fixture();
        env.source = ContextId::hub();
        env.target = vec![ContextId::hub()];
        let err = hub.channels[0].post(routed_wire(&env)).unwrap_err();
        assert!(err.is_addressing());
    }

    #[test]
    fn test_live_tabs_and_disconnect() {
        let host = MemoryTransport::new();
        let view = host.extension_context();
        host.tab_context(TabId::new(2))
            .attach(Role::ContentScript)
            .expect("attach");
        host.tab_context(TabId::new(7))
            .attach(Role::ContentScript)
            .expect("attach");
        assert_eq!(view.live_tabs(), vec![TabId::new(2), TabId::new(7)]);

        host.disconnect_tab(TabId::new(2));
        assert_eq!(view.live_tabs(), vec![TabId::new(7)]);
    }

    #[test]
    fn test_lifecycle_events() {
        let host = MemoryTransport::new();
        let view = host.extension_context();
        let events = Arc::new(Mutex::new(Vec::new()));

        let events_clone = Arc::clone(&events);
        view.subscribe_lifecycle(Arc::new(move |event| {
            events_clone.lock().push(event.clone());
        }));

        host.tab_context(TabId::new(4))
            .attach(Role::ContentScript)
            .expect("attach");
        host.disconnect_tab(TabId::new(4));

        let seen = events.lock().clone();
        let cs = ContextId::with_tab(Role::ContentScript, TabId::new(4));
        assert_eq!(
            seen,
            vec![
                LifecycleEvent::Connected(cs.clone()),
                LifecycleEvent::Disconnected(cs),
            ]
        );
    }
}
