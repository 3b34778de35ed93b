//! Control-plane message types.
//!
//! Handshake and readiness updates ride the normal envelope format under a
//! reserved type prefix. The router core consumes them during delivery;
//! application listeners never see them.
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | `router.hello` | page world -> own content script | page announces itself |
//! | `router.helloAck` | content script -> page world | link confirmed |
//! | `router.webReady` | content script -> hub | relayed page readiness |
//! | `router.readiness` | hub -> everything connected | snapshot broadcast |
//!
//! The handshake is sent exactly once, with no retry: a dropped hello is
//! unrecoverable within a page lifetime and the mitigation is a refresh.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};

use crate::protocol::ContextId;

// ============================================================================
// Message Types
// ============================================================================

/// Prefix reserved for router-internal message types.
pub const CONTROL_PREFIX: &str = "router.";

/// Page world announcing itself to its content script.
pub const HELLO: &str = "router.hello";

/// Content script confirming the page-world link.
pub const HELLO_ACK: &str = "router.helloAck";

/// Content script relaying page-world readiness to the hub.
pub const WEB_READY: &str = "router.webReady";

/// Hub broadcasting the readiness snapshot.
pub const READINESS: &str = "router.readiness";

/// Returns `true` if the message type is router-internal.
#[inline]
#[must_use]
pub fn is_control(message_type: &str) -> bool {
    message_type.starts_with(CONTROL_PREFIX)
}

// ============================================================================
// Content Helpers
// ============================================================================

/// Builds the content object carrying one context id.
#[must_use]
pub fn context_content(context_id: &ContextId) -> Value {
    json!({ "context": context_id })
}

/// Extracts the context id from a control content object.
#[must_use]
pub fn context_from(content: &Value) -> Option<ContextId> {
    content
        .get("context")
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::TabId;
    use crate::protocol::Role;

    #[test]
    fn test_is_control() {
        assert!(is_control(HELLO));
        assert!(is_control(READINESS));
        assert!(!is_control("jukebox.play"));
        assert!(!is_control("routerless"));
    }

    #[test]
    fn test_context_content_round_trip() {
        let ctx = ContextId::with_tab(Role::Web, TabId::new(5));
        let content = context_content(&ctx);
        assert_eq!(context_from(&content), Some(ctx));
    }

    #[test]
    fn test_context_from_rejects_malformed() {
        assert_eq!(context_from(&json!({})), None);
        assert_eq!(context_from(&json!({ "context": 5 })), None);
        assert_eq!(context_from(&json!({ "context": "sidebar-9" })), None);
    }
}
