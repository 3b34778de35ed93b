//! The canonical message record exchanged between contexts.
//!
//! # Format
//!
//! ```json
//! {
//!   "id": "uuid",
//!   "type": "jukebox.play",
//!   "content": { ... },
//!   "source": "web-42",
//!   "target": ["contentScript-42", "background"],
//!   "scope": "jukebox",
//!   "replyTo": null,
//!   "tabId": 42,
//!   "forwarder": "contentScript-42",
//!   "channel": "page"
//! }
//! ```
//!
//! `forwarder` and `channel` only appear on sub-messages produced by the
//! forwarding resolver; they name the immediate next hop and the physical
//! channel the sub-message travels on. On the wire every key is additionally
//! namespaced with a fixed prefix (see [`wire`](super::wire)).

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{MessageId, TabId};
use crate::transport::ChannelKind;

use super::ContextId;

// ============================================================================
// Envelope
// ============================================================================

/// A single routed message.
///
/// Invariants:
///
/// - `target` is non-empty and holds concrete context ids only (shortcuts
///   are expanded before an envelope is built)
/// - `id` is globally unique
/// - `reply_to`, when present, names the id of a previously sent envelope,
///   and `message_type`/`target`/`tab_id` were derived from that original
///   envelope rather than supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Unique identifier, generated at send time.
    pub id: MessageId,

    /// Application-level message type, if any.
    #[serde(rename = "type")]
    pub message_type: Option<String>,

    /// Application payload. Defaults to an empty object.
    #[serde(default)]
    pub content: Value,

    /// The sending context.
    pub source: ContextId,

    /// The concrete contexts this envelope (or sub-message) covers.
    pub target: Vec<ContextId>,

    /// Scope name, or `None` for global delivery to every scope view.
    #[serde(default)]
    pub scope: Option<String>,

    /// Id of the message this one replies to, if any.
    #[serde(default)]
    pub reply_to: Option<MessageId>,

    /// Tab the sender is bound to; replies inherit it from the original.
    #[serde(default)]
    pub tab_id: Option<TabId>,

    /// Immediate next hop for forwarded sub-messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarder: Option<ContextId>,

    /// Physical channel this sub-message travels on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelKind>,
}

impl Envelope {
    /// Creates a fresh envelope with a generated id.
    ///
    /// `content` defaults to an empty object when given `Value::Null`.
    #[must_use]
    pub fn new(
        message_type: Option<String>,
        content: Value,
        source: ContextId,
        target: Vec<ContextId>,
        scope: Option<String>,
        tab_id: Option<TabId>,
    ) -> Self {
        let content = match content {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };
        Self {
            id: MessageId::generate(),
            message_type,
            content,
            source,
            target,
            scope,
            reply_to: None,
            tab_id,
            forwarder: None,
            channel: None,
        }
    }

    /// Returns `true` if this envelope is a reply to another message.
    #[inline]
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }

    /// Returns `true` if the given context is among the final targets.
    #[inline]
    #[must_use]
    pub fn targets(&self, context_id: &ContextId) -> bool {
        self.target.contains(context_id)
    }

    /// A minimal envelope for use in tests.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn test_fixture() -> Self {
        use super::Role;

        Self::new(
            Some("test".to_string()),
            Value::Null,
            ContextId::with_tab(Role::Web, TabId::new(1)),
            vec![ContextId::hub()],
            None,
            Some(TabId::new(1)),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
