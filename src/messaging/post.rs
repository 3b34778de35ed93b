//! Outbound message description.
//!
//! [`PostMessage`] is the builder callers hand to
//! [`Messaging::post`](super::Messaging::post) and
//! [`Messaging::request`](super::Messaging::request):
//!
//! ```ignore
//! messaging.post(
//!     PostMessage::new("jukebox.play")
//!         .content(json!({ "track": 3 }))
//!         .target(Target::hub()),
//! )?;
//! ```
//!
//! Omitting the target selects the default audience (every role except the
//! sender's own). Building a reply with [`PostMessage::replying_to`] derives
//! the target, type, and tab from the original envelope; combining it with
//! an explicit target is an addressing error.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::Value;

use crate::protocol::{Envelope, Target};

// ============================================================================
// PostMessage
// ============================================================================

/// Everything the router needs to build and send one envelope.
#[derive(Debug, Clone)]
pub struct PostMessage {
    pub(crate) message_type: Option<String>,
    pub(crate) content: Value,
    pub(crate) target: Option<Vec<Target>>,
    pub(crate) reply_to: Option<Envelope>,
    pub(crate) timeout: Option<Duration>,
}

impl PostMessage {
    /// Creates a message of the given application type.
    #[must_use]
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: Some(message_type.into()),
            content: Value::Null,
            target: None,
            reply_to: None,
            timeout: None,
        }
    }

    /// Creates a message without a type.
    ///
    /// Mostly useful for replies, which inherit the original's type.
    #[must_use]
    pub fn untyped() -> Self {
        Self {
            message_type: None,
            content: Value::Null,
            target: None,
            reply_to: None,
            timeout: None,
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    /// Adds one target entry.
    #[must_use]
    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.target.get_or_insert_default().push(target.into());
        self
    }

    /// Sets the full target specification at once.
    #[must_use]
    pub fn targets(mut self, targets: impl IntoIterator<Item = Target>) -> Self {
        self.target = Some(targets.into_iter().collect());
        self
    }

    /// Marks this message as a reply to a received envelope.
    ///
    /// The reply's target, tab, and (unless set here) type are derived from
    /// the original.
    #[must_use]
    pub fn replying_to(mut self, original: &Envelope) -> Self {
        self.reply_to = Some(original.clone());
        self
    }

    /// Overrides the reply timeout for this request only.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::protocol::{ContextId, Role};

    #[test]
    fn test_builder_accumulates_targets() {
        let message = PostMessage::new("ping")
            .target(Role::Background)
            .target(ContextId::tabless(Role::Other));
        assert_eq!(
            message.target,
            Some(vec![
                Target::Role(Role::Background),
                Target::Context(ContextId::tabless(Role::Other)),
            ])
        );
    }

    #[test]
    fn test_targets_replaces() {
        let message = PostMessage::new("ping")
            .target(Role::Background)
            .targets([Target::All]);
        assert_eq!(message.target, Some(vec![Target::All]));
    }

    #[test]
    fn test_defaults() {
        let message = PostMessage::new("ping").content(json!({ "n": 1 }));
        assert_eq!(message.message_type.as_deref(), Some("ping"));
        assert_eq!(message.target, None);
        assert!(message.reply_to.is_none());
        assert!(message.timeout.is_none());
    }
}
