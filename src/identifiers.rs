//! Type-safe identifiers for routing entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Wraps | Purpose |
//! |------|-------|---------|
//! | [`MessageId`] | `Uuid` | Envelope identity and reply correlation |
//! | [`TabId`] | `u32` | Browser tab a context is bound to |
//! | [`ListenerToken`] | `u64` | Handle for removing a registered listener |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// MessageId
// ============================================================================

/// Unique identifier of an envelope.
///
/// Freshly generated (UUID v4) for every outbound message; replies reference
/// the original message's id through the envelope's `replyTo` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generates a fresh random id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// TabId
// ============================================================================

/// Identifier of the browser tab a context is associated with.
///
/// The page-world and content-script roles always carry one; the hub and
/// `other` surfaces never do.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TabId(u32);

impl TabId {
    /// Creates a tab id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw tab id value.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for TabId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// ============================================================================
// ListenerToken
// ============================================================================

/// Handle returned by listener registration.
///
/// Pass it back to `remove_listener` to detach. Tokens are unique for the
/// lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

impl ListenerToken {
    /// Allocates the next token from a process-wide counter.
    #[must_use]
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_unique() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_message_id_serde_transparent() {
        let id = MessageId::generate();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn test_tab_id_value() {
        let tab = TabId::new(42);
        assert_eq!(tab.value(), 42);
        assert_eq!(tab.to_string(), "42");
    }

    #[test]
    fn test_listener_tokens_distinct() {
        let a = ListenerToken::next();
        let b = ListenerToken::next();
        assert_ne!(a, b);
    }
}
