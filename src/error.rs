//! Error types for the routing layer.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use webext_router::{Messaging, PostMessage, Result};
//!
//! async fn example(messaging: &Messaging) -> Result<()> {
//!     messaging.post(PostMessage::new("ping"))?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Addressing | [`Error::Addressing`], [`Error::InvalidRole`], [`Error::DuplicateContext`] |
//! | Topology | [`Error::Unreachable`] |
//! | Replies | [`Error::ReplyTimeout`] |
//! | Transport | [`Error::Transport`], [`Error::ChannelClosed`] |
//! | External | [`Error::Json`] |
//!
//! Addressing errors are synchronous and fatal to the call. Unreachable is
//! defensive and indicates a reachability-graph bug. Reply timeouts are the
//! only recoverable category. The layer never retries anything: a dropped
//! handshake is unrecoverable within a page lifetime, the mitigation is a
//! page refresh.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::protocol::{ContextId, Envelope};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Addressing Errors
    // ========================================================================
    /// Invalid or empty target specification.
    ///
    /// Returned before any send is attempted, so partial delivery never
    /// happens for a malformed target.
    #[error("Addressing error: {message}")]
    Addressing {
        /// Description of the addressing problem.
        message: String,
    },

    /// Role could not be determined or is not in the fixed enumeration.
    #[error("Invalid role: {role}")]
    InvalidRole {
        /// The unrecognized role string.
        role: String,
    },

    /// A second router was constructed for the same execution context.
    ///
    /// Exactly one [`Messaging`](crate::Messaging) instance may exist per
    /// role per execution context.
    #[error("Messaging already attached for context: {context_id}")]
    DuplicateContext {
        /// The context that is already attached.
        context_id: ContextId,
    },

    // ========================================================================
    // Topology Errors
    // ========================================================================
    /// The forwarding resolver exhausted all rules.
    ///
    /// Should never occur in a correctly configured deployment; raised
    /// rather than swallowed so topology bugs are visible in development.
    #[error("No route from {origin} to {target}")]
    Unreachable {
        /// The sending context. Not named `source` since thiserror would
        /// treat that field as the error's cause.
        origin: ContextId,
        /// The target no rule could cover.
        target: ContextId,
    },

    // ========================================================================
    // Reply Errors
    // ========================================================================
    /// No reply arrived within the await-reply timeout.
    ///
    /// Carries the original envelope for diagnostics. Recoverable by the
    /// caller; does not crash the node.
    #[error("Reply to message {} timed out after {timeout_ms}ms", envelope.id)]
    ReplyTimeout {
        /// The envelope that was awaiting a reply.
        envelope: Box<Envelope>,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Transport-level failure while posting or attaching.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The underlying channel is gone.
    #[error("Channel closed")]
    ChannelClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an addressing error.
    #[inline]
    pub fn addressing(message: impl Into<String>) -> Self {
        Self::Addressing {
            message: message.into(),
        }
    }

    /// Creates an invalid role error.
    #[inline]
    pub fn invalid_role(role: impl Into<String>) -> Self {
        Self::InvalidRole { role: role.into() }
    }

    /// Creates a duplicate context error.
    #[inline]
    pub fn duplicate_context(context_id: ContextId) -> Self {
        Self::DuplicateContext { context_id }
    }

    /// Creates an unreachable error.
    #[inline]
    pub fn unreachable(origin: ContextId, target: ContextId) -> Self {
        Self::Unreachable { origin, target }
    }

    /// Creates a reply timeout error.
    #[inline]
    pub fn reply_timeout(envelope: Envelope, timeout_ms: u64) -> Self {
        Self::ReplyTimeout {
            envelope: Box::new(envelope),
            timeout_ms,
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is an addressing error.
    #[inline]
    #[must_use]
    pub fn is_addressing(&self) -> bool {
        matches!(
            self,
            Self::Addressing { .. } | Self::InvalidRole { .. } | Self::DuplicateContext { .. }
        )
    }

    /// Returns `true` if this is a reply timeout.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReplyTimeout { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Only reply timeouts are; everything else signals a programming or
    /// topology mistake.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_timeout()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::Role;

    #[test]
    fn test_addressing_display() {
        let err = Error::addressing("target cannot be empty");
        assert_eq!(err.to_string(), "Addressing error: target cannot be empty");
    }

    #[test]
    fn test_unreachable_display() {
        let err = Error::unreachable(
            ContextId::tabless(Role::Other),
            ContextId::with_tab(Role::Web, 5.into()),
        );
        assert_eq!(err.to_string(), "No route from other to web-5");
    }

    #[test]
    fn test_unreachable_has_no_cause() {
        use std::error::Error as _;

        // The origin context is data, not an underlying error.
        let err = Error::unreachable(ContextId::hub(), ContextId::hub());
        assert!(err.source().is_none());
    }

    #[test]
    fn test_is_addressing() {
        assert!(Error::addressing("x").is_addressing());
        assert!(Error::invalid_role("sidebar").is_addressing());
        assert!(!Error::ChannelClosed.is_addressing());
    }

    #[test]
    fn test_is_recoverable() {
        let env = Envelope::test_fixture();
        let timeout = Error::reply_timeout(env, 5000);
        assert!(timeout.is_timeout());
        assert!(timeout.is_recoverable());
        assert!(!Error::addressing("x").is_recoverable());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
