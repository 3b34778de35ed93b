//! Transport layer.
//!
//! This module defines the uniform channel interface the router speaks,
//! the injected host-platform provider, and an in-memory provider for
//! deterministic testing.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | [`MessagingChannel`] trait and [`ChannelKind`] |
//! | `provider` | [`TransportProvider`] injection seam |
//! | `memory` | [`MemoryTransport`] fake host |

// ============================================================================
// Submodules
// ============================================================================

/// Channel abstraction over the two underlying transports.
pub mod channel;

/// In-memory transport for deterministic testing.
pub mod memory;

/// Host-platform transport injection.
pub mod provider;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{ChannelKind, ListenerRegistry, MessagingChannel, WireListener};
pub use memory::{MemoryContext, MemoryTransport};
pub use provider::{
    Attachment, LifecycleEvent, LifecycleListener, TransportProvider,
};
