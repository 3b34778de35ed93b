//! Public messaging API.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`Messaging`] router: dispatch, replies, readiness, control |
//! | `post` | [`PostMessage`] outbound builder |
//! | `control` | Router-internal message types |

// ============================================================================
// Submodules
// ============================================================================

/// Control-plane message types.
pub(crate) mod control;

/// The per-context message router.
pub mod core;

/// Outbound message description.
pub mod post;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::{DEFAULT_REPLY_TIMEOUT, MessageCallback, MessageFilter, Messaging};
pub use post::PostMessage;
