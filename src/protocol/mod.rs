//! Message protocol types.
//!
//! This module defines the vocabulary shared by every context: roles and
//! addresses, target shortcuts, the envelope record, and the wire-format
//! key prefixing that separates this layer's traffic from unrelated
//! producers on the same transports.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `address` | [`Role`] and [`ContextId`] |
//! | `target` | [`Target`] shortcut enumeration |
//! | `envelope` | [`Envelope`] record |
//! | `wire` | Key prefixing and foreign-message filtering |

// ============================================================================
// Submodules
// ============================================================================

/// Roles and context addresses.
pub mod address;

/// The canonical message record.
pub mod envelope;

/// Target specifications and shortcuts.
pub mod target;

/// Wire-format key prefixing.
pub mod wire;

// ============================================================================
// Re-exports
// ============================================================================

pub use address::{ContextId, Role};
pub use envelope::Envelope;
pub use target::Target;
pub use wire::WIRE_PREFIX;
