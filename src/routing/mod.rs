//! Routing layer.
//!
//! Everything between "the caller named some targets" and "these exact
//! envelopes go on these exact channels":
//!
//! | Module | Description |
//! |--------|-------------|
//! | `graph` | Static role reachability table |
//! | `resolver` | Target shortcut expansion |
//! | `forwarder` | Per-target forwarding decision and channel grouping |

// ============================================================================
// Submodules
// ============================================================================

/// Forwarding resolution and sub-message grouping.
pub mod forwarder;

/// Static reachability graph.
pub mod graph;

/// Target shortcut expansion.
pub mod resolver;

// ============================================================================
// Re-exports
// ============================================================================

pub use forwarder::{SubMessage, split};
pub use graph::ReachabilityGraph;
pub use resolver::expand;
