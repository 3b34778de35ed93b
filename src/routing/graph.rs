//! Static reachability graph.
//!
//! Which role can directly reach which other role, and over which channel.
//! The table is fixed at compile time and never mutated:
//!
//! | From \ To | web | contentScript | background | other |
//! |-----------|-----|---------------|------------|-------|
//! | web | - | page | - | - |
//! | contentScript | page | page | runtime | - |
//! | background | - | runtime | - | runtime |
//! | other | - | - | runtime | - |
//!
//! The graph is deliberately asymmetric: nothing reaches the hub except
//! over its own runtime channel, and the hub never reaches itself (it has
//! no need to). Roles beyond the core three collapse to the single `other`
//! wildcard entry, so future extension surfaces participate without graph
//! changes.

// ============================================================================
// Imports
// ============================================================================

use crate::protocol::Role;
use crate::transport::ChannelKind;

// ============================================================================
// ReachabilityGraph
// ============================================================================

/// Pure lookup over the static role adjacency table.
///
/// Used only by the forwarding resolver.
#[derive(Debug, Clone, Copy)]
pub struct ReachabilityGraph;

impl ReachabilityGraph {
    /// Returns the channel over which `from` can directly reach `to`, or
    /// `None` when no direct link exists.
    #[must_use]
    pub const fn reachable(from: Role, to: Role) -> Option<ChannelKind> {
        use ChannelKind::{Page, Runtime};
        use Role::{Background, ContentScript, Other, Web};

        match (from, to) {
            (Web, ContentScript) => Some(Page),
            (ContentScript, Web | ContentScript) => Some(Page),
            (ContentScript, Background) => Some(Runtime),
            (Background, ContentScript | Other) => Some(Runtime),
            (Other, Background) => Some(Runtime),
            _ => None,
        }
    }

    /// Returns `true` when a direct link exists.
    #[inline]
    #[must_use]
    pub const fn can_reach(from: Role, to: Role) -> bool {
        Self::reachable(from, to).is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_links() {
        assert_eq!(
            ReachabilityGraph::reachable(Role::Web, Role::ContentScript),
            Some(ChannelKind::Page)
        );
        assert_eq!(
            ReachabilityGraph::reachable(Role::ContentScript, Role::Web),
            Some(ChannelKind::Page)
        );
        assert_eq!(
            ReachabilityGraph::reachable(Role::ContentScript, Role::ContentScript),
            Some(ChannelKind::Page)
        );
    }

    #[test]
    fn test_runtime_links() {
        assert_eq!(
            ReachabilityGraph::reachable(Role::ContentScript, Role::Background),
            Some(ChannelKind::Runtime)
        );
        assert_eq!(
            ReachabilityGraph::reachable(Role::Background, Role::ContentScript),
            Some(ChannelKind::Runtime)
        );
        assert_eq!(
            ReachabilityGraph::reachable(Role::Background, Role::Other),
            Some(ChannelKind::Runtime)
        );
        assert_eq!(
            ReachabilityGraph::reachable(Role::Other, Role::Background),
            Some(ChannelKind::Runtime)
        );
    }

    #[test]
    fn test_missing_links() {
        // The page world never reaches past its own tab's content script.
        assert!(!ReachabilityGraph::can_reach(Role::Web, Role::Web));
        assert!(!ReachabilityGraph::can_reach(Role::Web, Role::Background));
        assert!(!ReachabilityGraph::can_reach(Role::Web, Role::Other));
        // Nothing reaches the hub's page world directly, and the hub never
        // reaches itself.
        assert!(!ReachabilityGraph::can_reach(Role::Background, Role::Web));
        assert!(!ReachabilityGraph::can_reach(Role::Background, Role::Background));
        // Other surfaces only talk to the hub.
        assert!(!ReachabilityGraph::can_reach(Role::Other, Role::Other));
        assert!(!ReachabilityGraph::can_reach(Role::Other, Role::ContentScript));
    }
}
