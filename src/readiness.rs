//! Hub-centric connectivity tracking.
//!
//! The readiness table is owned exclusively by the hub. It is mutated only
//! on transport connect/disconnect events and on the relayed page-world
//! handshake, and every change is broadcast so edge roles can cache a
//! snapshot for target expansion. No other node ever writes readiness
//! state, which keeps the distributed picture lock-free: edges only read
//! their cached copy.
//!
//! # State Machine
//!
//! Per non-hub context: `unknown` (no entry) -> `connected` -> removed on
//! disconnect. A content-script disconnect also removes its tab's
//! page-world entry, since no independent disconnect signal exists for the
//! page world. The hub itself has no entry: it never initiates
//! connections and is permanently connected by definition.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::protocol::{ContextId, Role};

// ============================================================================
// ReadinessSnapshot
// ============================================================================

/// Immutable view of which contexts currently hold a live connection.
///
/// Broadcast by the hub on every change; edges consult their cached copy
/// when expanding target shortcuts. The hub never appears in the set and
/// always reads as connected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadinessSnapshot {
    connected: BTreeSet<ContextId>,
}

impl ReadinessSnapshot {
    /// Creates an empty snapshot.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the context is currently connected.
    ///
    /// The hub is connected by definition.
    #[must_use]
    pub fn contains(&self, context_id: &ContextId) -> bool {
        context_id.is_hub() || self.connected.contains(context_id)
    }

    /// Iterates over the connected non-hub contexts.
    pub fn contexts(&self) -> impl Iterator<Item = &ContextId> {
        self.connected.iter()
    }

    /// Iterates over the connected contexts of one role.
    pub fn of_role(&self, role: Role) -> impl Iterator<Item = &ContextId> {
        self.connected.iter().filter(move |ctx| ctx.role() == role)
    }

    /// Returns the number of connected non-hub contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connected.len()
    }

    /// Returns `true` if no non-hub context is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connected.is_empty()
    }

    pub(crate) fn insert(&mut self, context_id: ContextId) -> bool {
        self.connected.insert(context_id)
    }

    pub(crate) fn remove(&mut self, context_id: &ContextId) -> bool {
        self.connected.remove(context_id)
    }
}

// ============================================================================
// ReadinessTracker
// ============================================================================

/// The hub's authoritative readiness table.
///
/// Constructed only by the hub's router; everything else sees snapshots.
#[derive(Debug, Default)]
pub struct ReadinessTracker {
    table: RwLock<ReadinessSnapshot>,
}

impl ReadinessTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a context connected.
    ///
    /// Returns `true` if the table changed. Hub entries are rejected: the
    /// hub is connected by definition and never tracked.
    pub fn connect(&self, context_id: ContextId) -> bool {
        if context_id.is_hub() {
            warn!("Ignoring readiness entry for the hub itself");
            return false;
        }
        let changed = self.table.write().insert(context_id.clone());
        if changed {
            debug!(context = %context_id, "Context connected");
        }
        changed
    }

    /// Marks a context disconnected, cascading to dependents.
    ///
    /// A content-script disconnect also clears its tab's page-world entry.
    /// Returns every context actually removed.
    pub fn disconnect(&self, context_id: &ContextId) -> Vec<ContextId> {
        let mut dropped = Vec::new();
        let mut table = self.table.write();

        if table.remove(context_id) {
            dropped.push(context_id.clone());
        }
        if context_id.role() == Role::ContentScript
            && let Some(tab) = context_id.tab()
        {
            let web = ContextId::with_tab(Role::Web, tab);
            if table.remove(&web) {
                dropped.push(web);
            }
        }

        drop(table);
        for context in &dropped {
            debug!(context = %context, "Context disconnected");
        }
        dropped
    }

    /// Returns a copy of the current table.
    #[must_use]
    pub fn snapshot(&self) -> ReadinessSnapshot {
        self.table.read().clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
