//! Forwarding resolution.
//!
//! Given a sender and an envelope whose `target` list is already resolved
//! to concrete context ids, decides per target whether to send directly or
//! through an intermediate forwarder, then groups targets so the minimum
//! number of physical channel calls is made.
//!
//! # Per-target rules, in priority order
//!
//! 1. Direct: the graph links the two roles and the tab ids are
//!    compatible (direct is refused only when both sides carry a tab id
//!    and the ids differ)
//! 2. Hub to page world: forward through the target tab's content script
//! 3. Page world to anything but its own content script: forward through
//!    the sender's own content script
//! 4. Anything that can reach the hub: forward through the hub
//! 5. Nothing applies: raise an unreachable error - this indicates a
//!    reachability-graph bug, never a runtime condition
//!
//! A node receiving a sub-message whose `forwarder` names itself re-runs
//! this same resolution on the embedded target list, which is how a star
//! topology routes everything without any node knowing the full graph.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::{ContextId, Envelope, Role};
use crate::transport::ChannelKind;

use super::graph::ReachabilityGraph;

// ============================================================================
// SubMessage
// ============================================================================

/// One physical send produced by forwarding resolution.
///
/// The envelope carries the subset of targets this send covers, plus the
/// `forwarder` and `channel` routing fields.
#[derive(Debug, Clone)]
pub struct SubMessage {
    /// The envelope to put on the wire.
    pub envelope: Envelope,
    /// The channel kind to post it on.
    pub channel: ChannelKind,
}

// ============================================================================
// Resolution
// ============================================================================

/// Splits an envelope into per-channel, per-forwarder sub-messages.
///
/// # Errors
///
/// [`Error::Unreachable`] when no rule covers a target - a topology bug,
/// raised rather than dropped so it is visible during development.
pub fn split(sender: &ContextId, envelope: &Envelope) -> Result<Vec<SubMessage>> {
    // Group targets by chosen forwarder; `None` is the direct group.
    let mut groups: BTreeMap<Option<ContextId>, Vec<ContextId>> = BTreeMap::new();
    for target in &envelope.target {
        let forwarder = route(sender, target)?;
        groups.entry(forwarder).or_default().push(target.clone());
    }

    let mut subs = Vec::new();
    for (forwarder, targets) in groups {
        match forwarder {
            Some(forwarder) => {
                let channel = ReachabilityGraph::reachable(sender.role(), forwarder.role())
                    .ok_or_else(|| Error::unreachable(sender.clone(), forwarder.clone()))?;
                subs.push(sub_message(
                    envelope,
                    targets,
                    Some(forwarder),
                    channel,
                ));
            }
            None => {
                // Direct sends may still need several physical channels.
                let mut by_channel: BTreeMap<ChannelKind, Vec<ContextId>> = BTreeMap::new();
                for target in targets {
                    let channel = ReachabilityGraph::reachable(sender.role(), target.role())
                        .ok_or_else(|| Error::unreachable(sender.clone(), target.clone()))?;
                    by_channel.entry(channel).or_default().push(target);
                }
                for (channel, targets) in by_channel {
                    subs.push(sub_message(envelope, targets, None, channel));
                }
            }
        }
    }

    trace!(
        sender = %sender,
        message = %envelope.id,
        subs = subs.len(),
        "Resolved forwarding"
    );
    Ok(subs)
}

/// Chooses the forwarder for one target, or `None` for a direct send.
fn route(sender: &ContextId, target: &ContextId) -> Result<Option<ContextId>> {
    let tabs_clash = match (sender.tab(), target.tab()) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    };

    // Rule 1: direct reachability.
    if ReachabilityGraph::can_reach(sender.role(), target.role()) && !tabs_clash {
        return Ok(None);
    }

    // Rule 2: the hub reaches a tab's page world through that tab's
    // content script.
    if sender.role() == Role::Background && target.role() == Role::Web {
        let tab = target
            .tab()
            .ok_or_else(|| Error::unreachable(sender.clone(), target.clone()))?;
        return Ok(Some(ContextId::with_tab(Role::ContentScript, tab)));
    }

    // Rule 3: the page world reaches everything through its own tab's
    // content script.
    if sender.role() == Role::Web
        && let Some(tab) = sender.tab()
    {
        let own_content_script = ContextId::with_tab(Role::ContentScript, tab);
        if *target != own_content_script {
            return Ok(Some(own_content_script));
        }
    }

    // Rule 4: anything that can reach the hub forwards through it.
    if ReachabilityGraph::can_reach(sender.role(), Role::Background) {
        return Ok(Some(ContextId::hub()));
    }

    // Rule 5: topology bug.
    Err(Error::unreachable(sender.clone(), target.clone()))
}

fn sub_message(
    envelope: &Envelope,
    targets: Vec<ContextId>,
    forwarder: Option<ContextId>,
    channel: ChannelKind,
) -> SubMessage {
    let mut sub = envelope.clone();
    sub.target = targets;
    sub.forwarder = forwarder;
    sub.channel = Some(channel);
    SubMessage {
        envelope: sub,
        channel,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::Value;

    fn ctx(raw: &str) -> ContextId {
        raw.parse().expect("context id")
    }

    fn envelope(source: &str, targets: &[&str]) -> Envelope {
        let source = ctx(source);
        let tab_id = source.tab();
        Envelope::new(
            Some("test".to_string()),
            Value::Null,
            source,
            targets.iter().map(|t| ctx(t)).collect(),
            None,
            tab_id,
        )
    }

    #[test]
    fn test_same_tab_direct_over_page() {
        let env = envelope("contentScript-123", &["web-123", "contentScript-123"]);
        let subs = split(&ctx("contentScript-123"), &env).expect("split");

        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].channel, ChannelKind::Page);
        assert_eq!(subs[0].envelope.forwarder, None);
        assert_eq!(
            subs[0].envelope.target,
            vec![ctx("web-123"), ctx("contentScript-123")]
        );
    }

    #[test]
    fn test_content_script_fan_out_splits_by_channel_and_forwarder() {
        // The motivating example: one send splitting three ways.
        let env = envelope(
            "contentScript-123",
            &["web-123", "contentScript-123", "background", "other", "web-456"],
        );
        let subs = split(&ctx("contentScript-123"), &env).expect("split");
        assert_eq!(subs.len(), 3);

        let direct_page = subs
            .iter()
            .find(|s| s.envelope.forwarder.is_none() && s.channel == ChannelKind::Page)
            .expect("page group");
        assert_eq!(
            direct_page.envelope.target,
            vec![ctx("web-123"), ctx("contentScript-123")]
        );

        let direct_runtime = subs
            .iter()
            .find(|s| s.envelope.forwarder.is_none() && s.channel == ChannelKind::Runtime)
            .expect("runtime group");
        assert_eq!(direct_runtime.envelope.target, vec![ctx("background")]);

        let forwarded = subs
            .iter()
            .find(|s| s.envelope.forwarder.is_some())
            .expect("forwarded group");
        assert_eq!(forwarded.envelope.forwarder, Some(ctx("background")));
        assert_eq!(forwarded.channel, ChannelKind::Runtime);
        assert_eq!(
            forwarded.envelope.target,
            vec![ctx("other"), ctx("web-456")]
        );
    }

    #[test]
    fn test_hub_to_page_world_forwards_through_that_tab() {
        // Scenario: background posting to web-5 must pick contentScript-5.
        let env = envelope("background", &["web-5"]);
        let subs = split(&ctx("background"), &env).expect("split");

        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].envelope.forwarder, Some(ctx("contentScript-5")));
        assert_eq!(subs[0].channel, ChannelKind::Runtime);
        assert_eq!(subs[0].envelope.target, vec![ctx("web-5")]);
    }

    #[test]
    fn test_page_world_routes_everything_through_own_content_script() {
        let env = envelope("web-42", &["contentScript-42", "background"]);
        let subs = split(&ctx("web-42"), &env).expect("split");
        assert_eq!(subs.len(), 2);

        let direct = subs
            .iter()
            .find(|s| s.envelope.forwarder.is_none())
            .expect("direct group");
        assert_eq!(direct.envelope.target, vec![ctx("contentScript-42")]);
        assert_eq!(direct.channel, ChannelKind::Page);

        let forwarded = subs
            .iter()
            .find(|s| s.envelope.forwarder.is_some())
            .expect("forwarded group");
        assert_eq!(forwarded.envelope.forwarder, Some(ctx("contentScript-42")));
        assert_eq!(forwarded.channel, ChannelKind::Page);
        assert_eq!(forwarded.envelope.target, vec![ctx("background")]);
    }

    #[test]
    fn test_cross_tab_goes_through_hub() {
        let env = envelope("contentScript-1", &["contentScript-2"]);
        let subs = split(&ctx("contentScript-1"), &env).expect("split");
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].envelope.forwarder, Some(ctx("background")));
        assert_eq!(subs[0].channel, ChannelKind::Runtime);
    }

    #[test]
    fn test_other_to_other_goes_through_hub() {
        let env = envelope("other", &["other"]);
        let subs = split(&ctx("other"), &env).expect("split");
        assert_eq!(subs[0].envelope.forwarder, Some(ctx("background")));
    }

    #[test]
    fn test_replay_terminates_within_two_resolutions() {
        // Every directly-linked (sender role, target) pair either sends
        // immediately or reaches a forwarder whose own resolution is
        // direct.
        let pairs = [
            ("web-1", "contentScript-1"),
            ("contentScript-1", "web-1"),
            ("contentScript-1", "contentScript-1"),
            ("contentScript-1", "background"),
            ("background", "contentScript-1"),
            ("background", "other"),
            ("other", "background"),
        ];

        for (sender, target) in pairs {
            let env = envelope(sender, &[target]);
            let subs = split(&ctx(sender), &env).expect("split");
            assert_eq!(subs.len(), 1);

            match &subs[0].envelope.forwarder {
                None => {}
                Some(forwarder) => {
                    // Replay at the forwarder; the second hop must be
                    // direct.
                    let second = split(forwarder, &subs[0].envelope).expect("replay");
                    for sub in second {
                        assert_eq!(sub.envelope.forwarder, None, "{sender} -> {target}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_hub_to_itself_is_unreachable() {
        let env = envelope("background", &["background"]);
        let err = split(&ctx("background"), &env).unwrap_err();
        assert!(matches!(err, Error::Unreachable { .. }));
    }

    #[test]
    fn test_sub_messages_keep_identity_fields() {
        let env = envelope("web-42", &["background"]);
        let subs = split(&ctx("web-42"), &env).expect("split");
        assert_eq!(subs[0].envelope.id, env.id);
        assert_eq!(subs[0].envelope.source, env.source);
        assert_eq!(subs[0].envelope.tab_id, env.tab_id);
    }
}
