//! Target resolution.
//!
//! Expands a raw target specification (shortcuts, bare roles, concrete
//! context ids, or any mix) into a flat, deduplicated list of concrete
//! [`ContextId`]s. Expansion happens synchronously before any send is
//! attempted, so addressing mistakes surface immediately rather than
//! after partial delivery.
//!
//! Enumerating shortcuts consult the readiness snapshot and never
//! silently include contexts that are not currently connected. Explicit
//! context ids pass through unfiltered: the caller named a concrete
//! address, and delivery to a vanished context is simply dropped by the
//! transport.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::protocol::{ContextId, Role, Target};
use crate::readiness::ReadinessSnapshot;

// ============================================================================
// Expansion
// ============================================================================

/// Expands a target specification for the given sender.
///
/// `None` means the default: every role except the sender's own, each in
/// its default addressable form.
///
/// # Errors
///
/// [`Error::Addressing`] when the specification is empty, refers to the
/// sender's tab while the sender has none, names a tab-bound role without
/// a tab, or expands to no context at all.
pub fn expand(
    sender: &ContextId,
    spec: Option<&[Target]>,
    readiness: &ReadinessSnapshot,
) -> Result<Vec<ContextId>> {
    let mut resolved = BTreeSet::new();

    match spec {
        None => {
            for role in Role::ALL {
                if role != sender.role() {
                    expand_one(sender, &Target::Role(role), readiness, &mut resolved)?;
                }
            }
        }
        Some([]) => return Err(Error::addressing("target cannot be empty")),
        Some(targets) => {
            for target in targets {
                expand_one(sender, target, readiness, &mut resolved)?;
            }
        }
    }

    if resolved.is_empty() {
        return Err(Error::addressing(format!(
            "target expanded to no connected context (sender {sender})"
        )));
    }
    Ok(resolved.into_iter().collect())
}

/// Expands a single specification entry into `resolved`.
fn expand_one(
    sender: &ContextId,
    target: &Target,
    readiness: &ReadinessSnapshot,
    resolved: &mut BTreeSet<ContextId>,
) -> Result<()> {
    match target {
        Target::Context(context_id) => {
            if context_id.role().is_tab_bound() && context_id.tab().is_none() {
                return Err(Error::addressing(format!(
                    "target `{context_id}` requires a tab id"
                )));
            }
            resolved.insert(context_id.clone());
        }

        Target::Current => {
            resolved.insert(sender.clone());
        }

        Target::Role(Role::Background) | Target::RoleAll(Role::Background) => {
            resolved.insert(ContextId::hub());
        }

        Target::Role(role) => match sender.tab() {
            // A bare tab-bound role aliases the sender's own tab's instance.
            Some(tab) if role.is_tab_bound() => {
                let candidate = ContextId::with_tab(*role, tab);
                if readiness.contains(&candidate) {
                    resolved.insert(candidate);
                }
            }
            _ => {
                resolved.extend(readiness.of_role(*role).cloned());
            }
        },

        Target::RoleAll(role) => {
            resolved.extend(readiness.of_role(*role).cloned());
        }

        Target::OwnTab => {
            let Some(tab) = sender.tab() else {
                return Err(Error::addressing(format!(
                    "sender {sender} has no tab to expand `tab` against"
                )));
            };
            expand_one(sender, &Target::Tab(tab), readiness, resolved)?;
        }

        Target::Tab(tab) => {
            for role in [Role::Web, Role::ContentScript] {
                let candidate = ContextId::with_tab(role, *tab);
                if readiness.contains(&candidate) {
                    resolved.insert(candidate);
                }
            }
        }

        Target::All => {
            resolved.extend(readiness.contexts().filter(|ctx| *ctx != sender).cloned());
            if !sender.is_hub() {
                resolved.insert(ContextId::hub());
            }
        }

        Target::AllIncludingSelf => {
            resolved.extend(readiness.contexts().cloned());
            resolved.insert(ContextId::hub());
            resolved.insert(sender.clone());
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::TabId;

    fn ctx(raw: &str) -> ContextId {
        raw.parse().expect("context id")
    }

    /// One connected tab 42 plus a connected options surface.
    fn snapshot() -> ReadinessSnapshot {
        let mut snap = ReadinessSnapshot::new();
        snap.insert(ctx("web-42"));
        snap.insert(ctx("contentScript-42"));
        snap.insert(ctx("other"));
        snap
    }

    #[test]
    fn test_default_excludes_own_role() {
        let sender = ctx("web-42");
        let resolved = expand(&sender, None, &snapshot()).expect("expand");
        assert_eq!(
            resolved,
            vec![ctx("contentScript-42"), ctx("background"), ctx("other")]
        );
    }

    #[test]
    fn test_default_without_other_surfaces() {
        let mut snap = snapshot();
        snap.remove(&ctx("other"));
        let resolved = expand(&ctx("web-42"), None, &snap).expect("expand");
        assert_eq!(resolved, vec![ctx("contentScript-42"), ctx("background")]);
    }

    #[test]
    fn test_all_excludes_self() {
        let sender = ctx("web-42");
        let resolved = expand(&sender, Some(&[Target::All]), &snapshot()).expect("expand");
        assert!(!resolved.contains(&sender));
        assert!(resolved.contains(&ctx("background")));
        assert!(resolved.contains(&ctx("contentScript-42")));
    }

    #[test]
    fn test_all_including_self_includes_self() {
        let sender = ctx("web-42");
        let resolved =
            expand(&sender, Some(&[Target::AllIncludingSelf]), &snapshot()).expect("expand");
        assert!(resolved.contains(&sender));
        assert!(resolved.contains(&ctx("background")));
    }

    #[test]
    fn test_self_shortcut() {
        let sender = ctx("contentScript-42");
        let resolved = expand(&sender, Some(&[Target::Current]), &snapshot()).expect("expand");
        assert_eq!(resolved, vec![sender]);
    }

    #[test]
    fn test_own_tab_shortcut() {
        let resolved =
            expand(&ctx("web-42"), Some(&[Target::OwnTab]), &snapshot()).expect("expand");
        assert_eq!(resolved, vec![ctx("web-42"), ctx("contentScript-42")]);
    }

    #[test]
    fn test_own_tab_requires_tab() {
        let err = expand(&ctx("other"), Some(&[Target::OwnTab]), &snapshot()).unwrap_err();
        assert!(err.is_addressing());
    }

    #[test]
    fn test_specific_tab_filters_disconnected() {
        // Tab 9 has no connected contexts at all.
        let err = expand(
            &ctx("background"),
            Some(&[Target::Tab(TabId::new(9))]),
            &snapshot(),
        )
        .unwrap_err();
        assert!(err.is_addressing());
    }

    #[test]
    fn test_bare_role_aliases_own_tab() {
        let resolved = expand(
            &ctx("web-42"),
            Some(&[Target::Role(Role::ContentScript)]),
            &snapshot(),
        )
        .expect("expand");
        assert_eq!(resolved, vec![ctx("contentScript-42")]);
    }

    #[test]
    fn test_bare_role_from_tabless_sender_enumerates() {
        let mut snap = snapshot();
        snap.insert(ctx("web-7"));
        let resolved = expand(
            &ctx("background"),
            Some(&[Target::Role(Role::Web)]),
            &snap,
        )
        .expect("expand");
        assert_eq!(resolved, vec![ctx("web-7"), ctx("web-42")]);
    }

    #[test]
    fn test_role_all_enumerates_connected() {
        let mut snap = snapshot();
        snap.insert(ctx("contentScript-7"));
        let resolved = expand(
            &ctx("web-42"),
            Some(&[Target::RoleAll(Role::ContentScript)]),
            &snap,
        )
        .expect("expand");
        assert_eq!(resolved, vec![ctx("contentScript-7"), ctx("contentScript-42")]);
    }

    #[test]
    fn test_explicit_context_bypasses_readiness() {
        let resolved = expand(
            &ctx("background"),
            Some(&[Target::context(ctx("contentScript-99"))]),
            &snapshot(),
        )
        .expect("expand");
        assert_eq!(resolved, vec![ctx("contentScript-99")]);
    }

    #[test]
    fn test_empty_spec_is_an_error() {
        let err = expand(&ctx("web-42"), Some(&[]), &snapshot()).unwrap_err();
        assert!(err.is_addressing());
    }

    #[test]
    fn test_mixed_spec_deduplicates() {
        let resolved = expand(
            &ctx("web-42"),
            Some(&[
                Target::Role(Role::ContentScript),
                Target::context(ctx("contentScript-42")),
                Target::hub(),
            ]),
            &snapshot(),
        )
        .expect("expand");
        assert_eq!(resolved, vec![ctx("contentScript-42"), ctx("background")]);
    }

    #[test]
    fn test_tabless_page_world_target_rejected() {
        let err = expand(
            &ctx("background"),
            Some(&[Target::context(ContextId::tabless(Role::Web))]),
            &snapshot(),
        )
        .unwrap_err();
        assert!(err.is_addressing());
    }
}
