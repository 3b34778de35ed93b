//! Target specifications and shortcuts.
//!
//! A [`Target`] is what callers put in a post's `target` field: either a
//! concrete [`ContextId`] or a symbolic shortcut that the target resolver
//! expands against the current readiness snapshot.
//!
//! # Shortcuts
//!
//! | Form | Meaning |
//! |------|---------|
//! | `all` | every currently known context except the sender |
//! | `all_including_self` | every currently known context, sender included |
//! | `self` | the sender's own context |
//! | `tab` | the sender's own tab (page world + content script) |
//! | `tab-<id>` | a specific tab (page world + content script) |
//! | `<role>` | see resolver: own-tab instance, or every connected instance |
//! | `<role>-all` | every connected instance of the role |
//! | `<role>-<id>` | a concrete context id |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::identifiers::TabId;

use super::{ContextId, Role};

// ============================================================================
// Target
// ============================================================================

/// One entry of a post's target specification.
///
/// Shortcut expansion happens in the target resolver before any send is
/// attempted; after expansion only concrete [`ContextId`]s remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every currently known context except the sender (`all`).
    All,
    /// Every currently known context including the sender
    /// (`all_including_self`).
    AllIncludingSelf,
    /// The sender's own context (`self`).
    Current,
    /// The sender's own tab: page world plus content script (`tab`).
    OwnTab,
    /// A specific tab: page world plus content script (`tab-<id>`).
    Tab(TabId),
    /// A bare role name (`web`, `contentScript`, `background`, `other`).
    Role(Role),
    /// Every connected instance of a role (`web-all`, `contentScript-all`).
    RoleAll(Role),
    /// A concrete context id (`web-5`, `background`).
    Context(ContextId),
}

impl Target {
    /// Shorthand for targeting a concrete context.
    #[inline]
    #[must_use]
    pub const fn context(context_id: ContextId) -> Self {
        Self::Context(context_id)
    }

    /// Shorthand for targeting the hub.
    #[inline]
    #[must_use]
    pub const fn hub() -> Self {
        Self::Context(ContextId::hub())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str("all"),
            Target::AllIncludingSelf => f.write_str("all_including_self"),
            Target::Current => f.write_str("self"),
            Target::OwnTab => f.write_str("tab"),
            Target::Tab(tab) => write!(f, "tab-{tab}"),
            Target::Role(role) => role.fmt(f),
            Target::RoleAll(role) => write!(f, "{role}-all"),
            Target::Context(ctx) => ctx.fmt(f),
        }
    }
}

impl FromStr for Target {
    type Err = Error;

    /// Parses a single target entry.
    ///
    /// # Errors
    ///
    /// [`Error::Addressing`] or [`Error::InvalidRole`] when the entry is not
    /// a recognized shortcut, role, or context id.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => return Ok(Target::All),
            "all_including_self" => return Ok(Target::AllIncludingSelf),
            "self" => return Ok(Target::Current),
            "tab" => return Ok(Target::OwnTab),
            _ => {}
        }

        if let Some(raw) = s.strip_prefix("tab-") {
            let id: u32 = raw
                .parse()
                .map_err(|_| Error::addressing(format!("invalid tab target `{s}`")))?;
            return Ok(Target::Tab(TabId::new(id)));
        }

        if let Some(role) = s.strip_suffix("-all") {
            return Ok(Target::RoleAll(role.parse()?));
        }

        if let Ok(role) = s.parse::<Role>() {
            return Ok(Target::Role(role));
        }

        Ok(Target::Context(s.parse()?))
    }
}

impl From<ContextId> for Target {
    #[inline]
    fn from(context_id: ContextId) -> Self {
        Target::Context(context_id)
    }
}

impl From<Role> for Target {
    #[inline]
    fn from(role: Role) -> Self {
        Target::Role(role)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shortcuts() {
        assert_eq!("all".parse::<Target>().expect("parse"), Target::All);
        assert_eq!(
            "all_including_self".parse::<Target>().expect("parse"),
            Target::AllIncludingSelf
        );
        assert_eq!("self".parse::<Target>().expect("parse"), Target::Current);
        assert_eq!("tab".parse::<Target>().expect("parse"), Target::OwnTab);
        assert_eq!(
            "tab-5".parse::<Target>().expect("parse"),
            Target::Tab(TabId::new(5))
        );
    }

    #[test]
    fn test_parse_roles_and_contexts() {
        assert_eq!(
            "web".parse::<Target>().expect("parse"),
            Target::Role(Role::Web)
        );
        assert_eq!(
            "web-all".parse::<Target>().expect("parse"),
            Target::RoleAll(Role::Web)
        );
        assert_eq!(
            "contentScript-9".parse::<Target>().expect("parse"),
            Target::Context(ContextId::with_tab(Role::ContentScript, TabId::new(9)))
        );
        assert_eq!(
            "background".parse::<Target>().expect("parse"),
            Target::Role(Role::Background)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("everything".parse::<Target>().is_err());
        assert!("tab-xyz".parse::<Target>().is_err());
        assert!("sidebar-all".parse::<Target>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for raw in [
            "all",
            "all_including_self",
            "self",
            "tab",
            "tab-12",
            "web",
            "web-all",
            "web-12",
            "background",
        ] {
            let target: Target = raw.parse().expect("parse");
            assert_eq!(target.to_string(), raw);
        }
    }
}
