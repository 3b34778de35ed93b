//! Roles and context addresses.
//!
//! A [`Role`] is the fixed category of execution context a node runs in; a
//! [`ContextId`] is a role optionally paired with a tab id and is the unit
//! of addressing for the whole routing layer.
//!
//! String forms exist only at the parsing boundary (`Display`/`FromStr`/
//! serde); everything else matches exhaustively on the enums.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::identifiers::TabId;

// ============================================================================
// Role
// ============================================================================

/// Fixed enumeration of execution-context categories.
///
/// | Role | Runs in | Tab-bound |
/// |------|---------|-----------|
/// | `Web` | The page world of a browser tab | yes |
/// | `ContentScript` | The extension's content-script world | yes |
/// | `Background` | The background/service process (the hub) | no |
/// | `Other` | Any further extension surface (options, offscreen, ...) | no |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Page-world script sharing the tab's page context.
    Web,
    /// Content-script world; bridges the page world and the hub.
    ContentScript,
    /// Background process; the central hub of the star topology.
    Background,
    /// Any other extension surface. All such surfaces are equivalent for
    /// routing purposes and collapse to this single role.
    Other,
}

impl Role {
    /// All roles, in canonical order.
    pub const ALL: [Role; 4] = [
        Role::Web,
        Role::ContentScript,
        Role::Background,
        Role::Other,
    ];

    /// Returns the wire name of the role.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Web => "web",
            Role::ContentScript => "contentScript",
            Role::Background => "background",
            Role::Other => "other",
        }
    }

    /// Returns `true` for the hub role.
    #[inline]
    #[must_use]
    pub const fn is_hub(&self) -> bool {
        matches!(self, Role::Background)
    }

    /// Returns `true` for roles that are bound to a browser tab.
    #[inline]
    #[must_use]
    pub const fn is_tab_bound(&self) -> bool {
        matches!(self, Role::Web | Role::ContentScript)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "web" => Ok(Role::Web),
            "contentScript" => Ok(Role::ContentScript),
            "background" => Ok(Role::Background),
            "other" => Ok(Role::Other),
            _ => Err(Error::invalid_role(s)),
        }
    }
}

// ============================================================================
// ContextId
// ============================================================================

/// Address of a single execution context: a role plus, for tab-bound roles,
/// the tab the context lives in.
///
/// Renders as `web-123` / `contentScript-123` / `background` / `other`.
/// Two tab-bound contexts with different tab ids are never directly
/// reachable from each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId {
    role: Role,
    tab: Option<TabId>,
}

impl ContextId {
    /// Creates a context id without a tab suffix.
    #[inline]
    #[must_use]
    pub const fn tabless(role: Role) -> Self {
        Self { role, tab: None }
    }

    /// Creates a context id bound to a tab.
    #[inline]
    #[must_use]
    pub const fn with_tab(role: Role, tab: TabId) -> Self {
        Self {
            role,
            tab: Some(tab),
        }
    }

    /// The hub's context id. The hub never carries a tab suffix.
    #[inline]
    #[must_use]
    pub const fn hub() -> Self {
        Self::tabless(Role::Background)
    }

    /// Returns the role component.
    #[inline]
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns the tab component, if any.
    #[inline]
    #[must_use]
    pub const fn tab(&self) -> Option<TabId> {
        self.tab
    }

    /// Returns `true` if this is the hub.
    #[inline]
    #[must_use]
    pub const fn is_hub(&self) -> bool {
        self.role.is_hub()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tab {
            Some(tab) => write!(f, "{}-{}", self.role, tab),
            None => self.role.fmt(f),
        }
    }
}

impl FromStr for ContextId {
    type Err = Error;

    /// Parses `role` or `role-<tab>` forms.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRole`] when the role part is not in the enumeration
    /// - [`Error::Addressing`] for a malformed tab suffix, or any tab suffix
    ///   on the hub role
    fn from_str(s: &str) -> Result<Self> {
        let (role_part, tab_part) = match s.split_once('-') {
            Some((role, tab)) => (role, Some(tab)),
            None => (s, None),
        };

        let role = Role::from_str(role_part)?;
        let tab = match tab_part {
            Some(raw) => {
                let id: u32 = raw
                    .parse()
                    .map_err(|_| Error::addressing(format!("invalid tab suffix in `{s}`")))?;
                Some(TabId::new(id))
            }
            None => None,
        };

        if role.is_hub() && tab.is_some() {
            return Err(Error::addressing(format!(
                "the hub never carries a tab suffix: `{s}`"
            )));
        }

        Ok(Self { role, tab })
    }
}

impl Serialize for ContextId {
    fn serialize<S: Serializer>(&self, serializer: S) -> StdResult<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContextId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> StdResult<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().expect("parse"), role);
        }
    }

    #[test]
    fn test_role_rejects_unknown() {
        let err = "sidebar".parse::<Role>().unwrap_err();
        assert!(matches!(err, Error::InvalidRole { .. }));
    }

    #[test]
    fn test_context_id_display() {
        let ctx = ContextId::with_tab(Role::Web, TabId::new(123));
        assert_eq!(ctx.to_string(), "web-123");
        assert_eq!(ContextId::hub().to_string(), "background");
    }

    #[test]
    fn test_context_id_parse() {
        let ctx: ContextId = "contentScript-7".parse().expect("parse");
        assert_eq!(ctx.role(), Role::ContentScript);
        assert_eq!(ctx.tab(), Some(TabId::new(7)));

        let hub: ContextId = "background".parse().expect("parse");
        assert!(hub.is_hub());
        assert_eq!(hub.tab(), None);
    }

    #[test]
    fn test_context_id_rejects_hub_tab_suffix() {
        let err = "background-3".parse::<ContextId>().unwrap_err();
        assert!(err.is_addressing());
    }

    #[test]
    fn test_context_id_rejects_garbage_tab() {
        let err = "web-abc".parse::<ContextId>().unwrap_err();
        assert!(err.is_addressing());
    }

    #[test]
    fn test_context_id_serde_as_string() {
        let ctx = ContextId::with_tab(Role::Web, TabId::new(9));
        let json = serde_json::to_string(&ctx).expect("serialize");
        assert_eq!(json, "\"web-9\"");
        let back: ContextId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, ctx);
    }
}
