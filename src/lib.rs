//! WebExtension message router - context-to-context messaging layer.
//!
//! This library routes messages between the execution contexts of a browser
//! extension: page worlds, content scripts, the background hub, and
//! auxiliary surfaces (popup, options, devtools). Callers address logical
//! contexts; the router picks channels and relays.
//!
//! # Architecture
//!
//! The topology is a star centred on the background hub:
//!
//! - Page world and content script of one tab share an in-page channel
//! - Content scripts and auxiliary surfaces hold a runtime connection to
//!   the hub
//! - Everything else is forwarded, at most two resolution steps per leg
//!
//! Key design principles:
//!
//! - Roles, targets, and channels are closed enums; strings exist only at
//!   the parsing boundary
//! - Addressing mistakes fail synchronously, before any send
//! - No delivery guarantees and no retries; the only recoverable error is
//!   a reply timeout
//! - The host platform is injected behind [`TransportProvider`], with an
//!   in-memory implementation for deterministic tests
//!
//! # Quick Start
//!
//! ```ignore
//! use webext_router::{Messaging, PostMessage, Result, Role, Target};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let messaging = Messaging::connect(provider, Role::ContentScript)?;
//!
//!     // Fire-and-forget to the default audience
//!     messaging.post(PostMessage::new("page.loaded"))?;
//!
//!     // Request/reply with the hub
//!     let reply = messaging
//!         .request(PostMessage::new("settings.get").target(Target::hub()))
//!         .await?;
//!     println!("settings: {}", reply.content);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`messaging`] | [`Messaging`] router and [`PostMessage`] builder |
//! | [`protocol`] | Roles, addresses, envelopes, wire format |
//! | [`readiness`] | Hub-owned connectivity tracking |
//! | [`routing`] | Reachability graph, target and forwarding resolvers |
//! | [`transport`] | Channel abstraction and providers |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for routing entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// The per-context router and its public API.
pub mod messaging;

/// Message protocol types.
///
/// Roles and addresses, target shortcuts, the envelope record, and the
/// wire-format key prefixing.
pub mod protocol;

/// Hub-centric connectivity tracking.
pub mod readiness;

/// Target expansion and forwarding resolution.
pub mod routing;

/// Channel abstraction and transport providers.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ListenerToken, MessageId, TabId};

// Messaging types
pub use messaging::{
    DEFAULT_REPLY_TIMEOUT, MessageCallback, MessageFilter, Messaging, PostMessage,
};

// Protocol types
pub use protocol::{ContextId, Envelope, Role, Target};

// Readiness types
pub use readiness::{ReadinessSnapshot, ReadinessTracker};

// Transport types
pub use transport::{
    ChannelKind, MemoryTransport, MessagingChannel, TransportProvider,
};
