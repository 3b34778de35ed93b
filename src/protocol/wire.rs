//! Wire-format key prefixing.
//!
//! Both underlying transports are shared with unrelated message producers
//! (the page posts its own window messages, other extensions talk on the
//! runtime port). To avoid colliding with anything that also relies on
//! fields like `id` and `type`, every envelope key is namespaced with a
//! fixed prefix before leaving a node and stripped on arrival.
//!
//! Stripping fails soft: an object where any key lacks the prefix is not
//! ours and is silently ignored rather than raised as an error.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Result;

use super::Envelope;

// ============================================================================
// Constants
// ============================================================================

/// Fixed prefix applied to every envelope key on the wire.
pub const WIRE_PREFIX: &str = "wxr_";

// ============================================================================
// Encoding
// ============================================================================

/// Serializes an envelope into its prefixed wire form.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
pub fn to_wire(envelope: &Envelope) -> Result<Value> {
    let value = serde_json::to_value(envelope)?;
    // Envelope always serializes to an object.
    let Value::Object(fields) = value else {
        unreachable!("envelope serializes to a JSON object");
    };

    let prefixed: Map<String, Value> = fields
        .into_iter()
        .map(|(key, value)| (format!("{WIRE_PREFIX}{key}"), value))
        .collect();

    Ok(Value::Object(prefixed))
}

// ============================================================================
// Decoding
// ============================================================================

/// Strips the wire prefix from every key of a received object.
///
/// Returns `None` (the "not ours" sentinel) when the value is not an
/// object, is empty, or any key lacks the prefix. This is the mechanism by
/// which foreign messages on a shared transport are filtered out before
/// reaching application listeners.
#[must_use]
pub fn strip_prefix(value: &Value) -> Option<Map<String, Value>> {
    let fields = value.as_object()?;
    if fields.is_empty() {
        return None;
    }

    let mut stripped = Map::with_capacity(fields.len());
    for (key, value) in fields {
        let bare = key.strip_prefix(WIRE_PREFIX)?;
        stripped.insert(bare.to_string(), value.clone());
    }
    Some(stripped)
}

/// Decodes a received wire object into an [`Envelope`].
///
/// Returns `None` both for foreign objects (prefix missing) and for
/// prefixed objects that do not parse as envelopes; the latter is logged
/// since it indicates a version skew between contexts.
#[must_use]
pub fn from_wire(value: &Value) -> Option<Envelope> {
    let stripped = strip_prefix(value)?;
    match serde_json::from_value(Value::Object(stripped)) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            warn!(error = %e, "Prefixed wire object is not a valid envelope");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
