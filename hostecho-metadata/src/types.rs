use std::fmt;

use serde::{Deserialize, Serialize};

/// Short-lived session credential returned by the token endpoint.
///
/// Never empty: [`MetadataToken::new`] rejects blank values so an attribute read can't be
/// attempted with a missing credential.
#[derive(Clone, PartialEq, Eq)]
pub struct MetadataToken(String);

impl MetadataToken {
    /// Wraps a raw token, returning `None` when it is blank.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == value.len() {
            Some(Self(value))
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MetadataToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MetadataToken(<redacted>)")
    }
}

/// Attribute value read from the metadata service, fresh as of the call that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataValue(String);

impl MetadataValue {
    /// Rendering used when a lookup came back absent.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the value's text, or `"unknown"` for an absent lookup.
    pub fn display_or_unknown(value: Option<&MetadataValue>) -> &str {
        value.map(MetadataValue::as_str).unwrap_or(Self::UNKNOWN)
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
