//! Request DTOs for the HTTP surface
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

/// Request body for `PUT /cache/:strategy/:identifier`
///
/// Key parameters travel in the query string, not the body.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// Value to cache
    pub value: Value,
    /// Optional TTL override in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.ttl == Some(0) {
            return Some("TTL must be at least 1 second".to_string());
        }
        None
    }
}

/// Request body for `POST /invalidate`
///
/// Either a glob `pattern` over composed keys, or a `trigger` event plus the
/// `identifier` it happened to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
}

/// A validated invalidation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationTarget {
    Pattern(String),
    Trigger { trigger: String, identifier: String },
}

impl InvalidateRequest {
    pub fn target(&self) -> Result<InvalidationTarget, String> {
        match (&self.pattern, &self.trigger, &self.identifier) {
            (Some(pattern), None, None) if !pattern.trim().is_empty() => {
                Ok(InvalidationTarget::Pattern(pattern.clone()))
            }
            (None, Some(trigger), Some(identifier))
                if !trigger.is_empty() && !identifier.is_empty() =>
            {
                Ok(InvalidationTarget::Trigger {
                    trigger: trigger.clone(),
                    identifier: identifier.clone(),
                })
            }
            _ => Err(
                "Provide either a non-empty 'pattern' or both 'trigger' and 'identifier'"
                    .to_string(),
            ),
        }
    }
}
