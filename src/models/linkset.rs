//! Allowed-linkset model

use serde::{Deserialize, Serialize};

/// A named set of extra URL patterns merged into the link allowlist.
///
/// Administrators maintain these per external site; the pipeline only
/// consumes them when building the allowlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedLinkset {
    /// Set name
    pub name: String,
    /// Glob-style URL patterns
    pub urls: Vec<String>,
}

impl AllowedLinkset {
    /// Create a linkset
    pub fn new(name: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            name: name.into(),
            urls,
        }
    }
}
