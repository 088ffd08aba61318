//! Docset model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A documentation set: the unit articles and images are grouped under in
/// the knowledge base and the image store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Docset {
    /// Stable docset identifier (the authoring tool's product map UUID)
    pub docset_id: Uuid,
    /// Human-readable name
    pub display_name: String,
}

impl Docset {
    /// Create a docset
    pub fn new(docset_id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            docset_id,
            display_name: display_name.into(),
        }
    }
}
