//! Bundle model
//!
//! A bundle is one export from the authoring tool: a directory tree of
//! article HTML files and their images, processed as a unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An article bundle exported from the authoring tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    /// Authoring-tool bundle identifier
    pub easydita_id: String,
    /// Authoring-tool resource identifier
    pub easydita_resource_id: String,
    /// Processing status
    pub status: BundleStatus,
    /// When the bundle entered the pipeline
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Bundle {
    /// Create a new bundle in the `New` state
    pub fn new(easydita_id: impl Into<String>, easydita_resource_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            easydita_id: easydita_id.into(),
            easydita_resource_id: easydita_resource_id.into(),
            status: BundleStatus::New,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance the bundle to a new status
    pub fn mark(&mut self, status: BundleStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Bundle processing lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleStatus {
    /// Received, not yet picked up
    New,
    /// Waiting behind another bundle
    Queued,
    /// Being parsed and validated
    Processing,
    /// Staged as drafts
    Draft,
    /// Drafts being promoted
    Publishing,
    /// Live
    Published,
    /// Rejected by a reviewer
    Rejected,
    /// Failed validation or processing
    Error,
}

impl BundleStatus {
    /// Database/string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleStatus::New => "new",
            BundleStatus::Queued => "queued",
            BundleStatus::Processing => "processing",
            BundleStatus::Draft => "draft",
            BundleStatus::Publishing => "publishing",
            BundleStatus::Published => "published",
            BundleStatus::Rejected => "rejected",
            BundleStatus::Error => "error",
        }
    }

    /// Whether the bundle has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BundleStatus::Published | BundleStatus::Rejected | BundleStatus::Error
        )
    }
}

impl std::fmt::Display for BundleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
