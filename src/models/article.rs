//! Article model
//!
//! This module provides:
//! - `Article`: the fields parsed out of an article HTML document
//! - `RecordStatus`: the change-tracking state of a synced record

use serde::{Deserialize, Serialize};

/// Article fields parsed from an HTML document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// URL name (unique key in the knowledge base)
    pub url_name: String,
    /// Article title
    pub title: String,
    /// Summary text (optional)
    pub summary: Option<String>,
    /// Visible in the customer self-service portal
    pub is_visible_in_csp: bool,
    /// Visible in the public knowledge base
    pub is_visible_in_pkb: bool,
    /// Visible in the partner portal
    pub is_visible_in_prm: bool,
    /// Article author
    pub author: String,
    /// Author override (org user id, optional)
    pub author_override: Option<String>,
    /// Docset the article belongs to (optional)
    pub docset_id: Option<String>,
    /// Topic list (optional)
    pub topics: Option<String>,
    /// Article type (optional)
    pub article_type: Option<String>,
    /// Body HTML
    pub body: String,
}

/// Change-tracking status of a synced record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Record does not exist upstream yet
    #[serde(rename = "N")]
    New,
    /// Record exists upstream but differs
    #[serde(rename = "C")]
    Changed,
    /// Record was removed from the bundle
    #[serde(rename = "D")]
    Deleted,
}

impl RecordStatus {
    /// Single-letter wire code
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::New => "N",
            RecordStatus::Changed => "C",
            RecordStatus::Deleted => "D",
        }
    }

    /// Parse from the single-letter wire code
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "N" => Some(RecordStatus::New),
            "C" => Some(RecordStatus::Changed),
            "D" => Some(RecordStatus::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
