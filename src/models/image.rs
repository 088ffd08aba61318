//! Image model

use serde::{Deserialize, Serialize};

use super::RecordStatus;

/// An image referenced by one or more articles in a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Bundle-relative path, forward slashes
    pub path: String,
    /// Change-tracking status
    pub status: RecordStatus,
}

impl Image {
    /// Create an image record
    pub fn new(path: impl Into<String>, status: RecordStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }

    /// File name component of the path
    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}
