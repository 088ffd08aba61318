//! Services layer - pipeline logic
//!
//! This module contains the processing stages of the publishing pipeline:
//! - HTML article parsing, scrubbing, and link rewriting
//! - URL allowlist matching
//! - Image URL derivation
//! - Bundle-level ingestion and staging

pub mod allowlist;
pub mod bundle;
pub mod html;
pub mod images;

pub use allowlist::{AllowlistError, UrlAllowlist};
pub use bundle::{BundleError, BundleProcessor, StagedArticle, StagedBundle, ValidatedBundle};
pub use html::{collect_html_files, ArticleDoc, HtmlError};
pub use images::ImageUrls;
