//! Configuration management
//!
//! This module handles loading and parsing configuration for the kbpress
//! pipeline. Configuration can be loaded from:
//! - a YAML file (config.yml by default)
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Article parsing and link-rewriting settings
    #[serde(default)]
    pub article: ArticleConfig,
    /// HTML tag/attribute whitelist
    #[serde(default)]
    pub whitelist: WhitelistConfig,
    /// URL allowlist for absolute hrefs and srcs
    #[serde(default)]
    pub links: LinksConfig,
    /// Image store settings
    #[serde(default)]
    pub images: ImagesConfig,
    /// Knowledge-base record field names
    #[serde(default)]
    pub record: RecordConfig,
}

/// Article parsing and link-rewriting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleConfig {
    /// Class token identifying the article body <div>
    #[serde(default = "default_body_class")]
    pub body_class: String,
    /// Meta tag name carrying the article author
    #[serde(default = "default_author_meta")]
    pub author_meta: String,
    /// Meta tag name carrying the author override
    #[serde(default = "default_author_override_meta")]
    pub author_override_meta: String,
    /// URL path prefix for rewritten article links
    #[serde(default = "default_url_path_prefix")]
    pub url_path_prefix: String,
    /// Number of rewritten links that stay site-relative before the
    /// base URL is prepended
    #[serde(default = "default_link_limit")]
    pub link_limit: u32,
    /// File names to skip when collecting bundle HTML files
    #[serde(default = "default_skip_files")]
    pub skip_files: Vec<String>,
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            body_class: default_body_class(),
            author_meta: default_author_meta(),
            author_override_meta: default_author_override_meta(),
            url_path_prefix: default_url_path_prefix(),
            link_limit: default_link_limit(),
            skip_files: default_skip_files(),
        }
    }
}

fn default_body_class() -> String {
    "article-body".to_string()
}

fn default_author_meta() -> String {
    "Author".to_string()
}

fn default_author_override_meta() -> String {
    "AuthorOverride".to_string()
}

fn default_url_path_prefix() -> String {
    "/articles/".to_string()
}

fn default_link_limit() -> u32 {
    100
}

fn default_skip_files() -> Vec<String> {
    vec!["index.html".to_string()]
}

/// HTML tag/attribute whitelist
///
/// Maps a tag name to the attribute names allowed on that tag. Tags absent
/// from the map are rejected outright during scrubbing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WhitelistConfig(pub HashMap<String, Vec<String>>);

/// Tags the authoring tool emits, with the attributes each may carry.
static DEFAULT_WHITELIST: Lazy<HashMap<String, Vec<String>>> = Lazy::new(|| {
    const TAGS: &[(&str, &[&str])] = &[
        ("a", &["href", "target", "title", "name"]),
        ("b", &[]),
        ("blockquote", &[]),
        ("br", &[]),
        ("caption", &[]),
        ("code", &[]),
        ("div", &["class"]),
        ("em", &[]),
        ("h1", &[]),
        ("h2", &[]),
        ("h3", &[]),
        ("h4", &[]),
        ("h5", &[]),
        ("h6", &[]),
        ("hr", &[]),
        ("i", &[]),
        ("img", &["src", "alt", "title", "width", "height"]),
        ("li", &["class"]),
        ("ol", &["class"]),
        ("p", &["class"]),
        ("pre", &[]),
        ("span", &["class"]),
        ("strong", &[]),
        ("sub", &[]),
        ("sup", &[]),
        ("table", &["class"]),
        ("tbody", &[]),
        ("td", &["colspan", "rowspan"]),
        ("th", &["colspan", "rowspan"]),
        ("thead", &[]),
        ("tr", &[]),
        ("u", &[]),
        ("ul", &["class"]),
    ];
    TAGS.iter()
        .map(|(tag, attrs)| {
            (
                (*tag).to_string(),
                attrs.iter().map(|a| (*a).to_string()).collect(),
            )
        })
        .collect()
});

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self(DEFAULT_WHITELIST.clone())
    }
}

impl WhitelistConfig {
    /// Check whether a tag is allowed at all
    pub fn allows_tag(&self, tag: &str) -> bool {
        self.0.contains_key(tag)
    }

    /// Check whether an attribute is allowed on a tag
    pub fn allows_attr(&self, tag: &str, attr: &str) -> bool {
        self.0
            .get(tag)
            .map(|attrs| attrs.iter().any(|a| a == attr))
            .unwrap_or(false)
    }
}

/// URL allowlist for absolute hrefs and srcs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Glob-style URL patterns (`*` matches any run of characters).
    /// Relative URLs always pass; absolute URLs must match a pattern.
    /// Empty by default: absolute links must be allowed explicitly.
    #[serde(default)]
    pub allow: Vec<String>,
}

/// Image store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Base URL of the image store
    #[serde(default = "default_images_url_root")]
    pub url_root: String,
    /// Path segment for draft-stage image URLs
    #[serde(default = "default_draft_segment")]
    pub draft_segment: String,
    /// Path segment for production-stage image URLs
    #[serde(default = "default_public_segment")]
    pub public_segment: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            url_root: default_images_url_root(),
            draft_segment: default_draft_segment(),
            public_segment: default_public_segment(),
        }
    }
}

fn default_images_url_root() -> String {
    "https://images.example.com".to_string()
}

fn default_draft_segment() -> String {
    "draft".to_string()
}

fn default_public_segment() -> String {
    "public".to_string()
}

/// Knowledge-base record field names the transformer writes under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Field holding the article body HTML
    #[serde(default = "default_body_field")]
    pub body_field: String,
    /// Field holding the article author
    #[serde(default = "default_author_field")]
    pub author_field: String,
    /// Field holding the author override
    #[serde(default = "default_author_override_field")]
    pub author_override_field: String,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            body_field: default_body_field(),
            author_field: default_author_field(),
            author_override_field: default_author_override_field(),
        }
    }
}

fn default_body_field() -> String {
    "Article_Body__c".to_string()
}

fn default_author_field() -> String {
    "Author__c".to_string()
}

fn default_author_override_field() -> String {
    "Author_Override__c".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        // Empty file - return defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - KBPRESS_ARTICLE_BODY_CLASS
    /// - KBPRESS_ARTICLE_AUTHOR_META
    /// - KBPRESS_ARTICLE_AUTHOR_OVERRIDE_META
    /// - KBPRESS_ARTICLE_URL_PATH_PREFIX
    /// - KBPRESS_ARTICLE_LINK_LIMIT
    /// - KBPRESS_IMAGES_URL_ROOT
    /// - KBPRESS_IMAGES_DRAFT_SEGMENT
    /// - KBPRESS_IMAGES_PUBLIC_SEGMENT
    /// - KBPRESS_RECORD_BODY_FIELD
    /// - KBPRESS_RECORD_AUTHOR_FIELD
    /// - KBPRESS_RECORD_AUTHOR_OVERRIDE_FIELD
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(body_class) = std::env::var("KBPRESS_ARTICLE_BODY_CLASS") {
            self.article.body_class = body_class;
        }
        if let Ok(author_meta) = std::env::var("KBPRESS_ARTICLE_AUTHOR_META") {
            self.article.author_meta = author_meta;
        }
        if let Ok(author_override_meta) = std::env::var("KBPRESS_ARTICLE_AUTHOR_OVERRIDE_META") {
            self.article.author_override_meta = author_override_meta;
        }
        if let Ok(prefix) = std::env::var("KBPRESS_ARTICLE_URL_PATH_PREFIX") {
            self.article.url_path_prefix = prefix;
        }
        if let Ok(limit) = std::env::var("KBPRESS_ARTICLE_LINK_LIMIT") {
            if let Ok(limit) = limit.parse::<u32>() {
                self.article.link_limit = limit;
            }
        }

        if let Ok(url_root) = std::env::var("KBPRESS_IMAGES_URL_ROOT") {
            self.images.url_root = url_root;
        }
        if let Ok(segment) = std::env::var("KBPRESS_IMAGES_DRAFT_SEGMENT") {
            self.images.draft_segment = segment;
        }
        if let Ok(segment) = std::env::var("KBPRESS_IMAGES_PUBLIC_SEGMENT") {
            self.images.public_segment = segment;
        }

        if let Ok(field) = std::env::var("KBPRESS_RECORD_BODY_FIELD") {
            self.record.body_field = field;
        }
        if let Ok(field) = std::env::var("KBPRESS_RECORD_AUTHOR_FIELD") {
            self.record.author_field = field;
        }
        if let Ok(field) = std::env::var("KBPRESS_RECORD_AUTHOR_OVERRIDE_FIELD") {
            self.record.author_override_field = field;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn clear_env() {
        for key in [
            "KBPRESS_ARTICLE_BODY_CLASS",
            "KBPRESS_ARTICLE_AUTHOR_META",
            "KBPRESS_ARTICLE_AUTHOR_OVERRIDE_META",
            "KBPRESS_ARTICLE_URL_PATH_PREFIX",
            "KBPRESS_ARTICLE_LINK_LIMIT",
            "KBPRESS_IMAGES_URL_ROOT",
            "KBPRESS_IMAGES_DRAFT_SEGMENT",
            "KBPRESS_IMAGES_PUBLIC_SEGMENT",
            "KBPRESS_RECORD_BODY_FIELD",
            "KBPRESS_RECORD_AUTHOR_FIELD",
            "KBPRESS_RECORD_AUTHOR_OVERRIDE_FIELD",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::path::Path::new("nonexistent_config.yml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.article.body_class, "article-body");
        assert_eq!(config.article.author_meta, "Author");
        assert_eq!(config.article.link_limit, 100);
        assert_eq!(config.article.url_path_prefix, "/articles/");
        assert_eq!(config.article.skip_files, vec!["index.html".to_string()]);
        assert_eq!(config.images.draft_segment, "draft");
        assert_eq!(config.images.public_segment, "public");
        assert_eq!(config.record.body_field, "Article_Body__c");
        assert!(config.links.allow.is_empty());
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.article.body_class, "article-body");
        assert_eq!(config.article.link_limit, 100);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "article:\n  link_limit: 25\n").unwrap();

        let config = Config::load(file.path()).unwrap();

        // Specified value
        assert_eq!(config.article.link_limit, 25);
        // Default values
        assert_eq!(config.article.body_class, "article-body");
        assert_eq!(config.images.draft_segment, "draft");
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
article:
  body_class: "conbody"
  author_meta: "DocAuthor"
  url_path_prefix: "/s/article/"
  link_limit: 10
  skip_files: ["index.html", "toc.html"]
links:
  allow:
    - "https://help.example.com/*"
images:
  url_root: "https://cdn.example.org"
  draft_segment: "staging"
  public_segment: "live"
record:
  body_field: "Body__c"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.article.body_class, "conbody");
        assert_eq!(config.article.author_meta, "DocAuthor");
        assert_eq!(config.article.url_path_prefix, "/s/article/");
        assert_eq!(config.article.link_limit, 10);
        assert_eq!(config.article.skip_files.len(), 2);
        assert_eq!(config.links.allow, vec!["https://help.example.com/*"]);
        assert_eq!(config.images.url_root, "https://cdn.example.org");
        assert_eq!(config.images.draft_segment, "staging");
        assert_eq!(config.images.public_segment, "live");
        assert_eq!(config.record.body_field, "Body__c");
        // Untouched section keeps its default
        assert_eq!(config.record.author_field, "Author__c");
    }

    #[test]
    fn test_load_custom_whitelist_replaces_default() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "whitelist:\n  p: []\n  a:\n    - href\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert!(config.whitelist.allows_tag("p"));
        assert!(config.whitelist.allows_attr("a", "href"));
        // The file's whitelist replaces the built-in one entirely
        assert!(!config.whitelist.allows_tag("img"));
        assert!(!config.whitelist.allows_attr("a", "target"));
    }

    #[test]
    fn test_default_whitelist_covers_authoring_output() {
        let whitelist = WhitelistConfig::default();

        assert!(whitelist.allows_tag("p"));
        assert!(whitelist.allows_tag("img"));
        assert!(whitelist.allows_attr("img", "src"));
        assert!(whitelist.allows_attr("a", "href"));
        assert!(whitelist.allows_attr("div", "class"));
        assert!(!whitelist.allows_tag("script"));
        assert!(!whitelist.allows_tag("iframe"));
        assert!(!whitelist.allows_attr("a", "onclick"));
        assert!(!whitelist.allows_attr("unknown", "href"));
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "article:\n  link_limit: not_a_number\n").unwrap();

        let result = Config::load(file.path());

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("parse") || err_msg.contains("invalid"));
    }

    #[test]
    fn test_load_malformed_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "article:\n  body_class: [invalid yaml").unwrap();

        let result = Config::load(file.path());

        assert!(result.is_err());
    }

    #[test]
    fn test_env_override_article_config() {
        let _guard = lock_env();
        clear_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "article:\n  body_class: \"from-file\"\n").unwrap();

        std::env::set_var("KBPRESS_ARTICLE_BODY_CLASS", "from-env");
        std::env::set_var("KBPRESS_ARTICLE_LINK_LIMIT", "7");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.article.body_class, "from-env");
        assert_eq!(config.article.link_limit, 7);

        clear_env();
    }

    #[test]
    fn test_env_override_images_and_record() {
        let _guard = lock_env();
        clear_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "").unwrap();

        std::env::set_var("KBPRESS_IMAGES_URL_ROOT", "https://img.test");
        std::env::set_var("KBPRESS_IMAGES_PUBLIC_SEGMENT", "released");
        std::env::set_var("KBPRESS_RECORD_BODY_FIELD", "Content__c");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.images.url_root, "https://img.test");
        assert_eq!(config.images.public_segment, "released");
        assert_eq!(config.record.body_field, "Content__c");

        clear_env();
    }

    #[test]
    fn test_env_override_invalid_link_limit_ignored() {
        let _guard = lock_env();
        clear_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "article:\n  link_limit: 42\n").unwrap();

        std::env::set_var("KBPRESS_ARTICLE_LINK_LIMIT", "not_a_number");

        let config = Config::load_with_env(file.path()).unwrap();

        // Should keep original value when env var is invalid
        assert_eq!(config.article.link_limit, 42);

        clear_env();
    }
}
