//! URL allowlist
//!
//! Absolute URLs appearing in article `href`/`src` attributes must match
//! one of a set of glob-style patterns; relative URLs always pass. The
//! patterns come from configuration plus any [`AllowedLinkset`] records.

use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::models::AllowedLinkset;

/// Allowlist-specific errors
#[derive(Debug, Error)]
pub enum AllowlistError {
    /// A configured pattern did not compile
    #[error("Invalid URL pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Compiled URL allowlist
#[derive(Debug)]
pub struct UrlAllowlist {
    patterns: Vec<Regex>,
}

impl UrlAllowlist {
    /// Build an allowlist from glob-style patterns
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, AllowlistError> {
        let patterns = patterns
            .iter()
            .map(|p| compile_pattern(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Build an allowlist from configured patterns plus linkset records
    pub fn with_linksets<S: AsRef<str>>(
        patterns: &[S],
        linksets: &[AllowedLinkset],
    ) -> Result<Self, AllowlistError> {
        let mut all: Vec<&str> = patterns.iter().map(|p| p.as_ref()).collect();
        for linkset in linksets {
            all.extend(linkset.urls.iter().map(|u| u.as_str()));
        }
        Self::new(&all)
    }

    /// Check whether a URL is acceptable in article content.
    ///
    /// Relative URLs are always allowed. Absolute URLs (including
    /// protocol-relative `//host/...` forms) must match a pattern.
    pub fn is_allowed(&self, url: &str) -> bool {
        if !is_absolute(url) {
            return true;
        }
        self.patterns.iter().any(|re| re.is_match(url))
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("//") || Url::parse(url).is_ok()
}

/// Compile a glob-style pattern (`*` matches any run of characters) into
/// an anchored regex.
fn compile_pattern(pattern: &str) -> Result<Regex, AllowlistError> {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    let mut first = true;
    for part in pattern.split('*') {
        if !first {
            regex.push_str(".*");
        }
        regex.push_str(&regex::escape(part));
        first = false;
    }
    regex.push('$');
    Regex::new(&regex).map_err(|source| AllowlistError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
