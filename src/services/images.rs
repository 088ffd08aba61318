//! Image URL derivation
//!
//! Bundle images live in an external image store, keyed by docset and
//! publish stage: `{root}/{docset}/{stage}/{bundle-relative path}`.
//! Draft staging points article `src` attributes at the draft stage;
//! production promotion rewrites those URLs to the public stage.

use uuid::Uuid;

use crate::config::ImagesConfig;

/// Derives draft and public image URLs
#[derive(Debug, Clone)]
pub struct ImageUrls {
    url_root: String,
    draft_segment: String,
    public_segment: String,
}

impl ImageUrls {
    /// Create from configuration
    pub fn new(config: &ImagesConfig) -> Self {
        Self {
            url_root: config.url_root.trim_end_matches('/').to_string(),
            draft_segment: config.draft_segment.clone(),
            public_segment: config.public_segment.clone(),
        }
    }

    /// Draft-stage URL for a bundle-relative image path
    pub fn draft_url(&self, docset_id: &Uuid, rel_path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.url_root, docset_id, self.draft_segment, rel_path
        )
    }

    /// Public-stage URL for a bundle-relative image path
    pub fn public_url(&self, docset_id: &Uuid, rel_path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.url_root, docset_id, self.public_segment, rel_path
        )
    }

    /// Rewrite a draft image URL to its public form.
    ///
    /// Anything that is not a draft URL under the configured root is
    /// returned unchanged.
    pub fn to_public(&self, src: &str) -> String {
        let Some(rest) = src.strip_prefix(&self.url_root) else {
            return src.to_string();
        };
        let Some(rest) = rest.strip_prefix('/') else {
            return src.to_string();
        };
        // rest = "{docset}/{stage}/{rel_path}"
        let mut parts = rest.splitn(3, '/');
        let (Some(docset), Some(stage), Some(rel_path)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return src.to_string();
        };
        if stage != self.draft_segment {
            return src.to_string();
        }
        format!(
            "{}/{}/{}/{}",
            self.url_root, docset, self.public_segment, rel_path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> ImageUrls {
        ImageUrls::new(&ImagesConfig {
            url_root: "https://images.example.com".to_string(),
            draft_segment: "draft".to_string(),
            public_segment: "public".to_string(),
        })
    }

    fn docset() -> Uuid {
        Uuid::parse_str("6f1f98a5-5c54-4c2b-a046-e90e4e5f54d2").unwrap()
    }

    #[test]
    fn test_draft_url_layout() {
        assert_eq!(
            urls().draft_url(&docset(), "guides/shot.png"),
            "https://images.example.com/6f1f98a5-5c54-4c2b-a046-e90e4e5f54d2/draft/guides/shot.png"
        );
    }

    #[test]
    fn test_trailing_slash_on_root_is_trimmed() {
        let urls = ImageUrls::new(&ImagesConfig {
            url_root: "https://images.example.com/".to_string(),
            draft_segment: "draft".to_string(),
            public_segment: "public".to_string(),
        });
        assert_eq!(
            urls.draft_url(&docset(), "a.png"),
            "https://images.example.com/6f1f98a5-5c54-4c2b-a046-e90e4e5f54d2/draft/a.png"
        );
    }

    #[test]
    fn test_to_public_rewrites_draft_url() {
        let urls = urls();
        let draft = urls.draft_url(&docset(), "guides/shot.png");
        assert_eq!(urls.to_public(&draft), urls.public_url(&docset(), "guides/shot.png"));
    }

    #[test]
    fn test_to_public_leaves_public_url_unchanged() {
        let urls = urls();
        let public = urls.public_url(&docset(), "guides/shot.png");
        assert_eq!(urls.to_public(&public), public);
    }

    #[test]
    fn test_to_public_leaves_foreign_urls_unchanged() {
        let urls = urls();
        assert_eq!(urls.to_public("https://other.example.org/draft/x.png"),
            "https://other.example.org/draft/x.png");
        assert_eq!(urls.to_public("relative/path.png"), "relative/path.png");
        assert_eq!(urls.to_public("https://images.example.com"), "https://images.example.com");
    }

    #[test]
    fn test_to_public_requires_all_path_segments() {
        let urls = urls();
        // No rel_path segment after the stage
        assert_eq!(
            urls.to_public("https://images.example.com/abc/draft"),
            "https://images.example.com/abc/draft"
        );
    }
}
