//! Bundle ingestion
//!
//! The parse-validate-rewrite pipeline over a bundle directory. Validation
//! aggregates every problem across the bundle before reporting; staging
//! draft-rewrites the validated articles and collects their images;
//! publishing promotes staged bodies to their production form.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::Config;
use crate::models::{AllowedLinkset, Bundle, BundleStatus, Docset, Image, RecordStatus};
use crate::services::allowlist::{AllowlistError, UrlAllowlist};
use crate::services::html::{collect_html_files, is_html_path, ArticleDoc, HtmlError};
use crate::services::images::ImageUrls;

/// Bundle processing errors
#[derive(Debug, Error)]
pub enum BundleError {
    /// One or more validation problems across the bundle
    #[error("Bundle validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),
    /// Article-level transformation failure
    #[error(transparent)]
    Html(#[from] HtmlError),
    /// Allowlist construction failure
    #[error(transparent)]
    Allowlist(#[from] AllowlistError),
    /// Filesystem failure while staging or publishing
    #[error("Failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A bundle that passed validation
#[derive(Debug)]
pub struct ValidatedBundle {
    /// Parsed articles, in file order
    pub articles: Vec<ArticleDoc>,
    /// Bundle-relative paths of every referenced image
    pub images: BTreeSet<String>,
}

/// One article after draft rewriting
#[derive(Debug, Clone)]
pub struct StagedArticle {
    /// Knowledge-base url name
    pub url_name: String,
    /// Draft-rewritten body HTML
    pub body: String,
    /// Knowledge-base record data
    pub record: Map<String, Value>,
}

/// A bundle staged for review
#[derive(Debug)]
pub struct StagedBundle {
    /// Staged articles
    pub articles: Vec<StagedArticle>,
    /// Images to upload to the draft image store
    pub images: Vec<Image>,
}

/// Runs the pipeline stages over bundle directories
pub struct BundleProcessor {
    config: Config,
    allowlist: UrlAllowlist,
    images: ImageUrls,
}

impl BundleProcessor {
    /// Create a processor from configuration
    pub fn new(config: Config) -> Result<Self, BundleError> {
        Self::with_linksets(config, &[])
    }

    /// Create a processor, merging extra allowed-linkset records into the
    /// URL allowlist
    pub fn with_linksets(
        config: Config,
        linksets: &[AllowedLinkset],
    ) -> Result<Self, BundleError> {
        let allowlist = UrlAllowlist::with_linksets(&config.links.allow, linksets)?;
        let images = ImageUrls::new(&config.images);
        Ok(Self {
            config,
            allowlist,
            images,
        })
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate a bundle directory.
    ///
    /// Collects the bundle's HTML files, parses every article, scrubs each
    /// against the whitelists, rejects duplicate url names
    /// (case-insensitive), and verifies every image reference resolves
    /// inside the bundle. Problems are aggregated; any problem fails the
    /// whole bundle.
    pub fn validate(&self, root: &Path) -> Result<ValidatedBundle, BundleError> {
        let files = collect_html_files(root, &self.config.article)?;
        let mut problems = Vec::new();
        let mut articles = Vec::new();

        for path in &files {
            let shown = display_path(path, root);
            match ArticleDoc::parse(path, root, &self.config) {
                Ok(doc) => {
                    for problem in doc.scrub(&self.config.whitelist, &self.allowlist) {
                        problems.push(format!("{}: {}", shown, problem));
                    }
                    articles.push(doc);
                }
                Err(err) => problems.push(format!("{}: {}", shown, err)),
            }
        }

        // The knowledge base treats url names as case-insensitive-unique
        let mut seen: HashMap<String, String> = HashMap::new();
        for doc in &articles {
            let shown = display_path(doc.html_path(), root);
            let key = doc.article().url_name.to_lowercase();
            if let Some(first) = seen.get(&key) {
                problems.push(format!(
                    "{}: Duplicate UrlName \"{}\" (also used by {})",
                    shown,
                    doc.article().url_name,
                    first
                ));
            } else {
                seen.insert(key, shown);
            }
        }

        let mut images = BTreeSet::new();
        for doc in &articles {
            let shown = display_path(doc.html_path(), root);
            for src in doc.image_paths() {
                match doc.resolve_image(&src) {
                    Ok(rel_path) => {
                        images.insert(rel_path);
                    }
                    Err(err) => problems.push(format!("{}: {}", shown, err)),
                }
            }
        }

        if !problems.is_empty() {
            return Err(BundleError::Validation(problems));
        }
        tracing::info!(
            "Bundle {} validated: {} articles, {} images",
            root.display(),
            articles.len(),
            images.len()
        );
        Ok(ValidatedBundle { articles, images })
    }

    /// Validate and draft-rewrite a bundle.
    ///
    /// Advances the bundle `New → Processing → Draft`, or to `Error` when
    /// validation or rewriting fails.
    pub fn stage(
        &self,
        root: &Path,
        docset: &Docset,
        base_url: &str,
        bundle: &mut Bundle,
    ) -> Result<StagedBundle, BundleError> {
        bundle.mark(BundleStatus::Processing);
        let validated = match self.validate(root) {
            Ok(validated) => validated,
            Err(err) => {
                bundle.mark(BundleStatus::Error);
                return Err(err);
            }
        };

        let mut articles = Vec::new();
        for mut doc in validated.articles {
            if let Err(err) = doc.rewrite_links_draft(
                &docset.docset_id,
                base_url,
                &self.config.article,
                &self.images,
            ) {
                bundle.mark(BundleStatus::Error);
                return Err(err.into());
            }
            articles.push(StagedArticle {
                url_name: doc.article().url_name.clone(),
                body: doc.article().body.clone(),
                record: doc.record_data(&self.config.record),
            });
        }

        let images = validated
            .images
            .into_iter()
            .map(|path| Image::new(path, RecordStatus::New))
            .collect::<Vec<_>>();

        bundle.mark(BundleStatus::Draft);
        tracing::info!(
            "Bundle {} staged for docset {}: {} articles, {} images",
            root.display(),
            docset.docset_id,
            articles.len(),
            images.len()
        );
        Ok(StagedBundle { articles, images })
    }

    /// Production-rewrite one staged article body
    pub fn publish_body(&self, html: &str) -> String {
        ArticleDoc::rewrite_links_production(html, &self.images)
    }

    /// Promote every staged `.html` file from `input` into `out`.
    ///
    /// Advances the bundle `Draft → Publishing → Published`, or to `Error`
    /// on I/O failure. Returns the number of articles published.
    pub fn publish(
        &self,
        input: &Path,
        out: &Path,
        bundle: &mut Bundle,
    ) -> Result<usize, BundleError> {
        bundle.mark(BundleStatus::Publishing);
        match self.publish_dir(input, out) {
            Ok(count) => {
                bundle.mark(BundleStatus::Published);
                tracing::info!("Published {} articles from {}", count, input.display());
                Ok(count)
            }
            Err(err) => {
                bundle.mark(BundleStatus::Error);
                Err(err)
            }
        }
    }

    fn publish_dir(&self, input: &Path, out: &Path) -> Result<usize, BundleError> {
        fs::create_dir_all(out).map_err(|source| BundleError::Io {
            action: "create",
            path: out.to_path_buf(),
            source,
        })?;
        let entries = fs::read_dir(input).map_err(|source| BundleError::Io {
            action: "read",
            path: input.to_path_buf(),
            source,
        })?;

        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|source| BundleError::Io {
                action: "read",
                path: input.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() || !is_html_path(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let html = fs::read_to_string(&path).map_err(|source| BundleError::Io {
                action: "read",
                path: path.clone(),
                source,
            })?;
            let target = out.join(entry.file_name());
            fs::write(&target, self.publish_body(&html)).map_err(|source| BundleError::Io {
                action: "write",
                path: target.clone(),
                source,
            })?;
            count += 1;
        }
        Ok(count)
    }
}

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
