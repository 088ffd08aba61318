//! HTML article transformer
//!
//! This module parses article metadata out of authoring-tool HTML exports,
//! enforces the tag/attribute/link whitelists, and rewrites hyperlinks and
//! image references for a publish stage.
//!
//! An article document carries its fields in `<meta name=... content=...>`
//! tags, its title in `<title>`, and its body as the first `<div>` whose
//! class contains the configured body class token. Draft staging rewrites
//! bundle-internal links to knowledge-base article URLs (subject to the
//! link-limit policy) and image references to draft image-store URLs;
//! production promotion swaps draft image URLs for their public form.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use kuchikiki::traits::TendrilSink;
use kuchikiki::{ElementData, NodeDataRef, NodeRef};
use serde_json::{json, Map, Value};
use thiserror::Error;
use url::Url;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::{ArticleConfig, Config, RecordConfig, WhitelistConfig};
use crate::models::Article;
use crate::services::allowlist::UrlAllowlist;
use crate::services::images::ImageUrls;

/// Article transformation errors
#[derive(Debug, Error)]
pub enum HtmlError {
    /// File could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A required meta tag is absent
    #[error("Meta tag name={0} not found")]
    MetaTagNotFound(String),
    /// A required meta tag is present but empty
    #[error("Meta tag name={0} has no content")]
    MetaTagEmpty(String),
    /// No `<title>` element
    #[error("Article title not found")]
    TitleNotFound,
    /// No body container div
    #[error("Body tag <div class={0} ...> not found")]
    BodyNotFound(String),
    /// An image reference does not resolve to a file on disk
    #[error("Image {src} not found (resolved to {})", resolved.display())]
    ImageNotFound { src: String, resolved: PathBuf },
    /// An image reference resolves outside the bundle root
    #[error("Image {src} escapes the bundle root")]
    ImageOutsideBundle { src: String },
    /// Bundle directory walk failed
    #[error("Failed to walk bundle directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// An article parsed from a bundle HTML file
#[derive(Debug, Clone)]
pub struct ArticleDoc {
    html_path: PathBuf,
    root_path: PathBuf,
    article: Article,
}

enum MetaLookup {
    Missing,
    Empty,
    Value(String),
}

impl ArticleDoc {
    /// Parse an article from an HTML file inside a bundle tree.
    pub fn parse(html_path: &Path, root_path: &Path, config: &Config) -> Result<Self, HtmlError> {
        let html = fs::read_to_string(html_path).map_err(|source| HtmlError::Io {
            path: html_path.to_path_buf(),
            source,
        })?;
        Self::from_html(&html, html_path, root_path, config)
    }

    /// Parse an article from an HTML string. `html_path` and `root_path`
    /// locate the document within its bundle for image resolution.
    pub fn from_html(
        html: &str,
        html_path: &Path,
        root_path: &Path,
        config: &Config,
    ) -> Result<Self, HtmlError> {
        let document = kuchikiki::parse_html().one(html);
        let article_cfg = &config.article;

        let url_name = required_meta(&document, "UrlName")?;
        let summary = optional_meta(&document, "description");
        let is_visible_in_csp = required_bool_meta(&document, "is-visible-in-csp")?;
        let is_visible_in_pkb = required_bool_meta(&document, "is-visible-in-pkb")?;
        let is_visible_in_prm = required_bool_meta(&document, "is-visible-in-prm")?;
        let author = required_meta(&document, &article_cfg.author_meta)?;
        let docset_id = optional_meta(&document, "ProductMapUUID");
        let topics = optional_meta(&document, "HubTopics");
        let article_type = optional_meta(&document, "ArticleType");
        let author_override = optional_meta(&document, &article_cfg.author_override_meta);

        let title = document
            .select_first("title")
            .map_err(|_| HtmlError::TitleNotFound)?
            .as_node()
            .text_contents();

        let body_div = select(&document, "div")
            .find(|div| {
                let attrs = div.attributes.borrow();
                attrs
                    .get("class")
                    .map(|classes| {
                        classes
                            .split_ascii_whitespace()
                            .any(|token| token == article_cfg.body_class)
                    })
                    .unwrap_or(false)
            })
            .ok_or_else(|| HtmlError::BodyNotFound(article_cfg.body_class.clone()))?;
        let body = inner_html(body_div.as_node());

        Ok(Self {
            html_path: normalize_path(html_path),
            root_path: normalize_path(root_path),
            article: Article {
                url_name,
                title,
                summary,
                is_visible_in_csp,
                is_visible_in_pkb,
                is_visible_in_prm,
                author,
                author_override,
                docset_id,
                topics,
                article_type,
                body,
            },
        })
    }

    /// The parsed article fields
    pub fn article(&self) -> &Article {
        &self.article
    }

    /// Path of the source HTML file
    pub fn html_path(&self) -> &Path {
        &self.html_path
    }

    /// Knowledge-base record data for this article
    pub fn record_data(&self, record: &RecordConfig) -> Map<String, Value> {
        let a = &self.article;
        let mut data = Map::new();
        data.insert("UrlName".to_string(), json!(a.url_name));
        data.insert("Title".to_string(), json!(a.title));
        data.insert("Summary".to_string(), json!(a.summary));
        data.insert("IsVisibleInCsp".to_string(), json!(a.is_visible_in_csp));
        data.insert("IsVisibleInPkb".to_string(), json!(a.is_visible_in_pkb));
        data.insert("IsVisibleInPrm".to_string(), json!(a.is_visible_in_prm));
        data.insert("Article_Type__c".to_string(), json!(a.article_type));
        data.insert("Topics__c".to_string(), json!(a.topics));
        data.insert(record.body_field.clone(), json!(a.body));
        data.insert(record.author_field.clone(), json!(a.author));
        data.insert(record.author_override_field.clone(), json!(a.author_override));
        data
    }

    /// Paths of images referenced by the article body
    pub fn image_paths(&self) -> BTreeSet<String> {
        let body = parse_body_fragment(&self.article.body);
        select(&body, "img")
            .filter_map(|img| img.attributes.borrow().get("src").map(str::to_string))
            .collect()
    }

    /// Check the article body against the tag/attribute whitelist and the
    /// URL allowlist. Returns every problem found; an empty vec means the
    /// body is clean.
    pub fn scrub(&self, whitelist: &WhitelistConfig, allowlist: &UrlAllowlist) -> Vec<String> {
        let body = parse_body_fragment(&self.article.body);
        let mut problems = Vec::new();
        scrub_tree(&body, whitelist, allowlist, &mut problems);
        problems
    }

    /// Rewrite article links and image references for the draft stage.
    ///
    /// Bundle-internal hyperlinks become knowledge-base article URLs; the
    /// first `link_limit` stay site-relative and the rest get `base_url`
    /// prepended. Image references are resolved on disk and pointed at the
    /// draft image store.
    pub fn rewrite_links_draft(
        &mut self,
        docset_id: &Uuid,
        base_url: &str,
        config: &ArticleConfig,
        images: &ImageUrls,
    ) -> Result<(), HtmlError> {
        let body = parse_body_fragment(&self.article.body);

        let mut link_count: u32 = 1;
        for anchor in select(&body, "a") {
            let href = { anchor.attributes.borrow().get("href").map(str::to_string) };
            let Some(href) = href else { continue };
            if let Some(new_href) = rewrite_href(&href, link_count, base_url, config) {
                anchor.attributes.borrow_mut().insert("href", new_href);
                link_count += 1;
            }
        }

        for img in select(&body, "img") {
            let src = { img.attributes.borrow().get("src").map(str::to_string) };
            let Some(src) = src else { continue };
            let rel_path = self.resolve_image(&src)?;
            img.attributes
                .borrow_mut()
                .insert("src", images.draft_url(docset_id, &rel_path));
        }

        self.article.body = inner_html(&body);
        Ok(())
    }

    /// Rewrite staged body HTML for production: draft image URLs become
    /// public image URLs, everything else passes through.
    pub fn rewrite_links_production(html: &str, images: &ImageUrls) -> String {
        let body = parse_body_fragment(html);
        for img in select(&body, "img") {
            let src = { img.attributes.borrow().get("src").map(str::to_string) };
            if let Some(src) = src {
                img.attributes.borrow_mut().insert("src", images.to_public(&src));
            }
        }
        inner_html(&body)
    }

    /// Resolve an image `src` to its bundle-relative path (forward
    /// slashes), verifying the file exists inside the bundle.
    pub fn resolve_image(&self, src: &str) -> Result<String, HtmlError> {
        let decoded = urlencoding::decode(src)
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| src.to_string());
        let dir = self.html_path.parent().unwrap_or_else(|| Path::new(""));
        let resolved = normalize_path(&dir.join(&decoded));

        let rel_path = match resolved.strip_prefix(&self.root_path) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                return Err(HtmlError::ImageOutsideBundle {
                    src: src.to_string(),
                })
            }
        };
        if !resolved.exists() {
            return Err(HtmlError::ImageNotFound {
                src: src.to_string(),
                resolved,
            });
        }
        Ok(path_to_url(&rel_path))
    }

    /// Compare this article with a knowledge-base record. Two absent or
    /// empty values compare equal; the body comparison uses the
    /// production-rewritten, trimmed form. Differences are logged.
    pub fn matches_record(
        &self,
        record: &Value,
        record_cfg: &RecordConfig,
        images: &ImageUrls,
    ) -> bool {
        let a = &self.article;
        let mut differences = Vec::new();

        diff_str(
            &mut differences,
            "author",
            Some(&a.author),
            record_str(record, &record_cfg.author_field),
        );
        diff_str(
            &mut differences,
            "author_override",
            a.author_override.as_deref(),
            record_str(record, &record_cfg.author_override_field),
        );
        diff_bool(
            &mut differences,
            "is_visible_in_csp",
            a.is_visible_in_csp,
            record_bool(record, "IsVisibleInCsp"),
        );
        diff_bool(
            &mut differences,
            "is_visible_in_pkb",
            a.is_visible_in_pkb,
            record_bool(record, "IsVisibleInPkb"),
        );
        diff_bool(
            &mut differences,
            "is_visible_in_prm",
            a.is_visible_in_prm,
            record_bool(record, "IsVisibleInPrm"),
        );
        diff_str(
            &mut differences,
            "title",
            Some(&a.title),
            record_str(record, "Title"),
        );
        diff_str(
            &mut differences,
            "summary",
            a.summary.as_deref(),
            record_str(record, "Summary"),
        );

        let body = Self::rewrite_links_production(&a.body, images);
        let record_body = record_str(record, &record_cfg.body_field).unwrap_or("");
        diff_str(
            &mut differences,
            "body",
            Some(body.trim()),
            Some(record_body.trim()),
        );

        if !differences.is_empty() {
            tracing::info!("Article {} updated: {:?}", a.url_name, differences);
        }
        differences.is_empty()
    }
}

/// Collect the HTML files of a bundle directory, skipping hidden files and
/// the configured skip list.
pub fn collect_html_files(
    root: &Path,
    config: &ArticleConfig,
) -> Result<BTreeSet<PathBuf>, HtmlError> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !is_html_path(&name) {
            continue;
        }
        if should_skip(&name, config) {
            let shown = entry.path().strip_prefix(root).unwrap_or_else(|_| entry.path());
            tracing::info!("Skipping file: {}", shown.display());
            continue;
        }
        files.insert(entry.path().to_path_buf());
    }
    Ok(files)
}

/// Whether a path names an HTML file (`.html`/`.htm`, case-insensitive)
pub fn is_html_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
        .unwrap_or(false)
}

fn should_skip(name: &str, config: &ArticleConfig) -> bool {
    name.starts_with('.') || config.skip_files.iter().any(|skip| skip == name)
}

/// Compute the rewritten href for a bundle-internal article link, or
/// `None` if the link should be left untouched.
fn rewrite_href(
    href: &str,
    link_count: u32,
    base_url: &str,
    config: &ArticleConfig,
) -> Option<String> {
    // Links with a scheme point outside the bundle
    if Url::parse(href).is_ok() {
        return None;
    }
    let (without_fragment, fragment) = match href.split_once('#') {
        Some((head, frag)) => (head, Some(frag).filter(|f| !f.is_empty())),
        None => (href, None),
    };
    let path = without_fragment
        .split_once('?')
        .map(|(head, _)| head)
        .unwrap_or(without_fragment);
    if path.is_empty() || !is_html_path(path) {
        return None;
    }

    let basename = path.rsplit('/').next().unwrap_or(path);
    let stem = Path::new(basename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| basename.to_string());

    let base = if link_count > config.link_limit {
        base_url
    } else {
        ""
    };
    let mut new_href = format!("{}{}{}", base, config.url_path_prefix, stem);
    if let Some(fragment) = fragment {
        new_href.push('#');
        new_href.push_str(fragment);
    }
    Some(new_href)
}

fn scrub_tree(
    node: &NodeRef,
    whitelist: &WhitelistConfig,
    allowlist: &UrlAllowlist,
    problems: &mut Vec<String>,
) {
    for child in node.children() {
        let Some(element) = child.as_element() else {
            continue;
        };
        let tag: &str = &element.name.local;
        if !whitelist.allows_tag(tag) {
            problems.push(format!("Tag \"{}\" not in whitelist", tag));
            continue;
        }
        {
            let attrs = element.attributes.borrow();
            for name in attrs.map.keys() {
                let attr: &str = &name.local;
                if !whitelist.allows_attr(tag, attr) {
                    problems.push(format!(
                        "Tag \"{}\" attribute \"{}\" not in whitelist",
                        tag, attr
                    ));
                }
                if attr == "href" || attr == "src" {
                    if let Some(value) = attrs.get(attr) {
                        if !allowlist.is_allowed(value) {
                            problems.push(format!("URL {} not whitelisted", value));
                        }
                    }
                }
            }
        }
        scrub_tree(&child, whitelist, allowlist, problems);
    }
}

fn find_meta(document: &NodeRef, name: &str) -> MetaLookup {
    for meta in select(document, "meta") {
        let attrs = meta.attributes.borrow();
        if attrs.get("name") == Some(name) {
            return match attrs.get("content") {
                Some(content) if !content.is_empty() => MetaLookup::Value(content.to_string()),
                _ => MetaLookup::Empty,
            };
        }
    }
    MetaLookup::Missing
}

fn required_meta(document: &NodeRef, name: &str) -> Result<String, HtmlError> {
    match find_meta(document, name) {
        MetaLookup::Value(value) => Ok(value),
        MetaLookup::Empty => Err(HtmlError::MetaTagEmpty(name.to_string())),
        MetaLookup::Missing => Err(HtmlError::MetaTagNotFound(name.to_string())),
    }
}

fn required_bool_meta(document: &NodeRef, name: &str) -> Result<bool, HtmlError> {
    Ok(required_meta(document, name)?.eq_ignore_ascii_case("true"))
}

fn optional_meta(document: &NodeRef, name: &str) -> Option<String> {
    match find_meta(document, name) {
        MetaLookup::Value(value) => Some(value),
        MetaLookup::Empty | MetaLookup::Missing => None,
    }
}

fn record_str<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

fn record_bool(record: &Value, field: &str) -> bool {
    record.get(field).and_then(Value::as_bool).unwrap_or(false)
}

fn diff_str(
    differences: &mut Vec<(String, String, String)>,
    name: &str,
    ours: Option<&str>,
    theirs: Option<&str>,
) {
    let ours = ours.filter(|s| !s.is_empty());
    let theirs = theirs.filter(|s| !s.is_empty());
    if ours != theirs {
        differences.push((name.to_string(), summarize(ours), summarize(theirs)));
    }
}

fn diff_bool(differences: &mut Vec<(String, String, String)>, name: &str, ours: bool, theirs: bool) {
    if ours != theirs {
        differences.push((name.to_string(), ours.to_string(), theirs.to_string()));
    }
}

fn summarize(value: Option<&str>) -> String {
    match value {
        None => "<unset>".to_string(),
        Some(v) if v.chars().count() > 75 => {
            format!("{}...", v.chars().take(20).collect::<String>())
        }
        Some(v) => v.to_string(),
    }
}

fn select(node: &NodeRef, selector: &str) -> impl Iterator<Item = NodeDataRef<ElementData>> {
    node.select(selector).into_iter().flatten()
}

/// Parse an HTML fragment and return the node holding its content.
///
/// The full-document parser wraps fragments in html/head/body scaffolding;
/// flow content lands under `<body>`, which is what callers iterate and
/// re-serialize.
fn parse_body_fragment(html: &str) -> NodeRef {
    let document = kuchikiki::parse_html().one(html);
    document
        .select_first("body")
        .map(|body| body.as_node().clone())
        .unwrap_or(document)
}

fn inner_html(node: &NodeRef) -> String {
    let mut bytes = Vec::new();
    for child in node.children() {
        // serializing into a Vec cannot fail
        let _ = child.serialize(&mut bytes);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Lexically normalize a path, resolving `.` and `..` components without
/// touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal =
                    matches!(out.components().next_back(), Some(Component::Normal(_)));
                if last_is_normal {
                    out.pop();
                } else if out.components().next_back() != Some(Component::RootDir) {
                    // the parent of the root is the root
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn path_to_url(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
