//! kbpress - knowledge-base article publishing pipeline

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use kbpress::{
    config::Config,
    models::{AllowedLinkset, Bundle, Docset},
    services::{ArticleDoc, BundleProcessor},
};

#[derive(Parser)]
#[command(
    name = "kbpress",
    version,
    about = "Knowledge-base article publishing pipeline"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "config.yml")]
    config: PathBuf,

    /// YAML file of allowed-linkset records merged into the URL allowlist
    #[arg(long, global = true)]
    linksets: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate an article bundle without rewriting anything
    Validate {
        /// Bundle directory
        bundle_dir: PathBuf,
    },
    /// Validate and draft-rewrite a bundle, writing staged output
    Stage {
        /// Bundle directory
        bundle_dir: PathBuf,
        /// Docset the bundle belongs to
        #[arg(long)]
        docset_id: Uuid,
        /// Base URL prepended to article links past the link limit
        #[arg(long, default_value = "")]
        base_url: String,
        /// Output directory for staged bodies and record data
        #[arg(long)]
        out: PathBuf,
    },
    /// Rewrite staged article bodies for production
    Publish {
        /// Directory of staged article bodies
        #[arg(long)]
        input: PathBuf,
        /// Output directory
        #[arg(long)]
        out: PathBuf,
    },
    /// Parse a single article and print its record data
    Inspect {
        /// Article HTML file
        file: PathBuf,
        /// Bundle root the file belongs to (defaults to its directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kbpress=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load_with_env(&cli.config)?;
    let linksets = load_linksets(cli.linksets.as_deref())?;

    match cli.command {
        Command::Validate { bundle_dir } => {
            let processor = BundleProcessor::with_linksets(config, &linksets)?;
            let validated = processor.validate(&bundle_dir)?;
            println!(
                "Bundle OK: {} articles, {} images",
                validated.articles.len(),
                validated.images.len()
            );
        }
        Command::Stage {
            bundle_dir,
            docset_id,
            base_url,
            out,
        } => {
            let processor = BundleProcessor::with_linksets(config, &linksets)?;
            let name = dir_name(&bundle_dir);
            let docset = Docset::new(docset_id, name.clone());
            let mut bundle = Bundle::new(name.clone(), name);
            let staged = processor.stage(&bundle_dir, &docset, &base_url, &mut bundle)?;

            fs::create_dir_all(&out).with_context(|| {
                format!("Failed to create output directory {}", out.display())
            })?;
            for article in &staged.articles {
                let path = out.join(format!("{}.html", article.url_name));
                fs::write(&path, &article.body)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            let records: Vec<_> = staged.articles.iter().map(|a| &a.record).collect();
            fs::write(
                out.join("articles.json"),
                serde_json::to_string_pretty(&records)?,
            )
            .context("Failed to write articles.json")?;
            fs::write(
                out.join("images.json"),
                serde_json::to_string_pretty(&staged.images)?,
            )
            .context("Failed to write images.json")?;

            println!(
                "Staged {} articles and {} images to {} (bundle status: {})",
                staged.articles.len(),
                staged.images.len(),
                out.display(),
                bundle.status
            );
        }
        Command::Publish { input, out } => {
            let processor = BundleProcessor::new(config)?;
            let name = dir_name(&input);
            let mut bundle = Bundle::new(name.clone(), name);
            let count = processor.publish(&input, &out, &mut bundle)?;
            println!(
                "Published {} articles to {} (bundle status: {})",
                count,
                out.display(),
                bundle.status
            );
        }
        Command::Inspect { file, root } => {
            let root = root
                .or_else(|| file.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."));
            let doc = ArticleDoc::parse(&file, &root, &config)?;
            let record = doc.record_data(&config.record);
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string())
}

fn load_linksets(path: Option<&Path>) -> Result<Vec<AllowedLinkset>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read linksets file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse linksets file {}", path.display()))
}
