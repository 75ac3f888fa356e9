//! CLI entry point for the image similarity index.
//!
//! Provides commands for building the index from an image directory,
//! adding images, searching by example, and clustering the corpus into
//! duplicate and similar groups.

use anyhow::Context;
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use indicatif::{ProgressBar, ProgressStyle};
use lookalike::embedding::{ClipEmbeddingProvider, EmbeddingProvider};
use lookalike::{
    ClusterReport, ClusterThresholds, ClusteringEngine, SearchEngine, Settings, SimilarityIndex,
    ingest,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(name = "lookalike")]
#[command(version, about = "Find duplicate and similar images by visual content")]
#[command(styles = clap_cargo_style())]
struct Cli {
    /// Path to a settings file (defaults to ./settings.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the index file (overrides the configured path)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a fresh index from every image under a directory
    Build {
        /// Directory to scan for images
        dir: PathBuf,
    },
    /// Add images to an existing index
    Add {
        /// Directory or single image to add
        path: PathBuf,
    },
    /// Search the index with an example image
    Search {
        /// Query image
        image: PathBuf,
        /// Maximum number of results
        #[arg(long)]
        top_k: Option<usize>,
        /// Minimum similarity for a result to appear
        #[arg(long)]
        min_similarity: Option<f32>,
        /// Emit results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cluster the whole index into duplicate and similar groups
    Analyze {
        /// Similarity at or above which images count as duplicates
        #[arg(long)]
        duplicate_threshold: Option<f32>,
        /// Similarity at or above which images count as similar
        #[arg(long)]
        similar_threshold: Option<f32>,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show index statistics
    Stats {
        /// Emit statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Serialize)]
struct SearchResultOutput {
    rank: usize,
    path: String,
    similarity: f32,
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::load().context("Failed to load settings")?,
    };
    if let Some(index) = &cli.index {
        settings.index_path = index.clone();
    }
    Ok(settings)
}

fn open_index(settings: &Settings) -> anyhow::Result<SimilarityIndex> {
    SimilarityIndex::load(&settings.index_path).with_context(|| {
        format!(
            "Failed to load index from {}\nRun `lookalike build <dir>` first",
            settings.index_path.display()
        )
    })
}

fn make_provider(settings: &Settings) -> anyhow::Result<ClipEmbeddingProvider> {
    ClipEmbeddingProvider::new(
        &settings.embedding.cache_dir,
        settings.embedding.show_download_progress,
    )
    .context("Failed to initialize the embedding model")
}

fn extraction_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{wide_bar} {pos}/{len} {msg}")
            .expect("static progress template is valid"),
    );
    bar
}

/// Scans `path` (a directory or a single image), extracts features, and
/// returns path/vector pairs ready for the index.
fn ingest_path(
    provider: &dyn EmbeddingProvider,
    path: &Path,
) -> anyhow::Result<Vec<(String, Vec<f32>)>> {
    let images = if path.is_dir() {
        ingest::find_images(path)
    } else {
        vec![path.to_path_buf()]
    };
    if images.is_empty() {
        anyhow::bail!("No images found under {}", path.display());
    }

    println!("Extracting features from {} image(s)...", images.len());
    let bar = extraction_bar(images.len() as u64);
    let report = ingest::extract_all(provider, &images, || bar.inc(1));
    bar.finish_and_clear();

    for (skipped, reason) in &report.skipped {
        eprintln!("Skipped {}: {}", skipped.display(), reason);
    }
    if report.is_empty() {
        anyhow::bail!("No usable images under {}", path.display());
    }
    Ok(report.vectors)
}

fn cmd_build(settings: &Settings, dir: &Path) -> anyhow::Result<()> {
    let start = Instant::now();
    let provider = make_provider(settings)?;
    let vectors = ingest_path(&provider, dir)?;

    let index = SimilarityIndex::build(&vectors).context("Failed to build index")?;
    index
        .save(&settings.index_path)
        .with_context(|| format!("Failed to save index to {}", settings.index_path.display()))?;

    println!(
        "Indexed {} vectors in {:.1}s ({})",
        index.len(),
        start.elapsed().as_secs_f64(),
        settings.index_path.display()
    );
    Ok(())
}

fn cmd_add(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    let index = open_index(settings)?;
    let provider = make_provider(settings)?;
    let vectors = ingest_path(&provider, path)?;

    let ids = index.add(&vectors).context("Failed to add vectors")?;
    index
        .save(&settings.index_path)
        .with_context(|| format!("Failed to save index to {}", settings.index_path.display()))?;

    println!("Added {} vectors ({} total)", ids.len(), index.len());
    Ok(())
}

fn cmd_search(
    settings: &Settings,
    image: &Path,
    top_k: Option<usize>,
    min_similarity: Option<f32>,
    json: bool,
) -> anyhow::Result<()> {
    let top_k = top_k.unwrap_or(settings.search.top_k);
    let min_similarity = min_similarity.unwrap_or(settings.search.min_similarity);

    let index = Arc::new(open_index(settings)?);
    let provider = make_provider(settings)?;
    let engine = SearchEngine::new(index);

    let hits = engine.search_image(&provider, image, top_k, min_similarity)?;

    if json {
        let output: Vec<SearchResultOutput> = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| SearchResultOutput {
                rank: i + 1,
                path: hit.record.source_path.clone(),
                similarity: hit.similarity.get(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No matches at or above similarity {min_similarity:.2}");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{:>3}. {:.4}  {}",
            i + 1,
            hit.similarity.get(),
            hit.record.source_path
        );
    }
    Ok(())
}

fn print_report(report: &ClusterReport) {
    for group in &report.groups {
        let representative = &group.representative.source_path;
        println!(
            "Group {} ({:?}, {} members, representative: {})",
            group.group_id,
            group.kind,
            group.members.len(),
            representative
        );
        for member in &group.members {
            println!(
                "  {:.4}  {}",
                member.similarity.get(),
                member.record.source_path
            );
        }
    }
    println!(
        "{} group(s), {} unique image(s)",
        report.groups.len(),
        report.unique.len()
    );
}

fn cmd_analyze(
    settings: &Settings,
    duplicate_threshold: Option<f32>,
    similar_threshold: Option<f32>,
    json: bool,
) -> anyhow::Result<()> {
    let duplicate = duplicate_threshold.unwrap_or(settings.clustering.duplicate_threshold);
    let similar = similar_threshold.unwrap_or(settings.clustering.similar_threshold);

    rayon::ThreadPoolBuilder::new()
        .num_threads(settings.clustering.parallel_threads)
        .build_global()
        .context("Failed to configure the thread pool")?;

    let index = open_index(settings)?;
    let thresholds = ClusterThresholds::new(duplicate, similar)?;
    let engine = ClusteringEngine::new(thresholds)
        .with_neighbor_cap(settings.clustering.neighbor_cap);

    let start = Instant::now();
    let report = engine.analyze(&index)?;
    let elapsed = start.elapsed();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
        println!(
            "Analyzed {} vectors in {:.1}s",
            index.len(),
            elapsed.as_secs_f64()
        );
    }
    Ok(())
}

fn cmd_stats(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let index = open_index(settings)?;
    let stats = index.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    println!("Index: {}", settings.index_path.display());
    println!("Vectors: {}", stats.total_vectors);
    match stats.dimension {
        Some(dimension) => println!("Dimension: {dimension}"),
        None => println!("Dimension: not yet fixed (empty index)"),
    }
    println!("Next id: {}", stats.next_id);
    Ok(())
}

fn cmd_config(settings: &Settings) -> anyhow::Result<()> {
    println!(
        "{}",
        toml::to_string_pretty(settings).context("Failed to render settings")?
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    match &cli.command {
        Commands::Build { dir } => cmd_build(&settings, dir),
        Commands::Add { path } => cmd_add(&settings, path),
        Commands::Search {
            image,
            top_k,
            min_similarity,
            json,
        } => cmd_search(&settings, image, *top_k, *min_similarity, *json),
        Commands::Analyze {
            duplicate_threshold,
            similar_threshold,
            json,
        } => cmd_analyze(&settings, *duplicate_threshold, *similar_threshold, *json),
        Commands::Stats { json } => cmd_stats(&settings, *json),
        Commands::Config => cmd_config(&settings),
    }
}
