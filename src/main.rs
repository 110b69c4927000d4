//! CLI entry point for framesift.
//!
//! Provides commands for ingesting videos, searching them with natural
//! language, deleting indexed videos, and inspecting index state.

use anyhow::{Context, Result, bail};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use framesift::{
    ClipEncoder, FfmpegSampler, SearchResult, Settings, VideoIndexer,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Container extensions considered when scanning a directory.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "webm"];

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "framesift",
    version,
    about = "Search your videos with natural language",
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to a custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up a .framesift directory with a default settings file
    Init {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },

    /// Sample, encode, and index one or more videos
    Ingest {
        /// Video files to ingest
        #[arg(required_unless_present = "dir")]
        paths: Vec<PathBuf>,

        /// Ingest every video found under this directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Search indexed videos with a natural-language query
    Search {
        /// What to look for, e.g. "a dog catching a frisbee"
        query: String,

        /// Number of results to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Restrict the search to one indexed video id
        #[arg(long)]
        video: Option<String>,

        /// Cut a preview clip for each result
        #[arg(long)]
        clips: bool,

        /// Copy each result's preview frame into this directory
        #[arg(long, value_name = "DIR")]
        save_frames: Option<PathBuf>,

        /// Emit results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a video's frames and embeddings from the index
    Delete {
        /// Video id (the file stem used at ingest time)
        video_id: String,
    },

    /// Show index statistics
    Stats {
        /// Emit statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display active settings
    Config,
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    result_count: usize,
    results: &'a [SearchResult],
}

fn load_settings(config: Option<&PathBuf>) -> Result<Settings> {
    let settings = match config {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            Settings::load_from(path)?
        }
        None => Settings::load()?,
    };
    Ok(settings)
}

fn open_indexer(settings: Settings) -> Result<VideoIndexer> {
    let settings = Arc::new(settings);
    let encoder =
        Arc::new(ClipEncoder::new(&settings).context("Failed to initialize the CLIP encoder")?);
    let indexer = VideoIndexer::open(settings, encoder, Box::new(FfmpegSampler::new()))?;
    Ok(indexer)
}

fn collect_videos(dir: &PathBuf) -> Result<Vec<PathBuf>> {
    let mut videos = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_video = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if is_video {
            videos.push(entry.into_path());
        }
    }
    videos.sort();
    Ok(videos)
}

fn cmd_ingest(settings: Settings, paths: Vec<PathBuf>, dir: Option<PathBuf>) -> Result<()> {
    let mut videos = paths;
    if let Some(dir) = dir {
        videos.extend(collect_videos(&dir)?);
    }
    if videos.is_empty() {
        bail!("No videos to ingest");
    }

    let mut indexer = open_indexer(settings)?;

    let bar = ProgressBar::new(videos.len() as u64).with_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .expect("static progress template is valid"),
    );

    let mut failures = 0usize;
    for path in &videos {
        bar.set_message(path.display().to_string());
        match indexer.ingest(path) {
            Ok(report) => {
                bar.println(format!(
                    "Indexed '{}': {} frames",
                    report.video_id, report.frames_extracted
                ));
            }
            Err(e) => {
                failures += 1;
                bar.println(format!("Failed to ingest '{}': {e}", path.display()));
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    let stats = indexer.stats();
    println!(
        "Index now holds {} frames across {} videos",
        stats.frame_count, stats.video_count
    );
    if failures > 0 {
        bail!("{failures} of {} videos failed to ingest", videos.len());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_search(
    settings: Settings,
    query: &str,
    top_k: Option<usize>,
    video: Option<String>,
    clips: bool,
    save_frames: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let top_k = top_k.unwrap_or(settings.search.default_top_k);
    let indexer = open_indexer(settings)?;

    let mut results = indexer.search(query, top_k, video.as_deref())?;
    if clips {
        indexer.materialize_clips(&mut results)?;
    }
    if let Some(dest) = save_frames {
        let copied = indexer.save_result_frames(&results, &dest)?;
        if !json {
            println!("Saved {} result frames to {}", copied.len(), dest.display());
        }
    }

    if json {
        let output = SearchOutput {
            query,
            result_count: results.len(),
            results: &results,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results for '{query}'");
        return Ok(());
    }

    println!("Results for '{query}':\n");
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{:2}. {} @ {:.1}s  (score {:.3})",
            rank + 1,
            result.video_id,
            result.timestamp,
            result.score
        );
        println!("    frame: {}", result.frame_path.display());
        match &result.clip {
            Some(framesift::ClipRef::Saved { path }) => {
                println!("    clip:  {}", path.display());
            }
            Some(framesift::ClipRef::FullVideo { path, start_offset }) => {
                println!(
                    "    clip:  (extraction failed) {} from {:.1}s",
                    path.display(),
                    start_offset
                );
            }
            None => {}
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("Created {}", path.display());
            Ok(())
        }
        Commands::Ingest { paths, dir } => {
            let settings = load_settings(cli.config.as_ref())?;
            cmd_ingest(settings, paths, dir)
        }
        Commands::Search {
            query,
            top_k,
            video,
            clips,
            save_frames,
            json,
        } => {
            let settings = load_settings(cli.config.as_ref())?;
            cmd_search(settings, &query, top_k, video, clips, save_frames, json)
        }
        Commands::Delete { video_id } => {
            let settings = load_settings(cli.config.as_ref())?;
            let mut indexer = open_indexer(settings)?;
            let report = indexer.delete_video(&video_id)?;
            if report.removed_count == 0 {
                println!("Video '{video_id}' was not indexed; nothing to do");
            } else {
                println!(
                    "Deleted '{video_id}': removed {} frames",
                    report.removed_count
                );
            }
            Ok(())
        }
        Commands::Stats { json } => {
            let settings = load_settings(cli.config.as_ref())?;
            let indexer = open_indexer(settings)?;
            let stats = indexer.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Videos:     {}", stats.video_count);
                println!("Frames:     {}", stats.frame_count);
                println!("Dimension:  {}", stats.dimension);
                println!("Generation: {}", stats.generation);
                println!("Model:      {}", stats.model_name);
            }
            Ok(())
        }
        Commands::Config => {
            let settings = load_settings(cli.config.as_ref())?;
            println!("{}", toml::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        // Surface the structured code when the failure came from the index
        if let Some(index_err) = e.downcast_ref::<framesift::IndexError>() {
            eprintln!("Code: {}", index_err.status_code());
            for suggestion in index_err.recovery_suggestions() {
                eprintln!("Hint: {suggestion}");
            }
        }
        std::process::exit(1);
    }
}
