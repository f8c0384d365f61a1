use anyhow::{Context, bail};
use clap::Parser;
use spectra_merge::engine::merge::MergeEngine;
use spectra_merge::engine::types::{InputFile, MergePhase, MergeSummary};
use spectra_merge::logging;
use spectra_merge::shared::config::model::{load_settings, load_settings_from};
use spectra_merge::shared::format::format_bytes;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "spectra_merge")]
#[command(about = "Merge downloaded spectral dataset files into batch files", long_about = None)]
struct Args {
    /// Input files, or directories searched for spectra_*.json
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory receiving merged_spectra_batch_NNN.json files
    #[arg(short, long, default_value = "merged")]
    output_dir: PathBuf,

    /// Configuration file (overrides SPECTRA_MERGE_CONFIG)
    #[arg(short, long)]
    config: Option<String>,

    /// Ignore the state of an interrupted run
    #[arg(long)]
    no_resume: bool,

    /// Progress poll interval in milliseconds
    #[arg(long, default_value = "250")]
    poll_ms: u64,
}

fn expand_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let pattern = input.join("spectra_*.json");
            let pattern = pattern.to_string_lossy();
            let mut found: Vec<PathBuf> = glob::glob(&pattern)
                .with_context(|| format!("Invalid input pattern {}", pattern))?
                .filter_map(|entry| match entry {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(target: "spectra_merge::inputs", error = %e, "Skipping unreadable path");
                        None
                    }
                })
                .collect();
            found.sort();
            info!(target: "spectra_merge::inputs", dir = %input.display(), files = found.len(), "Expanded input directory");
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn print_summary(summary: &MergeSummary, output_dir: &Path) {
    println!();
    println!("Merge summary");
    println!("  Datasets attempted: {}", summary.datasets_attempted);
    println!("  Datasets merged:    {}", summary.datasets_succeeded);
    println!("  Partial (memory):   {}", summary.datasets_partial);
    println!("  Capped:             {}", summary.datasets_capped);
    println!("  Empty:              {}", summary.datasets_empty);
    println!("  Corrupt:            {}", summary.datasets_corrupt);
    println!("  Spectra written:    {}", summary.records_written);
    println!("  Output size:        {}", format_bytes(summary.bytes_written));
    if summary.resumed_files > 0 {
        println!("  Resumed past:       {} files", summary.resumed_files);
    }
    if !summary.deferred_files.is_empty() {
        println!(
            "  Not merged yet:     {} files (run again to resume)",
            summary.deferred_files.len()
        );
    }
    println!("  Batches in {}:", output_dir.display());
    for batch in &summary.batches {
        println!(
            "    #{:03} {:<22} {:>4} datasets  {}",
            batch.number,
            batch.outcome.label(),
            batch.datasets_succeeded(),
            format_bytes(batch.bytes_written)
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings()?,
    };
    logging::init(&settings.logging)?;

    let inputs = expand_inputs(&args.inputs)?;
    if inputs.is_empty() {
        bail!("No input files found");
    }

    let mut merge = settings.merge.clone();
    if args.no_resume {
        merge.resume = false;
    }

    info!(target: "spectra_merge::main", files = inputs.len(), output = %args.output_dir.display(), "Starting merge");
    let handle = MergeEngine::builder()
        .merge_config(merge)
        .memory_config(settings.memory.clone())
        .build()
        .start(InputFile::discover_all(inputs), args.output_dir.clone())?;

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target: "spectra_merge::main", "Interrupted, finishing current file");
            cancel.cancel();
        }
    });

    let mut ticker = tokio::time::interval(Duration::from_millis(args.poll_ms.max(10)));
    let mut last_message = String::new();
    let last = loop {
        ticker.tick().await;
        let progress = handle.progress();
        if progress.status_message != last_message {
            println!(
                "[{}/{}] {}",
                progress.current_batch, progress.total_batches, progress.status_message
            );
            last_message = progress.status_message.clone();
        }
        if progress.is_terminal() {
            break progress;
        }
    };

    let summary = tokio::task::spawn_blocking(move || handle.join()).await??;
    print_summary(&summary, &args.output_dir);

    match last.phase {
        MergePhase::Failed => bail!(
            "Merge failed: {}",
            last.error.unwrap_or_else(|| "unknown error".to_string())
        ),
        MergePhase::Cancelled => {
            println!("Cancelled. Run again with the same output directory to resume.");
            Ok(())
        }
        _ => Ok(()),
    }
}
