mod cli;
mod config;
mod error;
mod progress;
mod sink;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use mimalloc::MiMalloc;
use reqwest::Client;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use vodpack_engine::{
    HttpSegmentFetcher, JobOutcome, Session, create_client, fetch_playlist, select_variant,
};

use crate::cli::CliArgs;
use crate::config::{FileConfig, engine_config};
use crate::error::{AppError, Result};
use crate::progress::ProgressReporter;
use crate::sink::FileArchiveSink;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        match e {
            AppError::Cancelled => warn!("{e}"),
            _ => error!("Application error: {e}"),
        }
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("vodpack=debug,vodpack_engine=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("vodpack=info,vodpack_engine=info").add_directive(Level::WARN.into())
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run(args: CliArgs) -> Result<()> {
    let file_config = FileConfig::load(args.config.as_deref())?;
    let config = engine_config(&args, &file_config)?;
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| file_config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let client = create_client(&config.http)?;
    let (source_url, content) = load_playlist(&client, &args).await?;
    let request_timeout = config.download.request_timeout;
    let session = Session::new(
        config,
        Arc::new(HttpSegmentFetcher::new(client).with_request_timeout(request_timeout)),
    )?;

    let capture = session.ingest(&content, &source_url, args.title.as_deref())?;
    if let Some(summary) = session.manifest(&capture.id).map(|m| m.summary()) {
        info!(
            name = %summary.display_name,
            segments = summary.segment_count,
            duration = ?summary.duration_seconds,
            resolution = ?summary.resolution.map(|r| r.to_string()),
            "Captured playlist"
        );
    }

    let sink = Arc::new(FileArchiveSink::new(output_dir, args.keep_encoded));
    let reporter = Arc::new(ProgressReporter::new(args.quiet));
    let handle = session.download(capture.id, sink.clone(), reporter)?;

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling download");
            token.cancel();
        }
    });

    match handle.wait().await {
        JobOutcome::Complete(report) => {
            if !report.skipped_media.is_empty() {
                warn!(
                    skipped = report.skipped_media.len(),
                    "Some media segments could not be downloaded and were left out"
                );
                for url in &report.skipped_media {
                    debug!(url = %url, "Skipped segment");
                }
            }
            for path in sink.written() {
                println!("{}", path.display());
            }
            Ok(())
        }
        JobOutcome::Cancelled => Err(AppError::Cancelled),
        JobOutcome::Failed(err) => Err(err.into()),
    }
}

/// Reads the playlist from a URL or a local file, returning its base URL and text.
///
/// Master playlists are resolved to one variant first.
async fn load_playlist(client: &Client, args: &CliArgs) -> Result<(String, String)> {
    if !args.is_remote_input() {
        let base_url = args.base_url.clone().ok_or_else(|| {
            AppError::InvalidInput("--base-url is required for a local playlist file".to_string())
        })?;
        let content = tokio::fs::read_to_string(&args.input).await?;
        return resolve_master(client, args, base_url, content).await;
    }

    let (final_url, content) = fetch_playlist(client, &args.input).await?;
    resolve_master(client, args, final_url, content).await
}

async fn resolve_master(
    client: &Client,
    args: &CliArgs,
    base_url: String,
    content: String,
) -> Result<(String, String)> {
    match select_variant(&content, &base_url, &args.variant)? {
        Some(variant_url) => {
            info!(url = %variant_url, "Master playlist detected, using selected variant");
            Ok(fetch_playlist(client, &variant_url).await?)
        }
        None => Ok((base_url, content)),
    }
}
