use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use vodpack_engine::VariantSelectionPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "vodpack",
    about = "Capture an HLS playlist, download its segments and pack them into a zip",
    version,
    author
)]
pub struct CliArgs {
    /// Playlist URL (http/https) or path to a local .m3u8 file
    #[arg(required = true)]
    pub input: String,

    /// Base URL for resolving segment references of a local playlist file
    #[arg(long)]
    pub base_url: Option<String>,

    /// Title used for the archive name and the remuxed output
    #[arg(short, long)]
    pub title: Option<String>,

    /// Directory the archive is written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Segments downloaded concurrently per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Segments downloaded concurrently per batch during the retry pass
    #[arg(long)]
    pub retry_batch_size: Option<usize>,

    /// Per-segment request timeout in seconds, 0 disables it
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Variant to pick from a master playlist: highest, lowest or WIDTHxHEIGHT
    #[arg(long, default_value = "highest", value_parser = parse_variant)]
    pub variant: VariantSelectionPolicy,

    /// Accept playlists that are not marked as VOD
    #[arg(long)]
    pub allow_live: bool,

    /// Write the base64-encoded archive instead of the decoded zip
    #[arg(long)]
    pub keep_encoded: bool,

    /// Configuration file path
    #[arg(short, long, env = "VODPACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl CliArgs {
    pub fn is_remote_input(&self) -> bool {
        let lower = self.input.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }
}

fn parse_variant(value: &str) -> Result<VariantSelectionPolicy, String> {
    match value.to_ascii_lowercase().as_str() {
        "highest" | "best" => Ok(VariantSelectionPolicy::HighestBandwidth),
        "lowest" | "worst" => Ok(VariantSelectionPolicy::LowestBandwidth),
        other => {
            let (width, height) = other.split_once('x').ok_or_else(|| {
                format!("invalid variant `{value}`, expected highest, lowest or WIDTHxHEIGHT")
            })?;
            Ok(VariantSelectionPolicy::MatchingResolution {
                width: u64::from_str(width).map_err(|e| format!("invalid width: {e}"))?,
                height: u64::from_str(height).map_err(|e| format!("invalid height: {e}"))?,
            })
        }
    }
}
