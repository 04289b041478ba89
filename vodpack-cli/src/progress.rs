use std::time::Duration;

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use vodpack_engine::{Phase, ProgressEvent, ProgressSink};

const DOWNLOAD_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments {msg}";
const ARCHIVE_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.magenta/blue}] {pos}/{len} chunks {msg}";

/// Renders job progress on a single terminal bar.
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new(hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        bar.set_style(style(DOWNLOAD_TEMPLATE));
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

impl ProgressSink for ProgressReporter {
    fn on_progress(&self, event: &ProgressEvent) {
        match event.phase {
            Phase::Starting => {
                self.bar.set_length(event.units_total as u64);
                self.bar.set_position(0);
                self.bar.set_message("starting");
            }
            Phase::Downloading => {
                self.bar.set_position(event.units_done as u64);
                let total = event
                    .bytes_total
                    .map(|b| format!(" of ~{}", HumanBytes(b)))
                    .unwrap_or_default();
                let rate = event
                    .instantaneous_throughput
                    .map(|r| format!(" @ {}/s", HumanBytes(r as u64)))
                    .unwrap_or_default();
                self.bar
                    .set_message(format!("{}{total}{rate}", HumanBytes(event.bytes_done)));
            }
            Phase::Archiving => {
                if self.bar.length() != Some(event.units_total as u64) {
                    self.bar.set_style(style(ARCHIVE_TEMPLATE));
                    self.bar.set_length(event.units_total as u64);
                }
                self.bar.set_position(event.units_done as u64);
                let size = event.archive_size_bytes.unwrap_or(0);
                self.bar
                    .set_message(format!("encoding {} archive", HumanBytes(size)));
            }
            Phase::Complete => self.bar.finish_with_message("done"),
            Phase::Cancelled => self.bar.abandon_with_message("cancelled"),
            Phase::Failed => self.bar.abandon_with_message("failed"),
        }
    }
}
