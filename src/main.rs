use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use squidle_dl::{Config, Event, Pipeline, RunSummary, Stage, cancel_on_signal};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Download images and poses for SQUIDLE+ campaigns
#[derive(Parser)]
#[clap(version, about)]
struct Opts {
    /// Campaign name to download (repeatable)
    #[clap(short, long = "campaign", value_name = "NAME", required = true)]
    campaigns: Vec<String>,

    /// Catalog server base URL
    #[clap(long, env = "SQUIDLE_URL", default_value = "https://soi.squidle.org")]
    url: String,

    /// API token sent with every catalog request
    #[clap(long, env = "SQUIDLE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Output directory for the manifest and images
    #[clap(short, long, default_value = "squidle_download")]
    output: PathBuf,

    /// Parallel metadata lookups and downloads
    #[clap(short, long, default_value_t = 8)]
    workers: usize,

    /// Page size for catalog listings
    #[clap(long, default_value_t = 100)]
    page_size: u32,

    /// Per-request timeout in seconds
    #[clap(long, default_value_t = 30)]
    timeout_secs: u64,

    /// File extension for saved images
    #[clap(long, default_value = "png")]
    extension: String,

    /// Write the manifest but do not download images
    #[clap(long)]
    metadata_only: bool,
}

impl Opts {
    fn into_config(self) -> (Config, Vec<String>) {
        let config = Config {
            base_url: self.url,
            api_token: self.api_token,
            output_dir: self.output,
            workers: self.workers,
            results_per_page: self.page_size,
            request_timeout: Duration::from_secs(self.timeout_secs),
            image_extension: self.extension,
            metadata_only: self.metadata_only,
            ..Config::default()
        };
        (config, self.campaigns)
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg:>9} {bar:40.cyan/blue} {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}

/// Draw one bar per parallel stage from pipeline events
async fn show_progress(mut events: broadcast::Receiver<Event>) {
    let mut bar: Option<ProgressBar> = None;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            Event::StageStarted { stage, total }
                if matches!(stage, Stage::Metadata | Stage::Download) =>
            {
                let pb = ProgressBar::new(total as u64);
                pb.set_style(bar_style());
                pb.set_message(stage.as_str());
                bar = Some(pb);
            }
            Event::Progress { completed, .. } => {
                if let Some(pb) = &bar {
                    pb.set_position(completed as u64);
                }
            }
            Event::StageFinished { .. } => {
                if let Some(pb) = bar.take() {
                    pb.finish_and_clear();
                }
            }
            _ => {}
        }
    }
}

fn exit_code(summary: &RunSummary) -> ExitCode {
    if summary.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

async fn run(opts: Opts) -> squidle_dl::Result<RunSummary> {
    let (config, campaigns) = opts.into_config();
    let pipeline = Pipeline::new(config)?;

    let progress = tokio::spawn(show_progress(pipeline.subscribe()));
    let signals = cancel_on_signal(pipeline.cancellation_token());

    let result = pipeline.run(&campaigns).await;

    signals.abort();
    drop(pipeline);
    progress.await.ok();
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(opts).await {
        Ok(summary) => {
            if let Some(path) = &summary.manifest_path {
                info!(path = %path.display(), rows = summary.manifest_rows, "manifest ready");
            }
            if summary.cancelled {
                warn!("run was interrupted; rerun to fetch the rest");
            }
            exit_code(&summary)
        }
        Err(e) => {
            error!(error = %e, code = e.code(), "run failed");
            ExitCode::FAILURE
        }
    }
}
