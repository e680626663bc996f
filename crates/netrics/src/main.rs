//! # netrics
//!
//! Command-line entry point: observe a single page load, rebuild a manifest
//! from an input file, or refresh the stale entries of an existing one.

#![deny(unsafe_code)]

mod logging;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use netrics_cdp::{ChromeLauncher, LaunchOptions};
use netrics_manifest::{
    FileStorage, ManifestStorage, build_manifest, load_input, to_pretty_json, update_manifest,
};
use netrics_observer::{Summarize, Summarizer};
use netrics_settings::{BrowserSettings, NetricsSettings};
use tokio_util::sync::CancellationToken;

/// Page-load observer and resource manifest builder.
#[derive(Parser, Debug)]
#[command(name = "netrics", about = "Observe page loads and record the resources they fetch")]
struct Cli {
    /// Settings file (defaults to `~/.netrics/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level filter, e.g. `debug` or `netrics_observer=trace`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize one URL and print the result as JSON.
    Observe {
        /// URL to load.
        url: String,
    },
    /// Summarize every site in the input file into a new manifest.
    Build {
        /// Input file listing `{ title, url }` sites.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Manifest file to write.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Re-summarize manifest entries older than the configured age.
    Update {
        /// Manifest file to refresh in place.
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = match &args.settings {
        Some(path) => netrics_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => netrics_settings::load_settings().with_context(|| {
            format!(
                "Failed to load settings from {}",
                netrics_settings::settings_path().display()
            )
        })?,
    };

    let level = args.log_level.as_deref().unwrap_or(settings.logging.level.as_str());
    logging::init_subscriber(level);

    let cancel = CancellationToken::new();
    let _ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    let launcher = ChromeLauncher::discover(
        settings.browser.chrome_path.as_deref(),
        launch_options(&settings.browser),
    )
    .context("Failed to locate a Chrome binary")?;
    let summarizer =
        Summarizer::new(launcher, settings.observer.to_config()).with_cancel(cancel);

    match args.command {
        Command::Observe { url } => observe(&summarizer, &url).await,
        Command::Build { input, output } => {
            let input = input.unwrap_or_else(|| PathBuf::from(&settings.manifest.input_path));
            let output =
                output.unwrap_or_else(|| PathBuf::from(&settings.manifest.manifest_path));
            build(&summarizer, &input, &output).await
        }
        Command::Update { manifest } => {
            let path =
                manifest.unwrap_or_else(|| PathBuf::from(&settings.manifest.manifest_path));
            update(&summarizer, &path, &settings).await
        }
    }
}

async fn observe(summarizer: &dyn Summarize, url: &str) -> Result<()> {
    let website = summarizer
        .summarize(url)
        .await
        .with_context(|| format!("Failed to summarize {url}"))?;
    let json = to_pretty_json(&website)?;
    std::io::stdout()
        .write_all(&json)
        .context("Failed to write to stdout")?;
    Ok(())
}

async fn build(summarizer: &dyn Summarize, input: &Path, output: &Path) -> Result<()> {
    let sites = load_input(input)
        .with_context(|| format!("Failed to read input {}", input.display()))?;
    let manifest = build_manifest(&sites, summarizer).await;
    FileStorage::new(output)
        .save(&manifest)
        .with_context(|| format!("Failed to write manifest {}", output.display()))?;
    tracing::info!(
        path = %output.display(),
        sites = manifest.len(),
        "manifest written"
    );
    Ok(())
}

async fn update(summarizer: &dyn Summarize, path: &Path, settings: &NetricsSettings) -> Result<()> {
    let storage = FileStorage::new(path);
    let stale_after = Duration::from_secs(settings.manifest.stale_after_secs);
    let report = update_manifest(&storage, summarizer, chrono::Utc::now(), stale_after)
        .await
        .with_context(|| format!("Failed to refresh manifest {}", path.display()))?;
    tracing::info!(
        refreshed = report.refreshed.len(),
        fresh = report.fresh.len(),
        "manifest up to date"
    );
    Ok(())
}

fn launch_options(browser: &BrowserSettings) -> LaunchOptions {
    LaunchOptions {
        window_width: browser.window_width,
        window_height: browser.window_height,
        launch_timeout: Duration::from_millis(browser.launch_timeout_ms),
        command_timeout: Duration::from_millis(browser.command_timeout_ms),
    }
}
