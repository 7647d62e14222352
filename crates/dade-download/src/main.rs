//! Downloader for the published DADE dataset.
//!
//! Fetches the dataset documents and the selected weather subsets from the
//! dataset repository into `{out_dir}/DADE`, unpacking each archive as soon
//! as it arrives. Reruns resume where the previous run stopped.
//!
//! ```text
//! dade-download <out_dir> [--subset static|dynamic|all]
//! ```

mod download;
mod error;
mod extract;
mod fetch;
mod manifest;

use std::path::PathBuf;

use clap::Parser;
use dade_types::DatasetSubset;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::fetch::Fetcher;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "dade-download")]
#[command(about = "Download the DADE dataset", long_about = None)]
struct Cli {
    /// Output directory in which to store the data.
    out_dir: PathBuf,

    /// Subset to download: static, dynamic or all.
    #[arg(long, alias = "dade", default_value = "all")]
    subset: DatasetSubset,

    /// Repository endpoint the file ids are appended to.
    #[arg(long, default_value = manifest::BASE_URL)]
    base_url: String,

    /// Hide the progress bars.
    #[arg(short, long)]
    quiet: bool,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if a download or an extraction fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    info!(
        out_dir = %cli.out_dir.display(),
        subset = ?cli.subset,
        base_url = cli.base_url,
        "Thank you for downloading the DADE dataset"
    );

    let fetcher = Fetcher::new(cli.base_url, !cli.quiet);
    let summary = download::download_dataset(&fetcher, &cli.out_dir, cli.subset).await?;

    info!(
        downloaded = summary.downloaded.len(),
        extracted = summary.extracted.len(),
        skipped = summary.skipped.len(),
        "Done"
    );
    Ok(())
}
