//! Dataset download pipeline.
//!
//! Documents are fetched once and kept. Each archive goes through
//! download, extraction, deletion and a marker file; a part whose marker
//! exists is skipped, so an interrupted run can simply be restarted.

use std::path::{Path, PathBuf};

use dade_types::DatasetSubset;
use tracing::info;

use crate::error::DownloadError;
use crate::extract;
use crate::fetch::Fetcher;
use crate::manifest::{self, DATASET_DIR, ManifestEntry};

/// What a run did with each file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Files fetched during this run.
    pub downloaded: Vec<&'static str>,
    /// Archives unpacked during this run.
    pub extracted: Vec<&'static str>,
    /// Files already present or already unpacked.
    pub skipped: Vec<&'static str>,
}

/// Download `subset` of the dataset into `{out_dir}/DADE`.
///
/// # Errors
///
/// Returns the first [`DownloadError`] met; files finished before it stay
/// in place.
pub async fn download_dataset(
    fetcher: &Fetcher,
    out_dir: &Path,
    subset: DatasetSubset,
) -> Result<DownloadSummary, DownloadError> {
    let dataset_dir = out_dir.join(DATASET_DIR);
    tokio::fs::create_dir_all(&dataset_dir)
        .await
        .map_err(|e| DownloadError::io(&dataset_dir, e))?;

    let mut summary = DownloadSummary::default();
    for entry in manifest::select(subset) {
        match entry.extract_dir(&dataset_dir) {
            None => fetch_document(fetcher, &dataset_dir, entry, &mut summary).await?,
            Some(into) => {
                fetch_archive(fetcher, &dataset_dir, entry, into, &mut summary).await?;
            }
        }
    }
    Ok(summary)
}

async fn fetch_document(
    fetcher: &Fetcher,
    dataset_dir: &Path,
    entry: ManifestEntry,
    summary: &mut DownloadSummary,
) -> Result<(), DownloadError> {
    let dest = entry.download_path(dataset_dir);
    if dest.exists() {
        summary.skipped.push(entry.name);
        return Ok(());
    }
    info!(file = entry.name, "Downloading");
    fetcher
        .fetch(&entry.url(fetcher.base_url()), &dest, entry.name)
        .await?;
    summary.downloaded.push(entry.name);
    Ok(())
}

async fn fetch_archive(
    fetcher: &Fetcher,
    dataset_dir: &Path,
    entry: ManifestEntry,
    into: PathBuf,
    summary: &mut DownloadSummary,
) -> Result<(), DownloadError> {
    let marker = entry.marker_path(dataset_dir);
    if marker.exists() {
        info!(file = entry.name, "Already extracted, skipping");
        summary.skipped.push(entry.name);
        return Ok(());
    }

    let archive = entry.download_path(dataset_dir);
    if archive.exists() {
        info!(file = entry.name, "Archive already downloaded");
    } else {
        info!(file = entry.name, "Downloading");
        fetcher
            .fetch(&entry.url(fetcher.base_url()), &archive, entry.name)
            .await?;
        summary.downloaded.push(entry.name);
    }

    info!(file = entry.name, into = %into.display(), "Extracting");
    extract::unpack(archive.clone(), into).await?;
    tokio::fs::remove_file(&archive)
        .await
        .map_err(|e| DownloadError::io(&archive, e))?;
    tokio::fs::write(&marker, entry.name)
        .await
        .map_err(|e| DownloadError::io(&marker, e))?;
    summary.extracted.push(entry.name);
    Ok(())
}
