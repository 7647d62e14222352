//! The files published with the dataset and where each one lands.
//!
//! Every file is served by the dataset repository under a numeric file id
//! appended to [`BASE_URL`]. Documents are stored as-is in the dataset
//! directory; archives are unpacked and then removed.

use std::path::{Path, PathBuf};

use dade_types::DatasetSubset;

/// Repository endpoint serving the files by id.
pub const BASE_URL: &str = "https://dataverse.uliege.be/api/access/datafile/";

/// Directory created under the output directory.
pub const DATASET_DIR: &str = "DADE";

/// Subdirectory receiving the dynamic-weather parts.
pub const DYNAMIC_DIR: &str = "dynamic_weather";

/// What happens to a file once it is downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Kept as downloaded.
    Document,
    /// Unpacked into the dataset directory.
    StaticArchive,
    /// Unpacked into the dynamic-weather subdirectory.
    DynamicArchive,
}

/// One published file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestEntry {
    /// File name in the dataset directory.
    pub name: &'static str,
    /// Repository file id.
    pub file_id: u32,
    /// Handling after download.
    pub kind: EntryKind,
}

impl ManifestEntry {
    const fn new(name: &'static str, file_id: u32, kind: EntryKind) -> Self {
        Self {
            name,
            file_id,
            kind,
        }
    }

    /// Download URL of this file under `base_url`.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.file_id)
    }

    /// Where the downloaded file is stored.
    pub fn download_path(&self, dataset_dir: &Path) -> PathBuf {
        dataset_dir.join(self.name)
    }

    /// Directory the archive is unpacked into, `None` for documents.
    pub fn extract_dir(&self, dataset_dir: &Path) -> Option<PathBuf> {
        match self.kind {
            EntryKind::Document => None,
            EntryKind::StaticArchive => Some(dataset_dir.to_path_buf()),
            EntryKind::DynamicArchive => Some(dataset_dir.join(DYNAMIC_DIR)),
        }
    }

    /// Marker written once the archive has been unpacked.
    pub fn marker_path(&self, dataset_dir: &Path) -> PathBuf {
        dataset_dir.join(format!(".{}.extracted", self.name))
    }
}

const DOCUMENTS: [ManifestEntry; 2] = [
    ManifestEntry::new("ReadMe.md", 28_017, EntryKind::Document),
    ManifestEntry::new("Town12.png", 28_012, EntryKind::Document),
];

const STATIC_ARCHIVES: [ManifestEntry; 1] = [ManifestEntry::new(
    "static_weather.tar",
    28_010,
    EntryKind::StaticArchive,
)];

const DYNAMIC_ARCHIVES: [ManifestEntry; 3] = [
    ManifestEntry::new("dynamic_weather_part1.tar", 28_014, EntryKind::DynamicArchive),
    ManifestEntry::new("dynamic_weather_part2.tar", 28_015, EntryKind::DynamicArchive),
    ManifestEntry::new("dynamic_weather_part3.tar", 28_016, EntryKind::DynamicArchive),
];

/// Files to fetch for `subset`, documents first.
pub fn select(subset: DatasetSubset) -> Vec<ManifestEntry> {
    let mut entries = DOCUMENTS.to_vec();
    if subset.includes_static() {
        entries.extend(STATIC_ARCHIVES);
    }
    if subset.includes_dynamic() {
        entries.extend(DYNAMIC_ARCHIVES);
    }
    entries
}
