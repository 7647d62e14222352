//! On-disk layout of a recorded sequence.
//!
//! A [`SequenceRecorder`] owns one sequence folder under the output
//! directory. It writes the sequence metadata file when created, keeps the
//! per-frame GNSS and weather tables in memory, and rewrites the
//! corresponding JSON files after every saved frame so a crashed run still
//! leaves readable metadata behind. The dataset-wide CSV is appended to by
//! [`append_metadata_row`].

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use dade_types::{
    GnssRecord, ImageKind, MetadataRow, SequenceMetadata, WeatherRecord,
};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::debug;

use crate::plan;

/// Errors from writing sequence output.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// A file or directory could not be written.
    #[error("failed to write {path}: {source}")]
    Io {
        /// The path being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// JSON serialization failed.
    #[error("failed to serialize {path}: {source}")]
    Json {
        /// The file being written.
        path: PathBuf,
        /// The underlying serialization error.
        source: serde_json::Error,
    },

    /// The metadata CSV could not be written.
    #[error("failed to append to {path}: {source}")]
    Csv {
        /// The CSV file.
        path: PathBuf,
        /// The underlying CSV error.
        source: csv::Error,
    },
}

/// Writer for one sequence folder.
#[derive(Debug)]
pub struct SequenceRecorder {
    root: PathBuf,
    folder: String,
    metadata: SequenceMetadata,
    gnss: BTreeMap<u64, GnssRecord>,
    weather: BTreeMap<u64, WeatherRecord>,
}

impl SequenceRecorder {
    /// Create `{output}/{folder}/` and write `{folder}.json`.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError`] if the folder or metadata file cannot be written.
    pub fn create(
        output: &Path,
        folder: &str,
        metadata: SequenceMetadata,
    ) -> Result<Self, RecorderError> {
        let root = output.join(folder);
        std::fs::create_dir_all(&root).map_err(|source| RecorderError::Io {
            path: root.clone(),
            source,
        })?;
        let recorder = Self {
            root,
            folder: folder.to_owned(),
            metadata,
            gnss: BTreeMap::new(),
            weather: BTreeMap::new(),
        };
        recorder.write_metadata()?;
        debug!(path = %recorder.root.display(), "Sequence folder created");
        Ok(recorder)
    }

    /// The sequence folder name.
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// The sequence folder path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The metadata as last written.
    pub const fn metadata(&self) -> &SequenceMetadata {
        &self.metadata
    }

    /// Absolute path of the image of `kind` for saved frame `frame`.
    pub fn image_path(&self, kind: ImageKind, frame: u64) -> PathBuf {
        self.root.join(plan::image_relative_path(kind, frame))
    }

    /// Record the GNSS entry of `frame` and rewrite `gnss.json`.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError`] if the file cannot be written.
    pub fn record_gnss(&mut self, frame: u64, record: GnssRecord) -> Result<(), RecorderError> {
        self.gnss.insert(frame, record);
        write_json_pretty(&self.root.join("gnss.json"), &self.gnss)
    }

    /// Record the weather entry of `frame` and rewrite `weather.json`.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError`] if the file cannot be written.
    pub fn record_weather(
        &mut self,
        frame: u64,
        record: WeatherRecord,
    ) -> Result<(), RecorderError> {
        self.weather.insert(frame, record);
        write_json_pretty(&self.root.join("weather.json"), &self.weather)
    }

    /// Store the final frame count in `{folder}.json` and return the folder path.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError`] if the metadata file cannot be rewritten.
    pub fn finish(mut self, frames_saved: u64) -> Result<PathBuf, RecorderError> {
        self.metadata.seq_length = Some(frames_saved);
        self.write_metadata()?;
        Ok(self.root)
    }

    fn write_metadata(&self) -> Result<(), RecorderError> {
        let path = self.root.join(format!("{}.json", self.folder));
        write_json_pretty(&path, &self.metadata)
    }
}

/// First folder name derived from `base` that does not exist under `output`.
///
/// Returns `base` itself when free, otherwise `base-1`, `base-2`, ...
pub fn unique_folder_name(output: &Path, base: &str) -> String {
    if !output.join(base).exists() {
        return base.to_owned();
    }
    let mut suffix: u32 = 1;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !output.join(&candidate).exists() {
            return candidate;
        }
        suffix = suffix.saturating_add(1);
    }
}

/// Append one `;`-delimited row to the dataset metadata CSV.
///
/// Parent directories are created as needed. No header is written.
///
/// # Errors
///
/// Returns [`RecorderError`] if the file cannot be opened or written.
pub fn append_metadata_row(csv_path: &Path, row: &MetadataRow) -> Result<(), RecorderError> {
    if let Some(parent) = csv_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| RecorderError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)
        .map_err(|source| RecorderError::Io {
            path: csv_path.to_path_buf(),
            source,
        })?;
    let csv_error = |source| RecorderError::Csv {
        path: csv_path.to_path_buf(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(file);
    writer.serialize(row).map_err(csv_error)?;
    writer.flush().map_err(|source| RecorderError::Io {
        path: csv_path.to_path_buf(),
        source,
    })
}

/// Write `value` as JSON indented with four spaces.
fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), RecorderError> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|source| RecorderError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    std::fs::write(path, buffer).map_err(|source| RecorderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dade_types::{Location, TownMap};

    use super::*;

    fn temp_output() -> PathBuf {
        std::env::temp_dir().join(format!("dade-recorder-{}", uuid::Uuid::new_v4()))
    }

    fn metadata() -> SequenceMetadata {
        SequenceMetadata {
            timestamp: 1200,
            map: TownMap::Town03,
            seed: 9,
            dynamic_weather: true,
            nb_vehicles: 4,
            nb_pedestrians: 0,
            seq_length: None,
        }
    }

    #[test]
    fn metadata_file_goes_from_nan_to_count() {
        let output = temp_output();
        let recorder = SequenceRecorder::create(&output, "seq", metadata()).unwrap();
        let path = output.join("seq").join("seq.json");
        let before = std::fs::read_to_string(&path).unwrap();
        assert!(before.contains("\"seq_length\": \"NaN\""));
        assert!(before.contains("\n    \"timestamp\": 1200"));

        recorder.finish(12).unwrap();
        let after: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(after["seq_length"], 12);
        assert_eq!(after["map"], "Town03");
        std::fs::remove_dir_all(&output).unwrap();
    }

    #[test]
    fn gnss_file_sorted_by_frame() {
        let output = temp_output();
        let mut recorder = SequenceRecorder::create(&output, "seq", metadata()).unwrap();
        let location = Location {
            x: 1.0,
            y: 2.0,
            z: 3.0,
        };
        for frame in [10, 2, 1] {
            recorder
                .record_gnss(frame, GnssRecord::new(0.5, 0.25, 3.0, location))
                .unwrap();
        }
        let text = std::fs::read_to_string(output.join("seq").join("gnss.json")).unwrap();
        let one = text.find("\"1\"").unwrap();
        let two = text.find("\"2\"").unwrap();
        let ten = text.find("\"10\"").unwrap();
        assert!(one < two && two < ten);
        let altitude = text.find("\"altitude\"").unwrap();
        let latitude = text.find("\"latitude\"").unwrap();
        assert!(altitude < latitude);
        std::fs::remove_dir_all(&output).unwrap();
    }

    #[test]
    fn image_paths_are_bucketed() {
        let output = temp_output();
        let recorder = SequenceRecorder::create(&output, "seq", metadata()).unwrap();
        assert_eq!(
            recorder.image_path(ImageKind::SemanticMask, 1000),
            output.join("seq/semantic_masks/002/001000.png")
        );
        std::fs::remove_dir_all(&output).unwrap();
    }

    #[test]
    fn folder_names_are_deduplicated() {
        let output = temp_output();
        assert_eq!(unique_folder_name(&output, "run"), "run");
        std::fs::create_dir_all(output.join("run")).unwrap();
        assert_eq!(unique_folder_name(&output, "run"), "run-1");
        std::fs::create_dir_all(output.join("run-1")).unwrap();
        assert_eq!(unique_folder_name(&output, "run"), "run-2");
        std::fs::remove_dir_all(&output).unwrap();
    }

    #[test]
    fn csv_rows_are_appended_without_header() {
        let output = temp_output();
        let csv_path = output.join("meta").join("metadata.csv");
        let row = MetadataRow {
            folder: "a".to_owned(),
            map: TownMap::Town10Hd,
            seed: 5,
            dynamic_weather: false,
            sun_altitude: 90.0,
            cloudiness: 0.0,
            nb_vehicles: 50,
            nb_pedestrians: 50,
            timestamp: 77,
        };
        append_metadata_row(&csv_path, &row).unwrap();
        append_metadata_row(
            &csv_path,
            &MetadataRow {
                folder: "b".to_owned(),
                ..row
            },
        )
        .unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines.first(), Some(&"a;Town10HD;5;False;90.0;0.0;50;50;77"));
        assert!(lines.last().unwrap().starts_with("b;Town10HD;5;False;"));
        std::fs::remove_dir_all(&output).unwrap();
    }
}
