//! Archive unpacking.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::DownloadError;

/// Unpack the tar `archive` into `into`, creating the directory if needed.
///
/// Runs on the blocking pool. Returns the number of entries unpacked.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] if the target directory cannot be created,
/// [`DownloadError::Extract`] if the archive cannot be read or unpacked, or
/// [`DownloadError::Join`] if the blocking task fails.
pub async fn unpack(archive: PathBuf, into: PathBuf) -> Result<u64, DownloadError> {
    tokio::fs::create_dir_all(&into)
        .await
        .map_err(|e| DownloadError::io(&into, e))?;
    tokio::task::spawn_blocking(move || unpack_blocking(&archive, &into)).await?
}

fn unpack_blocking(archive: &Path, into: &Path) -> Result<u64, DownloadError> {
    let extract_err = |source| DownloadError::Extract {
        archive: archive.to_path_buf(),
        source,
    };
    let file = File::open(archive).map_err(extract_err)?;
    let mut tar = tar::Archive::new(file);
    let mut count: u64 = 0;
    for entry in tar.entries().map_err(extract_err)? {
        let mut entry = entry.map_err(extract_err)?;
        // `unpack_in` refuses entries escaping `into`.
        if entry.unpack_in(into).map_err(extract_err)? {
            count = count.saturating_add(1);
        }
    }
    info!(archive = %archive.display(), into = %into.display(), entries = count, "Extracted");
    Ok(count)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Build an in-memory tar holding `files` (path, contents).
    pub(crate) fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(u64::try_from(contents.len()).unwrap());
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *contents).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dade-extract-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn unpacks_into_target() {
        let dir = temp_dir();
        let archive = dir.join("part.tar");
        std::fs::write(
            &archive,
            tar_bytes(&[
                ("seq_a/seq_a.json", b"{}".as_slice()),
                ("seq_a/images/001/000001.png", b"png".as_slice()),
            ]),
        )
        .unwrap();

        let target = dir.join("dynamic_weather");
        let count = unpack(archive, target.clone()).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            std::fs::read(target.join("seq_a/images/001/000001.png")).unwrap(),
            b"png"
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn corrupt_archive_is_extract_error() {
        let dir = temp_dir();
        let archive = dir.join("bad.tar");
        std::fs::write(&archive, vec![7_u8; 700]).unwrap();

        let err = unpack(archive, dir.join("out")).await.unwrap_err();

        assert!(matches!(err, DownloadError::Extract { .. }));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
