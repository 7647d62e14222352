//! Streaming HTTP download with a progress bar.
//!
//! The body is streamed into `{dest}.part` and renamed to `dest` once
//! complete, so an interrupted transfer never leaves a file that later runs
//! would mistake for a finished one.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::DownloadError;

const BAR_TEMPLATE: &str =
    "{msg:>28} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{msg:>28} {spinner} {bytes} ({bytes_per_sec})";

/// HTTP client bound to one repository base URL.
pub struct Fetcher {
    client: reqwest::Client,
    base_url: String,
    show_progress: bool,
}

impl Fetcher {
    /// Create a fetcher for `base_url`.
    pub fn new(base_url: impl Into<String>, show_progress: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            show_progress,
        }
    }

    /// Base URL the file ids are appended to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Download `url` into `dest`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Http`] if the request or body stream fails,
    /// [`DownloadError::Status`] for a non-success answer, or
    /// [`DownloadError::Io`] if the file cannot be written.
    pub async fn fetch(&self, url: &str, dest: &Path, label: &str) -> Result<u64, DownloadError> {
        let http_err = |source| DownloadError::Http {
            url: url.to_owned(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_owned(),
                status,
            });
        }

        let bar = self.progress_bar(response.content_length(), label);
        let partial = partial_path(dest);
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|e| DownloadError::io(&partial, e))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(http_err)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(&partial, e))?;
            let len = u64::try_from(chunk.len()).unwrap_or(u64::MAX);
            written = written.saturating_add(len);
            bar.inc(len);
        }
        file.flush()
            .await
            .map_err(|e| DownloadError::io(&partial, e))?;
        drop(file);

        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;
        bar.finish_and_clear();
        info!(url, dest = %dest.display(), bytes = written, "Downloaded");
        Ok(written)
    }

    fn progress_bar(&self, length: Option<u64>, label: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let (bar, template) = match length {
            Some(len) => (ProgressBar::new(len), BAR_TEMPLATE),
            None => {
                debug!(label, "No content length, showing a spinner");
                (ProgressBar::new_spinner(), SPINNER_TEMPLATE)
            }
        };
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_err| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message(label.to_owned());
        bar
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serve `files` (path without leading slash to body) over plain HTTP.
    ///
    /// Unknown paths get a 404. Returns the base URL.
    pub(crate) async fn serve(files: HashMap<String, Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let files = Arc::new(files);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let files = Arc::clone(&files);
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0_u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        let Ok(n) = socket.read(&mut buf).await else {
                            return;
                        };
                        if n == 0 {
                            return;
                        }
                        request.extend(buf.iter().take(n));
                    }
                    let head = String::from_utf8_lossy(&request);
                    let path = head
                        .split_whitespace()
                        .nth(1)
                        .unwrap_or("/")
                        .trim_start_matches('/')
                        .to_owned();
                    let response = match files.get(&path) {
                        Some(body) => {
                            let mut out = format!(
                                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                                body.len()
                            )
                            .into_bytes();
                            out.extend_from_slice(body);
                            out
                        }
                        None => b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            .to_vec(),
                    };
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dade-fetch-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn downloads_body_to_destination() {
        let body = b"hello dataset".to_vec();
        let base = serve(HashMap::from([("28017".to_owned(), body.clone())])).await;
        let dir = temp_dir();
        let dest = dir.join("ReadMe.md");

        let fetcher = Fetcher::new(base.clone(), false);
        let written = fetcher
            .fetch(&format!("{base}/28017"), &dest, "ReadMe.md")
            .await
            .unwrap();

        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert!(!partial_path(&dest).exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_status_error() {
        let base = serve(HashMap::new()).await;
        let dir = temp_dir();
        let dest = dir.join("gone.tar");

        let fetcher = Fetcher::new(base.clone(), false);
        let err = fetcher
            .fetch(&format!("{base}/1"), &dest, "gone.tar")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DownloadError::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND
        ));
        assert!(!dest.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn partial_name_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/x/static_weather.tar")),
            PathBuf::from("/x/static_weather.tar.part")
        );
    }
}
