// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Asset downloads.
//!
//! A file that already exists is never fetched again: there is no checksum
//! or freshness check, so a stale local copy wins over the remote resource.

use crate::PipelineError;
use std::path::Path;

/// What [`download_if_missing`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file was already present; nothing was requested.
    Cached,
    /// The file was downloaded and written.
    Downloaded { bytes: usize },
}

/// Downloads `url` to `path` unless `path` already exists.
///
/// # Errors
/// [`PipelineError::Fetch`] when the request fails or the server answers
/// with an error status; [`PipelineError::Io`] when the file cannot be
/// written.
pub async fn download_if_missing(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
) -> Result<FetchOutcome, PipelineError> {
    if tokio::fs::try_exists(path).await? {
        tracing::warn!(
            "using cached {} without checking {url} for a newer copy",
            path.display()
        );
        return Ok(FetchOutcome::Cached);
    }

    tracing::info!("downloading {url}");
    let fetch_err = |source| PipelineError::Fetch {
        url: url.to_string(),
        source,
    };
    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(fetch_err)?;
    let body = response.bytes().await.map_err(fetch_err)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &body).await?;
    tracing::info!("wrote {} ({} bytes)", path.display(), body.len());
    Ok(FetchOutcome::Downloaded { bytes: body.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log lines.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_existing_file_is_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synset.txt");
        std::fs::write(&path, "stale").unwrap();

        let client = reqwest::Client::new();
        let outcome = download_if_missing(&client, "http://invalid.invalid/synset.txt", &path)
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Cached);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "stale");
    }

    #[tokio::test]
    async fn test_cached_file_is_reported_as_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.png");
        std::fs::write(&path, "old image").unwrap();

        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let client = reqwest::Client::new();
        download_if_missing(&client, "http://invalid.invalid/cat.png", &path)
            .await
            .unwrap();
        let out = logs.contents();
        assert!(out.contains("WARN"), "{out}");
        assert!(out.contains("http://invalid.invalid/cat.png"), "{out}");
    }

    #[tokio::test]
    async fn test_malformed_url_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.png");

        let client = reqwest::Client::new();
        let err = download_if_missing(&client, "not a url", &path)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { ref url, .. } if url == "not a url"));
        assert!(!path.exists());
    }
}
