//! Installer downloads into the cache directory.
//!
//! `file://` URLs are copied and keep their basename. Everything else is
//! streamed over HTTP into a randomly named file.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use rand::Rng;
use rand::distr::Alphanumeric;
use reqwest::{Client, Url};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid URL {0}")]
    InvalidUrl(String),

    #[error("{} is already inside the download cache", .0.display())]
    SourceInCache(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    cache_dir: PathBuf,
}

impl Downloader {
    pub fn new(client: Client, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Local file name for `url`: the basename of a `file://` URL, or a
    /// random name with `extension` otherwise.
    pub fn local_file_name(url: &Url, extension: &str) -> String {
        if url.scheme() == "file" {
            if let Some(name) = url
                .to_file_path()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            {
                return name;
            }
        }
        let stem: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        format!("{}.{extension}", stem.to_lowercase())
    }

    /// Fetch `url` into the cache directory and return the local path.
    ///
    /// A partially written file is removed before the error is returned. A
    /// `file://` source that already lives in the cache is refused, since
    /// callers delete the returned file once they are done with it.
    pub async fn download(&self, url: &str, extension: &str) -> Result<PathBuf, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::InvalidUrl(url.to_string()))?;
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        if parsed.scheme() == "file" {
            let source = parsed
                .to_file_path()
                .map_err(|()| DownloadError::InvalidUrl(url.to_string()))?;
            if self.is_in_cache(&source).await? {
                return Err(DownloadError::SourceInCache(source));
            }
        }

        let dest = self.cache_dir.join(Self::local_file_name(&parsed, extension));
        tracing::debug!("Downloading {url} to {}", dest.display());
        let result = if parsed.scheme() == "file" {
            copy_local(&parsed, &dest).await
        } else {
            self.fetch_to(parsed, &dest).await
        };

        if let Err(e) = result {
            match tokio::fs::remove_file(&dest).await {
                Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => {
                    tracing::warn!("Could not remove partial download {}: {cleanup}", dest.display());
                }
                _ => {}
            }
            return Err(e);
        }
        Ok(dest)
    }

    /// Whether `source` resolves to a location under the cache directory.
    async fn is_in_cache(&self, source: &Path) -> Result<bool, DownloadError> {
        let cache = tokio::fs::canonicalize(&self.cache_dir).await?;
        let resolved = match tokio::fs::canonicalize(source).await {
            Ok(path) => path,
            // A missing source fails later with its own IO error.
            Err(_) => return Ok(false),
        };
        Ok(resolved.starts_with(&cache))
    }

    async fn fetch_to(&self, url: Url, dest: &Path) -> Result<(), DownloadError> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
        }
        file.flush().await?;
        tracing::debug!("Downloaded {downloaded} bytes");
        Ok(())
    }
}

async fn copy_local(url: &Url, dest: &Path) -> Result<(), DownloadError> {
    let source = url
        .to_file_path()
        .map_err(|()| DownloadError::InvalidUrl(url.to_string()))?;
    tokio::fs::copy(&source, dest).await?;
    Ok(())
}

/// GET `url` and return the body as text. Non-2xx statuses are errors.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, DownloadError> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}
