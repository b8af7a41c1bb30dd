//! Streaming downloads into per-call temporary directories

use crate::errors::{RalenError, RalenResult};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_DISPOSITION};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

const USER_AGENT: &str = concat!("ralen-installer/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by release lookups and downloads.
///
/// `token`, when present, is sent as a bearer token (raises API rate limits
/// and allows private repositories).
pub fn build_http_client(token: Option<&str>) -> RalenResult<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

    if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| RalenError::Config {
            message: format!("GITHUB_TOKEN is not a valid header value: {}", e),
        })?;
        headers.insert(AUTHORIZATION, value);
    }

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .map_err(|e| RalenError::Config {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// A downloaded file. The temporary directory holding it is deleted when
/// this value is dropped, whether or not installation succeeded.
#[derive(Debug)]
pub struct DownloadedArtifact {
    dir: TempDir,
    path: PathBuf,
    bytes: u64,
}

impl DownloadedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn temp_dir(&self) -> &Path {
        self.dir.path()
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveTransport {
    client: Client,
}

impl ArchiveTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Download `url` into a fresh temporary directory.
    pub async fn download(&self, url: &str) -> RalenResult<DownloadedArtifact> {
        let dir = tempfile::Builder::new().prefix("ralen_").tempdir()?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RalenError::Transport {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: status.canonical_reason().unwrap_or("download failed").to_string(),
            });
        }

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition)
            .or_else(|| file_name_from_url(url))
            .unwrap_or_else(|| format!("download_{}", uuid::Uuid::new_v4().simple()));

        let path = dir.path().join(&file_name);
        let mut file = File::create(&path).await?;
        let mut bytes = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RalenError::Transport {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("connection dropped while downloading: {}", e),
            })?;
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;

        log::debug!("Downloaded {} ({} bytes) to {}", url, bytes, path.display());
        Ok(DownloadedArtifact { dir, path, bytes })
    }
}

/// Last path segment of `url`, if it looks like a file name
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(segment).ok()?;
    sanitize_file_name(&decoded)
}

/// Extract the suggested file name from a `Content-Disposition` header.
/// `filename*` (RFC 5987) wins over plain `filename`.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in header.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let value = value.trim().trim_matches('"');
                let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
                extended = urlencoding::decode(encoded).ok().map(|s| s.into_owned());
            }
            "filename" => plain = Some(value.trim().trim_matches('"').to_string()),
            _ => {}
        }
    }

    extended.or(plain).and_then(|name| sanitize_file_name(&name))
}

fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_variants() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename=SaLang.zip").as_deref(),
            Some("SaLang.zip")
        );
        assert_eq!(
            filename_from_content_disposition("attachment; filename=\"serene1491-SaLang-3f2a.zip\"").as_deref(),
            Some("serene1491-SaLang-3f2a.zip")
        );
        assert_eq!(
            filename_from_content_disposition("attachment; filename=x.bin; filename*=UTF-8''sa%20lang.zip").as_deref(),
            Some("sa lang.zip")
        );
        assert_eq!(filename_from_content_disposition("inline"), None);
        assert_eq!(
            filename_from_content_disposition("attachment; filename=\"../../etc/passwd\"").as_deref(),
            Some("passwd")
        );
    }

    #[test]
    fn url_file_names() {
        assert_eq!(
            file_name_from_url("https://github.com/o/r/releases/download/v1/SaLang").as_deref(),
            Some("SaLang")
        );
        assert_eq!(
            file_name_from_url("https://example.com/files/sa%20lang.zip?x=1").as_deref(),
            Some("sa lang.zip")
        );
        assert_eq!(file_name_from_url("https://example.com/"), None);
        assert_eq!(file_name_from_url("not a url"), None);
    }

    #[test]
    fn client_rejects_malformed_token() {
        assert!(build_http_client(Some("bad\ntoken")).is_err());
        assert!(build_http_client(Some("  ")).is_ok());
        assert!(build_http_client(None).is_ok());
    }
}
