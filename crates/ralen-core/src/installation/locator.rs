//! Release lookup and download-URL selection against a GitHub-style hosting API

use crate::catalog::LanguageDefinition;
use crate::errors::{RalenError, RalenResult};
use crate::installation::traits::ReleaseLocator;
use crate::installation::types::{OwnerRepo, Platform, ReleaseInfo, RepositoryInfo, VersionSpec};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com";

/// Release locator for GitHub and API-compatible hosts
#[derive(Debug, Clone)]
pub struct GitHubReleaseLocator {
    client: Client,
    api_base: String,
    download_base: String,
    platform: Platform,
}

impl GitHubReleaseLocator {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
            platform: Platform::current(),
        }
    }

    /// Point API calls at another host (GitHub Enterprise, test servers)
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Host used to build `releases/download/{tag}/{name}` candidates
    pub fn with_download_base(mut self, base: &str) -> Self {
        self.download_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    fn release_url(&self, repo: &OwnerRepo, version: &VersionSpec) -> String {
        match version {
            VersionSpec::Latest => format!(
                "{}/repos/{}/{}/releases/latest",
                self.api_base, repo.owner, repo.repo
            ),
            VersionSpec::Tag(tag) => format!(
                "{}/repos/{}/{}/releases/tags/{}",
                self.api_base,
                repo.owner,
                repo.repo,
                urlencoding::encode(tag)
            ),
        }
    }

    fn repository_url(&self, repo: &OwnerRepo) -> String {
        format!("{}/repos/{}/{}", self.api_base, repo.owner, repo.repo)
    }

    fn candidate_url(&self, repo: &OwnerRepo, tag: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}/releases/download/{}/{}",
            self.download_base,
            repo.owner,
            repo.repo,
            urlencoding::encode(tag),
            file_name
        )
    }

    async fn exists(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("HEAD {} failed: {}", url, e);
                false
            }
        }
    }

    async fn default_branch_release(&self, repo: &OwnerRepo, version: &VersionSpec) -> RalenResult<ReleaseInfo> {
        let branch = self
            .default_branch(repo)
            .await?
            .ok_or_else(|| RalenError::ReleaseNotFound {
                owner: repo.owner.clone(),
                repo: repo.repo.clone(),
                version: version.to_string(),
            })?;

        log::info!(
            "No release '{}' in {}; falling back to default branch '{}'",
            version,
            repo,
            branch
        );

        Ok(ReleaseInfo {
            tag_name: Some(branch.clone()),
            name: Some(format!("default-branch-{}", branch)),
            assets: Vec::new(),
            zipball_url: Some(self.branch_archive_url(repo, &branch)),
            tarball_url: None,
        })
    }
}

#[async_trait]
impl ReleaseLocator for GitHubReleaseLocator {
    async fn resolve_release(&self, repo: &OwnerRepo, version: &VersionSpec) -> RalenResult<ReleaseInfo> {
        let url = self.release_url(repo, version);
        log::debug!("Querying release metadata: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return self.default_branch_release(repo, version).await;
        }
        if !status.is_success() {
            return Err(RalenError::Transport {
                url,
                status: Some(status.as_u16()),
                reason: status.canonical_reason().unwrap_or("unexpected status").to_string(),
            });
        }

        let release: ReleaseInfo = response.json().await?;
        Ok(release)
    }

    async fn select_download_url(
        &self,
        release: &ReleaseInfo,
        definition: &LanguageDefinition,
        repo: &OwnerRepo,
    ) -> RalenResult<Option<String>> {
        if let Some(url) = select_from_release(release, definition) {
            return Ok(Some(url));
        }

        let Some(tag) = release.version_tag() else {
            return Ok(None);
        };

        let base = definition
            .fallback_asset_name
            .as_deref()
            .unwrap_or(&definition.key);
        for file_name in candidate_asset_names(base, &self.platform) {
            let url = self.candidate_url(repo, tag, &file_name);
            if self.exists(&url).await {
                log::debug!("Found release download by probing: {}", url);
                return Ok(Some(url));
            }
        }

        Ok(None)
    }

    async fn default_branch(&self, repo: &OwnerRepo) -> RalenResult<Option<String>> {
        let url = self.repository_url(repo);
        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RalenError::Transport {
                url,
                status: Some(status.as_u16()),
                reason: status.canonical_reason().unwrap_or("unexpected status").to_string(),
            });
        }

        let info: RepositoryInfo = response.json().await?;
        Ok(info.default_branch.filter(|b| !b.is_empty()))
    }

    fn branch_archive_url(&self, repo: &OwnerRepo, branch: &str) -> String {
        format!(
            "{}/repos/{}/{}/zipball/{}",
            self.api_base,
            repo.owner,
            repo.repo,
            urlencoding::encode(branch)
        )
    }
}

/// The part of URL selection that needs no network: matching assets first,
/// then the bulk archives.
pub fn select_from_release(release: &ReleaseInfo, definition: &LanguageDefinition) -> Option<String> {
    let usable = || {
        release
            .assets
            .iter()
            .filter(|asset| !asset.browser_download_url.is_empty())
    };

    if let Some(pattern) = &definition.asset_pattern {
        if let Some(asset) = usable().find(|asset| pattern.is_match(&asset.name)) {
            return Some(asset.browser_download_url.clone());
        }
    }

    if let Some(asset) = usable().find(|asset| definition.is_runtime_name(&asset.name)) {
        return Some(asset.browser_download_url.clone());
    }

    if let Some(asset) = usable().next() {
        return Some(asset.browser_download_url.clone());
    }

    release
        .zipball_url
        .iter()
        .chain(release.tarball_url.iter())
        .find(|url| !url.is_empty())
        .cloned()
}

/// File names probed under `releases/download/{tag}/`, most likely first
pub fn candidate_asset_names(base: &str, platform: &Platform) -> Vec<String> {
    let exe = format!("{}.exe", base);
    let zip = format!("{}.zip", base);
    if platform.is_windows() {
        vec![exe, base.to_string(), zip]
    } else {
        vec![base.to_string(), exe, zip]
    }
}
