// src/test_utils/mock_release_server.rs
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// One release served by the mock. Releases are listed newest first.
#[derive(Debug, Clone, Default)]
pub struct ReleaseFixture {
    pub tag: String,
    pub assets: Vec<(String, Vec<u8>)>,
    pub zipball: Option<Vec<u8>>,
}

impl ReleaseFixture {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn asset(mut self, name: &str, content: Vec<u8>) -> Self {
        self.assets.push((name.to_string(), content));
        self
    }

    pub fn zipball(mut self, content: Vec<u8>) -> Self {
        self.zipball = Some(content);
        self
    }
}

#[derive(Debug, Clone, Default)]
struct RepoFixture {
    default_branch: Option<String>,
    releases: Vec<ReleaseFixture>,
    /// Archives served under `zipball/{ref}`
    archives: HashMap<String, Vec<u8>>,
    /// Files served under `releases/download/{tag}/{name}`
    downloads: HashMap<(String, String), Vec<u8>>,
    release_status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
}

#[derive(Clone)]
struct MockServerState {
    base: String,
    repos: Arc<HashMap<(String, String), RepoFixture>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServerState {
    fn record(&self, method: &Method, path: String) {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            path,
        });
    }

    fn repo(&self, owner: &str, repo: &str) -> Option<&RepoFixture> {
        self.repos.get(&(owner.to_string(), repo.to_string()))
    }

    fn release_json(&self, owner: &str, repo: &str, release: &ReleaseFixture) -> serde_json::Value {
        let assets: Vec<_> = release
            .assets
            .iter()
            .map(|(name, content)| {
                json!({
                    "name": name,
                    "content_type": "application/octet-stream",
                    "size": content.len(),
                    "browser_download_url": format!("{}/assets/{}/{}/{}/{}", self.base, owner, repo, release.tag, name),
                })
            })
            .collect();
        let zipball_url = release
            .zipball
            .as_ref()
            .map(|_| format!("{}/repos/{}/{}/zipball/{}", self.base, owner, repo, release.tag));

        json!({
            "tag_name": release.tag,
            "name": format!("{} {}", repo, release.tag),
            "assets": assets,
            "zipball_url": zipball_url,
        })
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))).into_response()
}

fn payload(content: &[u8], disposition: Option<String>) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream");
    if let Some(disposition) = disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, disposition);
    }
    builder
        .body(Body::from(content.to_vec()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn latest_release_handler(
    State(state): State<MockServerState>,
    method: Method,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    state.record(&method, format!("/repos/{}/{}/releases/latest", owner, repo));
    let Some(fixture) = state.repo(&owner, &repo) else {
        return not_found();
    };
    if let Some(status) = fixture.release_status {
        return StatusCode::from_u16(status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
    }
    match fixture.releases.first() {
        Some(release) => Json(state.release_json(&owner, &repo, release)).into_response(),
        None => not_found(),
    }
}

async fn tagged_release_handler(
    State(state): State<MockServerState>,
    method: Method,
    Path((owner, repo, tag)): Path<(String, String, String)>,
) -> Response {
    state.record(&method, format!("/repos/{}/{}/releases/tags/{}", owner, repo, tag));
    let Some(fixture) = state.repo(&owner, &repo) else {
        return not_found();
    };
    if let Some(status) = fixture.release_status {
        return StatusCode::from_u16(status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
    }
    match fixture.releases.iter().find(|r| r.tag == tag) {
        Some(release) => Json(state.release_json(&owner, &repo, release)).into_response(),
        None => not_found(),
    }
}

async fn repository_handler(
    State(state): State<MockServerState>,
    method: Method,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    state.record(&method, format!("/repos/{}/{}", owner, repo));
    match state.repo(&owner, &repo) {
        Some(fixture) => Json(json!({
            "full_name": format!("{}/{}", owner, repo),
            "default_branch": fixture.default_branch,
        }))
        .into_response(),
        None => not_found(),
    }
}

async fn zipball_handler(
    State(state): State<MockServerState>,
    method: Method,
    Path((owner, repo, reference)): Path<(String, String, String)>,
) -> Response {
    state.record(&method, format!("/repos/{}/{}/zipball/{}", owner, repo, reference));
    let archive = state.repo(&owner, &repo).and_then(|fixture| {
        fixture.archives.get(&reference).or_else(|| {
            fixture
                .releases
                .iter()
                .find(|r| r.tag == reference)
                .and_then(|r| r.zipball.as_ref())
        })
    });
    match archive {
        // Like the real API: no extension in the URL, name in Content-Disposition
        Some(content) => payload(
            content,
            Some(format!("attachment; filename={}-{}-{}.zip", owner, repo, reference)),
        ),
        None => not_found(),
    }
}

async fn asset_handler(
    State(state): State<MockServerState>,
    method: Method,
    Path((owner, repo, tag, name)): Path<(String, String, String, String)>,
) -> Response {
    state.record(&method, format!("/assets/{}/{}/{}/{}", owner, repo, tag, name));
    let content = state.repo(&owner, &repo).and_then(|fixture| {
        fixture
            .releases
            .iter()
            .find(|r| r.tag == tag)
            .and_then(|r| r.assets.iter().find(|(n, _)| *n == name))
            .map(|(_, content)| content)
    });
    match content {
        Some(content) => payload(content, None),
        None => not_found(),
    }
}

async fn release_download_handler(
    State(state): State<MockServerState>,
    method: Method,
    Path((owner, repo, tag, name)): Path<(String, String, String, String)>,
) -> Response {
    state.record(
        &method,
        format!("/dl/{}/{}/releases/download/{}/{}", owner, repo, tag, name),
    );
    let content = state
        .repo(&owner, &repo)
        .and_then(|fixture| fixture.downloads.get(&(tag, name)));
    match content {
        Some(content) => payload(content, None),
        None => not_found(),
    }
}

/// Builder for [`MockReleaseServer`]
#[derive(Debug, Default)]
pub struct MockReleaseServerBuilder {
    repos: HashMap<(String, String), RepoFixture>,
}

impl MockReleaseServerBuilder {
    fn repo_mut(&mut self, owner: &str, repo: &str) -> &mut RepoFixture {
        self.repos
            .entry((owner.to_string(), repo.to_string()))
            .or_default()
    }

    pub fn release(mut self, owner: &str, repo: &str, release: ReleaseFixture) -> Self {
        self.repo_mut(owner, repo).releases.push(release);
        self
    }

    /// Repository metadata with a default branch and, optionally, its archive
    pub fn default_branch(mut self, owner: &str, repo: &str, branch: &str, archive: Option<Vec<u8>>) -> Self {
        let fixture = self.repo_mut(owner, repo);
        fixture.default_branch = Some(branch.to_string());
        if let Some(archive) = archive {
            fixture.archives.insert(branch.to_string(), archive);
        }
        self
    }

    /// A file reachable only by guessing its `releases/download` URL
    pub fn release_download(mut self, owner: &str, repo: &str, tag: &str, name: &str, content: Vec<u8>) -> Self {
        self.repo_mut(owner, repo)
            .downloads
            .insert((tag.to_string(), name.to_string()), content);
        self
    }

    /// Answer every release lookup for this repository with `status`
    pub fn release_status(mut self, owner: &str, repo: &str, status: u16) -> Self {
        self.repo_mut(owner, repo).release_status = Some(status);
        self
    }

    pub async fn start(self) -> MockReleaseServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap_or_else(|e| {
            panic!("Failed to bind mock release server to 127.0.0.1:0. Error: {}", e);
        });
        let addr = listener.local_addr().unwrap();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockServerState {
            base: format!("http://{}", addr),
            repos: Arc::new(self.repos),
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/repos/{owner}/{repo}", get(repository_handler))
            .route("/repos/{owner}/{repo}/releases/latest", get(latest_release_handler))
            .route("/repos/{owner}/{repo}/releases/tags/{tag}", get(tagged_release_handler))
            .route("/repos/{owner}/{repo}/zipball/{reference}", get(zipball_handler))
            .route("/assets/{owner}/{repo}/{tag}/{name}", get(asset_handler))
            .route(
                "/dl/{owner}/{repo}/releases/download/{tag}/{name}",
                get(release_download_handler),
            )
            .with_state(state);

        log::info!("Mock release server listening on {}", addr);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| {
                    log::error!("Mock release server error: {}", e);
                });
        });

        MockReleaseServer {
            addr,
            shutdown_tx,
            requests,
        }
    }
}

/// In-process stand-in for a release-hosting API
pub struct MockReleaseServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockReleaseServer {
    pub fn builder() -> MockReleaseServerBuilder {
        MockReleaseServerBuilder::default()
    }

    pub fn address(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Value for the locator's API base
    pub fn api_base(&self) -> String {
        self.address()
    }

    /// Value for the locator's download base
    pub fn download_base(&self) -> String {
        format!("{}/dl", self.address())
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address(), path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of recorded requests whose path starts with `prefix`
    pub fn count(&self, method: &str, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path.starts_with(prefix))
            .count()
    }

    /// Release metadata lookups (latest or by tag)
    pub fn release_lookups(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path.contains("/releases/latest") || r.path.contains("/releases/tags/"))
            .count()
    }

    /// Payload downloads (GET of assets, archives or release files)
    pub fn downloads(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| {
                r.method == "GET"
                    && (r.path.starts_with("/assets/")
                        || r.path.contains("/zipball/")
                        || r.path.contains("/releases/download/"))
            })
            .count()
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock release server shutdown signal already sent or receiver dropped.");
        }
    }
}
