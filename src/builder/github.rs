use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::GitHubSettings;
use crate::errors::HostError;

const USER_AGENT: &str = "pagesmith";
const API_VERSION: &str = "2022-11-28";

/// A hosted repository (subset of fields we care about).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepo {
    pub name: String,
    pub html_url: String,
    pub default_branch: String,
}

/// Repository CRUD, commit history and static-page publishing.
/// Real implementation: `GitHubClient`. Test double: `fakes::InMemoryHost`.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// `Ok(None)` when the repository does not exist.
    async fn get_repo(&self, name: &str) -> Result<Option<RemoteRepo>, HostError>;

    async fn create_repo(&self, name: &str) -> Result<RemoteRepo, HostError>;

    /// Content identifier of `path` on `branch`, or `Ok(None)` if the file is absent.
    async fn file_sha(&self, repo: &str, path: &str, branch: &str)
    -> Result<Option<String>, HostError>;

    async fn create_file(
        &self,
        repo: &str,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> Result<(), HostError>;

    /// Overwrite `path`; `sha` must be the identifier read by `file_sha`.
    async fn update_file(
        &self,
        repo: &str,
        path: &str,
        content: &str,
        sha: &str,
        message: &str,
        branch: &str,
    ) -> Result<(), HostError>;

    async fn latest_commit(&self, repo: &str, branch: &str) -> Result<String, HostError>;

    /// Idempotent: an already-enabled site is not an error.
    async fn enable_pages(&self, repo: &str, branch: &str) -> Result<(), HostError>;
}

/// Known GitHub token prefixes.
/// See: https://github.blog/2021-04-05-behind-githubs-new-authentication-token-formats/
const GITHUB_TOKEN_PREFIXES: &[&str] = &[
    "ghp_",        // Personal access tokens (classic)
    "github_pat_", // Fine-grained personal access tokens
    "gho_",        // OAuth access tokens
    "ghu_",        // GitHub App user-to-server tokens
    "ghs_",        // GitHub App server-to-server tokens
    "ghr_",        // GitHub App refresh tokens
];

/// Format check only; does not verify the token is active or scoped.
pub fn is_valid_github_token(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    GITHUB_TOKEN_PREFIXES
        .iter()
        .any(|prefix| token.starts_with(prefix))
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: String,
}

/// GitHub REST client scoped to a single owner account.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    owner: String,
    token: String,
}

impl GitHubClient {
    pub fn new(settings: &GitHubSettings) -> Result<Self, HostError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(HostError::Transport)?;
        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            owner: settings.user.clone(),
            token: settings.token.clone().unwrap_or_default(),
        })
    }

    fn repo_url(&self, repo: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, self.owner, repo)
    }

    /// Contents endpoint for `path`, each path segment percent-encoded.
    fn contents_url(&self, repo: &str, path: &str) -> Result<reqwest::Url, HostError> {
        let base = self.repo_url(repo);
        let mut url =
            reqwest::Url::parse(&base).map_err(|_| HostError::InvalidUrl(base.clone()))?;
        url.path_segments_mut()
            .map_err(|_| HostError::InvalidUrl(base.clone()))?
            .push("contents")
            .extend(path.split('/'));
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, HostError> {
        builder.send().await.map_err(HostError::Transport)
    }

    async fn status_error(operation: &str, resp: reqwest::Response) -> HostError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        HostError::Status {
            operation: operation.to_string(),
            status,
            body: body.chars().take(500).collect(),
        }
    }

    async fn put_contents(
        &self,
        repo: &str,
        path: &str,
        content: &str,
        sha: Option<&str>,
        message: &str,
        branch: &str,
    ) -> Result<(), HostError> {
        let mut body = json!({
            "message": message,
            "content": BASE64.encode(content.as_bytes()),
            "branch": branch,
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }
        let url = self.contents_url(repo, path)?;
        let resp = self
            .send(self.request(reqwest::Method::PUT, url.as_str()).json(&body))
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let operation = if sha.is_some() { "update file" } else { "create file" };
            Err(Self::status_error(operation, resp).await)
        }
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn get_repo(&self, name: &str) -> Result<Option<RemoteRepo>, HostError> {
        let resp = self
            .send(self.request(reqwest::Method::GET, &self.repo_url(name)))
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => resp
                .json::<RemoteRepo>()
                .await
                .map(Some)
                .map_err(HostError::Transport),
            _ => Err(Self::status_error("get repository", resp).await),
        }
    }

    async fn create_repo(&self, name: &str) -> Result<RemoteRepo, HostError> {
        let url = format!("{}/user/repos", self.api_url);
        let body = json!({
            "name": name,
            "private": false,
            "auto_init": true,
            "description": format!("Generated app for task {}", name),
        });
        let resp = self
            .send(self.request(reqwest::Method::POST, &url).json(&body))
            .await?;
        if !resp.status().is_success() {
            return Err(Self::status_error("create repository", resp).await);
        }
        resp.json::<RemoteRepo>().await.map_err(HostError::Transport)
    }

    async fn file_sha(
        &self,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, HostError> {
        let url = self.contents_url(repo, path)?;
        let resp = self
            .send(
                self.request(reqwest::Method::GET, url.as_str())
                    .query(&[("ref", branch)]),
            )
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => resp
                .json::<ContentEntry>()
                .await
                .map(|entry| Some(entry.sha))
                .map_err(HostError::Transport),
            _ => Err(Self::status_error("read file", resp).await),
        }
    }

    async fn create_file(
        &self,
        repo: &str,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> Result<(), HostError> {
        self.put_contents(repo, path, content, None, message, branch)
            .await
    }

    async fn update_file(
        &self,
        repo: &str,
        path: &str,
        content: &str,
        sha: &str,
        message: &str,
        branch: &str,
    ) -> Result<(), HostError> {
        self.put_contents(repo, path, content, Some(sha), message, branch)
            .await
    }

    async fn latest_commit(&self, repo: &str, branch: &str) -> Result<String, HostError> {
        let url = format!("{}/commits", self.repo_url(repo));
        let resp = self
            .send(
                self.request(reqwest::Method::GET, &url)
                    .query(&[("sha", branch), ("per_page", "1")]),
            )
            .await?;
        // An empty repository answers 409.
        if resp.status() == StatusCode::CONFLICT {
            return Err(HostError::NoCommits {
                repo: repo.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(Self::status_error("list commits", resp).await);
        }
        let commits: Vec<CommitEntry> = resp.json().await.map_err(HostError::Transport)?;
        commits
            .into_iter()
            .next()
            .map(|c| c.sha)
            .ok_or_else(|| HostError::NoCommits {
                repo: repo.to_string(),
            })
    }

    async fn enable_pages(&self, repo: &str, branch: &str) -> Result<(), HostError> {
        let url = format!("{}/pages", self.repo_url(repo));
        let body = json!({ "source": { "branch": branch, "path": "/" } });
        let resp = self
            .send(self.request(reqwest::Method::POST, &url).json(&body))
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Ok(()),
            _ => Err(Self::status_error("enable pages", resp).await),
        }
    }
}
