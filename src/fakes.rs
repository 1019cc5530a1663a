//! In-memory fakes for the external seams (testing only)
//!
//! Provides `InMemoryHost`, `ScriptedGenerator`, `ScriptedCallbackClient`,
//! `StaticFetcher`, and `FakeProbe`, each satisfying its trait contract
//! without network access, a browser, or a hosting account.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::builder::github::{RemoteRepo, RepositoryHost};
use crate::builder::notifier::CallbackClient;
use crate::errors::{FetchError, HostError, LlmError, ProbeError};
use crate::evaluator::browser::PageProbe;
use crate::evaluator::fetch::{Checkout, RepoFetcher};
use crate::evaluator::models::PageReport;
use crate::llm::TextGenerator;

// ---------------------------------------------------------------------------
// InMemoryHost
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct HostedRepo {
    files: BTreeMap<String, (String, String)>,
    commits: Vec<String>,
    pages: bool,
}

#[derive(Debug, Default)]
struct HostState {
    repos: HashMap<String, HostedRepo>,
    counter: u64,
    fail_create: bool,
    failing_paths: HashSet<String>,
}

impl HostState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}{:08x}", prefix, self.counter)
    }

    fn commit(&mut self, repo: &str) -> Result<(), HostError> {
        let sha = self.next_id("c");
        self.repos
            .get_mut(repo)
            .ok_or_else(|| HostError::RepoNotFound {
                repo: repo.to_string(),
            })?
            .commits
            .push(sha);
        Ok(())
    }

    fn put(&mut self, repo: &str, path: &str, content: &str) -> Result<(), HostError> {
        let blob = self.next_id("b");
        self.repos
            .get_mut(repo)
            .ok_or_else(|| HostError::RepoNotFound {
                repo: repo.to_string(),
            })?
            .files
            .insert(path.to_string(), (blob, content.to_string()));
        self.commit(repo)
    }

    fn check_writable(&self, path: &str) -> Result<(), HostError> {
        if self.failing_paths.contains(path) {
            return Err(HostError::Status {
                operation: "write file".into(),
                status: 500,
                body: format!("injected failure for {}", path),
            });
        }
        Ok(())
    }
}

/// Hosting account backed by a map of repositories. New repositories are
/// auto-initialized with a `README.md` and one commit, like the real host.
#[derive(Debug)]
pub struct InMemoryHost {
    owner: String,
    state: Mutex<HostState>,
}

impl InMemoryHost {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            state: Mutex::new(HostState::default()),
        }
    }

    fn remote(&self, name: &str) -> RemoteRepo {
        RemoteRepo {
            name: name.to_string(),
            html_url: format!("https://github.com/{}/{}", self.owner, name),
            default_branch: "main".to_string(),
        }
    }

    /// Create a repository holding exactly `files` in one commit.
    pub fn seed_repo(&self, name: &str, files: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        let mut repo = HostedRepo::default();
        for (path, content) in files {
            let blob = state.next_id("b");
            repo.files
                .insert(path.to_string(), (blob, content.to_string()));
        }
        repo.commits.push(state.next_id("c"));
        state.repos.insert(name.to_string(), repo);
    }

    pub fn fail_repo_creation(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    /// Make every create or update of `path` fail.
    pub fn fail_writes_to(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_paths
            .insert(path.to_string());
    }

    pub fn repo_count(&self) -> usize {
        self.state.lock().unwrap().repos.len()
    }

    pub fn file(&self, repo: &str, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .repos
            .get(repo)
            .and_then(|r| r.files.get(path))
            .map(|(_, content)| content.clone())
    }

    pub fn head(&self, repo: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.repos.get(repo).and_then(|r| r.commits.last().cloned())
    }

    pub fn pages_enabled(&self, repo: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.repos.get(repo).is_some_and(|r| r.pages)
    }
}

#[async_trait]
impl RepositoryHost for InMemoryHost {
    async fn get_repo(&self, name: &str) -> Result<Option<RemoteRepo>, HostError> {
        let exists = self.state.lock().unwrap().repos.contains_key(name);
        Ok(exists.then(|| self.remote(name)))
    }

    async fn create_repo(&self, name: &str) -> Result<RemoteRepo, HostError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(HostError::Status {
                operation: "create repository".into(),
                status: 403,
                body: "injected failure".into(),
            });
        }
        if state.repos.contains_key(name) {
            return Err(HostError::Status {
                operation: "create repository".into(),
                status: 422,
                body: "name already exists on this account".into(),
            });
        }
        state.repos.insert(name.to_string(), HostedRepo::default());
        state.put(name, "README.md", &format!("# {}", name))?;
        Ok(self.remote(name))
    }

    async fn file_sha(
        &self,
        repo: &str,
        path: &str,
        _branch: &str,
    ) -> Result<Option<String>, HostError> {
        let state = self.state.lock().unwrap();
        let hosted = state.repos.get(repo).ok_or_else(|| HostError::RepoNotFound {
            repo: repo.to_string(),
        })?;
        Ok(hosted.files.get(path).map(|(sha, _)| sha.clone()))
    }

    async fn create_file(
        &self,
        repo: &str,
        path: &str,
        content: &str,
        _message: &str,
        _branch: &str,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        state.check_writable(path)?;
        let exists = state
            .repos
            .get(repo)
            .is_some_and(|r| r.files.contains_key(path));
        if exists {
            return Err(HostError::Status {
                operation: "create file".into(),
                status: 422,
                body: "\"sha\" wasn't supplied".into(),
            });
        }
        state.put(repo, path, content)
    }

    async fn update_file(
        &self,
        repo: &str,
        path: &str,
        content: &str,
        sha: &str,
        _message: &str,
        _branch: &str,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        state.check_writable(path)?;
        let current = state
            .repos
            .get(repo)
            .and_then(|r| r.files.get(path))
            .map(|(blob, _)| blob.clone());
        if current.as_deref() != Some(sha) {
            return Err(HostError::Status {
                operation: "update file".into(),
                status: 409,
                body: format!("{} does not match {}", path, sha),
            });
        }
        state.put(repo, path, content)
    }

    async fn latest_commit(&self, repo: &str, _branch: &str) -> Result<String, HostError> {
        let state = self.state.lock().unwrap();
        let hosted = state.repos.get(repo).ok_or_else(|| HostError::RepoNotFound {
            repo: repo.to_string(),
        })?;
        hosted
            .commits
            .last()
            .cloned()
            .ok_or_else(|| HostError::NoCommits {
                repo: repo.to_string(),
            })
    }

    async fn enable_pages(&self, repo: &str, _branch: &str) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        let hosted = state
            .repos
            .get_mut(repo)
            .ok_or_else(|| HostError::RepoNotFound {
                repo: repo.to_string(),
            })?;
        hosted.pages = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

enum Script {
    Always(Result<String, String>),
    Queue(Mutex<VecDeque<Result<String, String>>>),
}

/// Text backend that replays canned replies and records every prompt.
pub struct ScriptedGenerator {
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(text: &str) -> Self {
        Self::with_script(Script::Always(Ok(text.to_string())))
    }

    /// Every call fails with an HTTP 500 from the backend.
    pub fn failing() -> Self {
        Self::with_script(Script::Always(Err("backend unavailable".to_string())))
    }

    /// One reply per call, in order; calls past the end fail.
    pub fn sequence(replies: Vec<Result<String, String>>) -> Self {
        Self::with_script(Script::Queue(Mutex::new(replies.into())))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = match &self.script {
            Script::Always(reply) => reply.clone(),
            Script::Queue(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("script exhausted".to_string())),
        };
        reply.map_err(|body| LlmError::Status { status: 500, body })
    }
}

// ---------------------------------------------------------------------------
// ScriptedCallbackClient
// ---------------------------------------------------------------------------

/// Callback endpoint that answers from a script and records each POST.
/// `Err` entries stand in for transport failures.
pub struct ScriptedCallbackClient {
    fixed: Option<u16>,
    queue: Mutex<VecDeque<Result<u16, String>>>,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
}

impl ScriptedCallbackClient {
    pub fn always(status: u16) -> Self {
        Self {
            fixed: Some(status),
            queue: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Responses in order; once exhausted every call gets a 500.
    pub fn sequence(responses: Vec<Result<u16, String>>) -> Self {
        Self {
            fixed: None,
            queue: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallbackClient for ScriptedCallbackClient {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> anyhow::Result<u16> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        let next = match self.fixed {
            Some(status) => Ok(status),
            None => self.queue.lock().unwrap().pop_front().unwrap_or(Ok(500)),
        };
        next.map_err(|e| anyhow::anyhow!(e))
    }
}

// ---------------------------------------------------------------------------
// StaticFetcher
// ---------------------------------------------------------------------------

/// Repository fetcher that materializes a fixed file list instead of cloning.
pub struct StaticFetcher {
    files: Option<Vec<(String, String)>>,
    requested: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        Self {
            files: Some(
                files
                    .iter()
                    .map(|(p, c)| (p.to_string(), c.to_string()))
                    .collect(),
            ),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Every fetch fails as if the clone was refused.
    pub fn failing() -> Self {
        Self {
            files: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepoFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Checkout, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        let Some(files) = &self.files else {
            return Err(FetchError::Clone {
                url: url.to_string(),
                source: git2::Error::from_str("repository not found"),
            });
        };
        let dir = tempfile::tempdir().map_err(FetchError::WorkDir)?;
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).map_err(FetchError::WorkDir)?;
            }
            std::fs::write(full, content).map_err(FetchError::WorkDir)?;
        }
        Ok(Checkout::new(dir))
    }
}

// ---------------------------------------------------------------------------
// FakeProbe
// ---------------------------------------------------------------------------

/// Browser stand-in returning a fixed report or a fixed error.
pub struct FakeProbe {
    outcome: Result<PageReport, ProbeError>,
    visited: Mutex<Vec<String>>,
}

impl FakeProbe {
    pub fn reporting(report: PageReport) -> Self {
        Self {
            outcome: Ok(report),
            visited: Mutex::new(Vec::new()),
        }
    }

    /// Every probe fails with `error`.
    pub fn failing(error: ProbeError) -> Self {
        Self {
            outcome: Err(error),
            visited: Mutex::new(Vec::new()),
        }
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageProbe for FakeProbe {
    async fn probe(&self, url: &str) -> Result<PageReport, ProbeError> {
        self.visited.lock().unwrap().push(url.to_string());
        match &self.outcome {
            Ok(report) => Ok(report.clone()),
            Err(ProbeError::Launch(msg)) => Err(ProbeError::Launch(msg.clone())),
            Err(ProbeError::Timeout { url, secs }) => Err(ProbeError::Timeout {
                url: url.clone(),
                secs: *secs,
            }),
            Err(ProbeError::Browser(msg)) => Err(ProbeError::Browser(msg.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_host_auto_init_and_sha_checks() {
        let host = InMemoryHost::new("student");
        host.create_repo("app").await.unwrap();
        assert_eq!(host.file("app", "README.md").as_deref(), Some("# app"));

        let sha = host.file_sha("app", "README.md", "main").await.unwrap().unwrap();
        let err = host
            .update_file("app", "README.md", "x", "stale", "m", "main")
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Status { status: 409, .. }));

        host.update_file("app", "README.md", "x", &sha, "m", "main")
            .await
            .unwrap();
        assert_eq!(host.file("app", "README.md").as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_host_create_existing_file_conflicts() {
        let host = InMemoryHost::new("student");
        host.seed_repo("app", &[("index.html", "a")]);
        let err = host
            .create_file("app", "index.html", "b", "m", "main")
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Status { status: 422, .. }));
    }

    #[tokio::test]
    async fn test_scripted_generator_sequence_then_exhausted() {
        let backend = ScriptedGenerator::sequence(vec![Ok("one".into())]);
        assert_eq!(backend.complete("p1").await.unwrap(), "one");
        assert!(backend.complete("p2").await.is_err());
        assert_eq!(backend.prompts(), vec!["p1".to_string(), "p2".to_string()]);
    }

    #[tokio::test]
    async fn test_callback_sequence_falls_back_to_500() {
        let client = ScriptedCallbackClient::sequence(vec![Err("refused".into())]);
        let body = serde_json::json!({});
        assert!(client.post_json("u", &body).await.is_err());
        assert_eq!(client.post_json("u", &body).await.unwrap(), 500);
        assert_eq!(client.calls().len(), 2);
    }
}
