use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::errors::FetchError;

/// A cloned working tree in an ephemeral directory, removed on drop.
pub struct Checkout {
    dir: TempDir,
}

impl Checkout {
    pub fn new(dir: TempDir) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Abstraction over repository cloning for testability.
/// Real implementation: `GitCloner`. Test double: `fakes::StaticFetcher`.
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Checkout, FetchError>;
}

/// Clones with libgit2; network remotes are fetched at depth 1.
#[derive(Debug, Default)]
pub struct GitCloner;

fn is_network_url(url: &str) -> bool {
    ["https://", "http://", "ssh://", "git://", "git@"]
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

fn clone_into(url: &str, target: &Path) -> Result<(), FetchError> {
    let mut fetch = git2::FetchOptions::new();
    // libgit2's local transport does not support shallow fetches.
    if is_network_url(url) {
        fetch.depth(1);
    }
    git2::build::RepoBuilder::new()
        .fetch_options(fetch)
        .clone(url, target)
        .map(|_| ())
        .map_err(|source| FetchError::Clone {
            url: url.to_string(),
            source,
        })
}

#[async_trait]
impl RepoFetcher for GitCloner {
    async fn fetch(&self, url: &str) -> Result<Checkout, FetchError> {
        let dir = tempfile::Builder::new()
            .prefix("pagesmith-eval-")
            .tempdir()
            .map_err(FetchError::WorkDir)?;
        let target: PathBuf = dir.path().to_path_buf();
        let url = url.to_string();

        tokio::task::spawn_blocking(move || clone_into(&url, &target))
            .await
            .map_err(|_| FetchError::Panicked)??;

        Ok(Checkout::new(dir))
    }
}
