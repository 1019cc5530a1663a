use std::sync::Arc;

use tracing::{info, warn};

use crate::config::GitHubSettings;
use crate::errors::{HostError, SyncError};

use super::github::{RemoteRepo, RepositoryHost};
use super::models::{CodeArtifactSet, FileOutcome, Round, SyncOutcome};

/// Reconciles a generated artifact set with the task's hosted repository.
///
/// Files are written one at a time with a read-then-write per file (look up the
/// content identifier, then update or create). Two concurrent revise requests
/// for the same task are not coordinated here: one of them may update with a
/// stale identifier and see that file fail, and otherwise the last writer wins.
pub struct RepositorySync {
    host: Arc<dyn RepositoryHost>,
    settings: GitHubSettings,
}

impl RepositorySync {
    pub fn new(host: Arc<dyn RepositoryHost>, settings: GitHubSettings) -> Self {
        Self { host, settings }
    }

    pub async fn sync(
        &self,
        task: &str,
        files: &CodeArtifactSet,
        round: Round,
    ) -> Result<SyncOutcome, SyncError> {
        let repo = match round {
            Round::Build => self.ensure_repo(task).await?,
            Round::Revise => self
                .host
                .get_repo(task)
                .await?
                .ok_or_else(|| SyncError::RepoNotFound {
                    task: task.to_string(),
                })?,
        };
        info!(task, round = round.number(), repo = %repo.html_url, "syncing files");

        let outcomes = self.write_files(&repo, files, round).await;

        if round == Round::Build {
            self.host
                .enable_pages(&repo.name, &repo.default_branch)
                .await?;
        }

        let commit_sha = self
            .host
            .latest_commit(&repo.name, &repo.default_branch)
            .await?;

        Ok(SyncOutcome {
            repo_url: repo.html_url,
            commit_sha,
            pages_url: self.settings.pages_url(task),
            files: outcomes,
        })
    }

    async fn ensure_repo(&self, task: &str) -> Result<RemoteRepo, SyncError> {
        if let Some(existing) = self.host.get_repo(task).await? {
            info!(task, "repository already exists, reusing it");
            return Ok(existing);
        }
        self.host
            .create_repo(task)
            .await
            .map_err(|source| SyncError::CreateFailed {
                task: task.to_string(),
                source,
            })
    }

    async fn write_files(
        &self,
        repo: &RemoteRepo,
        files: &CodeArtifactSet,
        round: Round,
    ) -> Vec<FileOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for (path, content) in files.iter() {
            let outcome = match self.write_file(repo, path, content, round).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(repo = %repo.name, file = path, error = %e, "file write failed");
                    FileOutcome::Failed {
                        path: path.to_string(),
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn write_file(
        &self,
        repo: &RemoteRepo,
        path: &str,
        content: &str,
        round: Round,
    ) -> Result<FileOutcome, HostError> {
        let branch = &repo.default_branch;
        match self.host.file_sha(&repo.name, path, branch).await? {
            Some(sha) => {
                let message = format!("Update {} (round {})", path, round.number());
                self.host
                    .update_file(&repo.name, path, content, &sha, &message, branch)
                    .await?;
                info!(repo = %repo.name, file = path, "updated");
                Ok(FileOutcome::Updated {
                    path: path.to_string(),
                })
            }
            None => {
                let message = format!("Add {} (round {})", path, round.number());
                self.host
                    .create_file(&repo.name, path, content, &message, branch)
                    .await?;
                info!(repo = %repo.name, file = path, "created");
                Ok(FileOutcome::Created {
                    path: path.to_string(),
                })
            }
        }
    }
}
