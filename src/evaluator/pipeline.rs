use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::errors::FetchError;
use crate::llm::TextGenerator;

use super::browser::{PageProbe, dynamic_checks};
use super::checks::{read_readme, static_checks};
use super::db::ResultStore;
use super::fetch::RepoFetcher;
use super::models::{EvaluationRecord, EvaluationResults};
use super::review::review_readme;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to persist evaluation: {0}")]
    Persist(anyhow::Error),
}

/// Inputs for one evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationTarget {
    pub repo_url: String,
    pub pages_url: Option<String>,
    pub brief: Option<String>,
    pub email: Option<String>,
}

/// Clone, check, review, probe, persist.
///
/// Only the clone and the final write can fail the run. Review and browser
/// failures are recorded inside the results and the row is still written.
pub struct Evaluator {
    fetcher: Arc<dyn RepoFetcher>,
    reviewer: Arc<dyn TextGenerator>,
    probe: Arc<dyn PageProbe>,
    store: ResultStore,
}

impl Evaluator {
    pub fn new(
        fetcher: Arc<dyn RepoFetcher>,
        reviewer: Arc<dyn TextGenerator>,
        probe: Arc<dyn PageProbe>,
        store: ResultStore,
    ) -> Self {
        Self {
            fetcher,
            reviewer,
            probe,
            store,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub async fn evaluate(
        &self,
        target: &EvaluationTarget,
    ) -> Result<EvaluationResults, EvaluationError> {
        info!(repo_url = %target.repo_url, "evaluation started");

        let checkout = self.fetcher.fetch(&target.repo_url).await.map_err(|e| {
            warn!(repo_url = %target.repo_url, error = %e, "clone failed");
            e
        })?;

        let static_checks = static_checks(checkout.path());
        let readme = read_readme(checkout.path());
        // The working tree is not needed past this point.
        drop(checkout);

        let brief = target.brief.as_deref().unwrap_or_default();
        let llm_review = review_readme(self.reviewer.as_ref(), readme.as_deref(), brief).await;
        let dynamic_checks = dynamic_checks(self.probe.as_ref(), target.pages_url.as_deref()).await;

        let results = EvaluationResults {
            static_checks,
            llm_review,
            dynamic_checks,
        };

        let id = self
            .store
            .insert(EvaluationRecord {
                email: target.email.clone(),
                repo_url: target.repo_url.clone(),
                pages_url: target.pages_url.clone(),
                brief: target.brief.clone(),
                results: results.clone(),
                created_at: Utc::now(),
            })
            .await
            .map_err(EvaluationError::Persist)?;

        info!(
            id,
            repo_url = %target.repo_url,
            reachable = results.dynamic_checks.is_reachable(),
            "evaluation stored"
        );
        Ok(results)
    }
}
