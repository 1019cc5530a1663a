use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /notify`.
///
/// Extra fields sent by the build service (`task`, `round`, `nonce`,
/// `commit_sha`) are accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyRequest {
    pub repo_url: Option<String>,
    pub brief: Option<String>,
    pub email: Option<String>,
    pub pages_url: Option<String>,
}

/// File-presence checks against the cloned tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticChecks {
    pub has_license: bool,
    pub has_readme: bool,
    pub has_index_html: bool,
    pub has_code_files: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmReview {
    pub readme_feedback: String,
}

/// What the headless browser saw on the deployed page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReport {
    pub reachable: bool,
    pub title: String,
    pub header: String,
    pub buttons_count: usize,
    pub button_clicked: bool,
    pub screenshot_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DynamicChecks {
    Probed(PageReport),
    Failed { reachable: bool, error: String },
    Skipped { skipped: bool, reason: String },
}

impl DynamicChecks {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            reachable: false,
            error: error.into(),
        }
    }

    pub fn skipped() -> Self {
        Self::Skipped {
            skipped: true,
            reason: "No pages_url provided".to_string(),
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Probed(report) if report.reachable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResults {
    pub static_checks: StaticChecks,
    pub llm_review: LlmReview,
    pub dynamic_checks: DynamicChecks,
}

/// One evaluation, written once and never updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub email: Option<String>,
    pub repo_url: String,
    pub pages_url: Option<String>,
    pub brief: Option<String>,
    pub results: EvaluationResults,
    pub created_at: DateTime<Utc>,
}

/// A persisted row as listed by `GET /results`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvaluation {
    pub id: i64,
    pub email: Option<String>,
    pub repo_url: String,
    pub pages_url: Option<String>,
    pub results_json: String,
    pub created_at: String,
}
