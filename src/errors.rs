//! Typed error hierarchy for pagesmith.
//!
//! One enum per external seam:
//! - `LlmError` — text-completion backend failures
//! - `GenerationError` — model output that could not become an artifact set
//! - `HostError` — repository hosting provider failures
//! - `SyncError` — repository reconciliation failures surfaced to the caller
//! - `FetchError` — evaluator clone failures
//! - `ProbeError` — headless-browser failures
//! - `ConfigError` — configuration loading failures

use thiserror::Error;

/// Errors from the generative text backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Model backend request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Model backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Model backend returned no text")]
    EmptyResponse,

    #[error("Model backend is not configured")]
    NotConfigured,
}

/// Reasons a brief could not be turned into a usable artifact set.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Backend(#[from] LlmError),

    #[error("No JSON object found in model output")]
    NoJsonObject,

    #[error("Model output is not a filename-to-content object: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Generated files are missing the entry point {0}")]
    MissingEntryPoint(&'static str),
}

/// Errors from the repository hosting provider.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Repository {repo} not found")]
    RepoNotFound { repo: String },

    #[error("Hosting API request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Hosting API returned HTTP {status} for {operation}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Repository {repo} has no commits")]
    NoCommits { repo: String },

    #[error("Invalid hosting API URL: {0}")]
    InvalidUrl(String),
}

/// Failures that abort a repository sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Cannot revise task {task}: repository does not exist")]
    RepoNotFound { task: String },

    #[error("Failed to create repository {task}: {source}")]
    CreateFailed {
        task: String,
        #[source]
        source: HostError,
    },

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Errors from cloning a repository for evaluation.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to create working directory: {0}")]
    WorkDir(#[source] std::io::Error),

    #[error("Clone of {url} failed: {source}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },

    #[error("Clone task panicked")]
    Panicked,
}

/// Errors from a headless-browser probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("Browser error: {0}")]
    Browser(String),
}

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}
