use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Entry point every artifact set must contain.
pub const ENTRY_POINT: &str = "index.html";
pub const README: &str = "README.md";

/// Inbound build/revise request. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub email: String,
    pub secret: String,
    pub task: String,
    pub round: i64,
    pub nonce: String,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default)]
    pub checks: Option<Vec<String>>,
    #[serde(default)]
    pub evaluation_url: Option<String>,
    #[serde(default)]
    pub attachments: Option<Vec<serde_json::Value>>,
}

impl BuildRequest {
    pub fn brief_or_empty(&self) -> &str {
        self.brief.as_deref().unwrap_or("")
    }

    /// `(name, url)` pairs for attachments that carry at least a name or url.
    pub fn attachment_refs(&self) -> Vec<(String, String)> {
        self.attachments
            .iter()
            .flatten()
            .filter_map(|a| {
                let name = a.get("name").and_then(|v| v.as_str()).unwrap_or("");
                let url = a.get("url").and_then(|v| v.as_str()).unwrap_or("");
                if name.is_empty() && url.is_empty() {
                    None
                } else {
                    Some((name.to_string(), url.to_string()))
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    Build,
    Revise,
}

impl Round {
    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(Self::Build),
            2 => Some(Self::Revise),
            _ => None,
        }
    }

    pub fn number(&self) -> i64 {
        match self {
            Self::Build => 1,
            Self::Revise => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Revise => "revise",
        }
    }
}

/// Relative filename to full text content.
///
/// Ordered so that commits and logs are deterministic. A fresh set is produced
/// per request; revise overwrites remote files by filename only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeArtifactSet {
    files: BTreeMap<String, String>,
}

const FALLBACK_INDEX: &str = "<!DOCTYPE html><html><head><title>Fallback App</title></head><body><h1>Fallback App</h1></body></html>";
const FALLBACK_README: &str =
    "# Fallback App\nThis is a fallback README generated due to LLM error.";

impl CodeArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(files: BTreeMap<String, String>) -> Self {
        Self { files }
    }

    /// Fixed set used whenever generation fails. Byte-identical on every call.
    pub fn fallback() -> Self {
        let mut set = Self::new();
        set.insert(ENTRY_POINT, FALLBACK_INDEX);
        set.insert(README, FALLBACK_README);
        set
    }

    /// Minimal page echoing the brief, used when no model is configured.
    pub fn placeholder(brief: &str) -> Self {
        let mut set = Self::new();
        set.insert(
            ENTRY_POINT,
            format!(
                "<!DOCTYPE html>\n<html>\n<head>\n    <title>Placeholder App</title>\n</head>\n<body>\n    <h1>{}</h1>\n    <p>This is a placeholder app for testing repository push and Pages.</p>\n</body>\n</html>\n",
                escape_html(brief)
            ),
        );
        set
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.files.insert(name.into(), content.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn has_entry_point(&self) -> bool {
        self.contains(ENTRY_POINT)
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// First `lines` lines of the README, if one was generated.
    pub fn readme_preview(&self, lines: usize) -> Option<String> {
        self.get(README)
            .map(|readme| readme.lines().take(lines).collect::<Vec<_>>().join("\n"))
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Outbound notification body. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub email: String,
    pub task: String,
    pub round: i64,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

/// What happened to a single file during a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FileOutcome {
    Created { path: String },
    Updated { path: String },
    Failed { path: String, error: String },
}

impl FileOutcome {
    pub fn path(&self) -> &str {
        match self {
            Self::Created { path } | Self::Updated { path } | Self::Failed { path, .. } => path,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Identifiers read back from the hosting provider after a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
    pub files: Vec<FileOutcome>,
}

impl SyncOutcome {
    pub fn failed_files(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter(|f| f.is_failure())
            .map(FileOutcome::path)
            .collect()
    }
}

/// Synchronous response to the build/revise caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages_url: Option<String>,
}

impl BuildResponse {
    pub fn ok(request: &BuildRequest, message: String, outcome: &SyncOutcome) -> Self {
        Self {
            status: "ok".to_string(),
            message,
            email: Some(request.email.clone()),
            task: Some(request.task.clone()),
            round: Some(request.round),
            nonce: Some(request.nonce.clone()),
            repo_url: Some(outcome.repo_url.clone()),
            commit_sha: Some(outcome.commit_sha.clone()),
            pages_url: Some(outcome.pages_url.clone()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            email: None,
            task: None,
            round: None,
            nonce: None,
            repo_url: None,
            commit_sha: None,
            pages_url: None,
        }
    }
}
