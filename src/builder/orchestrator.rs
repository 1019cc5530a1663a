use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::SyncError;

use super::generator::{CodeGenerator, PromptContext};
use super::models::{BuildRequest, BuildResponse, CodeArtifactSet, NotificationPayload, Round, SyncOutcome};
use super::notifier::{NotificationDispatcher, NotifyReport};
use super::sync::RepositorySync;

/// Result of handling one request: the caller's response plus the
/// out-of-band notification task, if one was started.
pub struct Handled {
    pub response: BuildResponse,
    pub notification: Option<JoinHandle<NotifyReport>>,
}

/// Composes generation, repository sync and notification per request.
pub struct RequestOrchestrator {
    generator: CodeGenerator,
    sync: RepositorySync,
    dispatcher: Arc<NotificationDispatcher>,
}

impl RequestOrchestrator {
    pub fn new(
        generator: CodeGenerator,
        sync: RepositorySync,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            generator,
            sync,
            dispatcher,
        }
    }

    pub async fn handle(&self, request: &BuildRequest) -> Result<Handled, SyncError> {
        let Some(round) = Round::from_number(request.round) else {
            return Ok(Handled {
                response: BuildResponse::error(format!(
                    "Round {} not implemented yet",
                    request.round
                )),
                notification: None,
            });
        };

        info!(task = %request.task, round = round.number(), email = %request.email, "handling {} request", round.as_str());

        let files = self.artifacts_for(request).await;
        let outcome = self.sync.sync(&request.task, &files, round).await?;
        info!(
            task = %request.task,
            repo_url = %outcome.repo_url,
            commit_sha = %outcome.commit_sha,
            pages_url = %outcome.pages_url,
            "repository synced"
        );

        let notification = match request.evaluation_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                info!(task = %request.task, url, "notifying evaluation server");
                Some(self.dispatcher.spawn(url.to_string(), payload_for(request, &outcome)))
            }
            _ => {
                info!(task = %request.task, "no evaluation URL provided; skipping notification");
                None
            }
        };

        Ok(Handled {
            response: BuildResponse::ok(request, response_message(round, &outcome), &outcome),
            notification,
        })
    }

    /// Generated files for the request, or the fixed fallback set if generation fails.
    async fn artifacts_for(&self, request: &BuildRequest) -> CodeArtifactSet {
        let context = PromptContext {
            checks: request.checks.clone().unwrap_or_default(),
            attachments: request.attachment_refs(),
        };
        let files = match self
            .generator
            .generate_with(request.brief_or_empty(), &context)
            .await
        {
            Ok(files) => files,
            Err(e) => {
                warn!(task = %request.task, error = %e, "code generation failed, using fallback app");
                CodeArtifactSet::fallback()
            }
        };

        info!(task = %request.task, files = ?files.filenames(), "app code generated");
        if let Some(preview) = files.readme_preview(5) {
            debug!(task = %request.task, "README.md preview:\n{}", preview);
        }
        files
    }
}

fn payload_for(request: &BuildRequest, outcome: &SyncOutcome) -> NotificationPayload {
    NotificationPayload {
        email: request.email.clone(),
        task: request.task.clone(),
        round: request.round,
        nonce: request.nonce.clone(),
        repo_url: outcome.repo_url.clone(),
        commit_sha: outcome.commit_sha.clone(),
        pages_url: outcome.pages_url.clone(),
    }
}

fn response_message(round: Round, outcome: &SyncOutcome) -> String {
    let base = match round {
        Round::Build => "Request accepted".to_string(),
        Round::Revise => format!("Round {} revision applied", round.number()),
    };
    let failed = outcome.failed_files();
    if failed.is_empty() {
        base
    } else {
        format!(
            "{} ({} of {} files failed: {})",
            base,
            failed.len(),
            outcome.files.len(),
            failed.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, GeneratorMode};
    use crate::fakes::{InMemoryHost, ScriptedCallbackClient, ScriptedGenerator};

    struct Harness {
        orchestrator: RequestOrchestrator,
        host: Arc<InMemoryHost>,
        backend: Arc<ScriptedGenerator>,
        callbacks: Arc<ScriptedCallbackClient>,
    }

    fn harness(backend: ScriptedGenerator) -> Harness {
        let mut config = AppConfig::default();
        config.github.user = "student".to_string();
        let host = Arc::new(InMemoryHost::new("student"));
        let backend = Arc::new(backend);
        let callbacks = Arc::new(ScriptedCallbackClient::always(200));
        let orchestrator = RequestOrchestrator::new(
            CodeGenerator::new(backend.clone(), GeneratorMode::Model),
            RepositorySync::new(host.clone(), config.github.clone()),
            Arc::new(NotificationDispatcher::new(callbacks.clone(), &config.notify)),
        );
        Harness {
            orchestrator,
            host,
            backend,
            callbacks,
        }
    }

    fn request(round: i64, evaluation_url: Option<&str>) -> BuildRequest {
        BuildRequest {
            email: "student@example.com".into(),
            secret: "cutu".into(),
            task: "captcha-solver-001".into(),
            round,
            nonce: "1234".into(),
            brief: Some("Create a captcha solver".into()),
            checks: Some(vec!["Repo has MIT license".into()]),
            evaluation_url: evaluation_url.map(str::to_string),
            attachments: None,
        }
    }

    const GENERATED: &str = r##"{"index.html": "<h1>Captcha</h1>", "README.md": "# Captcha"}"##;

    #[tokio::test]
    async fn test_round_one_build_scenario() {
        let h = harness(ScriptedGenerator::replying(GENERATED));
        let handled = h
            .orchestrator
            .handle(&request(1, Some("https://eval.example/notify")))
            .await
            .unwrap();

        let resp = handled.response;
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.message, "Request accepted");
        assert_eq!(resp.task.as_deref(), Some("captcha-solver-001"));
        assert_eq!(resp.nonce.as_deref(), Some("1234"));
        assert!(!resp.repo_url.unwrap().is_empty());
        assert!(!resp.commit_sha.unwrap().is_empty());
        assert_eq!(
            resp.pages_url.as_deref(),
            Some("https://student.github.io/captcha-solver-001/")
        );
        assert!(h.backend.prompts()[0].contains("Repo has MIT license"));

        let report = handled.notification.unwrap().await.unwrap();
        assert!(report.delivered);
        let calls = h.callbacks.calls();
        assert_eq!(calls[0].0, "https://eval.example/notify");
        assert_eq!(calls[0].1["nonce"], "1234");
        assert_eq!(calls[0].1["round"], 1);
    }

    #[tokio::test]
    async fn test_generation_failure_pushes_fallback() {
        let h = harness(ScriptedGenerator::failing());
        let handled = h.orchestrator.handle(&request(1, None)).await.unwrap();

        assert_eq!(handled.response.status, "ok");
        assert!(handled.notification.is_none());
        let fallback = CodeArtifactSet::fallback();
        assert_eq!(
            h.host.file("captcha-solver-001", "index.html").as_deref(),
            fallback.get("index.html")
        );
    }

    #[tokio::test]
    async fn test_stalled_model_falls_back_within_request_timeout() {
        use crate::llm::GeminiClient;
        use std::time::Duration;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let mut config = AppConfig::default();
        config.github.user = "student".to_string();
        config.llm.api_url = server.uri();
        config.llm.api_key = Some("k".to_string());
        config.llm.request_timeout = Duration::from_millis(100);

        let host = Arc::new(InMemoryHost::new("student"));
        let orchestrator = RequestOrchestrator::new(
            CodeGenerator::new(
                Arc::new(GeminiClient::new(&config.llm).unwrap()),
                GeneratorMode::Model,
            ),
            RepositorySync::new(host.clone(), config.github.clone()),
            Arc::new(NotificationDispatcher::new(
                Arc::new(ScriptedCallbackClient::always(200)),
                &config.notify,
            )),
        );

        let handled = tokio::time::timeout(
            Duration::from_secs(10),
            orchestrator.handle(&request(1, None)),
        )
        .await
        .expect("model call should time out well before the outer guard")
        .unwrap();

        assert_eq!(handled.response.status, "ok");
        let fallback = CodeArtifactSet::fallback();
        assert_eq!(
            host.file("captcha-solver-001", "index.html").as_deref(),
            fallback.get("index.html")
        );
    }

    #[tokio::test]
    async fn test_revise_after_build_updates_same_repo() {
        let h = harness(ScriptedGenerator::sequence(vec![
            Ok(GENERATED.to_string()),
            Ok(r#"{"index.html": "<h1>Captcha v2</h1>"}"#.to_string()),
        ]));
        let first = h.orchestrator.handle(&request(1, None)).await.unwrap();
        let second = h.orchestrator.handle(&request(2, None)).await.unwrap();

        assert_eq!(h.host.repo_count(), 1);
        assert_eq!(second.response.message, "Round 2 revision applied");
        assert_eq!(first.response.repo_url, second.response.repo_url);
        assert_ne!(first.response.commit_sha, second.response.commit_sha);
        assert_eq!(
            h.host.file("captcha-solver-001", "index.html").as_deref(),
            Some("<h1>Captcha v2</h1>")
        );
    }

    #[tokio::test]
    async fn test_revise_without_repo_propagates_not_found() {
        let h = harness(ScriptedGenerator::replying(GENERATED));
        let err = h.orchestrator.handle(&request(2, None)).await.err().unwrap();
        assert!(matches!(err, SyncError::RepoNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unhandled_round_skips_generation_and_sync() {
        let h = harness(ScriptedGenerator::replying(GENERATED));
        let handled = h
            .orchestrator
            .handle(&request(3, Some("https://eval.example/notify")))
            .await
            .unwrap();

        assert_eq!(handled.response, BuildResponse::error("Round 3 not implemented yet"));
        assert!(handled.notification.is_none());
        assert!(h.backend.prompts().is_empty());
        assert_eq!(h.host.repo_count(), 0);
        assert!(h.callbacks.calls().is_empty());
    }

    #[tokio::test]
    async fn test_per_file_failures_reported_in_message() {
        let h = harness(ScriptedGenerator::replying(GENERATED));
        h.host.fail_writes_to("README.md");
        let handled = h.orchestrator.handle(&request(1, None)).await.unwrap();
        assert_eq!(
            handled.response.message,
            "Request accepted (1 of 2 files failed: README.md)"
        );
    }
}
