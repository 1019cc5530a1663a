//! Build service command — `pagesmith serve`.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use pagesmith::builder::api::{AppState, api_router};
use pagesmith::builder::generator::CodeGenerator;
use pagesmith::builder::github::{GitHubClient, is_valid_github_token};
use pagesmith::builder::notifier::{HttpCallbackClient, NotificationDispatcher};
use pagesmith::builder::orchestrator::RequestOrchestrator;
use pagesmith::builder::sync::RepositorySync;
use pagesmith::config::{AppConfig, GeneratorMode};
use pagesmith::llm::GeminiClient;

pub async fn cmd_serve(config: AppConfig) -> Result<()> {
    if config.student_secret.is_none() {
        warn!("STUDENT_SECRET is not set; every build request will be rejected");
    }
    match config.github.token.as_deref() {
        None => warn!("GITHUB_TOKEN is not set; repository operations will fail"),
        Some(token) if !is_valid_github_token(token) => {
            warn!("GITHUB_TOKEN does not look like a GitHub token")
        }
        Some(_) => {}
    }
    if config.github.user.is_empty() {
        warn!("GITHUB_USER is not set; pages URLs will be malformed");
    }

    let mode = config.effective_generator_mode();
    if mode == GeneratorMode::Placeholder && config.llm.mode == GeneratorMode::Model {
        warn!("no model API key configured; using placeholder generation");
    }
    info!(mode = ?mode, model = %config.llm.model, "code generator ready");

    let model = GeminiClient::new(&config.llm)?;
    let host = GitHubClient::new(&config.github)?;
    let callbacks = HttpCallbackClient::new(config.notify.request_timeout)?;

    let orchestrator = RequestOrchestrator::new(
        CodeGenerator::new(Arc::new(model), mode),
        RepositorySync::new(Arc::new(host), config.github.clone()),
        Arc::new(NotificationDispatcher::new(Arc::new(callbacks), &config.notify)),
    );
    let state = Arc::new(AppState {
        orchestrator,
        student_secret: config.student_secret.clone(),
    });

    pagesmith::server::serve(
        api_router().with_state(state),
        &config.server.host,
        config.server.port,
        "builder",
    )
    .await
}
