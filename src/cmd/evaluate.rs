//! Evaluator service command — `pagesmith evaluate`.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use pagesmith::config::AppConfig;
use pagesmith::evaluator::api::{EvaluatorState, api_router};
use pagesmith::evaluator::browser::ChromiumProbe;
use pagesmith::evaluator::db::ResultStore;
use pagesmith::evaluator::fetch::GitCloner;
use pagesmith::evaluator::pipeline::Evaluator;
use pagesmith::llm::GeminiClient;

pub async fn cmd_evaluate(config: AppConfig) -> Result<()> {
    if config.llm.api_key.is_none() {
        warn!("no model API key configured; README reviews will report the failure");
    }

    let store = ResultStore::open(&config.evaluator.db_path)?;
    info!(db_path = %config.evaluator.db_path.display(), "evaluation store ready");

    let evaluator = Evaluator::new(
        Arc::new(GitCloner),
        Arc::new(GeminiClient::new(&config.llm)?),
        Arc::new(ChromiumProbe::new(&config.evaluator)),
        store,
    );
    let app = api_router().with_state(Arc::new(EvaluatorState { evaluator }));

    pagesmith::server::serve(
        app,
        &config.server.host,
        config.server.evaluator_port,
        "evaluator",
    )
    .await
}
