use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use insight_engine::llm::LanguageModel;
use insight_engine::{EngineConfig, InsightEngine, OllamaClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env();

    let ollama = OllamaClient::new(
        Some(config.ollama_url.clone()),
        Some(config.model.clone()),
    );
    let llm: Option<Arc<dyn LanguageModel>> = if ollama.health_check().await.unwrap_or(false) {
        info!(url = %config.ollama_url, model = %config.model, "model backend reachable");
        Some(Arc::new(ollama))
    } else {
        warn!(
            url = %config.ollama_url,
            "model backend unreachable, running with rule-based fallbacks only"
        );
        None
    };

    let host = config.host.clone();
    let port = config.port;
    let engine = InsightEngine::new(config, llm);
    insight_engine::web::start_server(engine, &host, port).await
}
