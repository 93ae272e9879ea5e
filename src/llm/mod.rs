//! LLM boundary: a single injected collaborator interface
//!
//! Every model interaction in the engine (intent classification, transform
//! plan generation, explanation streaming) goes through [`LanguageModel`],
//! so executors and classifiers unit-test against a fake implementation.

pub mod explain;
pub mod ollama;

pub use ollama::OllamaClient;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Text-completion contract for the model backend
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// One-shot completion. The classifier demands a single lowercase token;
    /// plan generation demands strict JSON.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Streamed completion. The channel yields text chunks; a chunk error is
    /// terminal, and channel close is the definitive end-of-stream signal.
    async fn stream_complete(
        &self,
        system: &str,
        user: &str,
    ) -> Result<mpsc::Receiver<Result<String>>>;
}
