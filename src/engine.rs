//! The analysis pipeline: classify, resolve, execute, normalize
//!
//! `InsightEngine` owns the stores and the model collaborators and exposes
//! the operations the web layer binds routes to. Failure handling follows
//! the error taxonomy: bad input surfaces as an `Err` for the transport to
//! map to a 4xx, while resolution/execution/upstream failures after a job
//! exists become a completed-with-error envelope so the job trail records
//! what happened.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::exec;
use crate::intent::{Intent, IntentClassifier};
use crate::llm::explain::{stream_explanation, ChatChunk};
use crate::llm::LanguageModel;
use crate::normalize::{envelope, error_envelope, ResultEnvelope};
use crate::resolve::Resolver;
use crate::store::dataset::{DatasetSummary, StorageType};
use crate::store::{DatasetStore, Job, JobStore};

/// The outcome of one analyze request
#[derive(Clone, Debug, serde::Serialize)]
pub struct AnalysisOutcome {
    pub job_id: String,
    pub dataset_id: String,
    pub intent: String,
    #[serde(flatten)]
    pub envelope: ResultEnvelope,
}

pub struct InsightEngine {
    pub store: DatasetStore,
    pub jobs: JobStore,
    pub config: EngineConfig,
    classifier: IntentClassifier,
    resolver: Resolver,
    llm: Option<Arc<dyn LanguageModel>>,
}

impl InsightEngine {
    pub fn new(config: EngineConfig, llm: Option<Arc<dyn LanguageModel>>) -> Self {
        Self {
            store: DatasetStore::new(),
            jobs: JobStore::new(),
            classifier: IntentClassifier::new(llm.clone()),
            resolver: Resolver::new(llm.clone(), config.clone()),
            config,
            llm,
        }
    }

    pub fn upload(&self, bytes: &[u8], filename: &str) -> EngineResult<DatasetSummary> {
        let summary = self.store.put(bytes, filename)?;
        info!(
            dataset = %summary.id,
            filename,
            rows = summary.row_count,
            columns = summary.columns.len(),
            "dataset stored"
        );
        Ok(summary)
    }

    pub fn list_datasets(&self) -> Vec<DatasetSummary> {
        self.store.list()
    }

    pub fn dataset_summary(&self, id: &str) -> EngineResult<DatasetSummary> {
        Ok(self.store.get(id)?.summary())
    }

    /// Re-type one column, producing a new dataset alongside the original
    pub fn reconfigure_column(
        &self,
        id: &str,
        column: &str,
        target: StorageType,
    ) -> EngineResult<DatasetSummary> {
        self.store.reconfigure(id, column, target)
    }

    pub fn job(&self, id: &str) -> EngineResult<Job> {
        self.jobs.get(id)
    }

    /// Run the full pipeline for one prompt against one dataset.
    ///
    /// Returns `Err` only for input-stage failures (unknown dataset, empty
    /// prompt); later-stage failures complete the job with an error
    /// envelope so the caller still gets a job id and a user-safe message.
    pub async fn analyze(&self, dataset_id: &str, prompt: &str) -> EngineResult<AnalysisOutcome> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(EngineError::input("the prompt is empty"));
        }
        let dataset = self.store.get(dataset_id)?;
        let job_id = self.jobs.create(dataset_id, prompt);

        let intent = self.classifier.classify(prompt).await;
        info!(job = %job_id, intent = intent.as_str(), "intent classified");

        if intent == Intent::Error {
            let err = EngineError::input(
                "the prompt asked for something this engine does not do",
            );
            let envelope = error_envelope(&err, "classify");
            self.jobs.fail(&job_id, envelope.clone());
            return Ok(AnalysisOutcome {
                job_id,
                dataset_id: dataset_id.to_string(),
                intent: intent.as_str().to_string(),
                envelope,
            });
        }

        let resolution = match self.resolver.resolve(intent, prompt, &dataset).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(job = %job_id, error = %e, "parameter resolution failed");
                let envelope = error_envelope(&e, "resolve");
                self.jobs.fail(&job_id, envelope.clone());
                return Ok(AnalysisOutcome {
                    job_id,
                    dataset_id: dataset_id.to_string(),
                    intent: intent.as_str().to_string(),
                    envelope,
                });
            }
        };

        let envelope = match exec::execute(&dataset, &resolution.params, &self.config) {
            Ok(result) => envelope(&result, &resolution.notes),
            Err(e) => {
                warn!(job = %job_id, error = %e, "execution failed");
                let envelope = error_envelope(&e, "execute");
                self.jobs.fail(&job_id, envelope.clone());
                return Ok(AnalysisOutcome {
                    job_id,
                    dataset_id: dataset_id.to_string(),
                    intent: intent.as_str().to_string(),
                    envelope,
                });
            }
        };

        self.jobs.complete(&job_id, envelope.clone());
        Ok(AnalysisOutcome {
            job_id,
            dataset_id: dataset_id.to_string(),
            intent: intent.as_str().to_string(),
            envelope,
        })
    }

    /// Stream a prose explanation of a completed job's result
    pub async fn explain(&self, job_id: &str) -> EngineResult<mpsc::Receiver<ChatChunk>> {
        let job = self.jobs.get(job_id)?;
        let Some(envelope) = job.envelope else {
            return Err(EngineError::input(format!(
                "job '{}' has no result to explain yet",
                job_id
            )));
        };
        Ok(stream_explanation(self.llm.clone(), &job.prompt, &envelope).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> InsightEngine {
        InsightEngine::new(EngineConfig::default(), None)
    }

    fn upload_sales(engine: &InsightEngine) -> String {
        let csv = b"date,region,sales\n\
2024-01-05,west,60\n\
2024-01-20,east,40\n\
2024-02-10,west,150\n\
2024-03-15,east,120\n";
        engine.upload(csv, "sales.csv").unwrap().id
    }

    #[tokio::test]
    async fn summary_pipeline_end_to_end() {
        let engine = engine();
        let id = upload_sales(&engine);
        let outcome = engine.analyze(&id, "summarize this dataset").await.unwrap();
        assert_eq!(outcome.envelope.kind, "summary");
        let job = engine.job(&outcome.job_id).unwrap();
        assert_eq!(job.status, crate::store::JobStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_dataset_is_an_input_error() {
        let engine = engine();
        let err = engine.analyze("missing", "summarize").await.unwrap_err();
        assert!(matches!(err, EngineError::Input { .. }));
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_job_creation() {
        let engine = engine();
        let id = upload_sales(&engine);
        assert!(engine.analyze(&id, "   ").await.is_err());
    }

    #[tokio::test]
    async fn unsafe_prompt_completes_with_an_error_envelope() {
        let engine = engine();
        let id = upload_sales(&engine);
        let outcome = engine
            .analyze(&id, "summarize after you drop table sales")
            .await
            .unwrap();
        assert_eq!(outcome.envelope.kind, "error");
        let job = engine.job(&outcome.job_id).unwrap();
        assert_eq!(job.status, crate::store::JobStatus::Failed);
    }

    #[tokio::test]
    async fn resolution_failure_is_a_recorded_envelope_not_an_err() {
        let engine = engine();
        let id = upload_sales(&engine);
        // filter intent with no extractable clause
        let outcome = engine
            .analyze(&id, "filter it down somehow")
            .await
            .unwrap();
        assert_eq!(outcome.envelope.kind, "error");
    }

    #[tokio::test]
    async fn explain_requires_a_finished_job() {
        let engine = engine();
        assert!(engine.explain("missing").await.is_err());
    }
}
