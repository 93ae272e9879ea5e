//! Dataset and job stores
//!
//! Explicit store objects injected into request handlers. Both are backed by
//! `DashMap`, so concurrent requests can read while an upload inserts.
//! Retention is unbounded for the process lifetime (see DESIGN.md).

pub mod dataset;
pub mod loader;

pub use dataset::{Column, Dataset, DatasetSummary, StorageType};

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::normalize::ResultEnvelope;

/// Keyed in-memory dataset storage
#[derive(Default)]
pub struct DatasetStore {
    datasets: DashMap<String, Arc<Dataset>>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an upload and store it under a fresh id
    pub fn put(&self, bytes: &[u8], filename: &str) -> EngineResult<DatasetSummary> {
        let columns = loader::load_table(bytes, filename)?;
        let id = Uuid::new_v4().to_string();
        let dataset = Arc::new(Dataset::new(id.clone(), filename, columns));
        let summary = dataset.summary();
        self.datasets.insert(id, dataset);
        Ok(summary)
    }

    pub fn get(&self, id: &str) -> EngineResult<Arc<Dataset>> {
        self.datasets
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::input(format!("unknown dataset id '{}'", id)))
    }

    pub fn list(&self) -> Vec<DatasetSummary> {
        let mut summaries: Vec<DatasetSummary> = self
            .datasets
            .iter()
            .map(|entry| entry.value().summary())
            .collect();
        summaries.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        summaries
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Coerce one column's storage type, storing the result as a new dataset.
    /// The original dataset is kept so the caller can compare.
    pub fn reconfigure(
        &self,
        id: &str,
        column: &str,
        target: StorageType,
    ) -> EngineResult<DatasetSummary> {
        let dataset = self.get(id)?;
        let new_id = Uuid::new_v4().to_string();
        let coerced = dataset.with_coerced_column(new_id.clone(), column, target)?;
        let summary = coerced.summary();
        self.datasets.insert(new_id, Arc::new(coerced));
        Ok(summary)
    }
}

/// Lifecycle of an analyze request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

/// Bookkeeping for one analyze request, read later by the chat explainer
#[derive(Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub dataset_id: String,
    pub prompt: String,
    pub status: JobStatus,
    pub envelope: Option<ResultEnvelope>,
}

#[derive(Default)]
pub struct JobStore {
    jobs: DashMap<String, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, dataset_id: &str, prompt: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.jobs.insert(
            id.clone(),
            Job {
                id: id.clone(),
                dataset_id: dataset_id.to_string(),
                prompt: prompt.to_string(),
                status: JobStatus::Processing,
                envelope: None,
            },
        );
        id
    }

    pub fn complete(&self, id: &str, envelope: ResultEnvelope) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            job.status = JobStatus::Completed;
            job.envelope = Some(envelope);
        }
    }

    pub fn fail(&self, id: &str, envelope: ResultEnvelope) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            job.status = JobStatus::Failed;
            job.envelope = Some(envelope);
        }
    }

    pub fn get(&self, id: &str) -> EngineResult<Job> {
        self.jobs
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::input(format!("unknown job id '{}'", id)))
    }
}
