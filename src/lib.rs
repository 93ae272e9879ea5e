//! # Insight Engine
//!
//! A prompt-driven analytics engine for uploaded tabular data.
//!
//! A free-text request is classified into one of a closed set of
//! analytical intents, bound to concrete columns of the dataset, executed
//! by a deterministic per-intent executor, and normalized into one
//! canonical JSON envelope. A language model collaborates at three
//! well-defined seams (intent classification, transform-plan generation,
//! result explanation) and every model path has a deterministic fallback.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use insight_engine::{EngineConfig, InsightEngine};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let engine = InsightEngine::new(EngineConfig::default(), None);
//!
//! let csv = b"date,region,sales\n2024-01-05,west,60\n2024-02-10,east,150\n";
//! let dataset = engine.upload(csv, "sales.csv")?;
//!
//! let outcome = engine.analyze(&dataset.id, "monthly sales trend").await?;
//! println!("{}: {}", outcome.envelope.kind, outcome.envelope.payload);
//! # Ok(())
//! # }
//! ```

// Internal modules
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod intent;
pub mod llm;
pub mod normalize;
pub mod plan;
pub mod predictor;
pub mod profile;
pub mod resolve;
pub mod store;
pub mod web;

// Public API - Main types users need
pub use config::EngineConfig;
pub use engine::{AnalysisOutcome, InsightEngine};
pub use error::{EngineError, EngineResult};
pub use intent::Intent;
pub use llm::{LanguageModel, OllamaClient};
pub use normalize::ResultEnvelope;
pub use store::{DatasetStore, JobStore};
