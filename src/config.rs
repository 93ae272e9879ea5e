/// Engine configuration
///
/// All limits that bound executor output live here so the backpressure
/// story is in one place: preview rows, filter transport cap, forecast
/// horizon cap.
use serde::{Deserialize, Serialize};

/// Fraction of non-null values in a text column that must parse as a date
/// for the column to be reclassified as date-like.
pub const DATE_DETECT_THRESHOLD: f64 = 0.8;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Server bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Ollama base URL
    pub ollama_url: String,

    /// Ollama model name
    pub model: String,

    /// Rows returned by the generic query preview
    pub preview_rows: usize,

    /// Maximum rows a filter result carries over the wire; the reported
    /// match count is still the full count
    pub max_filter_rows: usize,

    /// Default forecast horizon when the prompt names none
    pub default_forecast_periods: usize,

    /// Hard cap on the forecast horizon
    pub max_forecast_periods: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            preview_rows: 50,
            max_filter_rows: 100,
            default_forecast_periods: 3,
            max_forecast_periods: 24,
        }
    }
}

impl EngineConfig {
    /// Build a config from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("INSIGHT_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("INSIGHT_PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.ollama_url = url;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            config.model = model;
        }
        config
    }
}
