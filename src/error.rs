/// Unified error type for the insight engine
/// Provides structured error handling with categories for different failure modes
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Input errors: bad upload, empty prompt, unknown dataset id
    /// Always recoverable by the caller correcting its input
    #[error("Input error: {message}")]
    Input {
        message: String,
        context: Option<String>,
    },

    /// Resolution errors: intent classified but a required parameter
    /// could not be determined from the prompt or the column profile
    #[error("Resolution error: {message}")]
    Resolution {
        message: String,
        parameter: Option<String>,
        context: Option<String>,
    },

    /// Execution errors: an executor's internal computation failed
    #[error("Execution error: {message}")]
    Execution {
        message: String,
        operation: Option<String>,
        context: Option<String>,
    },

    /// Upstream errors: the LLM or predictor collaborator is unreachable
    /// or returned malformed output
    #[error("Upstream error: {message}")]
    Upstream {
        message: String,
        service: Option<String>,
    },

    /// Internal errors: should never happen, indicates a bug
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        context: Option<String>,
    },
}

impl EngineError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            context: None,
        }
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
            parameter: None,
            context: None,
        }
    }

    pub fn resolution_for(message: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
            parameter: Some(parameter.into()),
            context: None,
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            operation: None,
            context: None,
        }
    }

    pub fn execution_in(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            operation: Some(operation.into()),
            context: None,
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            service: None,
        }
    }

    pub fn upstream_from(message: impl Into<String>, service: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            service: Some(service.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::Input { context: ctx, .. } => *ctx = Some(context.into()),
            Self::Resolution { context: ctx, .. } => *ctx = Some(context.into()),
            Self::Execution { context: ctx, .. } => *ctx = Some(context.into()),
            Self::Internal { context: ctx, .. } => *ctx = Some(context.into()),
            _ => {}
        }
        self
    }

    /// Human-readable phrasing the chat layer can relay as-is, keyed to
    /// the failure category rather than the internal detail
    pub fn user_message(&self) -> String {
        match self {
            Self::Input { message, .. } => message.clone(),
            Self::Resolution {
                message, parameter, ..
            } => match parameter {
                Some(p) => format!(
                    "Your request couldn't be understood: {} (missing: {})",
                    message, p
                ),
                None => format!("Your request couldn't be understood: {}", message),
            },
            Self::Execution { message, .. } => {
                format!("The system hit a problem computing this: {}", message)
            }
            Self::Upstream { message, .. } => {
                format!("The data service is temporarily unavailable: {}", message)
            }
            Self::Internal { message, .. } => {
                format!("The system hit a problem computing this: {}", message)
            }
        }
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
            context: None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Input {
            message: err.to_string(),
            context: None,
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
