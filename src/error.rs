use thiserror::Error;

/// The evaluator (or warehouse) handle could not be built. Aborts a run.
#[derive(Error, Debug)]
#[error("connection error: {message}")]
pub struct ConnectionError {
    pub message: String,
}

impl ConnectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure scoring a single conversation. The pipeline skips it and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("evaluator request failed: {message}")]
    Transport { message: String },

    #[error("evaluator response was malformed: {message}")]
    MalformedResponse { message: String },

    #[error("{field} = {value} is outside the 1-5 range")]
    Validation { field: String, value: i64 },
}

impl EvalError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, value: i64) -> Self {
        Self::Validation {
            field: field.into(),
            value,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::Transport { .. } => "transport",
            EvalError::MalformedResponse { .. } => "malformed_response",
            EvalError::Validation { .. } => "validation",
        }
    }
}
