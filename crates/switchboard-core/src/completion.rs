//! The error taxonomy of a generation call and the outcome of a synchronous one.

use thiserror::Error;

use crate::{
    error::ApiError, http_client, json_utils::DecodeError, message::Generation,
    message::ValidationError, schema::SchemaError,
};

#[derive(Debug, Error)]
pub enum CompletionError {
    /// Malformed input. Nothing was sent.
    #[error("ValidationError: {0}")]
    Validation(#[from] ValidationError),

    /// Requested options the backend has no equivalent for. The call still proceeds without
    /// them, so this is a warning rather than a failure.
    #[error("unsupported options: {}", .0.join(", "))]
    UnsupportedOptions(Vec<String>),

    /// Error returned by the backend, normalized.
    #[error("ApiError: {0}")]
    Api(#[from] ApiError),

    /// Network failure or timeout, passed through.
    #[error("TransportError: {0}")]
    Transport(#[from] http_client::Error),

    /// The backend replied with something this crate does not understand. Never retried.
    #[error("DecoderBug: {0}")]
    DecoderBug(String),

    #[error("generation cancelled")]
    Cancelled,

    #[error("{}", join_display(.0))]
    Joined(Vec<CompletionError>),
}

fn join_display(errors: &[CompletionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl CompletionError {
    /// Join several errors. `None` when there are none, the error itself when there is one.
    pub fn join(mut errors: Vec<CompletionError>) -> Option<CompletionError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(CompletionError::Joined(errors)),
        }
    }

    /// Whether the call produced a usable, if degraded, outcome.
    pub fn is_continuable(&self) -> bool {
        matches!(self, CompletionError::UnsupportedOptions(_))
    }

    pub fn decoder_bug(msg: impl Into<String>) -> Self {
        CompletionError::DecoderBug(msg.into())
    }
}

impl From<DecodeError> for CompletionError {
    fn from(error: DecodeError) -> Self {
        CompletionError::DecoderBug(error.to_string())
    }
}

impl From<SchemaError> for CompletionError {
    fn from(error: SchemaError) -> Self {
        CompletionError::Validation(ValidationError::new("schema", error.to_string()))
    }
}

/// The outcome of a synchronous generation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub generation: Generation,
    /// Options that were requested but dropped because the backend does not support them.
    pub unsupported: Vec<String>,
}

impl CompletionResponse {
    /// The dropped options as a continuable error, if any.
    pub fn warning(&self) -> Option<CompletionError> {
        (!self.unsupported.is_empty())
            .then(|| CompletionError::UnsupportedOptions(self.unsupported.clone()))
    }
}
