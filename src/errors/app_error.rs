//! HTTP-facing error type.
//!
//! Handlers return [`AppResult`]; every failure renders as
//! `{"success": false, "error": "..."}` with a status derived from the
//! pipeline error kind.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::core::error::PipelineError;
use crate::core::registry::{InMemoryRegistry, RegistryError};
use crate::core::storage::StorageError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Unknown character or voice, with the ids a client may use instead
    #[error("{message}")]
    UnknownId {
        message: String,
        field: &'static str,
        available: Vec<String>,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AppError {
    /// Map a pipeline error, attaching available ids for unknown references
    pub fn from_pipeline(err: PipelineError, registry: &InMemoryRegistry) -> Self {
        match err {
            PipelineError::UnknownCharacter(id) => AppError::UnknownId {
                message: format!("Unknown character: {id}"),
                field: "available_characters",
                available: registry.character_ids(),
            },
            PipelineError::UnknownVoice(id) => AppError::UnknownId {
                message: format!("Unknown voice: {id}"),
                field: "available_voices",
                available: registry.voice_ids(),
            },
            other => AppError::Pipeline(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Pipeline(err) => pipeline_status(err),
            AppError::UnknownId { .. } | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed to clients; internal failures stay generic
    fn public_message(&self) -> String {
        match self {
            AppError::Pipeline(err) => pipeline_message(err),
            AppError::Storage(_) => "Failed to store audio".to_string(),
            other => other.to_string(),
        }
    }
}

/// HTTP status for a pipeline error kind
pub fn pipeline_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::InvalidInput(_)
        | PipelineError::UnknownCharacter(_)
        | PipelineError::UnknownVoice(_) => StatusCode::BAD_REQUEST,
        PipelineError::Overloaded => StatusCode::TOO_MANY_REQUESTS,
        PipelineError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::ModelFailure(_)
        | PipelineError::EmptyOutput
        | PipelineError::Encoding(_)
        | PipelineError::CacheUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Client-facing message for a pipeline error
pub fn pipeline_message(err: &PipelineError) -> String {
    match err {
        PipelineError::InvalidInput(msg) => msg.clone(),
        other => other.to_string(),
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::CharacterNotFound(_) | RegistryError::VoiceNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let mut body = json!({
            "success": false,
            "error": self.public_message(),
        });
        if let AppError::UnknownId {
            field, available, ..
        } = &self
        {
            body[*field] = json!(available);
        }

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
