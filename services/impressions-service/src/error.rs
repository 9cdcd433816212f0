use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::decode::DecodeError;

pub const FAILURE_MESSAGE: &str = "Error processing impressions.";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to decode request body: {0}")]
    Decode(#[from] DecodeError),
    #[error("failed to parse impressions: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no impressions received")]
    EmptyBatch,
    #[error("{context} failed: {source}")]
    Persistence {
        context: &'static str,
        #[source]
        source: tokio_postgres::Error,
    },
}

impl IngestError {
    pub fn persistence(context: &'static str, source: tokio_postgres::Error) -> Self {
        IngestError::Persistence { context, source }
    }

    /// Stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Decode(_) => "decode",
            IngestError::Parse(_) => "parse",
            IngestError::EmptyBatch => "empty_batch",
            IngestError::Persistence { .. } => "persistence",
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        match self {
            IngestError::EmptyBatch => StatusCode::BAD_REQUEST.into_response(),
            IngestError::Decode(_) | IngestError::Parse(_) | IngestError::Persistence { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE).into_response()
            }
        }
    }
}
