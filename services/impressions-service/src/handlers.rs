use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::decode::decode_body;
use crate::error::IngestError;
use crate::models::parse_impressions;
use crate::state::AppState;

pub const SUCCESS_MESSAGE: &str = "Impressions processed successfully.";

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz() -> StatusCode {
    StatusCode::OK
}

pub async fn ingest_impressions(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    tracing::info!(count = params.len(), "query parameters received");
    for (name, value) in &params {
        tracing::info!("{name}: {value}");
    }

    match process(&state, &body).await {
        Ok(written) => {
            tracing::info!(written, "impressions stored");
            (StatusCode::OK, SUCCESS_MESSAGE).into_response()
        }
        Err(err @ IngestError::EmptyBatch) => {
            tracing::warn!("no impressions received");
            err.into_response()
        }
        Err(err) => {
            tracing::error!(kind = err.kind(), error = %err, "error processing impressions");
            err.into_response()
        }
    }
}

async fn process(state: &AppState, body: &[u8]) -> Result<u64, IngestError> {
    let text = decode_body(body, state.max_inflated_bytes)?;
    let impressions = parse_impressions(&text)?;

    tracing::info!("ensuring table exists");
    state.store.ensure_schema().await?;

    tracing::info!(count = impressions.len(), "inserting impressions");
    state.store.insert_batch(&impressions).await
}
