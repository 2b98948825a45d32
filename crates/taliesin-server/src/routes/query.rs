//! Query submission endpoint.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use taliesin_types::RunId;

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Request body for query submission.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// The natural-language query.
    pub query: String,

    /// Optional model override for this run.
    #[serde(default)]
    pub model: Option<String>,
}

/// Response from query submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The run identifier to stream events from.
    pub run_id: String,
}

/// POST /v1/query - start a run.
///
/// Registers the run and spawns its background processing task, returning
/// before any retrieval happens.
pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    if request.query.trim().is_empty() {
        return Err(ServerError::BadRequest("query must not be empty".into()));
    }

    let run_id = RunId::new();
    tracing::info!(%run_id, query = %request.query, model = ?request.model, "Accepted query");

    // Register before spawning so the stream endpoint can never race the run.
    state.registry().register(run_id);

    let agent = state.agent.clone();
    tokio::spawn(async move {
        agent
            .process_query(run_id, &request.query, request.model.as_deref())
            .await;
    });

    Ok(Json(QueryResponse {
        run_id: run_id.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parsing() {
        let request: QueryRequest = serde_json::from_str(r#"{"query": "What is 2+2?"}"#).unwrap();
        assert_eq!(request.query, "What is 2+2?");
        assert!(request.model.is_none());

        let request: QueryRequest =
            serde_json::from_str(r#"{"query": "q", "model": "o4-mini"}"#).unwrap();
        assert_eq!(request.model.as_deref(), Some("o4-mini"));
    }

    #[test]
    fn test_response_serialization() {
        let response = QueryResponse {
            run_id: "abc".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["run_id"], "abc");
    }
}
