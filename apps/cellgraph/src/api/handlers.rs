//! # API Endpoint Handlers
//!
//! This module implements the HTTP endpoint handlers. All endpoints are
//! read-only; the store is only written by pipeline runs and ingestion.

use super::{
    AppState,
    types::{
        EdgeElement, EdgeJson, ErrorResponse, GraphResponse, HealthResponse, NodeElement,
        StatusResponse, entity_json,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cellgraph_core::{CellGraphError, EntityKey, StoreMetrics};

/// Map a store error to a status code and JSON body.
fn error_response(error: &CellGraphError) -> Response {
    let status = match error {
        CellGraphError::MissingCollection(_) | CellGraphError::EntityNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(error.to_string()))).into_response()
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Store counts.
pub async fn status_handler(State(state): State<AppState>) -> Response {
    let store = state.store.read().await;
    match StoreMetrics::from_store(&**store) {
        Ok(metrics) => (StatusCode::OK, Json(StatusResponse::from(metrics))).into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// ENTITY HANDLERS
// =============================================================================

/// All cell records, flattened.
pub async fn entities_handler(State(state): State<AppState>) -> Response {
    let store = state.store.read().await;
    match store.read_all_entities() {
        Ok(records) => {
            let body: Vec<_> = records.iter().map(entity_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// One cell record, flattened.
pub async fn entity_handler(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    let key = EntityKey::new(key);
    let store = state.store.read().await;
    match store.get_entity(&key) {
        Ok(Some(record)) => (StatusCode::OK, Json(entity_json(&record))).into_response(),
        Ok(None) => error_response(&CellGraphError::EntityNotFound(key)),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// EDGE AND SEGMENT HANDLERS
// =============================================================================

/// Connectivity edges. 404 until the edge collection exists.
pub async fn edges_handler(State(state): State<AppState>) -> Response {
    let store = state.store.read().await;
    match store.read_all_edges() {
        Ok(edges) => {
            let body: Vec<EdgeJson> = edges.iter().map(EdgeJson::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Segment predictions of the latest run.
pub async fn segments_handler(State(state): State<AppState>) -> Response {
    let store = state.store.read().await;
    match store.read_segments() {
        Ok(segments) => (StatusCode::OK, Json(segments)).into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// GRAPH HANDLER
// =============================================================================

/// Node and edge elements for the dashboard.
///
/// Without an edge collection the nodes are still returned.
pub async fn graph_handler(State(state): State<AppState>) -> Response {
    let store = state.store.read().await;
    let records = match store.read_all_entities() {
        Ok(records) => records,
        Err(e) => return error_response(&e),
    };
    let edges = match store.read_all_edges() {
        Ok(edges) => edges,
        Err(CellGraphError::MissingCollection(name)) => {
            tracing::warn!(collection = %name, "graph requested without edges");
            Vec::new()
        }
        Err(e) => return error_response(&e),
    };

    let response = GraphResponse {
        nodes: records.iter().map(NodeElement::from).collect(),
        edges: edges
            .iter()
            .map(|edge| EdgeElement {
                data: EdgeJson::from(edge),
            })
            .collect(),
    };
    (StatusCode::OK, Json(response)).into_response()
}
