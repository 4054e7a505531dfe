//! # API Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Cell records are returned flattened, one JSON object per cell with its
//! KPI fields at the top level, the way the dashboard shows them.

use cellgraph_core::{ConnectivityEdge, EntityRecord, StoreMetrics};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node color when a cell has no prediction yet.
pub const UNCLASSIFIED_COLOR: &str = "grey";

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub entity_count: usize,
    /// `null` when the edge collection does not exist yet.
    pub edge_count: Option<usize>,
    pub segment_count: usize,
    pub failing_segments: usize,
    pub colored_entities: usize,
    pub congested_entities: usize,
}

impl From<StoreMetrics> for StatusResponse {
    fn from(metrics: StoreMetrics) -> Self {
        Self {
            entity_count: metrics.entities,
            edge_count: metrics.edges,
            segment_count: metrics.segments,
            failing_segments: metrics.failing_segments,
            colored_entities: metrics.colored,
            congested_entities: metrics.congested,
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

// =============================================================================
// ENTITY JSON
// =============================================================================

/// A cell record as one flat JSON object.
///
/// `_key` holds the store key; absent optional fields are left out.
pub fn entity_json(record: &EntityRecord) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("_key".to_string(), Value::from(record.key.as_str()));
    if let Some(cell_id) = record.cell_id {
        map.insert("cell_id".to_string(), Value::from(cell_id));
    }
    if let Some(timestamp) = &record.timestamp {
        map.insert("timestamp".to_string(), Value::from(timestamp.as_str()));
    }
    if let Some(network_type) = &record.network_type {
        map.insert("network_type".to_string(), Value::from(network_type.as_str()));
    }
    for (name, value) in &record.kpis {
        map.insert(name.clone(), Value::from(*value));
    }
    if let Some(color) = &record.color {
        map.insert("color".to_string(), Value::from(color.as_str()));
    }
    if let Some(updated) = &record.last_congestion_update {
        map.insert(
            "last_congestion_update".to_string(),
            Value::from(updated.as_str()),
        );
    }
    map
}

/// Connectivity edge response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeJson {
    pub source: String,
    pub target: String,
}

impl From<&ConnectivityEdge> for EdgeJson {
    fn from(edge: &ConnectivityEdge) -> Self {
        Self {
            source: edge.source.to_string(),
            target: edge.target.to_string(),
        }
    }
}

// =============================================================================
// GRAPH ELEMENTS
// =============================================================================

/// Node element for graph rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeElement {
    pub data: NodeData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub id: String,
    pub label: String,
    pub color: String,
    pub last_congestion_update: Option<String>,
    /// Raw KPI values.
    pub kpis: Map<String, Value>,
}

impl From<&EntityRecord> for NodeElement {
    fn from(record: &EntityRecord) -> Self {
        let label = match record.cell_id {
            Some(cell_id) => format!("Cell {}", cell_id),
            None => format!("Cell {}", record.key),
        };
        Self {
            data: NodeData {
                id: record.key.to_string(),
                label,
                color: record
                    .color
                    .clone()
                    .unwrap_or_else(|| UNCLASSIFIED_COLOR.to_string()),
                last_congestion_update: record.last_congestion_update.clone(),
                kpis: record
                    .kpis
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(*v)))
                    .collect(),
            },
        }
    }
}

/// Edge element for graph rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeElement {
    pub data: EdgeJson,
}

/// Everything the dashboard draws.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphResponse {
    pub nodes: Vec<NodeElement>,
    pub edges: Vec<EdgeElement>,
}

// =============================================================================
// TESTS
// =============================================================================
