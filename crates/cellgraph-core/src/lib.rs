//! # cellgraph-core
//!
//! Congestion inference for cellular networks - THE PIPELINE.
//!
//! Cells and their KPI telemetry form a heterogeneous graph. One round of
//! message passing turns it into per-cell embeddings, a small classifier
//! trained against rule-derived labels predicts congestion for every cell,
//! and a bounded breadth-first segmenter groups neighbouring cells and
//! flags weak segments.
//!
//! ## Layout
//!
//! - `types`, `primitives`: value types, errors and constants
//! - `graph`, `labeler`, `propagate`, `trainer`, `segment`: the stages
//! - `pipeline`: wires the stages to a store
//! - `storage`: the store trait with in-memory and redb backends
//! - `ingest`, `simulate`: getting telemetry into a store
//! - `config`: TOML configuration
//!
//! ## Constraints
//!
//! - Sync only, no network dependencies
//! - Every random source is seeded; `BTreeMap` wherever order is observable
//! - Each run recomputes everything; predictions and segments are its only writes

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod graph;
pub mod ingest;
pub mod labeler;
pub mod pipeline;
pub mod primitives;
pub mod propagate;
pub mod segment;
pub mod simulate;
pub mod storage;
pub mod trainer;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CellGraphError, Color, Congestion, ConnectivityEdge, EntityKey, EntityRecord, EntitySnapshot,
    EntityUpdate, KpiField, KpiVector, SegmentRecord, SegmentStatus,
};

// =============================================================================
// RE-EXPORTS: Pipeline Stages
// =============================================================================

pub use config::PipelineConfig;
pub use graph::{BuildReport, FeatureInit, GraphBuilder, HeteroGraph, NodeType, RelationKind};
pub use labeler::{CongestionLabeler, LabelThresholds};
pub use pipeline::{Pipeline, RunReport, SegmentSummary};
pub use propagate::{Embeddings, HeteroPropagator, WeightInit};
pub use segment::{Segment, Segmentation, Segmenter, SegmenterConfig};
pub use trainer::{ClassifierTrainer, EvaluationMetrics, TrainerConfig, TrainingOutcome};

// =============================================================================
// RE-EXPORTS: Storage and Ingestion
// =============================================================================

pub use ingest::{
    CellRef, EdgeRow, SyncReport, TelemetryRow, latest_per_entity, link_edges, sync_rows,
};
pub use simulate::Simulator;
pub use storage::{
    MemoryStore, PersistenceFailure, PersistenceReport, RedbStore, StoreMetrics, TelemetryStore,
    UpsertOutcome,
};
