//! # Telemetry Store
//!
//! The pipeline reads cells and connectivity from, and writes predictions
//! and segments to, a document-style store behind [`TelemetryStore`].
//!
//! Two backends:
//! - [`MemoryStore`]: `BTreeMap`-backed, for tests and the simulator
//! - [`RedbStore`]: redb-backed, persistent
//!
//! Both iterate entities in key order, so index assignment in the graph
//! builder is identical across backends and runs.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::primitives::EDGE_COLLECTION;
use crate::{CellGraphError, ConnectivityEdge, EntityKey, EntityRecord, EntityUpdate, SegmentRecord};
use serde::{Deserialize, Serialize};

/// Store operations used by the pipeline, ingestion and the API.
pub trait TelemetryStore {
    /// All cell records, in key order.
    fn read_all_entities(&self) -> Result<Vec<EntityRecord>, CellGraphError>;

    /// All connectivity edges, in insertion order.
    ///
    /// Fails with `MissingCollection` if the edge collection was never created.
    fn read_all_edges(&self) -> Result<Vec<ConnectivityEdge>, CellGraphError>;

    /// One cell record.
    fn get_entity(&self, key: &EntityKey) -> Result<Option<EntityRecord>, CellGraphError>;

    /// Set the prediction fields of an existing cell, leaving everything else.
    fn upsert_entity_fields(
        &mut self,
        key: &EntityKey,
        update: &EntityUpdate,
    ) -> Result<(), CellGraphError>;

    /// Insert a telemetry snapshot, or merge it into the existing record.
    fn upsert_snapshot(&mut self, record: EntityRecord) -> Result<UpsertOutcome, CellGraphError>;

    /// Create the edge collection if it does not exist.
    fn create_edge_collection(&mut self) -> Result<(), CellGraphError>;

    /// Append an edge, creating the edge collection if needed.
    fn insert_edge(&mut self, edge: &ConnectivityEdge) -> Result<(), CellGraphError>;

    /// Overwrite the segment with the record's id.
    fn upsert_segment(&mut self, record: &SegmentRecord) -> Result<(), CellGraphError>;

    /// All segments, by id.
    fn read_segments(&self) -> Result<Vec<SegmentRecord>, CellGraphError>;

    fn get_segment(&self, segment_id: u64) -> Result<Option<SegmentRecord>, CellGraphError>;
}

/// Result of [`TelemetryStore::upsert_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Merge an incoming telemetry snapshot into an existing record.
///
/// Telemetry fields are taken from `incoming` where present; KPI values are
/// merged by name. Prediction fields (`color`, `last_congestion_update`) are
/// kept from `existing`.
pub(crate) fn merge_snapshot(existing: &mut EntityRecord, incoming: EntityRecord) {
    if incoming.cell_id.is_some() {
        existing.cell_id = incoming.cell_id;
    }
    if incoming.timestamp.is_some() {
        existing.timestamp = incoming.timestamp;
    }
    if incoming.network_type.is_some() {
        existing.network_type = incoming.network_type;
    }
    existing.kpis.extend(incoming.kpis);
}

pub(crate) fn missing_edges() -> CellGraphError {
    CellGraphError::MissingCollection(EDGE_COLLECTION.to_string())
}

// =============================================================================
// PERSISTENCE REPORT
// =============================================================================

/// A write that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceFailure {
    pub target: String,
    pub error: String,
}

/// Outcome of a best-effort batch of writes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistenceReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<PersistenceFailure>,
}

impl PersistenceReport {
    /// Record one write. Failures are logged and kept, never propagated.
    pub fn record(&mut self, target: impl Into<String>, result: Result<(), CellGraphError>) {
        self.attempted += 1;
        match result {
            Ok(()) => self.succeeded += 1,
            Err(e) => {
                let target = target.into();
                tracing::warn!(target = %target, error = %e, "write failed, skipping");
                self.failures.push(PersistenceFailure {
                    target,
                    error: e.to_string(),
                });
            }
        }
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Combine two batches.
    pub fn absorb(&mut self, other: PersistenceReport) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failures.extend(other.failures);
    }
}

// =============================================================================
// STORE METRICS
// =============================================================================

/// Counts shown by `status` and `/status`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreMetrics {
    pub entities: usize,
    /// `None` when the edge collection does not exist.
    pub edges: Option<usize>,
    pub segments: usize,
    pub failing_segments: usize,
    /// Cells carrying a prediction color.
    pub colored: usize,
    pub congested: usize,
}

impl StoreMetrics {
    pub fn from_store<S: TelemetryStore + ?Sized>(store: &S) -> Result<Self, CellGraphError> {
        let entities = store.read_all_entities()?;
        let edges = match store.read_all_edges() {
            Ok(edges) => Some(edges.len()),
            Err(CellGraphError::MissingCollection(_)) => None,
            Err(e) => return Err(e),
        };
        let segments = store.read_segments()?;

        Ok(Self {
            entities: entities.len(),
            edges,
            segments: segments.len(),
            failing_segments: segments
                .iter()
                .filter(|s| s.status == crate::SegmentStatus::Fail)
                .count(),
            colored: entities.iter().filter(|e| e.color.is_some()).count(),
            congested: entities
                .iter()
                .filter(|e| e.color.as_deref() == Some(crate::Color::Red.as_str()))
                .count(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{Color, KpiField, KpiVector, SegmentStatus};

    fn record(key: &str) -> EntityRecord {
        EntityRecord::with_kpis(
            EntityKey::new(key),
            &KpiVector::default().with(KpiField::Latency, 30.0),
        )
    }

    #[test]
    fn merge_keeps_prediction_fields() {
        let mut existing = record("1");
        existing.color = Some("red".to_string());
        existing.last_congestion_update = Some("01/01/2024 00:00:00".to_string());

        let mut incoming = record("1");
        incoming.kpis.insert("latency_ms".to_string(), 95.0);
        incoming.timestamp = Some("01/02/2024 00:00:00".to_string());
        merge_snapshot(&mut existing, incoming);

        assert_eq!(existing.kpis["latency_ms"], 95.0);
        assert_eq!(existing.timestamp.as_deref(), Some("01/02/2024 00:00:00"));
        assert_eq!(existing.color.as_deref(), Some("red"));
        assert!(existing.last_congestion_update.is_some());
    }

    #[test]
    fn report_collects_failures() {
        let mut report = PersistenceReport::default();
        report.record("a", Ok(()));
        report.record("b", Err(CellGraphError::IoError("disk".to_string())));
        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].target, "b");
    }

    #[test]
    fn metrics_without_edge_collection() {
        let mut store = MemoryStore::new();
        store.upsert_snapshot(record("1")).expect("insert");
        store
            .upsert_entity_fields(
                &EntityKey::new("1"),
                &EntityUpdate {
                    color: Color::Red,
                    last_congestion_update: "01/01/2024 00:00:00".to_string(),
                },
            )
            .expect("update");
        store
            .upsert_segment(&SegmentRecord {
                segment_id: 0,
                norm: 1.0,
                status: SegmentStatus::Fail,
                updated: "01/01/2024 00:00:00".to_string(),
                device_ids: vec![EntityKey::new("1")],
            })
            .expect("segment");

        let metrics = StoreMetrics::from_store(&store).expect("metrics");
        assert_eq!(metrics.entities, 1);
        assert_eq!(metrics.edges, None);
        assert_eq!(metrics.segments, 1);
        assert_eq!(metrics.failing_segments, 1);
        assert_eq!(metrics.colored, 1);
        assert_eq!(metrics.congested, 1);
    }
}
