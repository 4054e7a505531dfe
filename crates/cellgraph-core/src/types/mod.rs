//! # Core Type Definitions
//!
//! This module contains the value types that flow through the pipeline:
//! - Entity identifiers and KPI vectors (`EntityKey`, `KpiField`, `KpiVector`)
//! - Store records (`EntityRecord`, `ConnectivityEdge`, `SegmentRecord`)
//! - Pipeline outputs (`Congestion`, `Color`, `SegmentStatus`, `EntityUpdate`)
//! - Error types (`CellGraphError`)
//!
//! ## Ordering Guarantees
//!
//! Everything keyed by string uses `BTreeMap` so store reads, index
//! assignment and report output are identical across runs.

use crate::primitives::KPI_DIM;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// ENTITY IDENTIFIERS
// =============================================================================

/// Stable key of a cell in the telemetry store (the decimal cell id).
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntityKey(pub String);

impl EntityKey {
    /// Create a new key from anything string-like.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Key for a numeric cell id.
    #[must_use]
    pub fn from_cell_id(cell_id: u64) -> Self {
        Self(cell_id.to_string())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// KPI FIELDS
// =============================================================================

/// The named KPI metrics, in the fixed order used by every KPI vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KpiField {
    UplinkTraffic,
    DownlinkTraffic,
    ActiveUsers,
    CallDropRate,
    Latency,
    Throughput,
    SignalStrength,
    ResourceUtilization,
    HandoverSuccessRate,
    PacketLossRate,
    Jitter,
}

impl KpiField {
    /// All fields in vector order.
    pub const ALL: [KpiField; KPI_DIM] = [
        KpiField::UplinkTraffic,
        KpiField::DownlinkTraffic,
        KpiField::ActiveUsers,
        KpiField::CallDropRate,
        KpiField::Latency,
        KpiField::Throughput,
        KpiField::SignalStrength,
        KpiField::ResourceUtilization,
        KpiField::HandoverSuccessRate,
        KpiField::PacketLossRate,
        KpiField::Jitter,
    ];

    /// Attribute name used in telemetry rows and store records.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            KpiField::UplinkTraffic => "uplink_traffic_MB",
            KpiField::DownlinkTraffic => "downlink_traffic_MB",
            KpiField::ActiveUsers => "active_users",
            KpiField::CallDropRate => "call_drop_rate",
            KpiField::Latency => "latency_ms",
            KpiField::Throughput => "throughput_Mbps",
            KpiField::SignalStrength => "signal_strength_dBm",
            KpiField::ResourceUtilization => "resource_utilization",
            KpiField::HandoverSuccessRate => "handover_success_rate",
            KpiField::PacketLossRate => "packet_loss_rate",
            KpiField::Jitter => "jitter_ms",
        }
    }

    /// Position of this field in a KPI vector.
    #[must_use]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Look a field up by its attribute name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<KpiField> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }
}

// =============================================================================
// KPI VECTOR
// =============================================================================

/// Fixed-length, fixed-order KPI values of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KpiVector(pub [f64; KPI_DIM]);

impl KpiVector {
    /// Build a vector from named values. Fields that are absent or not
    /// finite are substituted with 0 and reported back to the caller.
    #[must_use]
    pub fn from_named(values: &BTreeMap<String, f64>) -> (Self, Vec<KpiField>) {
        let mut vector = [0.0; KPI_DIM];
        let mut defaulted = Vec::new();
        for field in KpiField::ALL {
            match values.get(field.name()) {
                Some(v) if v.is_finite() => vector[field.index()] = *v,
                _ => defaulted.push(field),
            }
        }
        (Self(vector), defaulted)
    }

    /// Value of a single field.
    #[must_use]
    pub fn get(&self, field: KpiField) -> f64 {
        self.0[field.index()]
    }

    /// Set a single field.
    pub fn set(&mut self, field: KpiField, value: f64) {
        self.0[field.index()] = value;
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, field: KpiField, value: f64) -> Self {
        self.set(field, value);
        self
    }

    /// Values in vector order.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Named view of the vector.
    #[must_use]
    pub fn to_named(&self) -> BTreeMap<String, f64> {
        KpiField::ALL
            .iter()
            .map(|f| (f.name().to_string(), self.get(*f)))
            .collect()
    }
}

/// One entity's KPI snapshot as seen by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub key: EntityKey,
    pub kpis: KpiVector,
}

impl EntitySnapshot {
    #[must_use]
    pub fn new(key: EntityKey, kpis: KpiVector) -> Self {
        Self { key, kpis }
    }
}

// =============================================================================
// STORE RECORDS
// =============================================================================

/// A cell document in the telemetry store.
///
/// Holds the latest telemetry row for the cell plus the prediction fields
/// written back by the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityRecord {
    pub key: EntityKey,
    pub cell_id: Option<u64>,
    pub timestamp: Option<String>,
    pub network_type: Option<String>,
    pub kpis: BTreeMap<String, f64>,
    pub color: Option<String>,
    pub last_congestion_update: Option<String>,
}

impl EntityRecord {
    /// Minimal record with KPI values and nothing else.
    #[must_use]
    pub fn with_kpis(key: EntityKey, kpis: &KpiVector) -> Self {
        Self {
            key,
            kpis: kpis.to_named(),
            ..Self::default()
        }
    }

    /// Convert to a pipeline snapshot, defaulting missing KPI fields to 0.
    #[must_use]
    pub fn to_snapshot(&self) -> EntitySnapshot {
        let (kpis, defaulted) = KpiVector::from_named(&self.kpis);
        if !defaulted.is_empty() {
            let names: Vec<&str> = defaulted.iter().map(|f| f.name()).collect();
            tracing::warn!(entity = %self.key, fields = ?names, "KPI fields missing, defaulted to 0");
        }
        EntitySnapshot::new(self.key.clone(), kpis)
    }
}

/// A connectivity edge between two cells.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectivityEdge {
    pub source: EntityKey,
    pub target: EntityKey,
}

impl ConnectivityEdge {
    #[must_use]
    pub fn new(source: EntityKey, target: EntityKey) -> Self {
        Self { source, target }
    }
}

// =============================================================================
// PREDICTIONS
// =============================================================================

/// Binary congestion class. The discriminant is the classifier's class index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Congestion {
    Clear = 0,
    Congested = 1,
}

impl Congestion {
    /// Class index (0 or 1).
    #[must_use]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Class for a classifier output index. Anything other than 1 is clear.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        if index == 1 {
            Congestion::Congested
        } else {
            Congestion::Clear
        }
    }

    #[must_use]
    pub fn is_congested(&self) -> bool {
        matches!(self, Congestion::Congested)
    }

    /// Visualization color of this class.
    #[must_use]
    pub fn color(&self) -> Color {
        match self {
            Congestion::Clear => Color::Green,
            Congestion::Congested => Color::Red,
        }
    }
}

/// Node color shown by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
}

impl Color {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
        }
    }
}

/// Partial update written to a cell record after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityUpdate {
    pub color: Color,
    pub last_congestion_update: String,
}

// =============================================================================
// SEGMENTS
// =============================================================================

/// Outlier status of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAIL")]
    Fail,
}

impl SegmentStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::Ok => "OK",
            SegmentStatus::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted segment, keyed by `segment_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub segment_id: u64,
    pub norm: f64,
    pub status: SegmentStatus,
    pub updated: String,
    pub device_ids: Vec<EntityKey>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the cellgraph pipeline.
///
/// - Configuration errors abort before any computation
/// - Data errors abort the current run
/// - Persistence errors on single records are collected, not propagated
#[derive(Debug, Error)]
pub enum CellGraphError {
    /// A collection the pipeline depends on does not exist in the store.
    #[error("Collection {0} not found")]
    MissingCollection(String),

    /// One of the two classes has no member in the training split.
    #[error("Class {class:?} absent from training split, class weights undefined")]
    ClassAbsent { class: Congestion },

    /// There are no entities to process.
    #[error("No entities in telemetry store")]
    EmptyGraph,

    /// Two arrays that must agree on a dimension do not.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The requested entity does not exist in the store.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityKey),

    /// Configuration values are out of range or unparsable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An input record could not be interpreted.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kpi_field_order_is_fixed() {
        let names: Vec<&str> = KpiField::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(names.len(), KPI_DIM);
        assert_eq!(names[0], "uplink_traffic_MB");
        assert_eq!(names[4], "latency_ms");
        assert_eq!(names[10], "jitter_ms");
        for (i, field) in KpiField::ALL.iter().enumerate() {
            assert_eq!(field.index(), i);
            assert_eq!(KpiField::from_name(field.name()), Some(*field));
        }
    }

    #[test]
    fn missing_kpi_fields_default_to_zero() {
        let mut named = BTreeMap::new();
        named.insert("latency_ms".to_string(), 55.0);
        named.insert("jitter_ms".to_string(), f64::NAN);

        let (vector, defaulted) = KpiVector::from_named(&named);

        assert_eq!(vector.get(KpiField::Latency), 55.0);
        assert_eq!(vector.get(KpiField::Jitter), 0.0);
        assert_eq!(defaulted.len(), KPI_DIM - 1);
        assert!(defaulted.contains(&KpiField::Jitter));
    }

    #[test]
    fn named_view_round_trips() {
        let vector = KpiVector::default()
            .with(KpiField::UplinkTraffic, 12.5)
            .with(KpiField::PacketLossRate, 0.4);
        let (back, defaulted) = KpiVector::from_named(&vector.to_named());
        assert_eq!(back, vector);
        assert!(defaulted.is_empty());
    }

    #[test]
    fn congestion_maps_to_color() {
        assert_eq!(Congestion::Congested.color(), Color::Red);
        assert_eq!(Congestion::Clear.color(), Color::Green);
        assert_eq!(Congestion::from_index(1), Congestion::Congested);
        assert_eq!(Congestion::from_index(0), Congestion::Clear);
    }

    #[test]
    fn record_snapshot_keeps_key() {
        let kpis = KpiVector::default().with(KpiField::Latency, 90.0);
        let record = EntityRecord::with_kpis(EntityKey::from_cell_id(7), &kpis);
        let snapshot = record.to_snapshot();
        assert_eq!(snapshot.key.as_str(), "7");
        assert_eq!(snapshot.kpis, kpis);
    }

    #[test]
    fn default_record_is_empty() {
        let record = EntityRecord::default();
        assert_eq!(record.key, EntityKey::default());
        assert!(record.key.as_str().is_empty());
        assert!(record.kpis.is_empty());
        assert!(record.color.is_none());

        let fresh = EntityRecord::with_kpis(EntityKey::from_cell_id(3), &KpiVector::default());
        assert_eq!(fresh.key.as_str(), "3");
        assert!(fresh.last_congestion_update.is_none());
    }
}
