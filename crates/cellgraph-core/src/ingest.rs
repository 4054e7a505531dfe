//! # Telemetry Ingestion
//!
//! Loads telemetry rows and connectivity into a [`TelemetryStore`].
//!
//! A telemetry log holds many rows per cell. Only the most recent row of
//! each cell is written: rows are ordered by their parsed timestamp and,
//! on equal timestamps, the row appearing later in the input wins.

use crate::primitives::TIMESTAMP_FORMAT;
use crate::storage::{PersistenceReport, TelemetryStore, UpsertOutcome};
use crate::{CellGraphError, ConnectivityEdge, EntityKey, EntityRecord, KpiField};
use chrono::NaiveDateTime;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One telemetry row. Every field besides the three named ones is a KPI.
///
/// Input is read leniently: numeric strings are parsed, while nulls and
/// other non-numeric columns are dropped with a warning. A dropped KPI is
/// later defaulted to 0 when the record becomes a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTelemetryRow")]
pub struct TelemetryRow {
    /// `%m/%d/%Y %H:%M:%S`
    pub timestamp: String,
    pub cell_id: u64,
    #[serde(default)]
    pub network_type: Option<String>,
    #[serde(flatten)]
    pub kpis: BTreeMap<String, f64>,
}

/// A column value as it appears in a telemetry export.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColumnValue {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

#[derive(Debug, Deserialize)]
struct RawTelemetryRow {
    timestamp: String,
    cell_id: u64,
    #[serde(default)]
    network_type: Option<String>,
    #[serde(flatten)]
    columns: BTreeMap<String, ColumnValue>,
}

impl From<RawTelemetryRow> for TelemetryRow {
    fn from(raw: RawTelemetryRow) -> Self {
        let mut kpis = BTreeMap::new();
        for (name, value) in raw.columns {
            let number = match value {
                ColumnValue::Number(n) => Some(n),
                ColumnValue::Text(text) => text.trim().parse::<f64>().ok(),
                ColumnValue::Other(_) => None,
            };
            match number {
                Some(n) if n.is_finite() => {
                    kpis.insert(name, n);
                }
                _ if KpiField::from_name(&name).is_some() => {
                    tracing::warn!(cell = raw.cell_id, field = %name, "non-numeric KPI value dropped");
                }
                _ => {
                    tracing::debug!(cell = raw.cell_id, column = %name, "non-numeric column ignored");
                }
            }
        }
        Self {
            timestamp: raw.timestamp,
            cell_id: raw.cell_id,
            network_type: raw.network_type,
            kpis,
        }
    }
}

impl TelemetryRow {
    pub fn parsed_timestamp(&self) -> Result<NaiveDateTime, CellGraphError> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).map_err(|e| {
            CellGraphError::InvalidRecord(format!(
                "cell {}: timestamp {:?}: {}",
                self.cell_id, self.timestamp, e
            ))
        })
    }

    /// Store document for this row, without prediction fields.
    #[must_use]
    pub fn into_record(self) -> EntityRecord {
        EntityRecord {
            key: EntityKey::from_cell_id(self.cell_id),
            cell_id: Some(self.cell_id),
            timestamp: Some(self.timestamp),
            network_type: self.network_type,
            kpis: self.kpis,
            color: None,
            last_congestion_update: None,
        }
    }
}

// =============================================================================
// CONNECTIVITY ROWS
// =============================================================================

/// A cell reference in a connectivity file: a numeric id or a store key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CellRef {
    Id(u64),
    Key(String),
}

impl From<CellRef> for EntityKey {
    fn from(cell: CellRef) -> Self {
        match cell {
            CellRef::Id(id) => EntityKey::from_cell_id(id),
            CellRef::Key(key) => EntityKey::new(key),
        }
    }
}

/// One `{source, target}` entry of a connectivity file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EdgeRow {
    pub source: CellRef,
    pub target: CellRef,
}

impl From<EdgeRow> for ConnectivityEdge {
    fn from(row: EdgeRow) -> Self {
        ConnectivityEdge::new(row.source.into(), row.target.into())
    }
}

/// Latest row per cell, ordered by cell id.
///
/// Any unparsable timestamp rejects the whole batch.
pub fn latest_per_entity(rows: Vec<TelemetryRow>) -> Result<Vec<TelemetryRow>, CellGraphError> {
    let mut latest: BTreeMap<u64, (NaiveDateTime, TelemetryRow)> = BTreeMap::new();
    for row in rows {
        let at = row.parsed_timestamp()?;
        match latest.get(&row.cell_id) {
            Some((current, _)) if *current > at => {}
            _ => {
                latest.insert(row.cell_id, (at, row));
            }
        }
    }
    Ok(latest.into_values().map(|(_, row)| row).collect())
}

/// Outcome of [`sync_rows`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub rows: usize,
    pub cells: usize,
    pub inserted: usize,
    pub updated: usize,
    pub writes: PersistenceReport,
}

/// Reduce rows to the latest per cell and upsert each one.
///
/// Individual write failures are recorded and skipped.
pub fn sync_rows<S: TelemetryStore + ?Sized>(
    store: &mut S,
    rows: Vec<TelemetryRow>,
) -> Result<SyncReport, CellGraphError> {
    let row_count = rows.len();
    let latest = latest_per_entity(rows)?;
    let mut report = SyncReport {
        rows: row_count,
        cells: latest.len(),
        ..SyncReport::default()
    };

    for row in latest {
        let target = EntityKey::from_cell_id(row.cell_id).to_string();
        match store.upsert_snapshot(row.into_record()) {
            Ok(UpsertOutcome::Inserted) => {
                report.inserted += 1;
                report.writes.record(target, Ok(()));
            }
            Ok(UpsertOutcome::Updated) => {
                report.updated += 1;
                report.writes.record(target, Ok(()));
            }
            Err(e) => report.writes.record(target, Err(e)),
        }
    }

    tracing::info!(
        rows = report.rows,
        cells = report.cells,
        inserted = report.inserted,
        updated = report.updated,
        failed = report.writes.failed(),
        "telemetry synced"
    );
    Ok(report)
}

/// Append connectivity edges, creating the edge collection first.
pub fn link_edges<S: TelemetryStore + ?Sized>(
    store: &mut S,
    edges: &[ConnectivityEdge],
) -> Result<PersistenceReport, CellGraphError> {
    store.create_edge_collection()?;
    let mut report = PersistenceReport::default();
    for edge in edges {
        report.record(
            format!("{}->{}", edge.source, edge.target),
            store.insert_edge(edge),
        );
    }
    tracing::info!(
        edges = report.attempted,
        failed = report.failed(),
        "connectivity linked"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn row(cell_id: u64, timestamp: &str, latency: f64) -> TelemetryRow {
        TelemetryRow {
            timestamp: timestamp.to_string(),
            cell_id,
            network_type: Some("4G".to_string()),
            kpis: BTreeMap::from([("latency_ms".to_string(), latency)]),
        }
    }

    #[test]
    fn keeps_latest_row_per_cell() {
        let rows = vec![
            row(2, "01/01/2024 10:00:30", 20.0),
            row(1, "01/01/2024 10:00:30", 11.0),
            row(1, "01/01/2024 10:00:00", 10.0),
            row(2, "01/01/2024 10:00:00", 21.0),
        ];
        let latest = latest_per_entity(rows).expect("latest");
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].cell_id, 1);
        assert_eq!(latest[0].kpis["latency_ms"], 11.0);
        assert_eq!(latest[1].kpis["latency_ms"], 20.0);
    }

    #[test]
    fn timestamps_compare_chronologically_not_lexically() {
        // "12/31/2023" sorts after "01/01/2024" as a string
        let rows = vec![
            row(1, "01/01/2024 00:00:00", 2.0),
            row(1, "12/31/2023 23:59:59", 1.0),
        ];
        let latest = latest_per_entity(rows).expect("latest");
        assert_eq!(latest[0].kpis["latency_ms"], 2.0);
    }

    #[test]
    fn equal_timestamps_keep_later_row() {
        let rows = vec![
            row(1, "01/01/2024 00:00:00", 1.0),
            row(1, "01/01/2024 00:00:00", 2.0),
        ];
        let latest = latest_per_entity(rows).expect("latest");
        assert_eq!(latest[0].kpis["latency_ms"], 2.0);
    }

    #[test]
    fn bad_timestamp_rejects_batch() {
        let rows = vec![row(1, "2024-01-01T00:00:00", 1.0)];
        assert!(matches!(
            latest_per_entity(rows),
            Err(CellGraphError::InvalidRecord(_))
        ));
    }

    #[test]
    fn sync_inserts_then_updates() {
        let mut store = MemoryStore::new();
        let first = sync_rows(&mut store, vec![row(1, "01/01/2024 00:00:00", 1.0)]).expect("sync");
        assert_eq!((first.inserted, first.updated), (1, 0));

        let second = sync_rows(
            &mut store,
            vec![
                row(1, "01/01/2024 00:00:30", 5.0),
                row(2, "01/01/2024 00:00:30", 6.0),
            ],
        )
        .expect("sync");
        assert_eq!((second.inserted, second.updated), (1, 1));
        assert_eq!(second.writes.succeeded, 2);

        let record = store
            .get_entity(&EntityKey::from_cell_id(1))
            .expect("get")
            .expect("present");
        assert_eq!(record.kpis["latency_ms"], 5.0);
    }

    #[test]
    fn link_creates_collection() {
        let mut store = MemoryStore::new();
        let report = link_edges(&mut store, &[]).expect("link");
        assert_eq!(report.attempted, 0);
        assert!(store.read_all_edges().expect("edges").is_empty());

        let edge = ConnectivityEdge::new(EntityKey::new("1"), EntityKey::new("2"));
        link_edges(&mut store, std::slice::from_ref(&edge)).expect("link");
        assert_eq!(store.read_all_edges().expect("edges"), vec![edge]);
    }

    #[test]
    fn null_kpi_is_dropped_not_fatal() {
        let json = r#"[
            {"timestamp": "01/01/2024 00:00:00", "cell_id": 1, "network_type": "4G",
             "latency_ms": null, "jitter_ms": 3.5},
            {"timestamp": "01/01/2024 00:00:00", "cell_id": 2, "latency_ms": 42}
        ]"#;
        let rows: Vec<TelemetryRow> = serde_json::from_str(json).expect("rows");

        assert_eq!(rows.len(), 2);
        assert!(!rows[0].kpis.contains_key("latency_ms"));
        assert_eq!(rows[0].kpis["jitter_ms"], 3.5);
        assert_eq!(rows[1].kpis["latency_ms"], 42.0);
        assert_eq!(rows[1].network_type, None);

        let snapshot = rows[0].clone().into_record().to_snapshot();
        assert_eq!(snapshot.kpis.get(KpiField::Latency), 0.0);
    }

    #[test]
    fn text_columns_are_parsed_or_ignored() {
        let json = r#"{"timestamp": "01/01/2024 00:00:00", "cell_id": 4,
            "region": "north", "latency_ms": " 61.5", "jitter_ms": "n/a", "tags": [1, 2]}"#;
        let row: TelemetryRow = serde_json::from_str(json).expect("row");

        assert_eq!(row.kpis.len(), 1);
        assert_eq!(row.kpis["latency_ms"], 61.5);
    }

    #[test]
    fn edge_rows_accept_ids_and_keys() {
        let json = r#"[{"source": 1, "target": "2"}, {"source": "7", "target": 8}]"#;
        let rows: Vec<EdgeRow> = serde_json::from_str(json).expect("edges");
        let edges: Vec<ConnectivityEdge> = rows.into_iter().map(ConnectivityEdge::from).collect();

        assert_eq!(
            edges,
            vec![
                ConnectivityEdge::new(EntityKey::from_cell_id(1), EntityKey::from_cell_id(2)),
                ConnectivityEdge::new(EntityKey::from_cell_id(7), EntityKey::from_cell_id(8)),
            ]
        );
    }
}
