//! # redb-backed Telemetry Store
//!
//! A disk-backed telemetry store using the redb embedded database.
//!
//! ## Tables
//!
//! | Collection           | Key                  | Value                       |
//! |----------------------|----------------------|-----------------------------|
//! | `traffic_data`       | entity key (`&str`)  | postcard `EntityRecord`     |
//! | `cell_edges`         | sequence (`u64`)     | postcard `ConnectivityEdge` |
//! | `segment_prediction` | segment id (`u64`)   | postcard `SegmentRecord`    |
//!
//! The entity and segment tables are created on open. The edge table is
//! only created by `create_edge_collection` or the first `insert_edge`, so a
//! database that never received connectivity reports `MissingCollection`.

use super::{TelemetryStore, UpsertOutcome, merge_snapshot, missing_edges};
use crate::primitives::{EDGE_COLLECTION, SEGMENT_COLLECTION, TRAFFIC_COLLECTION};
use crate::{CellGraphError, ConnectivityEdge, EntityKey, EntityRecord, EntityUpdate, SegmentRecord};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableError};
use std::path::Path;

/// Cell documents: entity key -> serialized `EntityRecord`.
const ENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new(TRAFFIC_COLLECTION);

/// Connectivity: insertion sequence -> serialized `ConnectivityEdge`.
const EDGES: TableDefinition<u64, &[u8]> = TableDefinition::new(EDGE_COLLECTION);

/// Segment predictions: segment id -> serialized `SegmentRecord`.
const SEGMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new(SEGMENT_COLLECTION);

/// A disk-backed telemetry store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, CellGraphError> {
    postcard::to_allocvec(value).map_err(|e| CellGraphError::SerializationError(e.to_string()))
}

fn decode<'a, T: serde::Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, CellGraphError> {
    postcard::from_bytes(bytes).map_err(|e| CellGraphError::SerializationError(e.to_string()))
}

impl RedbStore {
    /// Open or create a telemetry database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CellGraphError> {
        let db = Database::create(path.as_ref())
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;

        {
            let write_txn = db
                .begin_write()
                .map_err(|e| CellGraphError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(ENTITIES)
                .map_err(|e| CellGraphError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(SEGMENTS)
                .map_err(|e| CellGraphError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        }

        Ok(Self { db })
    }
}

impl TelemetryStore for RedbStore {
    fn read_all_entities(&self) -> Result<Vec<EntityRecord>, CellGraphError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(ENTITIES)
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;

        let mut records = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?
        {
            let (_, value) = entry.map_err(|e| CellGraphError::IoError(e.to_string()))?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }

    fn read_all_edges(&self) -> Result<Vec<ConnectivityEdge>, CellGraphError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        let table = match read_txn.open_table(EDGES) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Err(missing_edges()),
            Err(e) => return Err(CellGraphError::IoError(e.to_string())),
        };

        let mut edges = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?
        {
            let (_, value) = entry.map_err(|e| CellGraphError::IoError(e.to_string()))?;
            edges.push(decode(value.value())?);
        }
        Ok(edges)
    }

    fn get_entity(&self, key: &EntityKey) -> Result<Option<EntityRecord>, CellGraphError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(ENTITIES)
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;

        match table
            .get(key.as_str())
            .map_err(|e| CellGraphError::IoError(e.to_string()))?
        {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    fn upsert_entity_fields(
        &mut self,
        key: &EntityKey,
        update: &EntityUpdate,
    ) -> Result<(), CellGraphError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(ENTITIES)
                .map_err(|e| CellGraphError::IoError(e.to_string()))?;

            let mut record: EntityRecord = match table
                .get(key.as_str())
                .map_err(|e| CellGraphError::IoError(e.to_string()))?
            {
                Some(data) => decode(data.value())?,
                None => return Err(CellGraphError::EntityNotFound(key.clone())),
            };
            record.color = Some(update.color.as_str().to_string());
            record.last_congestion_update = Some(update.last_congestion_update.clone());

            let bytes = encode(&record)?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        Ok(())
    }

    fn upsert_snapshot(&mut self, record: EntityRecord) -> Result<UpsertOutcome, CellGraphError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        let outcome = {
            let mut table = write_txn
                .open_table(ENTITIES)
                .map_err(|e| CellGraphError::IoError(e.to_string()))?;

            let existing: Option<EntityRecord> = match table
                .get(record.key.as_str())
                .map_err(|e| CellGraphError::IoError(e.to_string()))?
            {
                Some(data) => Some(decode(data.value())?),
                None => None,
            };

            let key = record.key.clone();
            let (merged, outcome) = match existing {
                Some(mut existing) => {
                    merge_snapshot(&mut existing, record);
                    (existing, UpsertOutcome::Updated)
                }
                None => (record, UpsertOutcome::Inserted),
            };

            let bytes = encode(&merged)?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| CellGraphError::IoError(e.to_string()))?;
            outcome
        };
        write_txn
            .commit()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        Ok(outcome)
    }

    fn create_edge_collection(&mut self) -> Result<(), CellGraphError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        let _ = write_txn
            .open_table(EDGES)
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        write_txn
            .commit()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        Ok(())
    }

    fn insert_edge(&mut self, edge: &ConnectivityEdge) -> Result<(), CellGraphError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(EDGES)
                .map_err(|e| CellGraphError::IoError(e.to_string()))?;
            let next = table
                .last()
                .map_err(|e| CellGraphError::IoError(e.to_string()))?
                .map(|(k, _)| k.value().saturating_add(1))
                .unwrap_or(0);
            let bytes = encode(edge)?;
            table
                .insert(next, bytes.as_slice())
                .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        Ok(())
    }

    fn upsert_segment(&mut self, record: &SegmentRecord) -> Result<(), CellGraphError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(SEGMENTS)
                .map_err(|e| CellGraphError::IoError(e.to_string()))?;
            let bytes = encode(record)?;
            table
                .insert(record.segment_id, bytes.as_slice())
                .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        Ok(())
    }

    fn read_segments(&self) -> Result<Vec<SegmentRecord>, CellGraphError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(SEGMENTS)
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;

        let mut segments = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?
        {
            let (_, value) = entry.map_err(|e| CellGraphError::IoError(e.to_string()))?;
            segments.push(decode(value.value())?);
        }
        Ok(segments)
    }

    fn get_segment(&self, segment_id: u64) -> Result<Option<SegmentRecord>, CellGraphError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(SEGMENTS)
            .map_err(|e| CellGraphError::IoError(e.to_string()))?;

        match table
            .get(segment_id)
            .map_err(|e| CellGraphError::IoError(e.to_string()))?
        {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{Color, KpiField, KpiVector, SegmentStatus};
    use tempfile::tempdir;

    fn cell(id: u64, latency: f64) -> EntityRecord {
        let mut record = EntityRecord::with_kpis(
            EntityKey::from_cell_id(id),
            &KpiVector::default().with(KpiField::Latency, latency),
        );
        record.cell_id = Some(id);
        record
    }

    #[test]
    fn missing_edge_table_is_missing_collection() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("cells.redb")).expect("open db");
        let err = store.read_all_edges().expect_err("no edge table");
        assert!(matches!(err, CellGraphError::MissingCollection(ref name) if name == EDGE_COLLECTION));
    }

    #[test]
    fn edges_keep_insertion_order() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("cells.redb")).expect("open db");
        let edges = [
            ConnectivityEdge::new(EntityKey::new("3"), EntityKey::new("1")),
            ConnectivityEdge::new(EntityKey::new("1"), EntityKey::new("2")),
            ConnectivityEdge::new(EntityKey::new("3"), EntityKey::new("1")),
        ];
        for edge in &edges {
            store.insert_edge(edge).expect("insert edge");
        }
        assert_eq!(store.read_all_edges().expect("edges"), edges.to_vec());
    }

    #[test]
    fn entity_round_trip_and_partial_update() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("cells.redb")).expect("open db");

        assert_eq!(
            store.upsert_snapshot(cell(1, 30.0)).expect("insert"),
            UpsertOutcome::Inserted
        );
        store
            .upsert_entity_fields(
                &EntityKey::from_cell_id(1),
                &EntityUpdate {
                    color: Color::Green,
                    last_congestion_update: "05/01/2024 10:00:00".to_string(),
                },
            )
            .expect("update");
        assert_eq!(
            store.upsert_snapshot(cell(1, 99.0)).expect("merge"),
            UpsertOutcome::Updated
        );

        let record = store
            .get_entity(&EntityKey::from_cell_id(1))
            .expect("get")
            .expect("present");
        assert_eq!(record.kpis["latency_ms"], 99.0);
        assert_eq!(record.color.as_deref(), Some("green"));
        assert_eq!(record.cell_id, Some(1));
    }

    #[test]
    fn segments_overwrite_by_id() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("cells.redb")).expect("open db");
        let mut record = SegmentRecord {
            segment_id: 3,
            norm: 1.25,
            status: SegmentStatus::Ok,
            updated: "05/01/2024 10:00:00".to_string(),
            device_ids: vec![EntityKey::new("1"), EntityKey::new("2")],
        };
        store.upsert_segment(&record).expect("write");
        record.status = SegmentStatus::Fail;
        record.device_ids.pop();
        store.upsert_segment(&record).expect("overwrite");

        assert_eq!(store.read_segments().expect("read").len(), 1);
        assert_eq!(store.get_segment(3).expect("get"), Some(record));
        assert_eq!(store.get_segment(4).expect("get"), None);
    }

    #[test]
    fn persistence_across_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("cells.redb");
        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            store.upsert_snapshot(cell(2, 10.0)).expect("insert");
            store.upsert_snapshot(cell(10, 10.0)).expect("insert");
            store.create_edge_collection().expect("create edges");
        }
        let store = RedbStore::open(&db_path).expect("reopen db");
        let keys: Vec<String> = store
            .read_all_entities()
            .expect("read")
            .into_iter()
            .map(|r| r.key.0)
            .collect();
        // string key order
        assert_eq!(keys, vec!["10".to_string(), "2".to_string()]);
        assert!(store.read_all_edges().expect("edges").is_empty());
    }
}
