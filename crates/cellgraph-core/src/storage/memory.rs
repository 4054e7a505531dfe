//! In-memory telemetry store.

use super::{TelemetryStore, UpsertOutcome, merge_snapshot, missing_edges};
use crate::{CellGraphError, ConnectivityEdge, EntityKey, EntityRecord, EntityUpdate, SegmentRecord};
use std::collections::BTreeMap;

/// `BTreeMap`-backed store. The edge collection starts absent.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entities: BTreeMap<EntityKey, EntityRecord>,
    edges: Option<Vec<ConnectivityEdge>>,
    segments: BTreeMap<u64, SegmentRecord>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with records and edges.
    #[must_use]
    pub fn with_data(records: Vec<EntityRecord>, edges: Vec<ConnectivityEdge>) -> Self {
        Self {
            entities: records.into_iter().map(|r| (r.key.clone(), r)).collect(),
            edges: Some(edges),
            segments: BTreeMap::new(),
        }
    }
}

impl TelemetryStore for MemoryStore {
    fn read_all_entities(&self) -> Result<Vec<EntityRecord>, CellGraphError> {
        Ok(self.entities.values().cloned().collect())
    }

    fn read_all_edges(&self) -> Result<Vec<ConnectivityEdge>, CellGraphError> {
        self.edges.clone().ok_or_else(missing_edges)
    }

    fn get_entity(&self, key: &EntityKey) -> Result<Option<EntityRecord>, CellGraphError> {
        Ok(self.entities.get(key).cloned())
    }

    fn upsert_entity_fields(
        &mut self,
        key: &EntityKey,
        update: &EntityUpdate,
    ) -> Result<(), CellGraphError> {
        let record = self
            .entities
            .get_mut(key)
            .ok_or_else(|| CellGraphError::EntityNotFound(key.clone()))?;
        record.color = Some(update.color.as_str().to_string());
        record.last_congestion_update = Some(update.last_congestion_update.clone());
        Ok(())
    }

    fn upsert_snapshot(&mut self, record: EntityRecord) -> Result<UpsertOutcome, CellGraphError> {
        match self.entities.get_mut(&record.key) {
            Some(existing) => {
                merge_snapshot(existing, record);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                self.entities.insert(record.key.clone(), record);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    fn create_edge_collection(&mut self) -> Result<(), CellGraphError> {
        self.edges.get_or_insert_with(Vec::new);
        Ok(())
    }

    fn insert_edge(&mut self, edge: &ConnectivityEdge) -> Result<(), CellGraphError> {
        self.edges.get_or_insert_with(Vec::new).push(edge.clone());
        Ok(())
    }

    fn upsert_segment(&mut self, record: &SegmentRecord) -> Result<(), CellGraphError> {
        self.segments.insert(record.segment_id, record.clone());
        Ok(())
    }

    fn read_segments(&self) -> Result<Vec<SegmentRecord>, CellGraphError> {
        Ok(self.segments.values().cloned().collect())
    }

    fn get_segment(&self, segment_id: u64) -> Result<Option<SegmentRecord>, CellGraphError> {
        Ok(self.segments.get(&segment_id).cloned())
    }
}
