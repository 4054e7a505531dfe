//! # Graph Builder
//!
//! Assembles the heterogeneous cell graph consumed by the propagator.
//!
//! The graph is an immutable value with two node types:
//! - `Device`: one row per cell, features from a [`FeatureInit`] strategy
//! - `DeviceKpi`: one row per cell, the cell's KPI vector
//!
//! and four relations, each a pair of index arrays:
//!
//! | Relation         | Source    | Target    | Edges                    |
//! |------------------|-----------|-----------|--------------------------|
//! | `HasKpi`         | Device    | DeviceKpi | i → i                    |
//! | `RevHasKpi`      | DeviceKpi | Device    | i → i                    |
//! | `ConnectedTo`    | Device    | Device    | connectivity             |
//! | `RevConnectedTo` | Device    | Device    | connectivity, flipped    |
//!
//! Row `i` of every per-cell array refers to the same cell.

use crate::primitives::{DEFAULT_SEED, KPI_DIM};
use crate::{CellGraphError, ConnectivityEdge, EntityKey, EntitySnapshot};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// NODE TYPES AND RELATIONS
// =============================================================================

/// Node types of the heterogeneous graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Device,
    DeviceKpi,
}

/// The fixed set of relation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    HasKpi,
    RevHasKpi,
    ConnectedTo,
    RevConnectedTo,
}

impl RelationKind {
    /// All relation kinds, in propagation order.
    pub const ALL: [RelationKind; 4] = [
        RelationKind::HasKpi,
        RelationKind::RevHasKpi,
        RelationKind::ConnectedTo,
        RelationKind::RevConnectedTo,
    ];

    #[must_use]
    pub fn source(&self) -> NodeType {
        match self {
            RelationKind::RevHasKpi => NodeType::DeviceKpi,
            _ => NodeType::Device,
        }
    }

    #[must_use]
    pub fn target(&self) -> NodeType {
        match self {
            RelationKind::HasKpi => NodeType::DeviceKpi,
            _ => NodeType::Device,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RelationKind::HasKpi => "has_kpi",
            RelationKind::RevHasKpi => "rev_has_kpi",
            RelationKind::ConnectedTo => "connected_to",
            RelationKind::RevConnectedTo => "rev_connected_to",
        }
    }
}

/// Parallel source/target index arrays of one relation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EdgeIndex {
    pub sources: Vec<usize>,
    pub targets: Vec<usize>,
}

impl EdgeIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: usize, target: usize) {
        self.sources.push(source);
        self.targets.push(target);
    }

    /// Same edges with source and target swapped.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            sources: self.targets.clone(),
            targets: self.sources.clone(),
        }
    }

    /// Edges as (source, target) pairs, in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.sources.iter().copied().zip(self.targets.iter().copied())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// A typed relation with its edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub kind: RelationKind,
    pub edges: EdgeIndex,
}

// =============================================================================
// FEATURE INITIALIZATION
// =============================================================================

/// How device node features are initialized.
///
/// Cells carry no intrinsic features; the KPI signal enters through the
/// `RevHasKpi` relation.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureInit {
    /// All features zero.
    Zeros,
    /// Every feature set to `value`.
    Constant { value: f64 },
    /// Uniform in `[0, 1)` from a seeded RNG.
    Seeded { seed: u64 },
}

impl Default for FeatureInit {
    fn default() -> Self {
        FeatureInit::Seeded { seed: DEFAULT_SEED }
    }
}

impl FeatureInit {
    /// Materialize an `rows x dim` feature matrix.
    #[must_use]
    pub fn materialize(&self, rows: usize, dim: usize) -> Array2<f64> {
        match self {
            FeatureInit::Zeros => Array2::zeros((rows, dim)),
            FeatureInit::Constant { value } => Array2::from_elem((rows, dim), *value),
            FeatureInit::Seeded { seed } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                Array2::from_shape_simple_fn((rows, dim), || rng.gen_range(0.0..1.0))
            }
        }
    }
}

// =============================================================================
// HETEROGENEOUS GRAPH
// =============================================================================

/// Immutable snapshot of the cell graph for one run.
#[derive(Debug, Clone)]
pub struct HeteroGraph {
    keys: Vec<EntityKey>,
    device_features: Array2<f64>,
    kpi_features: Array2<f64>,
    relations: Vec<Relation>,
}

impl HeteroGraph {
    /// Cell keys in index order.
    #[must_use]
    pub fn keys(&self) -> &[EntityKey] {
        &self.keys
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn features(&self, node_type: NodeType) -> &Array2<f64> {
        match node_type {
            NodeType::Device => &self.device_features,
            NodeType::DeviceKpi => &self.kpi_features,
        }
    }

    /// All relations, in [`RelationKind::ALL`] order.
    #[must_use]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Edges of one relation. Every kind is always present.
    #[must_use]
    pub fn edges(&self, kind: RelationKind) -> &EdgeIndex {
        // relations is built from RelationKind::ALL, so the position is the kind's index
        &self.relations[kind as usize].edges
    }

    /// Index of a cell key.
    #[must_use]
    pub fn index_of(&self, key: &EntityKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }
}

/// Counters produced while building a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildReport {
    pub entities: usize,
    pub edges_kept: usize,
    pub edges_dropped: usize,
}

// =============================================================================
// GRAPH BUILDER
// =============================================================================

/// Builds a [`HeteroGraph`] from snapshots and connectivity.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    feature_init: FeatureInit,
    feature_dim: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self {
            feature_init: FeatureInit::default(),
            feature_dim: KPI_DIM,
        }
    }
}

impl GraphBuilder {
    #[must_use]
    pub fn new(feature_init: FeatureInit, feature_dim: usize) -> Self {
        Self {
            feature_init,
            feature_dim,
        }
    }

    /// Build the graph.
    ///
    /// Cells are indexed in snapshot order. If a key occurs twice, the
    /// first occurrence owns the index and edges resolve to it. Edges whose
    /// endpoints are not among the snapshots are dropped.
    pub fn build(
        &self,
        snapshots: &[EntitySnapshot],
        edges: &[ConnectivityEdge],
    ) -> Result<(HeteroGraph, BuildReport), CellGraphError> {
        if snapshots.is_empty() {
            return Err(CellGraphError::EmptyGraph);
        }
        if self.feature_dim == 0 {
            return Err(CellGraphError::InvalidConfig(
                "feature dimension must be positive".to_string(),
            ));
        }

        let n = snapshots.len();
        let mut index: BTreeMap<&EntityKey, usize> = BTreeMap::new();
        let mut keys = Vec::with_capacity(n);
        let mut kpi_features = Array2::zeros((n, KPI_DIM));
        let mut has_kpi = EdgeIndex::new();

        for (i, snapshot) in snapshots.iter().enumerate() {
            index.entry(&snapshot.key).or_insert(i);
            keys.push(snapshot.key.clone());
            for (j, value) in snapshot.kpis.as_slice().iter().enumerate() {
                kpi_features[[i, j]] = *value;
            }
            has_kpi.push(i, i);
        }

        let mut connected = EdgeIndex::new();
        let mut dropped = 0usize;
        for edge in edges {
            match (index.get(&edge.source), index.get(&edge.target)) {
                (Some(&src), Some(&dst)) => connected.push(src, dst),
                _ => {
                    dropped += 1;
                    tracing::debug!(
                        source = %edge.source,
                        target = %edge.target,
                        "Dropping edge with unknown endpoint"
                    );
                }
            }
        }

        let relations = RelationKind::ALL
            .iter()
            .map(|kind| {
                let edges = match kind {
                    RelationKind::HasKpi => has_kpi.clone(),
                    RelationKind::RevHasKpi => has_kpi.flipped(),
                    RelationKind::ConnectedTo => connected.clone(),
                    RelationKind::RevConnectedTo => connected.flipped(),
                };
                Relation { kind: *kind, edges }
            })
            .collect();

        let report = BuildReport {
            entities: n,
            edges_kept: connected.len(),
            edges_dropped: dropped,
        };

        let graph = HeteroGraph {
            keys,
            device_features: self.feature_init.materialize(n, self.feature_dim),
            kpi_features,
            relations,
        };

        Ok((graph, report))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{KpiField, KpiVector};

    fn snapshot(id: u64, uplink: f64) -> EntitySnapshot {
        EntitySnapshot::new(
            EntityKey::from_cell_id(id),
            KpiVector::default().with(KpiField::UplinkTraffic, uplink),
        )
    }

    fn edge(a: u64, b: u64) -> ConnectivityEdge {
        ConnectivityEdge::new(EntityKey::from_cell_id(a), EntityKey::from_cell_id(b))
    }

    #[test]
    fn indices_follow_snapshot_order() {
        let snapshots = vec![snapshot(10, 1.0), snapshot(3, 2.0), snapshot(7, 3.0)];
        let (graph, report) = GraphBuilder::default().build(&snapshots, &[]).expect("build");

        assert_eq!(graph.len(), 3);
        assert_eq!(report.entities, 3);
        assert_eq!(graph.index_of(&EntityKey::new("3")), Some(1));
        assert_eq!(graph.features(NodeType::DeviceKpi)[[2, 0]], 3.0);
    }

    #[test]
    fn kpi_relations_are_identity() {
        let snapshots = vec![snapshot(1, 1.0), snapshot(2, 2.0)];
        let (graph, _) = GraphBuilder::default().build(&snapshots, &[]).expect("build");

        let has_kpi = graph.edges(RelationKind::HasKpi);
        assert_eq!(has_kpi.pairs().collect::<Vec<_>>(), vec![(0, 0), (1, 1)]);
        assert_eq!(graph.edges(RelationKind::RevHasKpi), has_kpi);
    }

    #[test]
    fn connectivity_has_reverse_relation() {
        let snapshots = vec![snapshot(1, 0.0), snapshot(2, 0.0), snapshot(3, 0.0)];
        let edges = vec![edge(1, 2), edge(2, 3)];
        let (graph, _) = GraphBuilder::default().build(&snapshots, &edges).expect("build");

        let forward: Vec<_> = graph.edges(RelationKind::ConnectedTo).pairs().collect();
        let reverse: Vec<_> = graph.edges(RelationKind::RevConnectedTo).pairs().collect();
        assert_eq!(forward, vec![(0, 1), (1, 2)]);
        assert_eq!(reverse, vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn dangling_edges_are_dropped() {
        let snapshots = vec![snapshot(1, 0.0), snapshot(2, 0.0)];
        let edges = vec![edge(1, 2), edge(2, 99), edge(42, 1)];
        let (graph, report) = GraphBuilder::default().build(&snapshots, &edges).expect("build");

        assert_eq!(graph.edges(RelationKind::ConnectedTo).len(), 1);
        assert_eq!(report.edges_kept, 1);
        assert_eq!(report.edges_dropped, 2);
    }

    #[test]
    fn empty_snapshot_set_is_rejected() {
        let result = GraphBuilder::default().build(&[], &[]);
        assert!(matches!(result, Err(CellGraphError::EmptyGraph)));
    }

    #[test]
    fn relations_follow_declared_order() {
        let (graph, _) = GraphBuilder::default()
            .build(&[snapshot(1, 0.0)], &[])
            .expect("build");
        let kinds: Vec<_> = graph.relations().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, RelationKind::ALL.to_vec());
    }

    #[test]
    fn feature_init_strategies() {
        let zeros = FeatureInit::Zeros.materialize(2, 3);
        assert!(zeros.iter().all(|v| *v == 0.0));

        let constant = FeatureInit::Constant { value: 0.5 }.materialize(2, 3);
        assert!(constant.iter().all(|v| *v == 0.5));

        let a = FeatureInit::Seeded { seed: 7 }.materialize(4, 5);
        let b = FeatureInit::Seeded { seed: 7 }.materialize(4, 5);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn feature_dim_is_configurable() {
        let builder = GraphBuilder::new(FeatureInit::Zeros, 5);
        let (graph, _) = builder.build(&[snapshot(1, 0.0)], &[]).expect("build");
        assert_eq!(graph.features(NodeType::Device).ncols(), 5);
        assert_eq!(graph.features(NodeType::DeviceKpi).ncols(), KPI_DIM);
    }
}
