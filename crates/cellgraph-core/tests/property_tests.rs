//! # Property-Based Tests
//!
//! Invariants of the labeler, graph builder and segmenter over random input.

#![allow(clippy::unwrap_used, clippy::panic)]

use cellgraph_core::graph::EdgeIndex;
use cellgraph_core::primitives::RULE_COUNT;
use cellgraph_core::segment::flag_outliers;
use cellgraph_core::{
    Congestion, CongestionLabeler, ConnectivityEdge, EntityKey, EntitySnapshot, GraphBuilder,
    KpiField, KpiVector, RelationKind, SegmentStatus, Segmenter, SegmenterConfig,
};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;

fn kpi_vector() -> impl Strategy<Value = KpiVector> {
    vec(-200.0f64..200.0, KpiField::ALL.len()).prop_map(|values| {
        let mut kpis = KpiVector::default();
        for (field, value) in KpiField::ALL.iter().zip(values) {
            kpis.set(*field, value);
        }
        kpis
    })
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Score stays within the rule count and the label follows the score.
    #[test]
    fn label_follows_score(kpis in kpi_vector()) {
        let labeler = CongestionLabeler::default();
        let score = labeler.score(&kpis);
        prop_assert!(score <= RULE_COUNT);
        prop_assert_eq!(labeler.label(&kpis) == Congestion::Congested, score >= 2);
    }

    /// Index assignment is a bijection onto 0..N in input order, and only
    /// edges between known cells survive.
    #[test]
    fn builder_indexes_every_cell_once(
        ids in btree_set(0u64..500, 1..40),
        raw_edges in vec((0u64..600, 0u64..600), 0..80),
    ) {
        let snapshots: Vec<EntitySnapshot> = ids
            .iter()
            .map(|&id| EntitySnapshot::new(EntityKey::from_cell_id(id), KpiVector::default()))
            .collect();
        let edges: Vec<ConnectivityEdge> = raw_edges
            .iter()
            .map(|&(s, t)| ConnectivityEdge::new(EntityKey::from_cell_id(s), EntityKey::from_cell_id(t)))
            .collect();

        let (graph, report) = GraphBuilder::default().build(&snapshots, &edges).expect("build");

        prop_assert_eq!(graph.len(), snapshots.len());
        for (i, snapshot) in snapshots.iter().enumerate() {
            prop_assert_eq!(graph.index_of(&snapshot.key), Some(i));
        }

        let known = raw_edges
            .iter()
            .filter(|(s, t)| ids.contains(s) && ids.contains(t))
            .count();
        prop_assert_eq!(report.edges_kept, known);
        prop_assert_eq!(report.edges_dropped, raw_edges.len() - known);
        prop_assert_eq!(graph.edges(RelationKind::ConnectedTo).len(), known);
        prop_assert_eq!(graph.edges(RelationKind::HasKpi).len(), snapshots.len());
    }

    /// Segments partition the cells and respect the capacity.
    #[test]
    fn segments_partition_cells(
        n in 1usize..60,
        raw_edges in vec((0usize..60, 0usize..60), 0..120),
        capacity in 1usize..6,
    ) {
        let mut edges = EdgeIndex::new();
        for (u, v) in raw_edges.into_iter().filter(|&(u, v)| u < n && v < n) {
            edges.push(u, v);
        }

        let parts = Segmenter::new(SegmenterConfig { capacity })
            .partition(n, &edges)
            .expect("partition");

        let mut seen = vec![false; n];
        for part in &parts {
            prop_assert!(!part.is_empty());
            prop_assert!(part.len() <= capacity);
            for &i in part {
                prop_assert!(!seen[i]);
                seen[i] = true;
            }
        }
        prop_assert!(seen.iter().all(|&s| s));
    }

    /// A segment fails exactly when its norm is below mean minus one std,
    /// and the threshold never exceeds the mean.
    #[test]
    fn outlier_flags_follow_threshold(norms in vec(0.0f64..100.0, 1..30)) {
        let (mean, std, threshold, statuses) = flag_outliers(&norms);
        prop_assert_eq!(statuses.len(), norms.len());
        prop_assert!(std >= 0.0);
        prop_assert!(threshold <= mean);
        for (norm, status) in norms.iter().zip(&statuses) {
            prop_assert_eq!(*status == SegmentStatus::Fail, *norm < threshold);
        }
    }
}
