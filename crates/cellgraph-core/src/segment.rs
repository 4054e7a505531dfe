//! # Segmenter
//!
//! Groups cells into bounded, locally connected segments and flags
//! segments whose mean embedding is unusually weak.
//!
//! ## Partitioning
//!
//! Starting from each unvisited cell in index order, a breadth-first walk
//! over connectivity absorbs cells until the segment holds `capacity`
//! members. Cells are marked visited when absorbed; neighbours still queued
//! when the segment fills are left for later segments. Every cell ends up
//! in exactly one segment and isolated cells form singletons.
//!
//! ## Scoring
//!
//! A segment's norm is the Euclidean norm of the mean of its members'
//! embeddings. A segment FAILs when its norm is strictly below
//! `mean(norms) - std(norms)` (population standard deviation).

use crate::graph::{EdgeIndex, HeteroGraph, RelationKind};
use crate::primitives::SEGMENT_CAPACITY;
use crate::{CellGraphError, EntityKey, SegmentStatus};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Segmenter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Maximum members per segment.
    pub capacity: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            capacity: SEGMENT_CAPACITY,
        }
    }
}

/// A scored segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: u64,
    /// Member cell indices, in absorption order.
    pub members: Vec<usize>,
    pub norm: f64,
    pub status: SegmentStatus,
}

impl Segment {
    /// Member keys, in absorption order.
    #[must_use]
    pub fn member_keys(&self, keys: &[EntityKey]) -> Vec<EntityKey> {
        self.members
            .iter()
            .filter_map(|&i| keys.get(i).cloned())
            .collect()
    }
}

/// All segments of a run with the statistics used to flag them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Segmentation {
    pub segments: Vec<Segment>,
    pub mean_norm: f64,
    pub std_norm: f64,
    pub threshold: f64,
}

impl Segmentation {
    #[must_use]
    pub fn failing(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.status == SegmentStatus::Fail)
            .count()
    }
}

/// Population mean, population standard deviation and the outlier
/// threshold `mean - std`, with one status per norm.
#[must_use]
pub fn flag_outliers(norms: &[f64]) -> (f64, f64, f64, Vec<SegmentStatus>) {
    if norms.is_empty() {
        return (0.0, 0.0, 0.0, Vec::new());
    }
    let n = norms.len() as f64;
    let mean = norms.iter().sum::<f64>() / n;
    let variance = norms.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    let threshold = mean - std;
    let statuses = norms
        .iter()
        .map(|&norm| {
            if norm < threshold {
                SegmentStatus::Fail
            } else {
                SegmentStatus::Ok
            }
        })
        .collect();
    (mean, std, threshold, statuses)
}

/// Bounded breadth-first segmenter.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    #[must_use]
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    /// Partition `n` cells using undirected connectivity.
    ///
    /// Adjacency lists are filled by scanning edges in order and adding
    /// each endpoint to the other's list.
    pub fn partition(&self, n: usize, edges: &EdgeIndex) -> Result<Vec<Vec<usize>>, CellGraphError> {
        if self.config.capacity == 0 {
            return Err(CellGraphError::InvalidConfig(
                "segment capacity must be positive".to_string(),
            ));
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (u, v) in edges.pairs() {
            if u >= n || v >= n {
                return Err(CellGraphError::DimensionMismatch {
                    expected: n,
                    found: u.max(v) + 1,
                });
            }
            adjacency[u].push(v);
            adjacency[v].push(u);
        }

        let mut visited = vec![false; n];
        let mut segments = Vec::new();

        for start in 0..n {
            if visited[start] {
                continue;
            }
            let mut queue = VecDeque::from([start]);
            let mut current = Vec::with_capacity(self.config.capacity);

            while current.len() < self.config.capacity {
                let Some(node) = queue.pop_front() else {
                    break;
                };
                if visited[node] {
                    continue;
                }
                visited[node] = true;
                current.push(node);
                for &neighbor in &adjacency[node] {
                    if !visited[neighbor] {
                        queue.push_back(neighbor);
                    }
                }
            }

            segments.push(current);
        }

        Ok(segments)
    }

    /// Score a partition against per-cell embeddings.
    pub fn score(
        &self,
        partition: Vec<Vec<usize>>,
        embeddings: &Array2<f64>,
    ) -> Result<Segmentation, CellGraphError> {
        let mut norms = Vec::with_capacity(partition.len());
        for members in &partition {
            if let Some(&bad) = members.iter().find(|&&i| i >= embeddings.nrows()) {
                return Err(CellGraphError::DimensionMismatch {
                    expected: embeddings.nrows(),
                    found: bad + 1,
                });
            }
            let rows = embeddings.select(Axis(0), members);
            let norm = rows
                .mean_axis(Axis(0))
                .map(|mean| mean.dot(&mean).sqrt())
                .unwrap_or(0.0);
            norms.push(norm);
        }

        let (mean_norm, std_norm, threshold, statuses) = flag_outliers(&norms);
        let segments = partition
            .into_iter()
            .zip(norms)
            .zip(statuses)
            .enumerate()
            .map(|(id, ((members, norm), status))| Segment {
                id: id as u64,
                members,
                norm,
                status,
            })
            .collect();

        Ok(Segmentation {
            segments,
            mean_norm,
            std_norm,
            threshold,
        })
    }

    /// Partition the graph's connectivity and score it.
    pub fn segment(
        &self,
        graph: &HeteroGraph,
        embeddings: &Array2<f64>,
    ) -> Result<Segmentation, CellGraphError> {
        if embeddings.nrows() != graph.len() {
            return Err(CellGraphError::DimensionMismatch {
                expected: graph.len(),
                found: embeddings.nrows(),
            });
        }
        let partition = self.partition(graph.len(), graph.edges(RelationKind::ConnectedTo))?;
        self.score(partition, embeddings)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use ndarray::array;

    fn edges(pairs: &[(usize, usize)]) -> EdgeIndex {
        let mut e = EdgeIndex::new();
        for &(u, v) in pairs {
            e.push(u, v);
        }
        e
    }

    #[test]
    fn two_triangles_make_two_segments() {
        let e = edges(&[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]);
        let parts = Segmenter::default().partition(6, &e).expect("partition");
        assert_eq!(parts, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn capacity_caps_segment_size() {
        // star: hub 0 with six leaves
        let e = edges(&[(0, 1), (0, 2), (0, 3), (0, 4), (0, 5), (0, 6)]);
        let parts = Segmenter::default().partition(7, &e).expect("partition");
        assert_eq!(parts[0], vec![0, 1, 2, 3]);
        // leaves 4..6 only connect through the hub, so they become singletons
        assert_eq!(parts[1..], [vec![4], vec![5], vec![6]]);
    }

    #[test]
    fn isolated_cells_are_singletons() {
        let parts = Segmenter::default().partition(3, &EdgeIndex::new()).expect("partition");
        assert_eq!(parts, vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn chain_is_split_in_discovery_order() {
        let e = edges(&[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)]);
        let parts = Segmenter::default().partition(6, &e).expect("partition");
        assert_eq!(parts, vec![vec![0, 1, 2, 3], vec![4, 5]]);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let segmenter = Segmenter::new(SegmenterConfig { capacity: 0 });
        assert!(matches!(
            segmenter.partition(2, &EdgeIndex::new()),
            Err(CellGraphError::InvalidConfig(_))
        ));
    }

    #[test]
    fn equal_norms_are_all_ok() {
        let (_, std, _, statuses) = flag_outliers(&[2.5, 2.5]);
        assert_eq!(std, 0.0);
        assert_eq!(statuses, vec![SegmentStatus::Ok, SegmentStatus::Ok]);
    }

    #[test]
    fn low_outlier_fails() {
        let (mean, std, threshold, statuses) = flag_outliers(&[10.0, 10.0, 10.0, 1.0]);
        assert!((mean - 7.75).abs() < 1e-12);
        assert!(std > 0.0);
        assert!((threshold - (mean - std)).abs() < 1e-12);
        assert_eq!(
            statuses,
            vec![
                SegmentStatus::Ok,
                SegmentStatus::Ok,
                SegmentStatus::Ok,
                SegmentStatus::Fail
            ]
        );
    }

    #[test]
    fn norm_is_norm_of_mean_embedding() {
        let embeddings = array![[3.0, 0.0], [3.0, 8.0], [1.0, 1.0]];
        let seg = Segmenter::default()
            .score(vec![vec![0, 1], vec![2]], &embeddings)
            .expect("score");
        // mean of rows 0 and 1 is (3, 4)
        assert!((seg.segments[0].norm - 5.0).abs() < 1e-12);
        assert!((seg.segments[1].norm - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(seg.segments[1].id, 1);
    }

    #[test]
    fn member_keys_follow_members() {
        let keys = vec![EntityKey::new("a"), EntityKey::new("b"), EntityKey::new("c")];
        let segment = Segment {
            id: 0,
            members: vec![2, 0],
            norm: 0.0,
            status: SegmentStatus::Ok,
        };
        assert_eq!(
            segment.member_keys(&keys),
            vec![EntityKey::new("c"), EntityKey::new("a")]
        );
    }
}
