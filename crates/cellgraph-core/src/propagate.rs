//! # Embedding Propagator
//!
//! One round of heterogeneous message passing over a [`HeteroGraph`].
//!
//! Each relation owns a SAGE-style operator:
//!
//! ```text
//! h_i = W_neigh · Σ_{j ∈ N(i)} x_j + b + W_self · x_i
//! ```
//!
//! Outputs of relations that target the same node type are summed. The
//! device output is the cell embedding and keeps the device feature width.
//! A target with no neighbours in a relation aggregates to the zero vector.

use crate::graph::{EdgeIndex, HeteroGraph, NodeType, RelationKind};
use crate::primitives::DEFAULT_SEED;
use crate::CellGraphError;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =============================================================================
// WEIGHT INITIALIZATION
// =============================================================================

/// How operator weights are initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightInit {
    /// Rectangular identity, zero bias. Embeddings carry raw features through.
    Identity,
    /// Uniform in `±1/√fan_in` from a seeded RNG.
    Seeded { seed: u64 },
}

impl Default for WeightInit {
    fn default() -> Self {
        WeightInit::Seeded { seed: DEFAULT_SEED }
    }
}

fn init_matrix(rows: usize, cols: usize, init: &WeightInit, rng: &mut StdRng) -> Array2<f64> {
    match init {
        WeightInit::Identity => {
            Array2::from_shape_fn((rows, cols), |(i, j)| if i == j { 1.0 } else { 0.0 })
        }
        WeightInit::Seeded { .. } => {
            let bound = 1.0 / (cols.max(1) as f64).sqrt();
            Array2::from_shape_simple_fn((rows, cols), || rng.gen_range(-bound..=bound))
        }
    }
}

// =============================================================================
// SAGE OPERATOR
// =============================================================================

/// Sum-aggregating SAGE operator for one relation.
#[derive(Debug, Clone)]
pub struct SageOperator {
    /// `out x in_src`
    w_neigh: Array2<f64>,
    /// `out`
    bias: Array1<f64>,
    /// `out x in_dst`
    w_self: Array2<f64>,
}

impl SageOperator {
    fn new(in_src: usize, in_dst: usize, out: usize, init: &WeightInit, rng: &mut StdRng) -> Self {
        let w_neigh = init_matrix(out, in_src, init, rng);
        let bias = match init {
            WeightInit::Identity => Array1::zeros(out),
            WeightInit::Seeded { .. } => {
                let bound = 1.0 / (in_src.max(1) as f64).sqrt();
                Array1::from_shape_simple_fn(out, || rng.gen_range(-bound..=bound))
            }
        };
        let w_self = init_matrix(out, in_dst, init, rng);
        Self {
            w_neigh,
            bias,
            w_self,
        }
    }

    /// Output width.
    #[must_use]
    pub fn out_dim(&self) -> usize {
        self.bias.len()
    }

    /// Apply the operator to one relation.
    pub fn forward(
        &self,
        x_src: &Array2<f64>,
        x_dst: &Array2<f64>,
        edges: &EdgeIndex,
    ) -> Result<Array2<f64>, CellGraphError> {
        check_width(self.w_neigh.ncols(), x_src.ncols())?;
        check_width(self.w_self.ncols(), x_dst.ncols())?;

        let aggregated = aggregate(x_src, edges, x_dst.nrows())?;
        let mut out = aggregated.dot(&self.w_neigh.t());
        out += &self.bias;
        out += &x_dst.dot(&self.w_self.t());
        Ok(out)
    }
}

fn check_width(expected: usize, found: usize) -> Result<(), CellGraphError> {
    if expected != found {
        return Err(CellGraphError::DimensionMismatch { expected, found });
    }
    Ok(())
}

/// Sum source rows into their targets.
///
/// Returns a `n_dst x width` matrix; targets without incoming edges stay zero.
pub fn aggregate(
    x_src: &Array2<f64>,
    edges: &EdgeIndex,
    n_dst: usize,
) -> Result<Array2<f64>, CellGraphError> {
    let mut out = Array2::zeros((n_dst, x_src.ncols()));
    for (src, dst) in edges.pairs() {
        if src >= x_src.nrows() {
            return Err(CellGraphError::DimensionMismatch {
                expected: x_src.nrows(),
                found: src + 1,
            });
        }
        if dst >= n_dst {
            return Err(CellGraphError::DimensionMismatch {
                expected: n_dst,
                found: dst + 1,
            });
        }
        let mut row = out.row_mut(dst);
        row += &x_src.row(src);
    }
    Ok(out)
}

// =============================================================================
// HETEROGENEOUS PROPAGATOR
// =============================================================================

/// Per-type outputs of one propagation round.
#[derive(Debug, Clone)]
pub struct Embeddings {
    /// One row per cell, device feature width.
    pub device: Array2<f64>,
    /// One row per KPI record, KPI width.
    pub kpi: Array2<f64>,
}

/// Heterogeneous propagator: one [`SageOperator`] per relation kind.
#[derive(Debug, Clone)]
pub struct HeteroPropagator {
    device_dim: usize,
    kpi_dim: usize,
    operators: Vec<(RelationKind, SageOperator)>,
}

impl HeteroPropagator {
    /// Create operators for the given node feature widths.
    #[must_use]
    pub fn new(device_dim: usize, kpi_dim: usize, init: &WeightInit) -> Self {
        let seed = match init {
            WeightInit::Seeded { seed } => *seed,
            WeightInit::Identity => 0,
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let dim = |t: NodeType| match t {
            NodeType::Device => device_dim,
            NodeType::DeviceKpi => kpi_dim,
        };

        let operators = RelationKind::ALL
            .iter()
            .map(|kind| {
                let op = SageOperator::new(
                    dim(kind.source()),
                    dim(kind.target()),
                    dim(kind.target()),
                    init,
                    &mut rng,
                );
                (*kind, op)
            })
            .collect();

        Self {
            device_dim,
            kpi_dim,
            operators,
        }
    }

    /// Run one round of message passing.
    pub fn propagate(&self, graph: &HeteroGraph) -> Result<Embeddings, CellGraphError> {
        let x_device = graph.features(NodeType::Device);
        let x_kpi = graph.features(NodeType::DeviceKpi);
        check_width(self.device_dim, x_device.ncols())?;
        check_width(self.kpi_dim, x_kpi.ncols())?;

        let mut device = Array2::zeros((x_device.nrows(), self.device_dim));
        let mut kpi = Array2::zeros((x_kpi.nrows(), self.kpi_dim));

        for (kind, op) in &self.operators {
            let x_src = graph.features(kind.source());
            let x_dst = graph.features(kind.target());
            let out = op.forward(x_src, x_dst, graph.edges(*kind))?;
            match kind.target() {
                NodeType::Device => device += &out,
                NodeType::DeviceKpi => kpi += &out,
            }
            tracing::trace!(relation = kind.name(), edges = graph.edges(*kind).len(), "relation propagated");
        }

        Ok(Embeddings { device, kpi })
    }
}

// =============================================================================
// TESTS
// =============================================================================
