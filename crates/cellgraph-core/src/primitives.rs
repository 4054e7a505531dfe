//! # Pipeline Primitives
//!
//! Fixed constants of the cellgraph pipeline and the defaults used when the
//! configuration file leaves a value out.

/// Number of KPI metrics per cell.
///
/// Every KPI vector, every KPI node feature row and the default entity
/// feature width share this dimension.
pub const KPI_DIM: usize = 11;

/// Default maximum number of cells absorbed into one segment.
pub const SEGMENT_CAPACITY: usize = 4;

/// Minimum rule score at which a cell is labelled congested.
pub const CONGESTION_MIN_SCORE: u8 = 2;

/// Number of rule conditions the labeler evaluates.
pub const RULE_COUNT: u8 = 6;

/// Timestamp format of telemetry rows and written-back records.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

// =============================================================================
// TRAINER DEFAULTS
// =============================================================================

/// Default number of training epochs.
pub const DEFAULT_EPOCHS: usize = 100;

/// Default Adam learning rate.
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;

/// Default fraction of cells held out for evaluation.
pub const DEFAULT_TEST_FRACTION: f64 = 0.4;

/// Default seed for the split, feature and weight RNGs.
pub const DEFAULT_SEED: u64 = 42;

/// Loss is logged every this many epochs.
pub const LOSS_LOG_INTERVAL: usize = 10;

// =============================================================================
// STORE COLLECTIONS
// =============================================================================

/// Collection holding one document per cell.
pub const TRAFFIC_COLLECTION: &str = "traffic_data";

/// Collection holding cell-to-cell connectivity.
pub const EDGE_COLLECTION: &str = "cell_edges";

/// Collection holding segment predictions.
pub const SEGMENT_COLLECTION: &str = "segment_prediction";

// Checked at compile time.
const _: () = assert!(CONGESTION_MIN_SCORE <= RULE_COUNT);
const _: () = assert!(DEFAULT_TEST_FRACTION > 0.0 && DEFAULT_TEST_FRACTION < 1.0);
