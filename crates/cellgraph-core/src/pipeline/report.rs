//! Run summary returned by [`Pipeline::run`](super::Pipeline::run).

use crate::graph::BuildReport;
use crate::segment::Segmentation;
use crate::storage::PersistenceReport;
use crate::trainer::{EvaluationMetrics, TrainingOutcome};
use crate::SegmentStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment_id: u64,
    pub size: usize,
    pub norm: f64,
    pub status: SegmentStatus,
}

/// Everything a run computed and wrote, minus the embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Timestamp written to predictions and segments.
    pub timestamp: String,
    pub build: BuildReport,
    /// (clear, congested) rule labels.
    pub label_distribution: [usize; 2],
    pub class_weights: [f64; 2],
    pub loss_history: Vec<f64>,
    pub metrics: EvaluationMetrics,
    pub predicted_congested: usize,
    pub prediction_writes: PersistenceReport,
    pub segments: Vec<SegmentSummary>,
    pub mean_norm: f64,
    pub std_norm: f64,
    pub threshold: f64,
    pub segment_writes: PersistenceReport,
}

impl RunReport {
    pub(crate) fn new(
        timestamp: String,
        build: BuildReport,
        label_distribution: [usize; 2],
        outcome: &TrainingOutcome,
        prediction_writes: PersistenceReport,
        segmentation: &Segmentation,
        segment_writes: PersistenceReport,
    ) -> Self {
        Self {
            timestamp,
            build,
            label_distribution,
            class_weights: outcome.class_weights,
            loss_history: outcome.loss_history.clone(),
            metrics: outcome.metrics,
            predicted_congested: outcome
                .predictions
                .iter()
                .filter(|p| p.is_congested())
                .count(),
            prediction_writes,
            segments: segmentation
                .segments
                .iter()
                .map(|s| SegmentSummary {
                    segment_id: s.id,
                    size: s.members.len(),
                    norm: s.norm,
                    status: s.status,
                })
                .collect(),
            mean_norm: segmentation.mean_norm,
            std_norm: segmentation.std_norm,
            threshold: segmentation.threshold,
            segment_writes,
        }
    }

    #[must_use]
    pub fn failing_segments(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.status == SegmentStatus::Fail)
            .count()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run at {}", self.timestamp)?;
        writeln!(
            f,
            "  Graph:       {} cells, {} edges ({} dropped)",
            self.build.entities, self.build.edges_kept, self.build.edges_dropped
        )?;
        writeln!(
            f,
            "  Labels:      {} clear, {} congested",
            self.label_distribution[0], self.label_distribution[1]
        )?;
        writeln!(
            f,
            "  Weights:     [{:.4}, {:.4}]",
            self.class_weights[0], self.class_weights[1]
        )?;
        if let (Some(first), Some(last)) = (self.loss_history.first(), self.loss_history.last()) {
            writeln!(
                f,
                "  Loss:        {:.4} -> {:.4} over {} epochs",
                first,
                last,
                self.loss_history.len()
            )?;
        }
        writeln!(
            f,
            "  Held-out:    accuracy {:.3}, precision {:.3}, recall {:.3} (n={})",
            self.metrics.accuracy, self.metrics.precision, self.metrics.recall, self.metrics.support
        )?;
        writeln!(
            f,
            "  Predicted:   {} congested, {}/{} written",
            self.predicted_congested, self.prediction_writes.succeeded, self.prediction_writes.attempted
        )?;
        writeln!(
            f,
            "  Segments:    {} ({} FAIL), threshold {:.4}, {}/{} written",
            self.segments.len(),
            self.failing_segments(),
            self.threshold,
            self.segment_writes.succeeded,
            self.segment_writes.attempted
        )?;
        for failure in self
            .prediction_writes
            .failures
            .iter()
            .chain(&self.segment_writes.failures)
        {
            writeln!(f, "  Failed:      {} ({})", failure.target, failure.error)?;
        }
        Ok(())
    }
}
