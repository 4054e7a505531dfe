//! # Congestion Pipeline
//!
//! One batch run, start to finish:
//!
//! ```text
//! read edges ─┐
//! read cells ─┴─> build graph ─┬─> label ──────────┐
//!                              └─> propagate ──────┴─> train ─> write predictions
//!                                        └──────────────────> segment ─> write segments
//! ```
//!
//! The edge collection is read first so a missing collection aborts before
//! any computation. Prediction and segment writes are best-effort: each
//! failure is logged, recorded in the report, and skipped.

mod report;

pub use report::{RunReport, SegmentSummary};

use crate::config::PipelineConfig;
use crate::graph::GraphBuilder;
use crate::labeler::{CongestionLabeler, label_distribution};
use crate::primitives::{KPI_DIM, TIMESTAMP_FORMAT};
use crate::propagate::{HeteroPropagator, WeightInit};
use crate::segment::Segmenter;
use crate::storage::{PersistenceReport, TelemetryStore};
use crate::trainer::ClassifierTrainer;
use crate::{CellGraphError, EntitySnapshot, EntityUpdate, SegmentRecord};
use chrono::NaiveDateTime;

/// A configured pipeline. Holds no state between runs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    builder: GraphBuilder,
    labeler: CongestionLabeler,
    feature_dim: usize,
    weight_init: WeightInit,
    trainer: ClassifierTrainer,
    segmenter: Segmenter,
}

impl Pipeline {
    /// Validate the configuration and assemble the stages.
    pub fn new(config: &PipelineConfig) -> Result<Self, CellGraphError> {
        config.validate()?;
        Ok(Self {
            builder: GraphBuilder::new(config.features.feature_init(), config.features.dim),
            labeler: CongestionLabeler::new(config.labeler.clone()),
            feature_dim: config.features.dim,
            weight_init: config.propagator.weight_init(),
            trainer: ClassifierTrainer::new(config.trainer.clone()),
            segmenter: Segmenter::new(config.segmenter.clone()),
        })
    }

    /// Run against the store, stamping writes with the local time.
    pub fn run<S: TelemetryStore + ?Sized>(&self, store: &mut S) -> Result<RunReport, CellGraphError> {
        self.run_at(store, chrono::Local::now().naive_local())
    }

    /// Run against the store, stamping writes with `now`.
    pub fn run_at<S: TelemetryStore + ?Sized>(
        &self,
        store: &mut S,
        now: NaiveDateTime,
    ) -> Result<RunReport, CellGraphError> {
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();

        let edges = store.read_all_edges()?;
        let records = store.read_all_entities()?;
        let snapshots: Vec<EntitySnapshot> = records.iter().map(|r| r.to_snapshot()).collect();
        tracing::info!(entities = snapshots.len(), edges = edges.len(), "store read");

        let (graph, build) = self.builder.build(&snapshots, &edges)?;
        tracing::info!(
            entities = build.entities,
            edges_kept = build.edges_kept,
            edges_dropped = build.edges_dropped,
            "graph built"
        );

        let labels = self.labeler.label_all(&snapshots);
        let distribution = label_distribution(&labels);
        tracing::info!(clear = distribution[0], congested = distribution[1], "labels");

        let propagator = HeteroPropagator::new(self.feature_dim, KPI_DIM, &self.weight_init);
        let embeddings = propagator.propagate(&graph)?;

        let outcome = self.trainer.train(&embeddings.device, &labels)?;
        tracing::info!(
            accuracy = outcome.metrics.accuracy,
            precision = outcome.metrics.precision,
            recall = outcome.metrics.recall,
            support = outcome.metrics.support,
            "held-out metrics"
        );

        let mut prediction_writes = PersistenceReport::default();
        for (key, prediction) in graph.keys().iter().zip(&outcome.predictions) {
            let update = EntityUpdate {
                color: prediction.color(),
                last_congestion_update: stamp.clone(),
            };
            prediction_writes.record(key.to_string(), store.upsert_entity_fields(key, &update));
        }
        tracing::info!(
            written = prediction_writes.succeeded,
            failed = prediction_writes.failed(),
            "predictions written"
        );

        let segmentation = self.segmenter.segment(&graph, &embeddings.device)?;
        tracing::info!(
            segments = segmentation.segments.len(),
            failing = segmentation.failing(),
            threshold = segmentation.threshold,
            "segmented"
        );

        let mut segment_writes = PersistenceReport::default();
        for segment in &segmentation.segments {
            let record = SegmentRecord {
                segment_id: segment.id,
                norm: segment.norm,
                status: segment.status,
                updated: stamp.clone(),
                device_ids: segment.member_keys(graph.keys()),
            };
            segment_writes.record(
                format!("segment {}", segment.id),
                store.upsert_segment(&record),
            );
        }
        tracing::info!(
            written = segment_writes.succeeded,
            failed = segment_writes.failed(),
            "segments written"
        );

        Ok(RunReport::new(
            stamp,
            build,
            distribution,
            &outcome,
            prediction_writes,
            &segmentation,
            segment_writes,
        ))
    }
}
