//! # Congestion Labeler
//!
//! Rule-based scorer that stands in for ground truth when no labelled
//! congestion data exists.
//!
//! Six independent threshold tests each add one point:
//!
//! | Field                 | Condition |
//! |-----------------------|-----------|
//! | uplink traffic        | > 40      |
//! | latency               | > 80      |
//! | resource utilization  | > 75      |
//! | packet-loss rate      | > 1.5     |
//! | jitter                | > 20      |
//! | call-drop rate        | > 2.0     |
//!
//! A cell is congested when its score reaches `min_score` (2 by default).

use crate::primitives::CONGESTION_MIN_SCORE;
use crate::{Congestion, EntitySnapshot, KpiField, KpiVector};
use serde::{Deserialize, Serialize};

/// Thresholds of the six labelling rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelThresholds {
    pub uplink_traffic: f64,
    pub latency: f64,
    pub resource_utilization: f64,
    pub packet_loss_rate: f64,
    pub jitter: f64,
    pub call_drop_rate: f64,
    /// Score at or above which a cell is congested.
    pub min_score: u8,
}

impl Default for LabelThresholds {
    fn default() -> Self {
        Self {
            uplink_traffic: 40.0,
            latency: 80.0,
            resource_utilization: 75.0,
            packet_loss_rate: 1.5,
            jitter: 20.0,
            call_drop_rate: 2.0,
            min_score: CONGESTION_MIN_SCORE,
        }
    }
}

impl LabelThresholds {
    /// Rule table as (field, threshold) pairs.
    #[must_use]
    pub fn rules(&self) -> [(KpiField, f64); 6] {
        [
            (KpiField::UplinkTraffic, self.uplink_traffic),
            (KpiField::Latency, self.latency),
            (KpiField::ResourceUtilization, self.resource_utilization),
            (KpiField::PacketLossRate, self.packet_loss_rate),
            (KpiField::Jitter, self.jitter),
            (KpiField::CallDropRate, self.call_drop_rate),
        ]
    }
}

/// Deterministic congestion labeler.
#[derive(Debug, Clone, Default)]
pub struct CongestionLabeler {
    thresholds: LabelThresholds,
}

impl CongestionLabeler {
    #[must_use]
    pub fn new(thresholds: LabelThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn thresholds(&self) -> &LabelThresholds {
        &self.thresholds
    }

    /// Number of rules the KPI vector trips, in `0..=6`.
    #[must_use]
    pub fn score(&self, kpis: &KpiVector) -> u8 {
        self.thresholds
            .rules()
            .iter()
            .filter(|(field, limit)| kpis.get(*field) > *limit)
            .count() as u8
    }

    #[must_use]
    pub fn label(&self, kpis: &KpiVector) -> Congestion {
        if self.score(kpis) >= self.thresholds.min_score {
            Congestion::Congested
        } else {
            Congestion::Clear
        }
    }

    /// Label every snapshot, in index order.
    #[must_use]
    pub fn label_all(&self, snapshots: &[EntitySnapshot]) -> Vec<Congestion> {
        snapshots.iter().map(|s| self.label(&s.kpis)).collect()
    }
}

/// Count of (clear, congested) labels.
#[must_use]
pub fn label_distribution(labels: &[Congestion]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for label in labels {
        counts[label.index()] += 1;
    }
    counts
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn nominal() -> KpiVector {
        KpiVector::default()
            .with(KpiField::UplinkTraffic, 20.0)
            .with(KpiField::DownlinkTraffic, 50.0)
            .with(KpiField::ActiveUsers, 40.0)
            .with(KpiField::CallDropRate, 0.5)
            .with(KpiField::Latency, 30.0)
            .with(KpiField::Throughput, 80.0)
            .with(KpiField::SignalStrength, -90.0)
            .with(KpiField::ResourceUtilization, 50.0)
            .with(KpiField::HandoverSuccessRate, 95.0)
            .with(KpiField::PacketLossRate, 0.2)
            .with(KpiField::Jitter, 4.0)
    }

    #[test]
    fn nominal_cell_scores_zero() {
        let labeler = CongestionLabeler::default();
        assert_eq!(labeler.score(&nominal()), 0);
        assert_eq!(labeler.label(&nominal()), Congestion::Clear);
    }

    #[test]
    fn two_conditions_make_congested() {
        let labeler = CongestionLabeler::default();
        let kpis = nominal()
            .with(KpiField::UplinkTraffic, 45.0)
            .with(KpiField::Latency, 90.0);
        assert_eq!(labeler.score(&kpis), 2);
        assert_eq!(labeler.label(&kpis), Congestion::Congested);
    }

    #[test]
    fn single_condition_is_not_enough() {
        let labeler = CongestionLabeler::default();
        let kpis = nominal().with(KpiField::Jitter, 25.0);
        assert_eq!(labeler.score(&kpis), 1);
        assert_eq!(labeler.label(&kpis), Congestion::Clear);
    }

    #[test]
    fn thresholds_are_strict() {
        let labeler = CongestionLabeler::default();
        let kpis = nominal()
            .with(KpiField::UplinkTraffic, 40.0)
            .with(KpiField::Latency, 80.0)
            .with(KpiField::CallDropRate, 2.0);
        assert_eq!(labeler.score(&kpis), 0);
    }

    #[test]
    fn all_conditions_score_six() {
        let labeler = CongestionLabeler::default();
        let kpis = nominal()
            .with(KpiField::UplinkTraffic, 41.0)
            .with(KpiField::Latency, 81.0)
            .with(KpiField::ResourceUtilization, 76.0)
            .with(KpiField::PacketLossRate, 1.6)
            .with(KpiField::Jitter, 21.0)
            .with(KpiField::CallDropRate, 2.1);
        assert_eq!(labeler.score(&kpis), 6);
    }

    #[test]
    fn configured_thresholds_apply() {
        let labeler = CongestionLabeler::new(LabelThresholds {
            latency: 25.0,
            min_score: 1,
            ..LabelThresholds::default()
        });
        assert_eq!(labeler.label(&nominal()), Congestion::Congested);
    }

    #[test]
    fn distribution_counts_both_classes() {
        let labels = [
            Congestion::Clear,
            Congestion::Congested,
            Congestion::Clear,
        ];
        assert_eq!(label_distribution(&labels), [2, 1]);
    }
}
