//! # Telemetry Simulator
//!
//! Seeded synthetic telemetry for demos and tests: one row per cell with
//! KPI values drawn uniformly from typical operating ranges, and a ring
//! topology with optional random chords.

use crate::ingest::TelemetryRow;
use crate::primitives::TIMESTAMP_FORMAT;
use crate::{CellGraphError, ConnectivityEdge, EntityKey, KpiField};
use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

const NETWORK_TYPES: [&str; 3] = ["3G", "4G", "5G"];

/// Sampling range of each KPI.
fn kpi_range(field: KpiField) -> (f64, f64) {
    match field {
        KpiField::UplinkTraffic => (5.0, 50.0),
        KpiField::DownlinkTraffic => (10.0, 100.0),
        KpiField::ActiveUsers => (10.0, 100.0),
        KpiField::CallDropRate => (0.0, 3.0),
        KpiField::Latency => (10.0, 100.0),
        KpiField::Throughput => (20.0, 120.0),
        KpiField::SignalStrength => (-110.0, -70.0),
        KpiField::ResourceUtilization => (30.0, 100.0),
        KpiField::HandoverSuccessRate => (80.0, 100.0),
        KpiField::PacketLossRate => (0.0, 2.0),
        KpiField::Jitter => (0.0, 10.0),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Generator for cells numbered `1..=cells`.
#[derive(Debug, Clone)]
pub struct Simulator {
    cells: u64,
    seed: u64,
}

impl Simulator {
    pub fn new(cells: u64, seed: u64) -> Result<Self, CellGraphError> {
        if cells == 0 {
            return Err(CellGraphError::InvalidConfig(
                "simulator needs at least one cell".to_string(),
            ));
        }
        Ok(Self { cells, seed })
    }

    /// One telemetry row per cell, stamped `at`.
    #[must_use]
    pub fn rows(&self, at: NaiveDateTime) -> Vec<TelemetryRow> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let timestamp = at.format(TIMESTAMP_FORMAT).to_string();

        (1..=self.cells)
            .map(|cell_id| {
                let network_type = NETWORK_TYPES
                    .choose(&mut rng)
                    .map(|s| (*s).to_string());
                let kpis: BTreeMap<String, f64> = KpiField::ALL
                    .iter()
                    .map(|&field| {
                        let value = match field {
                            KpiField::ActiveUsers => f64::from(rng.gen_range(10u32..=100)),
                            _ => {
                                let (low, high) = kpi_range(field);
                                round2(rng.gen_range(low..=high))
                            }
                        };
                        (field.name().to_string(), value)
                    })
                    .collect();
                TelemetryRow {
                    timestamp: timestamp.clone(),
                    cell_id,
                    network_type,
                    kpis,
                }
            })
            .collect()
    }

    /// Ring over all cells plus `chords` random extra edges.
    #[must_use]
    pub fn edges(&self, chords: usize) -> Vec<ConnectivityEdge> {
        let key = EntityKey::from_cell_id;
        let mut edges: Vec<ConnectivityEdge> = match self.cells {
            1 => Vec::new(),
            2 => vec![ConnectivityEdge::new(key(1), key(2))],
            n => (1..=n)
                .map(|i| ConnectivityEdge::new(key(i), key(i % n + 1)))
                .collect(),
        };

        if self.cells > 1 {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1));
            for _ in 0..chords {
                let a = rng.gen_range(1..=self.cells);
                let mut b = rng.gen_range(1..self.cells);
                if b >= a {
                    b += 1;
                }
                edges.push(ConnectivityEdge::new(key(a), key(b)));
            }
        }
        edges
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date")
    }

    #[test]
    fn rows_are_in_range_and_rounded() {
        let sim = Simulator::new(25, 3).expect("sim");
        let rows = sim.rows(at());
        assert_eq!(rows.len(), 25);
        for row in &rows {
            assert_eq!(row.timestamp, "05/01/2024 12:00:00");
            assert!(NETWORK_TYPES.contains(&row.network_type.as_deref().expect("type")));
            assert_eq!(row.kpis.len(), KpiField::ALL.len());
            for field in KpiField::ALL {
                let value = row.kpis[field.name()];
                let (low, high) = kpi_range(field);
                assert!(value >= low && value <= high, "{} = {}", field.name(), value);
                assert!(((value * 100.0).round() - value * 100.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn same_seed_same_rows() {
        let a = Simulator::new(5, 11).expect("sim").rows(at());
        let b = Simulator::new(5, 11).expect("sim").rows(at());
        assert_eq!(a, b);
    }

    #[test]
    fn ring_topology() {
        let edges = Simulator::new(4, 0).expect("sim").edges(0);
        let pairs: Vec<(String, String)> = edges
            .into_iter()
            .map(|e| (e.source.0, e.target.0))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("1".to_string(), "2".to_string()),
                ("2".to_string(), "3".to_string()),
                ("3".to_string(), "4".to_string()),
                ("4".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn chords_never_self_loop() {
        let edges = Simulator::new(6, 8).expect("sim").edges(50);
        assert_eq!(edges.len(), 56);
        assert!(edges.iter().all(|e| e.source != e.target));
    }

    #[test]
    fn small_networks() {
        assert!(Simulator::new(1, 0).expect("sim").edges(3).is_empty());
        assert_eq!(Simulator::new(2, 0).expect("sim").edges(0).len(), 1);
        assert!(Simulator::new(0, 0).is_err());
    }
}
