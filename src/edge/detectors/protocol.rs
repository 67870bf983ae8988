//! D3: protocol anomalies (PCI validity, neighbour-cell count).

use crate::model::{Evidence, Measurement, Severity, Threat, ThreatType};

use super::{Detector, DetectorContext};

pub struct ProtocolDetector;

impl Detector for ProtocolDetector {
    fn name(&self) -> &'static str {
        "D3_protocol"
    }

    fn run(&self, ctx: &DetectorContext<'_>, sample: &Measurement) -> Vec<Threat> {
        let mut threats = Vec::new();
        let common = sample.common();
        let cfg = ctx.config;

        if let Some(pci) = sample.advanced().and_then(|a| a.pci) {
            if pci < cfg.d3_pci_min || pci > cfg.d3_pci_max {
                threats.push(Threat::new(
                    ThreatType::InvalidPhysicalCellId,
                    Severity::High,
                    common.timestamp,
                    "Physical cell id is outside the valid LTE range [0, 503]",
                    Evidence::new().with("pci", pci as i64).build(),
                    0.9,
                    common.location,
                    vec![common.tower_id.clone()],
                    "Invalid PCI strongly suggests a spoofed or malfunctioning base station.",
                ));
            }
        }

        if let Some(neighbors) = &common.neighbors {
            let count = neighbors.len();
            if count == 0 {
                threats.push(Threat::new(
                    ThreatType::NoNeighborCells,
                    Severity::Medium,
                    common.timestamp,
                    "No neighbour cells reported",
                    Evidence::new().with("neighbor_count", 0_i64).build(),
                    0.4,
                    common.location,
                    vec![common.tower_id.clone()],
                    "Absent neighbour list can indicate a standalone rogue base station.",
                ));
            } else if count > cfg.d3_neighbor_excessive {
                threats.push(Threat::new(
                    ThreatType::ExcessiveNeighborCells,
                    Severity::Medium,
                    common.timestamp,
                    "Neighbour cell count exceeds the expected maximum",
                    Evidence::new().with("neighbor_count", count as i64).build(),
                    0.5,
                    common.location,
                    vec![common.tower_id.clone()],
                    "Excessive neighbour count is atypical; verify against carrier network plans.",
                ));
            }
        }

        threats
    }
}
