//! DRF Writer.
//!
//! Emits the flat list of obligations that require re-signing: every
//! node that was invalidated, or that completed but carries an
//! un-resolved declined change against an otherwise-normal record.

use std::collections::BTreeMap;

use crate::engine::{SigNode, SigNodeKey};
use crate::run_config::RunConfig;
use crate::status::{ChangeStatus, RecStatus, SignatureStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrfRow {
    pub patient: String,
    pub visit: i64,
    pub sig_plate: i64,
}

fn requires_resign(node: &SigNode) -> bool {
    match node.status.signature {
        SignatureStatus::Invalidated => true,
        SignatureStatus::Complete => {
            node.status.record == RecStatus::Normal && node.status.change == ChangeStatus::Declined
        }
        SignatureStatus::None => false,
    }
}

/// Build the DRF row list, in `SigNodeKey` order. When `run_config.
/// arrived_only` is set, obligations whose signature plate has never
/// been observed this run (`!recseen`) are omitted (`-A`/`--arrived-only`).
pub fn build_drf(nodes: &BTreeMap<SigNodeKey, SigNode>, run_config: &RunConfig) -> Vec<DrfRow> {
    nodes
        .values()
        .filter(|node| !run_config.arrived_only || node.recseen)
        .filter(|node| requires_resign(node))
        .map(|node| DrfRow {
            patient: node.patient.clone(),
            visit: node.visit,
            sig_plate: node.header.sig_plate,
        })
        .collect()
}

/// Render rows as `patient|visit|plate\n`.
pub fn format_drf(rows: &[DrfRow]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&format!("{}|{}|{}\n", row.patient, row.visit, row.sig_plate));
    }
    out
}
