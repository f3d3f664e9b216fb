//! Status Propagator.
//!
//! A single pass over the forest that lifts per-field change-status up
//! to plate and then to signature-obligation status, under two
//! configurable policies (`allow_signer_changes`, `resign_when_final`).
//! Per the Open Question in DESIGN.md, the pass is idempotent only
//! within a single run: `plate.changeStatus` is deliberately *not*
//! reset between field changes, so re-running the propagator over an
//! already-propagated tree can accumulate a higher status than a fresh
//! pass would produce.

use std::collections::BTreeMap;

use crate::engine::{SigNode, SigNodeKey};
use crate::run_config::RunConfig;
use crate::status::ChangeStatus;

/// Run the propagator over every node in the forest, in place.
pub fn propagate(nodes: &mut BTreeMap<SigNodeKey, SigNode>, run_config: &RunConfig) {
    for node in nodes.values_mut() {
        propagate_node(node, run_config);
    }
}

fn propagate_node(node: &mut SigNode, run_config: &RunConfig) {
    // Step 1: reset the obligation-level change status; it is rebuilt
    // below from the covered plates.
    node.status.change = ChangeStatus::None;

    let sig_plate = node.header.sig_plate;
    let signer = node.signer.clone();
    let node_signature_status = node.status.signature;

    for plate in node.plates.values_mut() {
        // Step 2: the plate inherits the obligation's signature status;
        // its own change status is carried over from a prior pass.
        plate.status.signature = node_signature_status;
        plate.field_change_count = 0;

        for change in plate.changes.values_mut() {
            plate.field_change_count += 1;

            if run_config.resign_when_final
                && !plate.is_final
                && change.status.change == ChangeStatus::Declined
            {
                change.status.change = ChangeStatus::DeclinedAtFinal;
            }

            change.status.record = plate.status.record;
            change.status.signature = plate.status.signature;

            if run_config.allow_signer_changes {
                if let Some(signer) = signer.as_deref() {
                    if change.who == signer {
                        change.comment = Some("Changed by Signer".to_string());
                        change.status.change = ChangeStatus::Accepted;
                    }
                }
            }

            plate.status.change = plate.status.change.max(change.status.change);
        }

        // Step 4: the signature plate's record status flows back up to
        // the obligation.
        if plate.plate == sig_plate {
            node.status.record = plate.status.record;
        }

        // Step 5.
        node.status.change = node.status.change.max(plate.status.change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::exclusion::ExclusionTable;
    use crate::record::tokenize;
    use crate::status::SignatureStatus;
    use crate::SignatureEngine;

    fn audit(
        date: &str,
        time: &str,
        user: &str,
        patient: &str,
        visit: i64,
        plate: i64,
        status: i64,
        old: &str,
        new: &str,
        field_pos: i64,
    ) -> crate::record::AuditEvent {
        let line = format!(
            "{date}|{time}|{user}|{patient}|{visit}|{plate}|0|col8|{status}|3|c11|c12|c13|{old}|{new}|{field_pos}|d|od|nd"
        );
        tokenize(&line)
    }

    const CONFIG: &str = r#"signature "A" plate 10 visit * fields 5 { plate 10; plate 11; }"#;

    fn signed_key() -> SigNodeKey {
        SigNodeKey {
            patient: "P1".to_string(),
            visit: 1,
            sig_plate: 10,
            min_sig_field: 5,
        }
    }

    fn engine_with_post_sign_change(writer: &str) -> SignatureEngine {
        let (configs, errors) = parse_config(CONFIG);
        assert!(errors.is_empty());
        let mut engine = SignatureEngine::new(configs);
        let exclusions = ExclusionTable::default();

        engine.process_event(
            &audit("20250101", "0900", "u1", "P1", 1, 11, 2, "", "v1", 12),
            1,
            &exclusions,
        );
        engine.process_event(
            &audit("20250101", "0901", "u1", "P1", 1, 10, 2, "", "u1", 5),
            2,
            &exclusions,
        );
        engine.process_event(
            &audit("20250102", "0900", writer, "P1", 1, 11, 2, "v1", "v2", 12),
            3,
            &exclusions,
        );
        engine
    }

    #[test]
    fn s2_propagates_declined_to_node() {
        let mut engine = engine_with_post_sign_change("u2");
        propagate(engine.nodes_mut(), &RunConfig::default());
        let node = engine.nodes().get(&signed_key()).unwrap();
        assert_eq!(node.status.signature, SignatureStatus::Complete);
        assert_eq!(node.status.change, ChangeStatus::Declined);
    }

    #[test]
    fn s3_exempts_signer_changes() {
        let mut engine = engine_with_post_sign_change("u1");
        let run_config = RunConfig {
            allow_signer_changes: true,
            ..RunConfig::default()
        };
        propagate(engine.nodes_mut(), &run_config);
        let node = engine.nodes().get(&signed_key()).unwrap();
        assert_eq!(node.status.change, ChangeStatus::Accepted);
        let plate11 = node.plates.get(&11).unwrap();
        let change = plate11.changes.get(&12).unwrap();
        assert_eq!(change.comment.as_deref(), Some("Changed by Signer"));
    }

    #[test]
    fn s4_defers_to_final_on_non_final_plate() {
        // status=2 means plate.is_final is false (only 0/1 are final).
        let mut engine = engine_with_post_sign_change("u2");
        let run_config = RunConfig {
            resign_when_final: true,
            ..RunConfig::default()
        };
        propagate(engine.nodes_mut(), &run_config);
        let node = engine.nodes().get(&signed_key()).unwrap();
        let plate11 = node.plates.get(&11).unwrap();
        let change = plate11.changes.get(&12).unwrap();
        assert_eq!(change.status.change, ChangeStatus::DeclinedAtFinal);
        assert_eq!(node.status.change, ChangeStatus::DeclinedAtFinal);
    }
}
