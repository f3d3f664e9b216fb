//! Signature State Engine.
//!
//! Maintains the forest of signature-obligation nodes and mutates them
//! on each audit event, exposing `sign`/`unsign`/`dataChange`
//! transitions. The engine itself performs no I/O; it returns
//! `EngineNotification`s so an adapter layer can drive the SQLite
//! write-back at the right moments.

use std::collections::BTreeMap;

use crate::config::SignatureConfig;
use crate::exclusion::ExclusionTable;
use crate::record::{decode, AuditEvent};
use crate::status::{ChangeStatus, RecStatus, SignatureStatus, Status};

/// Unique key for a signature obligation: `(patient, visit, sigPlate,
/// minSigField)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SigNodeKey {
    pub patient: String,
    pub visit: i64,
    pub sig_plate: i64,
    pub min_sig_field: i64,
}

/// Header fields shared by every configuration record under one
/// `signature` block (deep-copied at parse time, kept here by value so
/// the node doesn't borrow from the configuration list).
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    pub name: String,
    pub sig_plate: i64,
    pub n_sig_fields: i64,
}

#[derive(Debug, Clone)]
pub struct SigField {
    pub field_number: i64,
    pub completed: bool,
    pub desc: String,
    pub value: String,
}

/// A single tracked field edit, keyed by field number on its owning
/// `CoveredPlate`. `old_value` is first-write-wins; every other column
/// is last-write-wins.
#[derive(Debug, Clone)]
pub struct FieldChange {
    pub field: i64,
    pub status: Status,
    pub desc: String,
    pub old_value: String,
    pub new_value: String,
    pub who: String,
    pub date: String,
    pub time: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CoveredPlate {
    pub plate: i64,
    pub status: Status,
    pub is_final: bool,
    pub field_change_count: i64,
    pub changes: BTreeMap<i64, FieldChange>,
}

impl CoveredPlate {
    fn new(plate: i64) -> Self {
        Self {
            plate,
            status: Status::default(),
            is_final: false,
            field_change_count: 0,
            changes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SigNode {
    pub patient: String,
    pub visit: i64,
    pub header: SignatureHeader,
    pub status: Status,
    pub signer: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    /// `RECSEEN`: the signature plate has been observed this run.
    pub recseen: bool,
    /// Transaction in which the obligation became `SIG_COMPLETE`, or 0.
    pub txn_id: u64,
    pub sig_fields: Vec<SigField>,
    pub plates: BTreeMap<i64, CoveredPlate>,
}

impl SigNode {
    fn new(patient: String, visit: i64, config: &SignatureConfig) -> Self {
        let sig_fields = config
            .sig_fields
            .iter()
            .map(|n| SigField {
                field_number: n,
                completed: false,
                desc: String::new(),
                value: String::new(),
            })
            .collect();
        Self {
            patient,
            visit,
            header: SignatureHeader {
                name: config.name.clone(),
                sig_plate: config.sig_plate,
                n_sig_fields: config.n_sig_fields,
            },
            status: Status::default(),
            signer: None,
            date: None,
            time: None,
            recseen: false,
            txn_id: 0,
            sig_fields,
            plates: BTreeMap::new(),
        }
    }

    fn completed_count(&self) -> i64 {
        self.sig_fields.iter().filter(|f| f.completed).count() as i64
    }
}

/// What happened on this dispatch, for an adapter layer to react to
/// (SQLite write-back timing).
#[derive(Debug, Clone)]
pub enum EngineNotification {
    /// A `(field, desc, value)` snapshot of every signature field and a
    /// `(plate, field, desc, value)` snapshot of every covered-plate
    /// change pending *at the moment of completion*, captured before
    /// `freeSignedValues` clears them. An adapter uses this to perform
    /// the "full dump of signature fields and of all currently-pending
    /// covered field changes" write.
    SignatureCompleted {
        key: SigNodeKey,
        txn_id: u64,
        signer: String,
        date: String,
        time: String,
        sig_fields: Vec<(i64, String, String)>,
        covered_values: Vec<(i64, i64, String, String)>,
    },
    DataChangeObserved {
        key: SigNodeKey,
        plate: i64,
        field: i64,
        txn_id: u64,
        who: String,
        date: String,
        time: String,
        desc: String,
        value: String,
    },
}

pub struct SignatureEngine {
    configs: Vec<SignatureConfig>,
    nodes: BTreeMap<SigNodeKey, SigNode>,
}

impl SignatureEngine {
    pub fn new(configs: Vec<SignatureConfig>) -> Self {
        Self {
            configs,
            nodes: BTreeMap::new(),
        }
    }

    pub fn nodes(&self) -> &BTreeMap<SigNodeKey, SigNode> {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut BTreeMap<SigNodeKey, SigNode> {
        &mut self.nodes
    }

    /// Dispatch one tokenised, transaction-stamped audit event per
    /// the dispatch sequence below.
    pub fn process_event(
        &mut self,
        event: &AuditEvent,
        txn_id: u64,
        exclusions: &ExclusionTable,
    ) -> Vec<EngineNotification> {
        let mut notifications = Vec::new();

        // Step 1: query/reason rows.
        if let Some(fieldref) = event.fieldref() {
            if fieldref != 0 {
                return notifications;
            }
        }
        // Step 2: raster/study/key metadata.
        if let Some(field_pos) = event.field_pos() {
            if field_pos > 2 && field_pos <= 7 {
                return notifications;
            }
        }

        let (Some(visit), Some(plate)) = (event.visit(), event.plate()) else {
            return notifications;
        };

        // Find the set of configuration records that apply to this event.
        // Indices are collected first to avoid holding an immutable borrow
        // of `self.configs` across the mutable dispatch below.
        let applying: Vec<usize> = self
            .configs
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.plate == plate
                    && c.visits.contains(visit)
                    && !c.ignore_fields.contains(event.field_pos().unwrap_or(i64::MIN))
            })
            .map(|(i, _)| i)
            .collect();

        for idx in applying {
            let config = self.configs[idx].clone();
            let key = SigNodeKey {
                patient: event.patient().to_string(),
                visit,
                sig_plate: config.sig_plate,
                min_sig_field: config.sig_fields.min().unwrap_or(0),
            };

            let node = self
                .nodes
                .entry(key.clone())
                .or_insert_with(|| SigNode::new(event.patient().to_string(), visit, &config));

            if plate == config.sig_plate {
                if let Some(status) = event.status() {
                    if status != 0 {
                        node.recseen = true;
                    }
                }
            }

            let field_pos = event.field_pos();
            let is_sig_field_write = plate == config.sig_plate
                && field_pos.map(|f| config.sig_fields.contains(f)).unwrap_or(false);

            if is_sig_field_write {
                let field = field_pos.unwrap();
                if !event.new_value().is_empty() {
                    if sign(node, field, event, txn_id) {
                        let sig_fields = node
                            .sig_fields
                            .iter()
                            .map(|f| (f.field_number, f.desc.clone(), f.value.clone()))
                            .collect();
                        let covered_values = node
                            .plates
                            .values()
                            .flat_map(|p| {
                                p.changes
                                    .values()
                                    .map(move |c| (p.plate, c.field, c.desc.clone(), c.new_value.clone()))
                            })
                            .collect();
                        free_signed_values(node);
                        notifications.push(EngineNotification::SignatureCompleted {
                            key: key.clone(),
                            txn_id,
                            signer: node.signer.clone().unwrap_or_default(),
                            date: node.date.clone().unwrap_or_default(),
                            time: node.time.clone().unwrap_or_default(),
                            sig_fields,
                            covered_values,
                        });
                    }
                } else {
                    unsign(node, field);
                }
            } else {
                data_change(node, &key, plate, event, txn_id, exclusions, &mut notifications);
            }
        }

        notifications
    }
}

/// `sign(field, txnId)`. Returns `true` iff this call
/// completed the obligation.
fn sign(node: &mut SigNode, field: i64, event: &AuditEvent, txn_id: u64) -> bool {
    if let Some(sf) = node.sig_fields.iter_mut().find(|f| f.field_number == field) {
        sf.completed = true;
        sf.desc = event.field_desc().to_string();
        sf.value = event.new_value().to_string();
    }

    if node.completed_count() == node.header.n_sig_fields {
        node.status.signature = SignatureStatus::Complete;
        node.signer = Some(event.user().to_string());
        node.date = Some(event.date().to_string());
        node.time = Some(event.time().to_string());
        node.txn_id = txn_id;
        true
    } else {
        false
    }
}

/// `freeSignedValues(txnId)`: called after every
/// completing `sign`. The signature accepts all pending data changes at
/// that instant.
fn free_signed_values(node: &mut SigNode) {
    for plate in node.plates.values_mut() {
        plate.changes.clear();
        plate.status.record = RecStatus::Normal;
        plate.status.change = ChangeStatus::None;
    }
}

/// `unsign(field)`.
fn unsign(node: &mut SigNode, field: i64) {
    if let Some(sf) = node.sig_fields.iter_mut().find(|f| f.field_number == field) {
        sf.completed = false;
        sf.value = String::new();
    }
    if node.status.signature == SignatureStatus::Complete {
        node.status.signature = SignatureStatus::Invalidated;
    }
    node.txn_id = 0;
}

/// `dataChange(event, txnId)`.
fn data_change(
    node: &mut SigNode,
    key: &SigNodeKey,
    plate_no: i64,
    event: &AuditEvent,
    txn_id: u64,
    exclusions: &ExclusionTable,
    notifications: &mut Vec<EngineNotification>,
) {
    let plate = node
        .plates
        .entry(plate_no)
        .or_insert_with(|| CoveredPlate::new(plate_no));

    // Open Question (see DESIGN.md): the source resets recStatus to
    // NORMAL at the top of every dataChange before applying the
    // status-derived assignment below, which means a later NORMAL event
    // on a previously-LOST plate silently clears the LOST state. That
    // behaviour is preserved here deliberately.
    plate.status.record = RecStatus::Normal;

    let status = event.status();
    plate.is_final = matches!(status, Some(0) | Some(1));

    let signed = node.status.signature != SignatureStatus::None;
    match (status, event.level()) {
        (Some(3), Some(7)) => {
            plate.status.record = RecStatus::Error;
            if signed {
                plate.status.change = ChangeStatus::Declined;
            }
        }
        (Some(7), _) => {
            plate.status.record = RecStatus::Deleted;
            plate.changes.clear();
            if signed {
                plate.status.change = ChangeStatus::Declined;
            }
        }
        (Some(0), _) => {
            plate.status.record = RecStatus::Lost;
            plate.changes.clear();
            if signed {
                plate.status.change = ChangeStatus::Declined;
            }
        }
        _ => {}
    }

    notifications.push(EngineNotification::DataChangeObserved {
        key: key.clone(),
        plate: plate_no,
        field: event.field_pos().unwrap_or(0),
        txn_id,
        who: event.user().to_string(),
        date: event.date().to_string(),
        time: event.time().to_string(),
        desc: event.field_desc().to_string(),
        value: decode(event.new_value(), event.new_decode()),
    });

    // Consumed by freeSignedValues: this change belongs to the signing
    // transaction itself.
    if txn_id == node.txn_id && node.txn_id != 0 {
        return;
    }

    let Some(field) = event.field_pos() else {
        return;
    };
    if field < 7 {
        return;
    }

    let is_new = !plate.changes.contains_key(&field);
    let entry = plate.changes.entry(field).or_insert_with(|| FieldChange {
        field,
        status: Status::default(),
        desc: String::new(),
        old_value: decode(event.old_value(), event.old_decode()),
        new_value: String::new(),
        who: String::new(),
        date: String::new(),
        time: String::new(),
        comment: None,
    });

    entry.who = event.user().to_string();
    entry.date = event.date().to_string();
    entry.time = event.time().to_string();
    entry.desc = event.field_desc().to_string();
    entry.new_value = decode(event.new_value(), event.new_decode());

    if is_new {
        if exclusions.contains(plate_no, field, &entry.who, &entry.date, &entry.old_value) {
            entry.status.change = ChangeStatus::Accepted;
            entry.comment = Some("Administratively exempted".to_string());
        } else {
            entry.status.change = ChangeStatus::Declined;
            entry.comment = None;
        }
    }

    plate.field_change_count = plate.changes.len() as i64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::record::tokenize;

    fn engine_for(src: &str) -> SignatureEngine {
        let (configs, errors) = parse_config(src);
        assert!(errors.is_empty(), "{errors:?}");
        SignatureEngine::new(configs)
    }

    fn audit(
        date: &str,
        time: &str,
        user: &str,
        patient: &str,
        visit: i64,
        plate: i64,
        fieldref: i64,
        status: i64,
        level: i64,
        old: &str,
        new: &str,
        field_pos: i64,
        desc: &str,
    ) -> crate::record::AuditEvent {
        let line = format!(
            "{date}|{time}|{user}|{patient}|{visit}|{plate}|{fieldref}|col8|{status}|{level}|c11|c12|c13|{old}|{new}|{field_pos}|{desc}|od|nd"
        );
        tokenize(&line)
    }

    const S1_CONFIG: &str = r#"signature "A" plate 10 visit * fields 5 { plate 10; plate 11; }"#;

    #[test]
    fn s1_clean_signature() {
        let mut engine = engine_for(S1_CONFIG);
        let exclusions = ExclusionTable::default();

        let data_write = audit(
            "20250101", "0900", "u1", "P1", 1, 11, 0, 2, 3, "", "v1", 12, "desc",
        );
        engine.process_event(&data_write, 1, &exclusions);

        let sign_write = audit(
            "20250101", "0901", "u1", "P1", 1, 10, 0, 2, 3, "", "u1", 5, "signer",
        );
        engine.process_event(&sign_write, 2, &exclusions);

        let key = SigNodeKey {
            patient: "P1".to_string(),
            visit: 1,
            sig_plate: 10,
            min_sig_field: 5,
        };
        let node = engine.nodes().get(&key).expect("node exists");
        assert_eq!(node.status.signature, SignatureStatus::Complete);
        let plate11 = node.plates.get(&11).expect("plate 11 tracked");
        assert!(plate11.changes.is_empty());
    }

    #[test]
    fn s2_post_sign_declined_change() {
        let mut engine = engine_for(S1_CONFIG);
        let exclusions = ExclusionTable::default();

        engine.process_event(
            &audit("20250101", "0900", "u1", "P1", 1, 11, 0, 2, 3, "", "v1", 12, "d"),
            1,
            &exclusions,
        );
        engine.process_event(
            &audit("20250101", "0901", "u1", "P1", 1, 10, 0, 2, 3, "", "u1", 5, "s"),
            2,
            &exclusions,
        );
        engine.process_event(
            &audit("20250102", "0900", "u2", "P1", 1, 11, 0, 2, 3, "v1", "v2", 12, "d"),
            3,
            &exclusions,
        );

        let key = SigNodeKey {
            patient: "P1".to_string(),
            visit: 1,
            sig_plate: 10,
            min_sig_field: 5,
        };
        let node = engine.nodes().get(&key).unwrap();
        let plate11 = node.plates.get(&11).unwrap();
        let change = plate11.changes.get(&12).unwrap();
        assert_eq!(change.status.change, ChangeStatus::Declined);
    }

    #[test]
    fn s5_unsign_cascade() {
        let mut engine = engine_for(S1_CONFIG);
        let exclusions = ExclusionTable::default();

        engine.process_event(
            &audit("20250101", "0901", "u1", "P1", 1, 10, 0, 2, 3, "", "u1", 5, "s"),
            1,
            &exclusions,
        );
        engine.process_event(
            &audit("20250102", "0900", "u1", "P1", 1, 10, 0, 2, 3, "u1", "", 5, "s"),
            2,
            &exclusions,
        );

        let key = SigNodeKey {
            patient: "P1".to_string(),
            visit: 1,
            sig_plate: 10,
            min_sig_field: 5,
        };
        let node = engine.nodes().get(&key).unwrap();
        assert_eq!(node.status.signature, SignatureStatus::Invalidated);
        assert_eq!(node.txn_id, 0);
    }

    #[test]
    fn s6_exclusion_marks_accepted() {
        let mut engine = engine_for(S1_CONFIG);
        let (exclusions, warnings) = ExclusionTable::parse("11|12|u2|20250101\n");
        assert!(warnings.is_empty());

        engine.process_event(
            &audit("20250101", "0901", "u1", "P1", 1, 10, 0, 2, 3, "", "u1", 5, "s"),
            1,
            &exclusions,
        );
        engine.process_event(
            &audit("20250101", "0902", "u2", "P1", 1, 11, 0, 2, 3, "", "v2", 12, "d"),
            2,
            &exclusions,
        );

        let key = SigNodeKey {
            patient: "P1".to_string(),
            visit: 1,
            sig_plate: 10,
            min_sig_field: 5,
        };
        let node = engine.nodes().get(&key).unwrap();
        let plate11 = node.plates.get(&11).unwrap();
        let change = plate11.changes.get(&12).unwrap();
        assert_eq!(change.status.change, ChangeStatus::Accepted);
        assert_eq!(change.comment.as_deref(), Some("Administratively exempted"));
    }

    #[test]
    fn field_change_invariant_is_at_least_seven() {
        let mut engine = engine_for(S1_CONFIG);
        let exclusions = ExclusionTable::default();
        // field_pos 6 is below the tracked threshold and must not create
        // a FieldChange even though plate 11 is covered.
        engine.process_event(
            &audit("20250101", "0900", "u1", "P1", 1, 11, 0, 2, 3, "", "v1", 6, "d"),
            1,
            &exclusions,
        );
        let key = SigNodeKey {
            patient: "P1".to_string(),
            visit: 1,
            sig_plate: 10,
            min_sig_field: 5,
        };
        let node = engine.nodes().get(&key).unwrap();
        let plate11 = node.plates.get(&11).unwrap();
        assert!(plate11.changes.is_empty());
    }
}
