//! Report row projection: a pure function from the final tracked-object
//! forest to rows and colour-tag styles, standing in for a byte-level
//! spreadsheet renderer. No `.xlsx` output is produced here.

use std::collections::BTreeMap;

use sig_domain::{ChangeStatus, RecStatus, SigNode, SigNodeKey, SignatureStatus};
use sig_ports::{ReportRow, ReportSink, ReportStyle, SiteLookup};

#[derive(Debug, Default)]
pub struct RowReportSink;

fn style_for(node: &SigNode, plate_record: RecStatus, plate_change: ChangeStatus) -> ReportStyle {
    if node.status.signature == SignatureStatus::Invalidated {
        return ReportStyle::Invalidated;
    }
    if matches!(plate_change, ChangeStatus::Declined | ChangeStatus::DeclinedAtFinal) {
        return ReportStyle::Discrepancy;
    }
    if plate_record != RecStatus::Normal {
        return ReportStyle::Warning;
    }
    ReportStyle::Clean
}

impl ReportSink for RowReportSink {
    fn render(
        &self,
        forest: &BTreeMap<SigNodeKey, SigNode>,
        sdv: bool,
        site_lookup: Option<&dyn SiteLookup>,
    ) -> Vec<ReportRow> {
        let mut rows = Vec::new();
        for node in forest.values() {
            let patient_no: Option<i64> = node.patient.parse().ok();
            let site = patient_no
                .zip(site_lookup)
                .and_then(|(p, lookup)| lookup.site_for_patient(p));
            let country = site
                .zip(site_lookup)
                .and_then(|(s, lookup)| lookup.country_for_site(s));

            for plate in node.plates.values() {
                rows.push(ReportRow {
                    patient: node.patient.clone(),
                    visit: node.visit,
                    sig_plate: node.header.sig_plate,
                    plate: plate.plate,
                    signature_label: node.status.signature.label(sdv).to_string(),
                    record_label: plate.status.record.label().to_string(),
                    change_label: plate.status.change.label(sdv).to_string(),
                    field_change_count: plate.field_change_count,
                    style: style_for(node, plate.status.record, plate.status.change),
                    site,
                    country,
                });
            }
        }
        rows
    }
}
