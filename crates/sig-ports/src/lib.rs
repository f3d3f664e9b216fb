//! Port traits for the electronic-signature tracker.
//!
//! These are the seams to the external collaborators — the SQLite
//! write-back, the spreadsheet renderer, and the site/country lookup
//! tables. Only trait interfaces live here; `sig-adapters` supplies
//! the implementations.

use std::collections::BTreeMap;

use serde::Serialize;
use sig_domain::{SigNode, SigNodeKey};
use thiserror::Error;

/// Errors a sink can raise mid-run. These are logged and the
/// offending row abandoned; the run continues and commits partial
/// state, so this is deliberately not the same error type as
/// `SignatureError` (which covers fatal, run-aborting conditions).
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("write failed: {0}")]
    Write(String),
    #[error("commit failed: {0}")]
    Commit(String),
}

/// One row of the `signings` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningRow {
    pub txn_id: u64,
    pub sig_id: String,
    pub patient: String,
    pub visit: i64,
    pub plate: i64,
    pub sig_desc: String,
    pub signer: String,
    pub sig_date: String,
    pub sig_time: String,
}

/// One row of the `signature_values` or `data_values` tables (they
/// share a schema).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValueRow {
    pub txn_id: u64,
    pub sig_id: String,
    pub plate: i64,
    pub field: i64,
    pub field_desc: String,
    pub field_value: String,
}

/// The SQLite write-back contract. Implementations own a single
/// connection and a single transaction: `record_signing`
/// plus any `record_signature_value`/`record_data_value` calls made
/// before `commit` are expected to land in one transaction that rolls
/// back if the process is aborted before `commit` runs.
pub trait SigningSink {
    fn record_signing(&mut self, row: SigningRow) -> Result<(), SinkError>;
    fn record_signature_value(&mut self, row: FieldValueRow) -> Result<(), SinkError>;
    fn record_data_value(&mut self, row: FieldValueRow) -> Result<(), SinkError>;
    fn commit(&mut self) -> Result<(), SinkError>;
}

/// A no-op sink for runs that pass no `--db`; every call is a silent
/// success and `commit` never fails.
#[derive(Debug, Default)]
pub struct NullSigningSink;

impl SigningSink for NullSigningSink {
    fn record_signing(&mut self, _row: SigningRow) -> Result<(), SinkError> {
        Ok(())
    }
    fn record_signature_value(&mut self, _row: FieldValueRow) -> Result<(), SinkError> {
        Ok(())
    }
    fn record_data_value(&mut self, _row: FieldValueRow) -> Result<(), SinkError> {
        Ok(())
    }
    fn commit(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A colour tag for one report row, standing in for the XLSX cell
/// fill a spreadsheet renderer would apply. The exact colour mapping
/// lives in `sig-adapters::report`; this is just the enum the renderer
/// would switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportStyle {
    Clean,
    Warning,
    Discrepancy,
    Invalidated,
}

/// One row of the report projection: one per covered plate per
/// signature obligation. `site`/`country` are populated only when the
/// caller supplies a `SiteLookup` and the patient number parses as an
/// integer; absent a lookup they stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub patient: String,
    pub visit: i64,
    pub sig_plate: i64,
    pub plate: i64,
    pub signature_label: String,
    pub record_label: String,
    pub change_label: String,
    pub field_change_count: i64,
    pub style: ReportStyle,
    pub site: Option<i64>,
    pub country: Option<i64>,
}

/// The spreadsheet-renderer contract: a pure function from the final
/// tracked-object forest to rows+styles. No byte-level
/// `.xlsx` serialization is in scope. `site_lookup` is `None` when the
/// run was not given `--studydir`.
pub trait ReportSink {
    fn render(
        &self,
        forest: &BTreeMap<SigNodeKey, SigNode>,
        sdv: bool,
        site_lookup: Option<&dyn SiteLookup>,
    ) -> Vec<ReportRow>;
}

/// Centre (site) and country lookups, loaded from delimited files as
/// `RangeSet`s of patient numbers per centre and centre ids per
/// country — not 1:1 string pairs.
pub trait SiteLookup {
    /// The centre id whose patient range covers this patient number.
    fn site_for_patient(&self, patient: i64) -> Option<i64>;
    /// The country id whose centre range covers this centre id.
    fn country_for_site(&self, site: i64) -> Option<i64>;
}
