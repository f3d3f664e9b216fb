//! SQLite write-back.
//!
//! Opens one connection, creates the three tables if absent, and wraps
//! the whole run in a single transaction that commits on `commit()`.
//! Every write is `INSERT OR REPLACE`. If the process is killed before
//! `commit()` runs, the open transaction is rolled back implicitly by
//! SQLite on connection drop.

use std::path::Path;

use rusqlite::Connection;
use sig_ports::{FieldValueRow, SigningRow, SinkError, SigningSink};
use tracing::{debug, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS signings (
    txnid INTEGER NOT NULL,
    sigid TEXT NOT NULL,
    pid TEXT NOT NULL,
    visit INTEGER NOT NULL,
    plate INTEGER NOT NULL,
    sdesc TEXT NOT NULL,
    signer TEXT NOT NULL,
    sdate TEXT NOT NULL,
    stime TEXT NOT NULL,
    PRIMARY KEY (txnid, sigid, pid, visit, plate)
);
CREATE TABLE IF NOT EXISTS signature_values (
    txnid INTEGER NOT NULL,
    sigid TEXT NOT NULL,
    plate INTEGER NOT NULL,
    field INTEGER NOT NULL,
    fdesc TEXT NOT NULL,
    fvalue TEXT NOT NULL,
    PRIMARY KEY (txnid, sigid, plate, field)
);
CREATE TABLE IF NOT EXISTS data_values (
    txnid INTEGER NOT NULL,
    sigid TEXT NOT NULL,
    plate INTEGER NOT NULL,
    field INTEGER NOT NULL,
    fdesc TEXT NOT NULL,
    fvalue TEXT NOT NULL,
    PRIMARY KEY (txnid, sigid, plate, field)
);
";

pub struct SqliteSigningSink {
    conn: Connection,
    committed: bool,
}

impl SqliteSigningSink {
    /// Open (or create) the database at `path`, create the schema if
    /// absent, and begin the run's single transaction.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let conn = Connection::open(path)
            .map_err(|e| SinkError::Write(format!("opening {path:?}: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| SinkError::Write(format!("creating schema: {e}")))?;
        conn.execute_batch("BEGIN")
            .map_err(|e| SinkError::Write(format!("beginning transaction: {e}")))?;
        Ok(Self { conn, committed: false })
    }
}

impl SigningSink for SqliteSigningSink {
    fn record_signing(&mut self, row: SigningRow) -> Result<(), SinkError> {
        let result = self.conn.execute(
            "INSERT OR REPLACE INTO signings \
             (txnid, sigid, pid, visit, plate, sdesc, signer, sdate, stime) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                row.txn_id as i64,
                row.sig_id,
                row.patient,
                row.visit,
                row.plate,
                row.sig_desc,
                row.signer,
                row.sig_date,
                row.sig_time,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "signings row abandoned");
                Err(SinkError::Write(e.to_string()))
            }
        }
    }

    fn record_signature_value(&mut self, row: FieldValueRow) -> Result<(), SinkError> {
        self.replace_field_value("signature_values", row)
    }

    fn record_data_value(&mut self, row: FieldValueRow) -> Result<(), SinkError> {
        self.replace_field_value("data_values", row)
    }

    fn commit(&mut self) -> Result<(), SinkError> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| SinkError::Commit(e.to_string()))?;
        self.committed = true;
        debug!("signing sink transaction committed");
        Ok(())
    }
}

impl SqliteSigningSink {
    fn replace_field_value(&mut self, table: &str, row: FieldValueRow) -> Result<(), SinkError> {
        let sql = format!(
            "INSERT OR REPLACE INTO {table} \
             (txnid, sigid, plate, field, fdesc, fvalue) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        );
        let result = self.conn.execute(
            &sql,
            rusqlite::params![
                row.txn_id as i64,
                row.sig_id,
                row.plate,
                row.field,
                row.field_desc,
                row.field_value,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, table, "field value row abandoned");
                Err(SinkError::Write(e.to_string()))
            }
        }
    }
}

impl Drop for SqliteSigningSink {
    fn drop(&mut self) {
        // An uncommitted transaction is rolled back by SQLite when the
        // connection closes; nothing to do here beyond the log line.
        if !self.committed {
            warn!("signing sink dropped without commit; transaction rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signing(txn_id: u64) -> SigningRow {
        SigningRow {
            txn_id,
            sig_id: "A".to_string(),
            patient: "P1".to_string(),
            visit: 1,
            plate: 10,
            sig_desc: "desc".to_string(),
            signer: "u1".to_string(),
            sig_date: "20250101".to_string(),
            sig_time: "0900".to_string(),
        }
    }

    #[test]
    fn records_and_commits() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("sigs.db");
        {
            let mut sink = SqliteSigningSink::open(&db_path).unwrap();
            sink.record_signing(sample_signing(1)).unwrap();
            sink.record_signature_value(FieldValueRow {
                txn_id: 1,
                sig_id: "A".to_string(),
                plate: 10,
                field: 5,
                field_desc: "signer".to_string(),
                field_value: "u1".to_string(),
            })
            .unwrap();
            sink.commit().unwrap();
        }

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM signings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn insert_or_replace_is_idempotent_on_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("sigs.db");
        let mut sink = SqliteSigningSink::open(&db_path).unwrap();
        sink.record_signing(sample_signing(1)).unwrap();
        sink.record_signing(sample_signing(1)).unwrap();
        sink.commit().unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM signings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
