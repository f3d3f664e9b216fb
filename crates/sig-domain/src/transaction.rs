//! Transaction Grouper.
//!
//! Assigns a monotonic transaction id to each audit line based on a
//! `(date,time,user,patient,visit,plate)` key change.

use crate::record::AuditEvent;

#[derive(Debug, Default)]
pub struct TransactionGrouper {
    last_key: Option<String>,
    txn_id: u64,
}

impl TransactionGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute this event's transaction id, incrementing the counter
    /// whenever the grouping key changes from the previous call.
    pub fn assign(&mut self, event: &AuditEvent) -> u64 {
        let key = format!(
            "{}|{}|{}|{}|{}|{}",
            event.date(),
            event.time(),
            event.user(),
            event.patient(),
            event.visit().map(|v| v.to_string()).unwrap_or_default(),
            event.plate().map(|v| v.to_string()).unwrap_or_default(),
        );
        if self.last_key.as_deref() != Some(key.as_str()) {
            self.txn_id += 1;
            self.last_key = Some(key);
        }
        self.txn_id
    }
}
