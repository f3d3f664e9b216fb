//! Priority File Emitter.
//!
//! Flattens the parsed configuration to a `plate|field|level` listing:
//! one row per (plate, field) pair named by a configuration record's
//! `sigFields`, with `ignoreFields` excluded and `level` set to
//! `"signature"` on the signature plate and `"data"` on every other
//! covered plate. A trivial flattening once configuration is parsed,
//! in configuration order with duplicates across sibling records
//! collapsed.

use std::collections::HashSet;

use crate::config::SignatureConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityRow {
    pub plate: i64,
    pub field: i64,
    pub level: &'static str,
}

pub fn priority_listing(configs: &[SignatureConfig]) -> Vec<PriorityRow> {
    let mut rows = Vec::new();
    let mut seen = HashSet::new();

    for config in configs {
        let level = if config.plate == config.sig_plate {
            "signature"
        } else {
            "data"
        };
        for field in config.sig_fields.iter() {
            if config.ignore_fields.contains(field) {
                continue;
            }
            let key = (config.plate, field, level);
            if seen.insert(key) {
                rows.push(PriorityRow {
                    plate: config.plate,
                    field,
                    level,
                });
            }
        }
    }

    rows
}

/// Render rows as `plate|field|level\n`.
pub fn format_priority_listing(rows: &[PriorityRow]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&format!("{}|{}|{}\n", row.plate, row.field, row.level));
    }
    out
}
