//! Record Tokeniser and AuditEvent view.
//!
//! Splits one `|`-delimited audit line into an indexed field vector and
//! exposes the well-known positions the core dispatches on.

/// One tokenised audit-trail line.
///
/// Fields are 1-indexed in the audit-trail schema (`date(1)` through
/// `newDecode(19)`); `fields` below is stored 0-indexed, and accessors
/// translate.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    fields: Vec<String>,
}

/// An audit line with too few columns to be addressed is not a hard
/// error — per the error-handling design it is silently skipped by the
/// caller. `tokenize` always succeeds; callers check `field(n)` for
/// `None` to detect a short line.
pub fn tokenize(line: &str) -> AuditEvent {
    AuditEvent {
        fields: line.split('|').map(|s| s.to_string()).collect(),
    }
}

impl AuditEvent {
    /// 1-indexed field access, matching the positional schema in
    /// the audit-trail schema. Returns `""` for positions beyond the line's length
    /// (anomalously short lines degrade to empty fields rather than
    /// panicking).
    pub fn field(&self, pos: usize) -> &str {
        self.fields.get(pos.saturating_sub(1)).map(|s| s.as_str()).unwrap_or("")
    }

    fn field_i64(&self, pos: usize) -> Option<i64> {
        let s = self.field(pos).trim();
        if s.is_empty() {
            None
        } else {
            s.parse().ok()
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn date(&self) -> &str {
        self.field(1)
    }

    pub fn time(&self) -> &str {
        self.field(2)
    }

    pub fn user(&self) -> &str {
        self.field(3)
    }

    pub fn patient(&self) -> &str {
        self.field(4)
    }

    pub fn visit(&self) -> Option<i64> {
        self.field_i64(5)
    }

    pub fn plate(&self) -> Option<i64> {
        self.field_i64(6)
    }

    pub fn fieldref(&self) -> Option<i64> {
        self.field_i64(7)
    }

    pub fn status(&self) -> Option<i64> {
        self.field_i64(9)
    }

    pub fn level(&self) -> Option<i64> {
        self.field_i64(10)
    }

    pub fn old_value(&self) -> &str {
        self.field(14)
    }

    pub fn new_value(&self) -> &str {
        self.field(15)
    }

    pub fn field_pos(&self) -> Option<i64> {
        self.field_i64(16)
    }

    pub fn field_desc(&self) -> &str {
        self.field(17)
    }

    pub fn old_decode(&self) -> &str {
        self.field(18)
    }

    pub fn new_decode(&self) -> &str {
        self.field(19)
    }
}

/// Join `value=decode` when a decode is present, else the bare value,
/// per the `FieldChange` upsert rule.
pub fn decode(value: &str, decode: &str) -> String {
    if decode.is_empty() {
        value.to_string()
    } else {
        format!("{value}={decode}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_positional_fields() {
        let line = "20250101|0900|u1|P001|1|10||0||2|3|4|5|old|new|12|desc|od|nd";
        let ev = tokenize(line);
        assert_eq!(ev.date(), "20250101");
        assert_eq!(ev.time(), "0900");
        assert_eq!(ev.user(), "u1");
        assert_eq!(ev.patient(), "P001");
        assert_eq!(ev.visit(), Some(1));
        assert_eq!(ev.plate(), Some(10));
        assert_eq!(ev.fieldref(), None);
        assert_eq!(ev.status(), Some(2));
        assert_eq!(ev.level(), Some(3));
        assert_eq!(ev.old_value(), "old");
        assert_eq!(ev.new_value(), "new");
        assert_eq!(ev.field_pos(), Some(12));
        assert_eq!(ev.field_desc(), "desc");
    }

    #[test]
    fn short_line_degrades_to_empty_fields() {
        let ev = tokenize("20250101|0900");
        assert_eq!(ev.field(15), "");
        assert_eq!(ev.new_value(), "");
        assert_eq!(ev.field_pos(), None);
    }

    #[test]
    fn decode_joins_with_equals() {
        assert_eq!(decode("1", "Yes"), "1=Yes");
        assert_eq!(decode("1", ""), "1");
    }
}
