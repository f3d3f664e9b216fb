//! Exclusion Table.
//!
//! Loads a delimited file of `(plate, field, user, date)` exclusion
//! tuples and answers membership queries. Date normalisation strips `/`
//! and `\r`; a row whose normalised date isn't 8 characters starting
//! with `"20"` is skipped with a warning rather than rejected outright.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ExclusionKey {
    plate: i64,
    field: i64,
    user: String,
    date: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExclusionTable {
    rows: HashSet<ExclusionKey>,
}

/// A skipped row, carried back to the caller for logging per the
/// error-handling design ("Bad exclusion row: logged to stderr, row
/// skipped; run continues").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionWarning {
    pub line: usize,
    pub reason: String,
}

fn normalize_date(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|&c| c != '/' && c != '\r').collect();
    if cleaned.len() == 8 && cleaned.starts_with("20") {
        Some(cleaned)
    } else {
        None
    }
}

impl ExclusionTable {
    /// Parse exclusion-file content, one `plate|field|user|date|...` row
    /// per line (at least 4 `|`-delimited columns; trailing columns are
    /// ignored). Returns the table plus any skipped-row warnings.
    pub fn parse(content: &str) -> (Self, Vec<ExclusionWarning>) {
        let mut table = ExclusionTable::default();
        let mut warnings = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let cols: Vec<&str> = trimmed.split('|').collect();
            if cols.len() < 4 {
                warnings.push(ExclusionWarning {
                    line: line_no,
                    reason: "fewer than 4 columns".to_string(),
                });
                continue;
            }
            let plate: i64 = match cols[0].trim().parse() {
                Ok(v) => v,
                Err(_) => {
                    warnings.push(ExclusionWarning {
                        line: line_no,
                        reason: format!("non-numeric plate {:?}", cols[0]),
                    });
                    continue;
                }
            };
            let field: i64 = match cols[1].trim().parse() {
                Ok(v) => v,
                Err(_) => {
                    warnings.push(ExclusionWarning {
                        line: line_no,
                        reason: format!("non-numeric field {:?}", cols[1]),
                    });
                    continue;
                }
            };
            let user = cols[2].trim().to_string();
            let date = match normalize_date(cols[3]) {
                Some(d) => d,
                None => {
                    warnings.push(ExclusionWarning {
                        line: line_no,
                        reason: format!("malformed date {:?}", cols[3]),
                    });
                    continue;
                }
            };
            table.rows.insert(ExclusionKey {
                plate,
                field,
                user,
                date,
            });
        }

        (table, warnings)
    }

    /// Membership query: exact equality on all four
    /// fields *and* `old_value == ""` on the probing audit event.
    pub fn contains(&self, plate: i64, field: i64, user: &str, date: &str, old_value: &str) -> bool {
        if !old_value.is_empty() {
            return false;
        }
        self.rows.contains(&ExclusionKey {
            plate,
            field,
            user: user.to_string(),
            date: date.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s6_exclusion_hits() {
        let (table, warnings) = ExclusionTable::parse("11|12|u2|20250101\n");
        assert!(warnings.is_empty());
        assert!(table.contains(11, 12, "u2", "20250101", ""));
        assert!(!table.contains(11, 12, "u2", "20250101", "prior"));
        assert!(!table.contains(11, 13, "u2", "20250101", ""));
    }

    #[test]
    fn date_with_slashes_is_normalized() {
        let (table, warnings) = ExclusionTable::parse("11|12|u2|2025/01/01\n");
        assert!(warnings.is_empty());
        assert!(table.contains(11, 12, "u2", "20250101", ""));
    }

    #[test]
    fn bad_date_is_skipped_with_warning() {
        let (table, warnings) = ExclusionTable::parse("11|12|u2|19991231\n");
        assert_eq!(warnings.len(), 1);
        assert!(!table.contains(11, 12, "u2", "19991231", ""));
    }

    #[test]
    fn short_row_is_skipped() {
        let (_table, warnings) = ExclusionTable::parse("11|12\n");
        assert_eq!(warnings.len(), 1);
    }
}
