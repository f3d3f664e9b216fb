//! Domain errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced at the boundary of the signature-tracker domain core.
///
/// Local, recoverable conditions (a bad exclusion row, a malformed audit
/// line, a malformed RangeSet in a lookup table) are *not* represented
/// here — per the error-handling design, those are logged and skipped
/// in place rather than propagated as `Result::Err`.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid range syntax: {input:?}")]
    InvalidRange { input: String },

    #[error("line {line}: {message}")]
    ConfigSyntax { line: usize, message: String },

    #[error("configuration aborted: {error_count} syntax error(s)")]
    ConfigAborted { error_count: usize },

    #[error("failed to open {path:?}: {source}")]
    IoOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
