//! Flag definitions for the `sigtrack` binary.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "sigtrack", version, about = "Electronic-signature tracker for clinical audit trails")]
pub struct Cli {
    /// Signature configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,

    /// Write the re-sign DRF to this path.
    #[arg(short = 'd', long = "drf")]
    pub drf: Option<PathBuf>,

    /// Write the report workbook (row projection) to this path.
    #[arg(short = 'x', long = "xls")]
    pub xls: Option<PathBuf>,

    /// Accept edits whose author is the node's own signer.
    #[arg(short = 'a', long = "allow-signer-changes")]
    pub allow_signer_changes: bool,

    /// Omit obligations without RECSEEN from the DRF.
    #[arg(short = 'A', long = "arrived-only")]
    pub arrived_only: bool,

    /// Demote DECLINED to DECLINED_ATFINAL on non-final plates.
    #[arg(short = 'F', long = "resign-when-final")]
    pub resign_when_final: bool,

    /// Render status strings under the SDV vocabulary.
    #[arg(short = 'S', long = "sdv")]
    pub sdv: bool,

    /// Root for centres/countries lookups.
    #[arg(short = 's', long = "studydir")]
    pub studydir: Option<PathBuf>,

    /// SQLite output database.
    #[arg(short = 'D', long = "db")]
    pub db: Option<PathBuf>,

    /// Exclusion table file.
    #[arg(short = 'E', long = "exclusion")]
    pub exclusion: Option<PathBuf>,

    /// Emit a priority listing and exit.
    #[arg(short = 'P', long = "priority-file")]
    pub priority_file: Option<PathBuf>,
}
