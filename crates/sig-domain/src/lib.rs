//! Pure domain core of the electronic-signature tracker.
//!
//! No I/O, no SQL, no file formats — just RangeSet, the audit-line
//! tokeniser, the configuration grammar, the exclusion table, the
//! transaction grouper, the signature state engine, the status
//! propagator, and the two flat emitters (DRF, priority listing) that
//! read off the final forest. Everything below this crate is wiring.

pub mod config;
pub mod drf;
pub mod engine;
pub mod errors;
pub mod exclusion;
pub mod priority;
pub mod propagator;
pub mod range_set;
pub mod record;
pub mod run_config;
pub mod status;
pub mod transaction;

pub use config::{parse_config, ConfigError, SignatureConfig};
pub use drf::{build_drf, format_drf, DrfRow};
pub use engine::{
    CoveredPlate, EngineNotification, FieldChange, SigField, SigNode, SigNodeKey, SignatureEngine,
};
pub use errors::SignatureError;
pub use exclusion::{ExclusionTable, ExclusionWarning};
pub use priority::{format_priority_listing, priority_listing, PriorityRow};
pub use propagator::propagate;
pub use range_set::RangeSet;
pub use record::{tokenize, AuditEvent};
pub use run_config::RunConfig;
pub use status::{ChangeStatus, RecStatus, SignatureStatus, Status};
pub use transaction::TransactionGrouper;
