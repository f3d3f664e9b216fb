//! The three-dimensional status lattice.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureStatus {
    None,
    Complete,
    Invalidated,
}

impl Default for SignatureStatus {
    fn default() -> Self {
        Self::None
    }
}

impl SignatureStatus {
    /// Vocabulary switch (`-S`/`--sdv`): the same
    /// three-state lattice, read out under either the plain signature
    /// vocabulary or the SDV (Source Data Verification) vocabulary.
    pub fn label(&self, sdv: bool) -> &'static str {
        match (self, sdv) {
            (Self::None, false) => "Not Signed",
            (Self::Complete, false) => "Signed",
            (Self::Invalidated, false) => "Invalidated",
            (Self::None, true) => "Not Verified",
            (Self::Complete, true) => "Verified",
            (Self::Invalidated, true) => "Verification Invalidated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecStatus {
    Normal,
    Error,
    Lost,
    Deleted,
}

impl Default for RecStatus {
    fn default() -> Self {
        Self::Normal
    }
}

impl RecStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Error => "Error",
            Self::Lost => "Lost",
            Self::Deleted => "Deleted",
        }
    }
}

/// Priority-ordered: `None < Accepted < Declined < DeclinedAtFinal`,
/// larger wins during propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeStatus {
    None,
    Accepted,
    Declined,
    DeclinedAtFinal,
}

impl Default for ChangeStatus {
    fn default() -> Self {
        Self::None
    }
}

impl ChangeStatus {
    pub fn max(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }

    pub fn label(&self, sdv: bool) -> &'static str {
        match (self, sdv) {
            (Self::None, false) => "None",
            (Self::Accepted, false) => "Accepted",
            (Self::Declined, false) => "Declined",
            (Self::DeclinedAtFinal, false) => "Declined (Deferred to Final)",
            (Self::None, true) => "Not Reviewed",
            (Self::Accepted, true) => "Verified",
            (Self::Declined, true) => "Discrepancy",
            (Self::DeclinedAtFinal, true) => "Discrepancy (Deferred to Final)",
        }
    }
}

/// The `{signatureStatus, recStatus, changeStatus}` triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    pub signature: SignatureStatus,
    pub record: RecStatus,
    pub change: ChangeStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_status_ordering() {
        assert!(ChangeStatus::None < ChangeStatus::Accepted);
        assert!(ChangeStatus::Accepted < ChangeStatus::Declined);
        assert!(ChangeStatus::Declined < ChangeStatus::DeclinedAtFinal);
        assert_eq!(
            ChangeStatus::Accepted.max(ChangeStatus::Declined),
            ChangeStatus::Declined
        );
    }

    #[test]
    fn vocabulary_switches_under_sdv() {
        assert_eq!(SignatureStatus::Complete.label(false), "Signed");
        assert_eq!(SignatureStatus::Complete.label(true), "Verified");
        assert_eq!(ChangeStatus::Declined.label(false), "Declined");
        assert_eq!(ChangeStatus::Declined.label(true), "Discrepancy");
    }
}
