//! Run-wide tunables shared by the engine, propagator, and report
//! projection, bundling the CLI flags so they don't have
//! to be threaded as separate positional booleans.

#[derive(Debug, Clone, Copy, Default)]
pub struct RunConfig {
    /// `-a`/`--allow-signer-changes`: exempt edits whose author is the
    /// node's own signer.
    pub allow_signer_changes: bool,
    /// `-A`/`--arrived-only`: omit obligations without `RECSEEN` from
    /// the DRF.
    pub arrived_only: bool,
    /// `-F`/`--resign-when-final`: demote `DECLINED` to
    /// `DECLINED_ATFINAL` on non-final covered plates.
    pub resign_when_final: bool,
    /// `-S`/`--sdv`: render status strings under SDV vocabulary.
    pub sdv: bool,
}
