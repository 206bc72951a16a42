//! Diagnostic reporting for the error taxonomy this crate follows:
//! structural violations and empty-domain queries are logged and the caller
//! gets a sentinel back; bounds violations and model-contract violations are
//! either fatal (panic) or propagated untouched. Nothing here raises an
//! exception-like type — see `SPEC_FULL.md` §7 for the full rationale.

/// A condition that leaves the data structure unmodified: a duplicate
/// insert, a removal or update targeting something absent, a count that
/// would have gone negative.
pub fn structural_violation(context: &str, detail: &str) {
    log::warn!("structural violation in {context}: {detail}");
}

/// A query against an empty domain (no children, no particles). The caller
/// receives `None`/a sentinel; this just makes the condition visible.
pub fn empty_domain(context: &str) {
    log::warn!("empty-domain query in {context}");
}

/// A collaborator behaved inconsistently with its own contract (e.g. a node
/// directory collision). Distinct from a structural violation because it
/// implicates a caller, not this crate's own bookkeeping.
pub fn contract_violation(context: &str, detail: &str) {
    log::error!("contract violation in {context}: {detail}");
}
