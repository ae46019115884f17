use crate::evidence::Evidence;

use super::types::{SignalKind, SignalResult};

pub const HIGH_AMOUNT_THRESHOLD: f64 = 1000.0;
pub const VELOCITY_10M_THRESHOLD: i64 = 3;
pub const VELOCITY_1H_THRESHOLD: i64 = 5;
pub const IDENTITY_MISSING_THRESHOLD: f64 = 0.95;

/// Run every signal rule against the evidence. Total: any evidence shape yields a result,
/// and unknown fields simply leave their flag unset.
pub fn compute_signals(evidence: &Evidence) -> SignalResult {
    let checks = [
        check_high_amount(evidence),
        check_velocity_10m(evidence),
        check_velocity_1h(evidence),
        check_identity_missing(evidence),
        check_email_mismatch(evidence),
    ];

    let fired: Vec<SignalKind> = checks.into_iter().flatten().collect();
    SignalResult::from_fired(&fired)
}

/// Explicit high-amount hint, or an amount at or above the threshold.
pub fn check_high_amount(evidence: &Evidence) -> Option<SignalKind> {
    let amount = evidence.amount.unwrap_or(0.0);
    (evidence.amount_high == Some(true) || amount >= HIGH_AMOUNT_THRESHOLD)
        .then_some(SignalKind::HighAmount)
}

pub fn check_velocity_10m(evidence: &Evidence) -> Option<SignalKind> {
    (evidence.entity_tx_count_10m.unwrap_or(0) >= VELOCITY_10M_THRESHOLD)
        .then_some(SignalKind::HighVelocity10m)
}

pub fn check_velocity_1h(evidence: &Evidence) -> Option<SignalKind> {
    (evidence.entity_tx_count_1h.unwrap_or(0) >= VELOCITY_1H_THRESHOLD)
        .then_some(SignalKind::HighVelocity1h)
}

pub fn check_identity_missing(evidence: &Evidence) -> Option<SignalKind> {
    (evidence.identity_missing_ratio.unwrap_or(0.0) >= IDENTITY_MISSING_THRESHOLD)
        .then_some(SignalKind::IdentityMissingHeavy)
}

/// Both domains known and different. A missing side is never a mismatch.
pub fn check_email_mismatch(evidence: &Evidence) -> Option<SignalKind> {
    match (&evidence.p_emaildomain, &evidence.r_emaildomain) {
        (Some(p), Some(r)) if p != r => Some(SignalKind::EmailMismatch),
        _ => None,
    }
}
