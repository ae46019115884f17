use crate::evidence::types::{
    display_float, display_json, display_opt, display_opt_float, Evidence,
};
use crate::neighbors::NeighborStats;
use crate::policy::Action;

const CONTEXT_BULLET_FIELDS: [&str; 4] = ["ProductCD", "card1", "addr1", "DeviceType"];

/// One sentence summarizing neighbor precedent, or an empty string when no labeled
/// neighbor was retrieved.
pub fn precedent_summary(stats: &NeighborStats) -> String {
    let close = &stats.close_neighbors;
    if let (true, Some(rate)) = (close.count > 0, close.rate) {
        return format!(
            "Close neighbors (distance <= {}): {}/{} fraud (rate {:.2}).",
            display_float(stats.max_distance_used),
            close.fraud,
            close.count,
            rate
        );
    }

    let all = &stats.all_neighbors;
    if let (true, Some(rate)) = (all.count > 0, all.rate) {
        return format!(
            "Among the {} most similar historical cases, {} were fraud (fraud rate {:.2}).",
            all.count, all.fraud, rate
        );
    }

    String::new()
}

/// Short factual bullets about the evidence, skipping anything unknown.
pub fn evidence_bullets(evidence: &Evidence) -> Vec<String> {
    let mut bullets = Vec::new();

    if let Some(v10) = evidence.entity_tx_count_10m {
        bullets.push(format!(
            "Entity velocity: {} tx in 10m, {} tx in 1h, {} tx in 24h (key: {}).",
            v10,
            display_opt(evidence.entity_tx_count_1h),
            display_opt(evidence.entity_tx_count_24h),
            display_opt(evidence.entity_key_used.as_deref()),
        ));
    }

    if let Some(present) = evidence.identity_present {
        bullets.push(format!(
            "Identity signals present: {} (missing ratio: {}).",
            python_bool(present),
            display_float(round3(evidence.identity_missing_ratio.unwrap_or(0.0))),
        ));
    }

    if evidence.amount.is_some() {
        bullets.push(format!(
            "Transaction amount: {} (high: {}).",
            display_opt_float(evidence.amount),
            evidence
                .amount_high
                .map(python_bool)
                .unwrap_or("None"),
        ));
    }

    let mut context = Vec::new();
    for key in CONTEXT_BULLET_FIELDS {
        if let Some(value) = evidence.context_value(key) {
            context.push(format!("{}={}", key, display_json(value)));
        }
        // Email domains sit between addr1 and DeviceType in the context line.
        if key == "addr1" {
            if let Some(p) = &evidence.p_emaildomain {
                context.push(format!("P_emaildomain={}", p));
            }
            if let Some(r) = &evidence.r_emaildomain {
                context.push(format!("R_emaildomain={}", r));
            }
        }
    }
    if !context.is_empty() {
        bullets.push(format!("Context: {}.", context.join(", ")));
    }

    bullets
}

/// Deterministic investigator narrative for the recommended action.
pub fn investigator_narrative(action: Action, fraud_proba: f64, evidence: &Evidence) -> String {
    let mut parts = vec![format!(
        "Model flagged this transaction with fraud probability {:.3}.",
        fraud_proba
    )];

    if let Some(amount) = evidence.amount {
        parts.push(format!("Amount is {:.2}.", amount));
    }
    if let Some(v10) = evidence.entity_tx_count_10m {
        parts.push(format!(
            "Recent activity for the entity shows {} transaction(s) in the last 10 minutes (key: {}).",
            v10,
            display_opt(evidence.entity_key_used.as_deref()),
        ));
    }
    if let Some(present) = evidence.identity_present {
        parts.push(format!(
            "Identity coverage is {}.",
            if present { "present" } else { "largely missing" }
        ));
    }

    parts.push(
        match action {
            Action::Block => {
                "Recommendation: block and initiate investigation due to high predicted risk."
            }
            Action::Review => {
                "Recommendation: send to manual review and request additional verification."
            }
            Action::Allow => {
                "Recommendation: allow, but monitor for repeated activity or pattern escalation."
            }
        }
        .to_string(),
    );

    parts.join(" ")
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn python_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}
