use crate::signals::{SignalKind, SignalResult};

use super::types::{Action, Decision, PolicyVersion};

/// Name reported when no rule matches and the policy falls through to allow.
pub const DEFAULT_RULE: &str = "default_allow";

/// Everything the policy looks at for one case.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub proba: f64,
    pub signals: &'a SignalResult,
    pub close_rate: Option<f64>,
    pub close_count: usize,
}

impl DecisionInput<'_> {
    /// Fired flags other than identity-missing. Derived here rather than stored on the
    /// signal result: discounting identity is a policy concern.
    pub fn score_without_identity(&self) -> usize {
        SignalKind::ALL
            .iter()
            .filter(|k| **k != SignalKind::IdentityMissingHeavy)
            .filter(|k| self.signals.is_set(**k))
            .count()
    }

    /// Rule evidence strong enough to escalate a mid-band probability.
    /// Identity-missing alone never qualifies.
    pub fn strong_rules(&self) -> bool {
        let s = self.signals;
        self.score_without_identity() >= 2
            || s.email_mismatch
            || s.high_velocity_10m
            || s.high_velocity_1h
            || s.high_amount
    }

    /// Close-neighbor fraud rate, if enough close precedent exists to trust it.
    pub fn trusted_close_rate(&self, min_close_count: usize) -> Option<f64> {
        self.close_rate
            .filter(|_| self.close_count >= min_close_count)
    }
}

/// Numeric cut-offs of a policy version.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyThresholds {
    pub block_proba: f64,
    pub neighbor_block_proba: f64,
    pub review_proba: f64,
    pub neighbor_review_proba: f64,
    pub rules_review_proba: f64,
    pub neighbor_rate: f64,
    pub min_close_count: usize,
}

impl PolicyThresholds {
    pub const V1: Self = Self {
        block_proba: 0.90,
        neighbor_block_proba: f64::INFINITY,
        review_proba: 0.70,
        neighbor_review_proba: f64::INFINITY,
        rules_review_proba: f64::INFINITY,
        neighbor_rate: f64::INFINITY,
        min_close_count: usize::MAX,
    };

    pub const V9: Self = Self {
        block_proba: 0.97,
        neighbor_block_proba: 0.92,
        review_proba: 0.70,
        neighbor_review_proba: 0.60,
        rules_review_proba: 0.60,
        neighbor_rate: 0.90,
        min_close_count: 5,
    };
}

/// A named `(predicate, action)` pair. Rules are tried in order; the first match wins.
#[derive(Clone, Copy)]
pub struct PolicyRule {
    pub name: &'static str,
    pub action: Action,
    matches: fn(&DecisionInput<'_>, &PolicyThresholds) -> bool,
}

impl PolicyRule {
    pub fn matches(&self, input: &DecisionInput<'_>, thresholds: &PolicyThresholds) -> bool {
        (self.matches)(input, thresholds)
    }
}

impl std::fmt::Debug for PolicyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRule")
            .field("name", &self.name)
            .field("action", &self.action)
            .finish()
    }
}

fn model_block(i: &DecisionInput<'_>, t: &PolicyThresholds) -> bool {
    i.proba >= t.block_proba
}

fn neighbor_block(i: &DecisionInput<'_>, t: &PolicyThresholds) -> bool {
    i.trusted_close_rate(t.min_close_count)
        .is_some_and(|rate| i.proba >= t.neighbor_block_proba && rate >= t.neighbor_rate)
}

fn model_review(i: &DecisionInput<'_>, t: &PolicyThresholds) -> bool {
    i.proba >= t.review_proba
}

fn neighbor_review(i: &DecisionInput<'_>, t: &PolicyThresholds) -> bool {
    i.trusted_close_rate(t.min_close_count)
        .is_some_and(|rate| i.proba >= t.neighbor_review_proba && rate >= t.neighbor_rate)
}

fn rules_review(i: &DecisionInput<'_>, t: &PolicyThresholds) -> bool {
    i.proba >= t.rules_review_proba && i.strong_rules()
}

const V1_RULES: [PolicyRule; 2] = [
    PolicyRule {
        name: "model_block",
        action: Action::Block,
        matches: model_block,
    },
    PolicyRule {
        name: "model_review",
        action: Action::Review,
        matches: model_review,
    },
];

const V9_RULES: [PolicyRule; 5] = [
    PolicyRule {
        name: "model_block",
        action: Action::Block,
        matches: model_block,
    },
    PolicyRule {
        name: "neighbor_block",
        action: Action::Block,
        matches: neighbor_block,
    },
    // Hard rail: borderline-high probabilities never reach allow.
    PolicyRule {
        name: "model_review",
        action: Action::Review,
        matches: model_review,
    },
    PolicyRule {
        name: "neighbor_review",
        action: Action::Review,
        matches: neighbor_review,
    },
    PolicyRule {
        name: "rules_review",
        action: Action::Review,
        matches: rules_review,
    },
];

/// A frozen policy version: thresholds plus the ordered rule cascade.
#[derive(Debug, Clone, Copy)]
pub struct DecisionPolicy {
    version: PolicyVersion,
    thresholds: PolicyThresholds,
    rules: &'static [PolicyRule],
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::for_version(PolicyVersion::default())
    }
}

impl DecisionPolicy {
    pub fn for_version(version: PolicyVersion) -> Self {
        match version {
            PolicyVersion::V1 => Self {
                version,
                thresholds: PolicyThresholds::V1,
                rules: &V1_RULES,
            },
            PolicyVersion::V9 => Self {
                version,
                thresholds: PolicyThresholds::V9,
                rules: &V9_RULES,
            },
        }
    }

    pub fn version(&self) -> PolicyVersion {
        self.version
    }

    pub fn thresholds(&self) -> &PolicyThresholds {
        &self.thresholds
    }

    pub fn rules(&self) -> &'static [PolicyRule] {
        self.rules
    }

    /// Walk the cascade top to bottom. Total: falls through to allow, so NaN
    /// probabilities (which satisfy no threshold) also end up here.
    pub fn evaluate(&self, input: &DecisionInput<'_>) -> Decision {
        let matched = self
            .rules
            .iter()
            .find(|rule| rule.matches(input, &self.thresholds));

        Decision {
            action: matched.map(|r| r.action).unwrap_or(Action::Allow),
            rule: matched.map(|r| r.name).unwrap_or(DEFAULT_RULE),
            policy_version: self.version,
        }
    }
}

/// Recommend an action under the current policy version.
pub fn decide(
    proba: f64,
    signals: &SignalResult,
    close_rate: Option<f64>,
    close_count: usize,
) -> Action {
    DecisionPolicy::default()
        .evaluate(&DecisionInput {
            proba,
            signals,
            close_rate,
            close_count,
        })
        .action
}
