use serde::{Deserialize, Serialize};

/// Terminal recommendation, ordered by severity: allow < review < block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Review,
    Block,
}

impl Action {
    pub const ALL: [Action; 3] = [Self::Allow, Self::Review, Self::Block];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Review => "review",
            Self::Block => "block",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Released policy revisions. Thresholds and rule order are frozen per version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyVersion {
    /// Model-only thresholds.
    V1,
    /// Tightened allow band with neighbor and rule reinforcement.
    #[default]
    V9,
}

impl PolicyVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V9 => "v9",
        }
    }
}

/// Outcome of evaluating a policy: the action and the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub action: Action,
    pub rule: &'static str,
    pub policy_version: PolicyVersion,
}
