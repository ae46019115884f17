use serde::{Deserialize, Serialize};

/// Rule-derived risk indicators, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    HighAmount,
    HighVelocity10m,
    HighVelocity1h,
    IdentityMissingHeavy,
    EmailMismatch,
}

impl SignalKind {
    pub const ALL: [SignalKind; 5] = [
        Self::HighAmount,
        Self::HighVelocity10m,
        Self::HighVelocity1h,
        Self::IdentityMissingHeavy,
        Self::EmailMismatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighAmount => "high_amount",
            Self::HighVelocity10m => "high_velocity_10m",
            Self::HighVelocity1h => "high_velocity_1h",
            Self::IdentityMissingHeavy => "identity_missing_heavy",
            Self::EmailMismatch => "email_mismatch",
        }
    }

    /// Human-readable reason attached to a fired signal.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::HighAmount => "High amount threshold triggered.",
            Self::HighVelocity10m => "High velocity in 10m (>= 3).",
            Self::HighVelocity1h => "High velocity in 1h (>= 5).",
            Self::IdentityMissingHeavy => "Identity signals mostly missing (>= 95%).",
            Self::EmailMismatch => "P and R email domain mismatch.",
        }
    }
}

/// Outcome of running every signal rule against one evidence record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalResult {
    pub high_amount: bool,
    pub high_velocity_10m: bool,
    pub high_velocity_1h: bool,
    pub identity_missing_heavy: bool,
    pub email_mismatch: bool,
    /// Number of fired flags (0-5).
    pub signal_score: u8,
    /// One reason per fired flag, in evaluation order.
    pub signal_reasons: Vec<String>,
}

impl SignalResult {
    /// Build a result from the set of fired signals; score and reasons follow from it.
    pub fn from_fired(fired: &[SignalKind]) -> Self {
        let mut result = Self::default();
        for kind in SignalKind::ALL {
            if !fired.contains(&kind) {
                continue;
            }
            match kind {
                SignalKind::HighAmount => result.high_amount = true,
                SignalKind::HighVelocity10m => result.high_velocity_10m = true,
                SignalKind::HighVelocity1h => result.high_velocity_1h = true,
                SignalKind::IdentityMissingHeavy => result.identity_missing_heavy = true,
                SignalKind::EmailMismatch => result.email_mismatch = true,
            }
            result.signal_score += 1;
            result.signal_reasons.push(kind.reason().to_string());
        }
        result
    }

    pub fn is_set(&self, kind: SignalKind) -> bool {
        match kind {
            SignalKind::HighAmount => self.high_amount,
            SignalKind::HighVelocity10m => self.high_velocity_10m,
            SignalKind::HighVelocity1h => self.high_velocity_1h,
            SignalKind::IdentityMissingHeavy => self.identity_missing_heavy,
            SignalKind::EmailMismatch => self.email_mismatch,
        }
    }

    /// Number of flags actually set, independent of the stored score.
    pub fn flag_count(&self) -> u8 {
        SignalKind::ALL.iter().filter(|k| self.is_set(**k)).count() as u8
    }
}
