pub mod engine;
pub mod types;

pub use engine::{decide, DecisionInput, DecisionPolicy, PolicyThresholds};
pub use types::{Action, Decision, PolicyVersion};
