pub mod rules;
pub mod types;

pub use rules::compute_signals;
pub use types::{SignalKind, SignalResult};
