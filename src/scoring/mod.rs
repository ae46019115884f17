pub mod model;

pub use model::{LogisticScorer, ModelArtifact, ProbabilityScorer};
