pub mod provider;
pub mod types;

pub use provider::{EvidenceProvider, PgEvidenceProvider};
pub use types::Evidence;
